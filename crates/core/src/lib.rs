//! Asteria Core: shared foundation for the Asteria scripting language
//!
//! This crate holds the pieces every other crate agrees on:
//! - `Error` / `ErrorKind`: the single tagged failure channel. All failures
//!   raised by the compiler, the execution core and the standard library are
//!   one of the closed set of kinds; native bindings translate OS errors into
//!   these kinds and never invent new ones.
//! - `SourceLocation` / `Span`: where something came from, for diagnostics
//!   and backtraces.

pub mod error;
pub mod source;

pub use error::{Error, ErrorKind, Frame, Payload, Result};
pub use source::{SourceLocation, Span};
