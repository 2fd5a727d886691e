//! Asteria Runtime: the execution core
//!
//! Key design principles:
//! - `Value`: what the language talks about (null, boolean, integer, real,
//!   string, opaque, function, array, object). Containers own their values
//!   inline; deep copy is explicit `clone()`.
//! - `Variable`: a refcounted mutable cell. All mutation goes through one.
//! - `Reference`: a root plus a path of modifiers, re-resolved from the
//!   root on every access. Never caches interior pointers.
//! - `Scope`: a named-reference map with a parent link; analytic and
//!   executive lifecycles share the one type.
//! - The evaluator is a stack machine over linearised postfix nodes; the
//!   executor walks compiled statement units and returns a `Status` sum.
//!
//! Execution is single-threaded per [`GlobalContext`]; hosts wanting
//! parallelism create independent globals.

pub mod bindings;
pub mod collector;
pub mod evaluator;
pub mod executor;
pub mod function;
pub mod global;
pub mod library;
pub mod reference;
pub mod scope;
pub mod script;
pub mod value;
pub mod variable;

pub use bindings::{ArgumentReader, NativeFunction, NativeProc};
pub use evaluator::Expression;
pub use executor::{Block, Status};
pub use function::{Callable, ScriptFunction};
pub use global::GlobalContext;
pub use reference::{Modifier, Reference};
pub use scope::Scope;
pub use script::Script;
pub use value::{Object, Opaque, Value};
pub use variable::Variable;

/// Re-exported so embedders need only this crate for the common path.
pub use asteria_core::{Error, ErrorKind, Result};
