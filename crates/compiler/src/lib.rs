//! Asteria front-end
//!
//! Turns an 8-bit-clean byte stream into the statement tree the execution
//! core consumes. The pipeline is `tokenize` -> `Parser::parse`, and the
//! result is an [`ast::Block`] of top-level statements.
//!
//! All rejections are `parse` failures carrying the offending line and
//! column in the message.

pub mod ast;
pub mod parser;
pub mod token;

pub use ast::{Block, Expr, Stmt, StmtKind};
pub use parser::Parser;
pub use token::{tokenize, Token, TokenKind};
