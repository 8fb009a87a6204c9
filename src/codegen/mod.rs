//! TypeScript source generation
//!
//! Entrypoints are built as a syntax tree and printed, so quoting and
//! escaping live in the printer instead of in string templates.

pub mod ast;
pub mod printer;

pub use ast::{Constructor, Expr, Item, Member, Module, Param, Stmt, TemplatePart, Type};
pub use printer::print_module;
