pub mod error;
pub mod lexer;
pub mod ast;
pub mod parser;
pub mod locator;
pub mod printer;
pub mod editor;
pub mod builder;
pub mod naming;
pub mod path_resolver;
pub mod operations;
pub mod diff;
pub mod model;

#[cfg(test)]
mod tests;

pub use ast::{DeclKind, Declaration, Literal, Statement, Visibility};
pub use builder::ContainerSpec;
pub use diff::{generate_unified_diff, DiffStats};
pub use editor::{write_atomic, ClassEditor, UpsertOutcome};
pub use error::{ForgeError, Result};
pub use operations::*;
pub use path_resolver::PathResolver;
