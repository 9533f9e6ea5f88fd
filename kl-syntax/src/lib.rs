//! Scanner and AST for KL's S-expression surface syntax.
//!
//! This crate owns tokenization only. String and character literals are
//! lowered to plain [`Node`] values at scan time (see [`NodeKind`]) so that
//! `kl-compiler` never has to special-case them.

mod error;
mod node;
mod scanner;

pub use error::ParseError;
pub use node::{Node, NodeKind};
pub use scanner::parse;
