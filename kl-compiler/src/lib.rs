//! Two-pass compiler lowering KL S-expressions into textual assembly for
//! the fixed-opcode register machine `kl-asm` encodes.
//!
//! [`CompileCtx::compile`] drives a definitions pass (collects function,
//! struct, and global tables, suppressing emission) followed by an
//! emission pass over the same tree. [`preprocess`] must run first: it
//! expands the `define`/`zero`/`str` macros that exist purely as AST
//! rewrites, before either pass ever sees the tree.

mod ctx;
mod error;
mod lower;
mod preprocess;
mod record;

pub use ctx::CompileCtx;
pub use error::CompileError;
pub use preprocess::preprocess;
pub use record::{FunctionRecord, StructRecord, VariableRecord};
