//! Fixed opcode table and byte-level encoder/decoder for the KL virtual ISA.
//!
//! This crate knows nothing about symbols, labels, or assembly text — it
//! packs and unpacks already-resolved [`Instruction`]s to and from bytes per
//! the table in §6.4 of the design document. `kl-link` owns the text parser
//! and symbol resolution that produce the [`Operand`]s this crate consumes.
//!
//! ## A known ISA limitation
//!
//! Signed comparisons (`<`, `>`, `<=`, `>=` over `int8`/`int16`/`int32`)
//! lower to the same `clt`/`cgt`/`cltq`/`cgtq` opcodes as unsigned
//! comparisons — there is no distinct signed-compare encoding in this ISA.
//! `kl-compiler` relies on this and does not attempt to route signed
//! comparisons elsewhere; see `kl-compiler`'s type-merge module docs.

mod error;
mod instruction;
mod opcode;
mod shape;

pub use error::{DecodeError, EncodeError};
pub use instruction::{Instruction, Operand};
pub use opcode::{lookup, OpcodeDef, OPCODES};
pub use shape::OperandShape;
