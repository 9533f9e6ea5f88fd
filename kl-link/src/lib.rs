//! Assembly-text parser and multi-file linker for the KL virtual ISA.
//!
//! [`Linker`] owns the whole pipeline: `.define` macro expansion, line
//! classification, instruction encoding via `kl-asm`, and the two-phase
//! symbol patch that lets files `.import` symbols `.export`ed by other
//! files in the same link, regardless of link order.

mod define;
mod error;
mod linker;
mod text;

pub use error::AssembleError;
pub use linker::Linker;

/// Parses the `<addr>` half of a CLI `@RELOC:<addr>` token (decimal, or
/// `0x`/`0b`/`0o`-prefixed).
pub fn parse_cli_reloc(text: &str) -> Option<u32> {
    text::parse_integer(text).map(|v| v as u32)
}
