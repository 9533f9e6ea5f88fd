/// Instruction encoding failures: an unknown mnemonic, or an operand list
/// that doesn't match the mnemonic's fixed shape.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum EncodeError {
    #[error("unknown mnemonic")]
    UnknownMnemonic,
    #[error("wrong operand count: expected {expected}, got {got}")]
    WrongOperandCount { expected: usize, got: usize },
    #[error("expected a register operand")]
    ExpectedRegister,
    #[error("expected an immediate operand")]
    ExpectedImmediate,
}

/// Instruction decoding failures, used only by this crate's own
/// round-trip tests (the linker never decodes).
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("instruction bytes truncated")]
    Truncated,
    #[error("unknown opcode bytes {first:#04x} {second:#04x}")]
    UnknownOpcode { first: u8, second: u8 },
}
