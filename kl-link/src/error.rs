use kl_types::Span;

/// Everything that can go wrong turning assembly text into linked bytes.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum AssembleError {
    #[error("unknown mnemonic '{mnemonic}' ({span})")]
    UnknownMnemonic { mnemonic: String, span: Span },
    #[error("unknown directive '{directive}' ({span})")]
    UnknownDirective { directive: String, span: Span },
    #[error("malformed operand '{text}' ({span})")]
    MalformedOperand { text: String, span: Span },
    #[error("register id out of range in '{text}' ({span})")]
    RegisterOutOfRange { text: String, span: Span },
    #[error("wrong operand count for '{mnemonic}': expected {expected}, got {got} ({span})")]
    WrongOperandCount { mnemonic: String, expected: usize, got: usize, span: Span },
    #[error("label '{0}' defined twice ({1})")]
    DuplicateLabel(String, Span),
    #[error("'.export {0}' names a symbol never defined in this file ({1})")]
    ExportUndefined(String, Span),
    #[error("malformed '@RELOC:' token '{0}' ({1})")]
    MalformedReloc(String, Span),
    #[error("malformed '.define' directive ({0})")]
    MalformedDefine(Span),
    #[error("'.{0}' expects exactly one operand ({1})")]
    MalformedDataDirective(String, Span),
    #[error("symbol '{0}' is exported by more than one linked file")]
    DuplicateExport(String),
    #[error("undefined symbol '{0}'")]
    UndefinedSymbol(String),
    #[error("failed to read '{path}': {message}")]
    Io { path: String, message: String },
    #[error("{}", .0.iter().map(ToString::to_string).collect::<Vec<_>>().join("; "))]
    Multiple(Vec<AssembleError>),
}

impl AssembleError {
    /// The source location this error should be reported against, when it
    /// has one. Link-time errors (duplicate/undefined symbols, I/O) span
    /// more than one file and carry none.
    pub fn span(&self) -> Option<Span> {
        match self {
            AssembleError::UnknownMnemonic { span, .. }
            | AssembleError::UnknownDirective { span, .. }
            | AssembleError::MalformedOperand { span, .. }
            | AssembleError::RegisterOutOfRange { span, .. }
            | AssembleError::WrongOperandCount { span, .. }
            | AssembleError::DuplicateLabel(_, span)
            | AssembleError::ExportUndefined(_, span)
            | AssembleError::MalformedReloc(_, span)
            | AssembleError::MalformedDefine(span)
            | AssembleError::MalformedDataDirective(_, span) => Some(*span),
            AssembleError::DuplicateExport(_)
            | AssembleError::UndefinedSymbol(_)
            | AssembleError::Io { .. }
            | AssembleError::Multiple(_) => None,
        }
    }
}
