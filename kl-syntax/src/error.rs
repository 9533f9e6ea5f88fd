use kl_types::Span;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("unmatched ')'")]
    UnmatchedCloseParen(Span),
    #[error("unterminated list")]
    UnclosedList(Span),
    #[error("unterminated string literal")]
    UnclosedString(Span),
    #[error("unterminated character literal")]
    UnclosedChar(Span),
    #[error("malformed number literal '{text}'")]
    MalformedNumber { text: String, span: Span },
}

impl ParseError {
    pub fn span(&self) -> Span {
        match self {
            ParseError::UnmatchedCloseParen(s)
            | ParseError::UnclosedList(s)
            | ParseError::UnclosedString(s)
            | ParseError::UnclosedChar(s) => *s,
            ParseError::MalformedNumber { span, .. } => *span,
        }
    }
}
