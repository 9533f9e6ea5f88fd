use kl_types::Span;

/// Everything that can go wrong lowering an AST into assembly text.
///
/// Every variant carries the [`Span`] of the offending node so the CLI can
/// render the `ERROR: ... (path:line:col)` + source-line + caret form.
#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum CompileError {
    #[error("top-level expression must be list")]
    TopLevelNotList(Span),
    #[error("invalid top-level expression")]
    InvalidTopLevel(Span),
    #[error("expression must be top-level")]
    NotTopLevel(Span),
    #[error("wrong number of arguments")]
    WrongArgCount(Span),
    #[error("undefined variable")]
    UndefinedVariable(Span),
    #[error("undefined function")]
    UndefinedFunction(Span),
    #[error("undefined struct")]
    UndefinedStruct(Span),
    #[error("undefined struct field")]
    UndefinedStructField(Span),
    #[error("undefined static variable")]
    UndefinedStatic(Span),
    #[error("cannot declare function twice")]
    DuplicateFunction(Span),
    #[error("cannot declare variable twice")]
    DuplicateVariable(Span),
    #[error("cannot declare struct twice")]
    DuplicateStruct(Span),
    #[error("first argument must be a type")]
    ExpectedType(Span),
    #[error("invalid function name")]
    InvalidFunctionName(Span),
    #[error("invalid variable name")]
    InvalidVariableName(Span),
    #[error("invalid parameter definition")]
    InvalidParameter(Span),
    #[error("third argument must be parameter list")]
    ExpectedParameterList(Span),
    #[error("static variable must be integer or array of integers")]
    InvalidStaticInitializer(Span),
    #[error("array element must be integer literal")]
    InvalidArrayElement(Span),
    #[error("file name must be string or list of bytes")]
    InvalidImportPath(Span),
    #[error("failed to read imported file: {0}")]
    ImportIo(String),
    #[error("inline assembly must be string or list of bytes")]
    InvalidInlineAsm(Span),
    #[error("invalid data type")]
    InvalidDataType(Span),
    #[error("while loop cannot be used in expression")]
    WhileNotStatement(Span),
    #[error("cond statement cannot be used in expression")]
    CondNotStatement(Span),
    #[error("switch statement cannot be used in expression")]
    SwitchNotStatement(Span),
    #[error("cond branch cannot be empty")]
    EmptyCondBranch(Span),
    #[error("local variable cannot be declared in expression")]
    LocalNotStatement(Span),
    #[error("return cannot be used in expression")]
    ReturnNotStatement(Span),
    #[error("cannot merge types '{left}' and '{right}'")]
    TypeMergeFailure { left: String, right: String, span: Span },
    #[error("malformed number literal in assembly macro")]
    MalformedMacroArgument(Span),
}

impl CompileError {
    pub fn span(&self) -> Span {
        match self {
            CompileError::TopLevelNotList(s)
            | CompileError::InvalidTopLevel(s)
            | CompileError::NotTopLevel(s)
            | CompileError::WrongArgCount(s)
            | CompileError::UndefinedVariable(s)
            | CompileError::UndefinedFunction(s)
            | CompileError::UndefinedStruct(s)
            | CompileError::UndefinedStructField(s)
            | CompileError::UndefinedStatic(s)
            | CompileError::DuplicateFunction(s)
            | CompileError::DuplicateVariable(s)
            | CompileError::DuplicateStruct(s)
            | CompileError::ExpectedType(s)
            | CompileError::InvalidFunctionName(s)
            | CompileError::InvalidVariableName(s)
            | CompileError::InvalidParameter(s)
            | CompileError::ExpectedParameterList(s)
            | CompileError::InvalidStaticInitializer(s)
            | CompileError::InvalidArrayElement(s)
            | CompileError::InvalidImportPath(s)
            | CompileError::InvalidInlineAsm(s)
            | CompileError::InvalidDataType(s)
            | CompileError::WhileNotStatement(s)
            | CompileError::CondNotStatement(s)
            | CompileError::SwitchNotStatement(s)
            | CompileError::EmptyCondBranch(s)
            | CompileError::LocalNotStatement(s)
            | CompileError::ReturnNotStatement(s)
            | CompileError::MalformedMacroArgument(s) => *s,
            CompileError::TypeMergeFailure { span, .. } => *span,
            CompileError::ImportIo(_) => Span::synthetic(),
        }
    }
}
