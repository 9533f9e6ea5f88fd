use kl_types::{RegisterId, Span};

use crate::error::AssembleError;

/// One resolved operand token from assembly source: a register, a bare
/// literal, or a `#name` symbol reference still awaiting resolution.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Token {
    Register(RegisterId),
    Immediate(u32),
    Symbol(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DataWidth {
    Byte,
    Word,
    Dword,
}

impl DataWidth {
    pub(crate) fn bytes(self, value: u32) -> Vec<u8> {
        match self {
            DataWidth::Byte => vec![value as u8],
            DataWidth::Word => (value as u16).to_le_bytes().to_vec(),
            DataWidth::Dword => value.to_le_bytes().to_vec(),
        }
    }
}

/// One classified, `.define`-substituted source line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Line {
    Label(String, Span),
    Export(String, Span),
    Import(String, Span),
    /// `.byte/.word/.dword value [count]`: `value` repeated `count` times
    /// (`count` defaults to 1).
    Data(DataWidth, Token, u32, Span),
    Reloc(u32, Span),
    Instruction(String, Vec<Token>, Span),
}

/// Parses already `.define`-expanded source into classified lines, skipping
/// blank lines and `;`-led comments.
pub(crate) fn parse_lines(source: &str) -> Result<Vec<Line>, AssembleError> {
    let mut lines = Vec::new();
    for (idx, raw_line) in source.split('\n').enumerate() {
        let span = Span::new(idx as u32 + 1, 1);
        let trimmed = raw_line.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') {
            continue;
        }
        lines.push(parse_line(trimmed, span)?);
    }
    Ok(lines)
}

fn parse_line(trimmed: &str, span: Span) -> Result<Line, AssembleError> {
    if is_label_def(trimmed) {
        let name = trimmed[1..trimmed.len() - 1].to_string();
        return Ok(Line::Label(name, span));
    }

    let mut tokens = trimmed.split_whitespace();
    let head = tokens.next().expect("non-empty trimmed line");

    if let Some(hex) = head.strip_prefix("@RELOC:") {
        let origin = parse_integer(hex)
            .ok_or_else(|| AssembleError::MalformedReloc(trimmed.to_string(), span))?;
        return Ok(Line::Reloc(origin as u32, span));
    }

    if let Some(directive) = head.strip_prefix('.') {
        let rest: Vec<&str> = tokens.collect();
        return parse_directive(directive, &rest, span);
    }

    let mnemonic = head.to_string();
    let operands = tokens.map(|tok| parse_token(tok, span)).collect::<Result<Vec<_>, _>>()?;
    Ok(Line::Instruction(mnemonic, operands, span))
}

fn is_label_def(trimmed: &str) -> bool {
    trimmed.starts_with('#')
        && trimmed.ends_with(':')
        && !trimmed.contains(char::is_whitespace)
        && trimmed.len() > 2
}

fn parse_directive(directive: &str, rest: &[&str], span: Span) -> Result<Line, AssembleError> {
    match directive {
        "export" => {
            let name = symbol_name(rest, span)?;
            Ok(Line::Export(name, span))
        }
        "import" => {
            let name = symbol_name(rest, span)?;
            Ok(Line::Import(name, span))
        }
        "byte" | "word" | "dword" => {
            let (operand, count) = match rest {
                [operand] => (*operand, 1),
                [operand, count] => {
                    let count = parse_integer(count)
                        .ok_or_else(|| AssembleError::MalformedDataDirective(directive.to_string(), span))?;
                    (*operand, count as u32)
                }
                _ => return Err(AssembleError::MalformedDataDirective(directive.to_string(), span)),
            };
            let width = match directive {
                "byte" => DataWidth::Byte,
                "word" => DataWidth::Word,
                _ => DataWidth::Dword,
            };
            let token = parse_token(operand, span)?;
            Ok(Line::Data(width, token, count, span))
        }
        other => Err(AssembleError::UnknownDirective { directive: other.to_string(), span }),
    }
}

fn symbol_name(rest: &[&str], span: Span) -> Result<String, AssembleError> {
    match rest {
        [sym] => sym
            .strip_prefix('#')
            .map(str::to_string)
            .ok_or_else(|| AssembleError::MalformedOperand { text: sym.to_string(), span }),
        _ => Err(AssembleError::MalformedOperand { text: rest.join(" "), span }),
    }
}

fn parse_token(text: &str, span: Span) -> Result<Token, AssembleError> {
    if let Some(digits) = text.strip_prefix('$') {
        let id: u8 = digits
            .parse()
            .map_err(|_| AssembleError::MalformedOperand { text: text.to_string(), span })?;
        let reg = RegisterId::new(id)
            .map_err(|_| AssembleError::RegisterOutOfRange { text: text.to_string(), span })?;
        return Ok(Token::Register(reg));
    }
    if let Some(name) = text.strip_prefix('#') {
        return Ok(Token::Symbol(name.to_string()));
    }
    if let Some(ch) = parse_char_literal(text) {
        return Ok(Token::Immediate(ch as u32));
    }
    let value = parse_integer(text).ok_or_else(|| AssembleError::MalformedOperand { text: text.to_string(), span })?;
    Ok(Token::Immediate(value as u32))
}

/// Parses a `'x'` character literal into its codepoint.
fn parse_char_literal(text: &str) -> Option<char> {
    let inner = text.strip_prefix('\'')?.strip_suffix('\'')?;
    let mut chars = inner.chars();
    let ch = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(ch)
}

/// Parses a decimal or `0x`/`0b`/`0o`-prefixed integer literal, with an
/// optional leading `-` for the decimal form.
pub(crate) fn parse_integer(text: &str) -> Option<i64> {
    let (negative, text) = match text.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, text),
    };
    let value = if let Some(hex) = text.strip_prefix("0x").or_else(|| text.strip_prefix("0X")) {
        i64::from_str_radix(hex, 16).ok()?
    } else if let Some(bin) = text.strip_prefix("0b").or_else(|| text.strip_prefix("0B")) {
        i64::from_str_radix(bin, 2).ok()?
    } else if let Some(oct) = text.strip_prefix("0o").or_else(|| text.strip_prefix("0O")) {
        i64::from_str_radix(oct, 8).ok()?
    } else {
        text.parse().ok()?
    };
    Some(if negative { -value } else { value })
}
