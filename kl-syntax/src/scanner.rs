use kl_types::Span;

use crate::error::ParseError;
use crate::node::Node;

/// Scanner state. `String`/`Char`/`Comment` are entered from `Normal` and
/// always return to it; `Normal` is also where `(`/`)` push and pop list
/// frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScanMode {
    Normal,
    String,
    Char,
    Comment,
}

/// Parses a full KL source file into a root [`Node::List`] spanning the file.
///
/// Single-pass scanner: whitespace-and-delimiter-driven tokenization with
/// an explicit stack of in-progress list frames, per §4.1.
pub fn parse(source: &str) -> Result<Node, ParseError> {
    let mut stack: Vec<Vec<Node>> = vec![Vec::new()];
    let mut open_spans: Vec<Span> = vec![Span::new(1, 1)];

    let mut mode = ScanMode::Normal;
    let mut word = String::new();
    let mut word_start: Option<Span> = None;
    let mut string_bytes: Vec<u8> = Vec::new();
    let mut string_start: Option<Span> = None;
    let mut escape = false;

    let mut line: u32 = 1;
    let mut col: u32 = 1;

    let mut chars = source.chars().peekable();

    while let Some(ch) = chars.next() {
        let here = Span::new(line, col);
        if ch == '\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }

        match mode {
            ScanMode::Comment => {
                if ch == '\n' {
                    mode = ScanMode::Normal;
                }
            }

            ScanMode::String => {
                if escape {
                    string_bytes.push(ch as u8);
                    escape = false;
                } else if ch == '\\' {
                    escape = true;
                } else if ch == '"' {
                    let start = string_start.expect("set on entry");
                    let mut items: Vec<Node> =
                        string_bytes.iter().map(|&b| Node::int(b as i64, start)).collect();
                    items.push(Node::int(0, start));
                    stack.last_mut().expect("root frame always present").push(Node::list(items, start));
                    string_bytes.clear();
                    mode = ScanMode::Normal;
                } else {
                    string_bytes.push(ch as u8);
                }
            }

            ScanMode::Char => {
                let start = word_start.expect("set on entry");
                stack
                    .last_mut()
                    .expect("root frame always present")
                    .push(Node::int(ch as i64, start));
                mode = ScanMode::Normal;
            }

            ScanMode::Normal => match ch {
                '"' => {
                    string_start = Some(here);
                    string_bytes.clear();
                    mode = ScanMode::String;
                }
                '\'' => {
                    word_start = Some(here);
                    mode = ScanMode::Char;
                }
                ';' => {
                    flush_word(&mut word, &mut word_start, &mut stack)?;
                    mode = ScanMode::Comment;
                }
                '(' => {
                    flush_word(&mut word, &mut word_start, &mut stack)?;
                    stack.push(Vec::new());
                    open_spans.push(here);
                }
                ')' => {
                    flush_word(&mut word, &mut word_start, &mut stack)?;
                    if stack.len() <= 1 {
                        return Err(ParseError::UnmatchedCloseParen(here));
                    }
                    let items = stack.pop().expect("len > 1 checked above");
                    let open = open_spans.pop().expect("paired with stack");
                    let span = items.first().map(|n| n.span).unwrap_or(open);
                    stack.last_mut().expect("root frame always present").push(Node::list(items, span));
                }
                ' ' | '\t' | '\r' | '\n' => {
                    flush_word(&mut word, &mut word_start, &mut stack)?;
                }
                _ => {
                    if word.is_empty() {
                        word_start = Some(here);
                    }
                    word.push(ch);
                }
            },
        }
    }

    if mode == ScanMode::String {
        return Err(ParseError::UnclosedString(string_start.unwrap_or(Span::synthetic())));
    }
    if mode == ScanMode::Char {
        return Err(ParseError::UnclosedChar(word_start.unwrap_or(Span::synthetic())));
    }

    flush_word(&mut word, &mut word_start, &mut stack)?;

    if stack.len() != 1 {
        return Err(ParseError::UnclosedList(
            open_spans.last().copied().unwrap_or(Span::synthetic()),
        ));
    }

    Ok(Node::list(stack.pop().expect("checked len == 1"), Span::new(1, 1)))
}

fn flush_word(
    word: &mut String,
    word_start: &mut Option<Span>,
    stack: &mut [Vec<Node>],
) -> Result<(), ParseError> {
    if word.is_empty() {
        return Ok(());
    }
    let span = word_start.take().expect("non-empty word always has a start span");
    let node = classify_word(std::mem::take(word), span)?;
    stack.last_mut().expect("root frame always present").push(node);
    Ok(())
}

fn classify_word(text: String, span: Span) -> Result<Node, ParseError> {
    let parsed = if let Some(digits) = text.strip_prefix("0x") {
        i64::from_str_radix(digits, 16).ok()
    } else if let Some(digits) = text.strip_prefix("0b") {
        i64::from_str_radix(digits, 2).ok()
    } else if let Some(digits) = text.strip_prefix("0o") {
        i64::from_str_radix(digits, 8).ok()
    } else if text.starts_with(|c: char| c.is_ascii_digit()) {
        text.parse::<i64>().ok()
    } else {
        return Ok(Node::word(text, span));
    };

    match parsed {
        Some(value) => Ok(Node::int(value, span)),
        None => Err(ParseError::MalformedNumber { text, span }),
    }
}
