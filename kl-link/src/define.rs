use std::collections::HashMap;

use kl_types::Span;

use crate::error::AssembleError;

/// Expands `.define NAME VALUE` as a pure text substitution over the
/// remaining lines, mirroring `kl-compiler`'s own `define` macro one layer
/// down, at the assembly-text level (§4.5). A `.define` line is consumed and
/// removed; every later line has each whitespace-delimited occurrence of
/// `NAME` (not `$NAME` or `#NAME`) replaced by `VALUE` before parsing.
pub fn expand_defines(source: &str) -> Result<String, AssembleError> {
    let mut defines: HashMap<String, String> = HashMap::new();
    let mut out_lines = Vec::new();

    for (idx, raw_line) in source.split('\n').enumerate() {
        let line = idx as u32 + 1;
        let trimmed = raw_line.trim();

        if let Some(rest) = trimmed.strip_prefix(".define") {
            let mut parts = rest.split_whitespace();
            let name = parts.next().ok_or_else(|| AssembleError::MalformedDefine(Span::new(line, 1)))?;
            let value: Vec<&str> = parts.collect();
            if value.is_empty() {
                return Err(AssembleError::MalformedDefine(Span::new(line, 1)));
            }
            defines.insert(name.to_string(), value.join(" "));
            out_lines.push(String::new());
            continue;
        }

        if defines.is_empty() {
            out_lines.push(raw_line.to_string());
            continue;
        }

        let substituted: Vec<String> = raw_line
            .split(' ')
            .map(|tok| match defines.get(tok) {
                Some(value) => value.clone(),
                None => tok.to_string(),
            })
            .collect();
        out_lines.push(substituted.join(" "));
    }

    Ok(out_lines.join("\n"))
}
