use std::collections::{HashMap, HashSet};

use kl_syntax::Node;
use kl_types::{Span, TypeCheckMode, TypeName};

use crate::error::CompileError;
use crate::record::{FunctionRecord, Scopes, StructRecord};

/// Per-translation-unit compiler state: the scope stack, function/struct
/// tables, the output assembly buffer, and the symbolic stack-offset
/// tracker used to allocate `local` slots.
///
/// A fresh `CompileCtx` is built for the top-level unit and for every file
/// pulled in by `(import ...)` — imported units compile in
/// definitions-only mode and contribute only their exported tables back to
/// the parent (§5: no shared mutable state across units).
pub struct CompileCtx {
    pub(crate) code: String,
    pub(crate) funcs: HashMap<String, FunctionRecord>,
    pub(crate) structs: HashMap<String, StructRecord>,
    pub(crate) scopes: Scopes,
    pub(crate) sp_offset: i32,

    pub path: String,
    pub source_lines: Option<Vec<String>>,
    last_commented_line: u32,
    pub comment: bool,

    pub type_checking: TypeCheckMode,
    pub(crate) definitions_mode: bool,
    /// Set for a `CompileCtx` constructed to process an `(import ...)`'d
    /// file; governs whether `@private` actually suppresses `.export`.
    pub(crate) is_import_unit: bool,
    pub(crate) pending_private: bool,
    /// Names marked by a preceding `@private` in THIS unit's definitions
    /// pass; consulted by an importing unit when deciding what to merge.
    pub(crate) private: HashSet<String>,
}

impl CompileCtx {
    pub fn new(path: impl Into<String>, comment: bool, type_checking: TypeCheckMode) -> Self {
        Self {
            code: String::new(),
            funcs: HashMap::new(),
            structs: HashMap::new(),
            scopes: Scopes::new(),
            sp_offset: 0,
            path: path.into(),
            source_lines: None,
            last_commented_line: 0,
            comment,
            type_checking,
            definitions_mode: false,
            is_import_unit: false,
            pending_private: false,
            private: HashSet::new(),
        }
    }

    pub(crate) fn has_function(&self, name: &str) -> bool {
        self.funcs.contains_key(name)
    }

    /// A sub-compiler for an `(import "path")`'d file: starts in
    /// definitions-only mode and never emits code of its own.
    pub(crate) fn new_import_unit(path: impl Into<String>, type_checking: TypeCheckMode) -> Self {
        let mut ctx = Self::new(path, false, type_checking);
        ctx.definitions_mode = true;
        ctx.is_import_unit = true;
        ctx
    }

    pub fn set_source(&mut self, source: &str) {
        self.source_lines = Some(source.split('\n').map(str::to_string).collect());
    }

    /// Runs the full two-pass compile (definitions, then emission) and
    /// returns the generated assembly text.
    pub fn compile(&mut self, root: &Node) -> Result<String, CompileError> {
        let items = root.as_list().ok_or_else(|| CompileError::TopLevelNotList(root.span))?;

        self.definitions_mode = true;
        self.run_pass(items)?;

        self.definitions_mode = false;
        self.code.clear();
        self.last_commented_line = 0;
        self.run_pass(items)?;

        Ok(std::mem::take(&mut self.code))
    }

    /// Runs only the definitions pass, for an imported unit: populates
    /// `funcs`/`structs`/global `scopes` but emits no code.
    pub(crate) fn compile_definitions_only(&mut self, root: &Node) -> Result<(), CompileError> {
        let items = root.as_list().ok_or_else(|| CompileError::TopLevelNotList(root.span))?;
        self.run_pass(items)
    }

    fn run_pass(&mut self, items: &[Node]) -> Result<(), CompileError> {
        for node in items {
            crate::lower::generate_expression(self, node, true, false, 1)?;
        }
        Ok(())
    }

    pub(crate) fn emit(&mut self, text: &str) {
        self.code.push_str(text);
    }

    pub(crate) fn prepend(&mut self, text: &str) {
        self.code = format!("{text}{}", self.code);
    }

    /// Emits a `; >>> path:line | source` annotation the first time a new
    /// source line is reached, mirroring `--comment`'s original behavior.
    pub(crate) fn maybe_comment(&mut self, span: Span) {
        if !self.comment || self.definitions_mode || span.line <= self.last_commented_line {
            return;
        }
        self.last_commented_line = span.line;

        let mut line = format!("; >>> {}:{}", self.path, span.line);
        if let Some(lines) = &self.source_lines {
            if let Some(src) = lines.get(span.line as usize - 1) {
                line.push_str(" | ");
                line.push_str(src);
            }
        }
        line.push('\n');
        self.emit(&line);
    }

    /// The type-merge algebra (§4.4): reconciles the static types of a
    /// binary operator's operands, or of a store's destination and value.
    pub fn merge_types(&self, l: TypeName, r: TypeName, span: Span) -> Result<TypeName, CompileError> {
        if self.type_checking == TypeCheckMode::Off {
            return Ok(l);
        }

        if l == r {
            return Ok(l);
        }

        if l == TypeName::Int && r != TypeName::Int {
            return Ok(r);
        }
        if r == TypeName::Int && l != TypeName::Int {
            return Ok(l);
        }

        if self.type_checking == TypeCheckMode::Loose {
            let widened = match (l.width_rank(), r.width_rank()) {
                (Some(lr), Some(rr)) if l.is_unsigned() && r.is_unsigned() => {
                    Some(if lr >= rr { l } else { r })
                }
                (Some(lr), Some(rr)) if l.is_signed() && r.is_signed() => {
                    Some(if lr >= rr { l } else { r })
                }
                _ => None,
            };
            if let Some(ty) = widened {
                tracing::warn!(
                    path = %self.path, line = span.line, column = span.column,
                    "widening merge of '{l}' and '{r}' to '{ty}' in loose mode",
                );
                return Ok(ty);
            }
        }

        Err(CompileError::TypeMergeFailure { left: l.to_string(), right: r.to_string(), span })
    }
}
