use std::collections::{HashMap, HashSet};

use kl_asm::{lookup, EncodeError, Instruction, Operand as AsmOperand, OperandShape};
use kl_types::Span;

use crate::define::expand_defines;
use crate::error::AssembleError;
use crate::text::{parse_lines, DataWidth, Line, Token};

const PLACEHOLDER: u32 = 0xFFFF_FFFF;

/// A not-yet-resolved 32-bit (or narrower) write site in [`Linker::code`]:
/// `width` bytes starting at `patch_at` hold [`PLACEHOLDER`] (or a zeroed
/// data directive) until `symbol`'s address is known.
struct SymbolUse {
    patch_at: usize,
    width: usize,
    symbol: String,
}

/// Assembles and links one or more assembly-text units into a single byte
/// blob (§4.7–§4.8).
///
/// Each [`Linker::add_unit`] call assembles one file against a running
/// position counter shared across the whole link: a `@RELOC:<addr>` line
/// re-bases everything that follows it, like a `.org` directive. Within
/// that file, references to its own labels are patched immediately; a
/// reference to a name the file itself doesn't define must be declared with
/// `.import` and is deferred to [`Linker::finish`], which runs once every
/// file has contributed its `.export`ed symbols to the global table. This
/// mirrors the reference assembler's own two-phase patch: a local pass per
/// file, then one global pass so files may import symbols defined by files
/// linked either before or after them.
pub struct Linker {
    code: Vec<u8>,
    pos_offset: i64,
    global_defs: HashMap<String, u32>,
    deferred_uses: Vec<SymbolUse>,
}

impl Default for Linker {
    fn default() -> Self {
        Self::new()
    }
}

impl Linker {
    pub fn new() -> Self {
        Self { code: Vec::new(), pos_offset: 0, global_defs: HashMap::new(), deferred_uses: Vec::new() }
    }

    /// Re-bases everything assembled from here on so the next byte emitted
    /// resolves to logical address `origin`. Equivalent to a `@RELOC:`
    /// line inside a file, but driven from the CLI's own positional
    /// arguments so a multi-segment link can place each file at a fixed
    /// address without editing its source.
    pub fn set_origin(&mut self, origin: u32) {
        self.pos_offset = origin as i64 - self.code.len() as i64;
    }

    /// Assembles one file's source and appends its machine code to the
    /// running output. `path` only appears in log output, to name the file
    /// a given span of code came from.
    pub fn add_unit(&mut self, path: &str, source: &str) -> Result<(), AssembleError> {
        let _span = tracing::debug_span!("assemble_unit", path).entered();

        let expanded = expand_defines(source)?;
        let lines = parse_lines(&expanded)?;

        let mut local_defs: HashMap<String, u32> = HashMap::new();
        let mut exports: Vec<(String, Span)> = Vec::new();
        let mut imports: HashSet<String> = HashSet::new();
        let mut local_uses: Vec<SymbolUse> = Vec::new();

        for line in &lines {
            match line {
                Line::Label(name, span) => {
                    if local_defs.contains_key(name) {
                        return Err(AssembleError::DuplicateLabel(name.clone(), *span));
                    }
                    let logical = self.code.len() as i64 + self.pos_offset;
                    local_defs.insert(name.clone(), logical as u32);
                }
                Line::Export(name, span) => exports.push((name.clone(), *span)),
                Line::Import(name, _) => {
                    imports.insert(name.clone());
                }
                Line::Reloc(origin, _) => {
                    self.pos_offset = *origin as i64 - self.code.len() as i64;
                }
                Line::Data(width, token, count, span) => {
                    self.emit_data(*width, token, *count, *span, &mut local_uses)?
                }
                Line::Instruction(mnemonic, operands, span) => {
                    self.emit_instruction(mnemonic, operands, *span, &mut local_uses)?
                }
            }
        }

        for use_ in local_uses {
            if let Some(&pos) = local_defs.get(&use_.symbol) {
                self.patch(&use_, pos);
            } else if imports.contains(&use_.symbol) {
                self.deferred_uses.push(use_);
            } else {
                return Err(AssembleError::UndefinedSymbol(use_.symbol));
            }
        }

        for (name, span) in exports {
            let pos = *local_defs.get(&name).ok_or_else(|| AssembleError::ExportUndefined(name.clone(), span))?;
            if self.global_defs.contains_key(&name) {
                return Err(AssembleError::DuplicateExport(name));
            }
            self.global_defs.insert(name, pos);
        }

        tracing::debug!(path, bytes = self.code.len(), "unit assembled");
        Ok(())
    }

    fn emit_data(
        &mut self,
        width: DataWidth,
        token: &Token,
        count: u32,
        span: Span,
        local_uses: &mut Vec<SymbolUse>,
    ) -> Result<(), AssembleError> {
        for _ in 0..count {
            let value = match token {
                Token::Immediate(v) => *v,
                Token::Symbol(name) => {
                    let patch_at = self.code.len();
                    local_uses.push(SymbolUse { patch_at, width: width.bytes(0).len(), symbol: name.clone() });
                    0
                }
                Token::Register(_) => {
                    return Err(AssembleError::MalformedOperand { text: "register in data directive".into(), span })
                }
            };
            self.code.extend(width.bytes(value));
        }
        Ok(())
    }

    fn emit_instruction(
        &mut self,
        mnemonic: &str,
        operands: &[Token],
        span: Span,
        local_uses: &mut Vec<SymbolUse>,
    ) -> Result<(), AssembleError> {
        let def = lookup(mnemonic)
            .ok_or_else(|| AssembleError::UnknownMnemonic { mnemonic: mnemonic.to_string(), span })?;

        let mut asm_operands = Vec::with_capacity(operands.len());
        let mut symbol_slots: Vec<(usize, String)> = Vec::new();
        for (idx, tok) in operands.iter().enumerate() {
            match tok {
                Token::Register(r) => asm_operands.push(AsmOperand::Reg(*r)),
                Token::Immediate(v) => asm_operands.push(AsmOperand::Imm(*v)),
                Token::Symbol(name) => {
                    asm_operands.push(AsmOperand::Imm(PLACEHOLDER));
                    symbol_slots.push((idx, name.clone()));
                }
            }
        }

        let bytes = Instruction::new(def.mnemonic, asm_operands).encode().map_err(|e| match e {
            EncodeError::WrongOperandCount { expected, got } => {
                AssembleError::WrongOperandCount { mnemonic: mnemonic.to_string(), expected, got, span }
            }
            EncodeError::UnknownMnemonic => AssembleError::UnknownMnemonic { mnemonic: mnemonic.to_string(), span },
            EncodeError::ExpectedRegister | EncodeError::ExpectedImmediate => {
                AssembleError::MalformedOperand { text: mnemonic.to_string(), span }
            }
        })?;

        let prefix_len = def.bytes.len();
        let base = self.code.len();
        for (idx, name) in symbol_slots {
            let offset = symbol_byte_offset(def.shape, idx, prefix_len);
            local_uses.push(SymbolUse { patch_at: base + offset, width: 4, symbol: name });
        }

        self.code.extend(bytes);
        Ok(())
    }

    fn patch(&mut self, use_: &SymbolUse, value: u32) {
        let bytes = value.to_le_bytes();
        self.code[use_.patch_at..use_.patch_at + use_.width].copy_from_slice(&bytes[..use_.width]);
    }

    /// Runs the final global patch pass and returns the linked code.
    ///
    /// Patches every deferred use that now resolves against the combined
    /// `.export` table; an unresolved one is recorded as an error but
    /// doesn't stop the rest from being patched, so a single run reports
    /// every undefined symbol across every linked file at once rather than
    /// just the first.
    pub fn finish(mut self) -> Result<Vec<u8>, AssembleError> {
        tracing::debug!(
            deferred = self.deferred_uses.len(),
            exported = self.global_defs.len(),
            "final symbol patch pass"
        );
        let mut errors = Vec::new();
        for use_ in std::mem::take(&mut self.deferred_uses) {
            match self.global_defs.get(&use_.symbol).copied() {
                Some(pos) => self.patch(&use_, pos),
                None => errors.push(AssembleError::UndefinedSymbol(use_.symbol.clone())),
            }
        }
        match errors.len() {
            0 => Ok(self.code),
            1 => Err(errors.into_iter().next().expect("checked len")),
            _ => Err(AssembleError::Multiple(errors)),
        }
    }
}

/// The byte offset, within an encoded instruction, of the immediate slot a
/// given source-text operand index resolves to. `Ir`/`Ri`/`I` carry exactly
/// one immediate, always right after the opcode prefix; `Ii` carries two,
/// back to back.
fn symbol_byte_offset(shape: OperandShape, operand_index: usize, prefix_len: usize) -> usize {
    match shape {
        OperandShape::Ii => prefix_len + 4 * operand_index,
        _ => prefix_len,
    }
}
