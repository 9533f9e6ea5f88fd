use kl_types::RegisterId;

use crate::error::{DecodeError, EncodeError};
use crate::opcode::{lookup, OpcodeDef, OPCODES};
use crate::shape::OperandShape;

/// A single operand as seen by the encoder: either a validated register id
/// or an already-resolved 32-bit value. Symbol references are resolved to a
/// value (or a `0xFFFFFFFF` placeholder) by `kl-link` before reaching here;
/// this crate has no notion of symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operand {
    Reg(RegisterId),
    Imm(u32),
}

/// A fully-resolved instruction ready for byte encoding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Instruction {
    pub mnemonic: &'static str,
    pub operands: Vec<Operand>,
}

impl Instruction {
    pub fn new(mnemonic: &'static str, operands: Vec<Operand>) -> Self {
        Self { mnemonic, operands }
    }

    /// Encodes this instruction to its byte representation, per §4.6.
    pub fn encode(&self) -> Result<Vec<u8>, EncodeError> {
        let def = lookup(self.mnemonic).ok_or(EncodeError::UnknownMnemonic)?;
        encode_operands(def, &self.operands)
    }

    /// Decodes one instruction from the front of `bytes`, returning it along
    /// with the number of bytes consumed. Used by the encoder's own tests
    /// to assert round-trip fidelity; the linker only ever encodes.
    pub fn decode(bytes: &[u8]) -> Result<(Self, usize), DecodeError> {
        let def = match_opcode(bytes)?;
        decode_operands(def, bytes)
    }
}

fn reg_nibble(reg: RegisterId) -> u8 {
    reg.get() & 0x0F
}

fn encode_operands(def: &OpcodeDef, operands: &[Operand]) -> Result<Vec<u8>, EncodeError> {
    let mut out = def.bytes.to_vec();

    match def.shape {
        OperandShape::Nullary => {
            expect_len(operands, 0)?;
        }
        OperandShape::R => {
            expect_len(operands, 1)?;
            let reg = expect_reg(&operands[0])?;
            or_last_byte(&mut out, reg_nibble(reg));
        }
        OperandShape::Rr => {
            expect_len(operands, 2)?;
            let r1 = expect_reg(&operands[0])?;
            let r2 = expect_reg(&operands[1])?;
            out.push((reg_nibble(r1) << 4) | reg_nibble(r2));
        }
        OperandShape::Ri => {
            expect_len(operands, 2)?;
            let reg = expect_reg(&operands[0])?;
            let imm = expect_imm(&operands[1])?;
            or_last_byte(&mut out, reg_nibble(reg));
            out.extend_from_slice(&imm.to_le_bytes());
        }
        OperandShape::Ir => {
            expect_len(operands, 2)?;
            let imm = expect_imm(&operands[0])?;
            let reg = expect_reg(&operands[1])?;
            or_last_byte(&mut out, reg_nibble(reg));
            out.extend_from_slice(&imm.to_le_bytes());
        }
        OperandShape::I => {
            expect_len(operands, 1)?;
            let imm = expect_imm(&operands[0])?;
            out.extend_from_slice(&imm.to_le_bytes());
        }
        OperandShape::Ii => {
            expect_len(operands, 2)?;
            let imm1 = expect_imm(&operands[0])?;
            let imm2 = expect_imm(&operands[1])?;
            out.extend_from_slice(&imm1.to_le_bytes());
            out.extend_from_slice(&imm2.to_le_bytes());
        }
    }

    Ok(out)
}

fn or_last_byte(bytes: &mut [u8], nibble: u8) {
    if let Some(last) = bytes.last_mut() {
        *last |= nibble;
    }
}

fn expect_len(operands: &[Operand], n: usize) -> Result<(), EncodeError> {
    if operands.len() == n {
        Ok(())
    } else {
        Err(EncodeError::WrongOperandCount { expected: n, got: operands.len() })
    }
}

fn expect_reg(operand: &Operand) -> Result<RegisterId, EncodeError> {
    match operand {
        Operand::Reg(r) => Ok(*r),
        Operand::Imm(_) => Err(EncodeError::ExpectedRegister),
    }
}

fn expect_imm(operand: &Operand) -> Result<u32, EncodeError> {
    match operand {
        Operand::Imm(v) => Ok(*v),
        Operand::Reg(_) => Err(EncodeError::ExpectedImmediate),
    }
}

fn match_opcode(bytes: &[u8]) -> Result<&'static OpcodeDef, DecodeError> {
    let first = *bytes.first().ok_or(DecodeError::Truncated)?;
    let mut candidates = OPCODES.iter().filter(|def| def.bytes[0] == first);

    let single_byte = candidates.clone().find(|def| def.bytes.len() == 1);
    if let Some(def) = single_byte {
        return Ok(def);
    }

    let second = *bytes.get(1).ok_or(DecodeError::Truncated)?;
    candidates
        .find(|def| def.bytes.len() == 2 && def.bytes[1] == (second & 0xF0))
        .ok_or(DecodeError::UnknownOpcode { first, second })
}

fn decode_operands(def: &'static OpcodeDef, bytes: &[u8]) -> Result<(Instruction, usize), DecodeError> {
    let prefix_len = def.bytes.len();
    let mut pos = prefix_len;
    let mut operands = Vec::new();

    let last_byte = |bytes: &[u8]| -> Result<u8, DecodeError> {
        bytes.get(prefix_len - 1).copied().ok_or(DecodeError::Truncated)
    };
    let take_imm = |bytes: &[u8], pos: &mut usize| -> Result<u32, DecodeError> {
        let slice = bytes.get(*pos..*pos + 4).ok_or(DecodeError::Truncated)?;
        *pos += 4;
        Ok(u32::from_le_bytes(slice.try_into().expect("checked len")))
    };

    match def.shape {
        OperandShape::Nullary => {}
        OperandShape::R => {
            let reg = RegisterId::new(last_byte(bytes)? & 0x0F).expect("nibble fits");
            operands.push(Operand::Reg(reg));
        }
        OperandShape::Rr => {
            let byte = *bytes.get(pos).ok_or(DecodeError::Truncated)?;
            pos += 1;
            let r1 = RegisterId::new((byte >> 4) & 0x0F).expect("nibble fits");
            let r2 = RegisterId::new(byte & 0x0F).expect("nibble fits");
            operands.push(Operand::Reg(r1));
            operands.push(Operand::Reg(r2));
        }
        OperandShape::Ri => {
            let reg = RegisterId::new(last_byte(bytes)? & 0x0F).expect("nibble fits");
            let imm = take_imm(bytes, &mut pos)?;
            operands.push(Operand::Reg(reg));
            operands.push(Operand::Imm(imm));
        }
        OperandShape::Ir => {
            let reg = RegisterId::new(last_byte(bytes)? & 0x0F).expect("nibble fits");
            let imm = take_imm(bytes, &mut pos)?;
            operands.push(Operand::Imm(imm));
            operands.push(Operand::Reg(reg));
        }
        OperandShape::I => {
            let imm = take_imm(bytes, &mut pos)?;
            operands.push(Operand::Imm(imm));
        }
        OperandShape::Ii => {
            let imm1 = take_imm(bytes, &mut pos)?;
            let imm2 = take_imm(bytes, &mut pos)?;
            operands.push(Operand::Imm(imm1));
            operands.push(Operand::Imm(imm2));
        }
    }

    Ok((Instruction::new(def.mnemonic, operands), pos))
}
