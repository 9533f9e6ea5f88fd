use kl_asm::{EncodeError, Instruction, Operand};
use kl_types::RegisterId;
use rstest::rstest;

fn reg(n: u8) -> Operand {
    Operand::Reg(RegisterId::new(n).unwrap())
}

#[test]
fn push_frame_base_matches_scenario_1() {
    // `push $12` must encode as 0x20 0x1C (scenario 1 of the design document).
    let ins = Instruction::new("push", vec![reg(12)]);
    assert_eq!(ins.encode().unwrap(), vec![0x20, 0x1C]);
}

#[test]
fn mov_immediate_register_round_trips() {
    let ins = Instruction::new("movi", vec![Operand::Imm(0x11223344), reg(3)]);
    let bytes = ins.encode().unwrap();
    assert_eq!(bytes, vec![0x10, 0x13, 0x44, 0x33, 0x22, 0x11]);

    let (decoded, consumed) = Instruction::decode(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, ins);
}

#[test]
fn add_rr_appends_packed_register_byte() {
    let ins = Instruction::new("add", vec![reg(1), reg(2)]);
    assert_eq!(ins.encode().unwrap(), vec![0x01, 0x12]);
}

#[test]
fn store_immediate_to_immediate_address_has_two_immediates() {
    let ins = Instruction::new("stdii", vec![Operand::Imm(1), Operand::Imm(2)]);
    let bytes = ins.encode().unwrap();
    assert_eq!(bytes.len(), 1 + 4 + 4);
    let (decoded, _) = Instruction::decode(&bytes).unwrap();
    assert_eq!(decoded, ins);
}

#[test]
fn unknown_mnemonic_is_rejected() {
    let ins = Instruction::new("frobnicate", vec![]);
    assert_eq!(ins.encode().unwrap_err(), EncodeError::UnknownMnemonic);
}

#[test]
fn wrong_operand_shape_is_rejected() {
    let ins = Instruction::new("add", vec![reg(1)]);
    assert_eq!(
        ins.encode().unwrap_err(),
        EncodeError::WrongOperandCount { expected: 2, got: 1 }
    );
}

#[rstest]
#[case("nop", vec![])]
#[case("ret", vec![])]
#[case("push", vec![reg(5)])]
#[case("call", vec![reg(2)])]
#[case("add", vec![reg(1), reg(2)])]
#[case("ceq", vec![reg(0), reg(15)])]
#[case("addi", vec![Operand::Imm(7), reg(4)])]
#[case("stbi", vec![reg(4), Operand::Imm(9)])]
#[case("ji", vec![Operand::Imm(0x200)])]
#[case("stbii", vec![Operand::Imm(1), Operand::Imm(2)])]
fn every_shape_round_trips(#[case] mnemonic: &'static str, #[case] operands: Vec<Operand>) {
    let ins = Instruction::new(mnemonic, operands);
    let bytes = ins.encode().unwrap();
    let (decoded, consumed) = Instruction::decode(&bytes).unwrap();
    assert_eq!(consumed, bytes.len());
    assert_eq!(decoded, ins);
}

#[test]
fn two_byte_prefix_groups_distinguish_by_second_byte_high_nibble() {
    // addi and ldbi share the 0x10 first byte; their second-byte prefix
    // (0x10 vs 0xD0) must disambiguate after OR-ing in a register nibble.
    let addi = Instruction::new("addi", vec![Operand::Imm(1), reg(3)]).encode().unwrap();
    let ldbi = Instruction::new("ldbi", vec![Operand::Imm(1), reg(3)]).encode().unwrap();
    assert_eq!(addi[0], 0x10);
    assert_eq!(ldbi[0], 0x10);
    assert_ne!(addi[1] & 0xF0, ldbi[1] & 0xF0);
}
