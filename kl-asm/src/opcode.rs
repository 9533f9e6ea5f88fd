use crate::shape::OperandShape;

/// A single row of the fixed opcode map: the mnemonic text, its opcode byte
/// prefix, and the operand shape that determines how the rest of the
/// instruction is packed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpcodeDef {
    pub mnemonic: &'static str,
    pub bytes: &'static [u8],
    pub shape: OperandShape,
}

/// Declares the fixed opcode table and, for each row, a `const` with the
/// encoded prefix bytes. Mirrors the reference assembler's `INSTRUCTIONS`
/// dict: one source of truth for mnemonic, opcode, and operand shape.
macro_rules! opcode_table {
    ($( $mnemonic:literal => $shape:ident, $bytes:expr );+ $(;)?) => {
        /// The complete, fixed mapping from mnemonic to opcode bytes and
        /// operand shape. Order matches §6.4 of the design document.
        pub const OPCODES: &[OpcodeDef] = &[
            $(
                OpcodeDef { mnemonic: $mnemonic, bytes: &$bytes, shape: OperandShape::$shape },
            )+
        ];
    };
}

opcode_table! {
    "nop"     => Nullary, [0x00];

    "add"     => Rr, [0x01];
    "sub"     => Rr, [0x02];
    "mul"     => Rr, [0x03];
    "div"     => Rr, [0x04];
    "and"     => Rr, [0x05];
    "or"      => Rr, [0x06];
    "xor"     => Rr, [0x07];
    "shl"     => Rr, [0x08];
    "shr"     => Rr, [0x09];

    "stb"     => Rr, [0x0A];
    "stw"     => Rr, [0x0B];
    "std"     => Rr, [0x0C];
    "ldb"     => Rr, [0x0D];
    "ldw"     => Rr, [0x0E];
    "ldd"     => Rr, [0x0F];

    "addi"    => Ir, [0x10, 0x10];
    "subi"    => Ir, [0x10, 0x20];
    "muli"    => Ir, [0x10, 0x30];
    "divi"    => Ir, [0x10, 0x40];
    "andi"    => Ir, [0x10, 0x50];
    "ori"     => Ir, [0x10, 0x60];
    "xori"    => Ir, [0x10, 0x70];
    "shli"    => Ir, [0x10, 0x80];
    "shri"    => Ir, [0x10, 0x90];
    "stbi"    => Ri, [0x10, 0xA0];
    "stwi"    => Ri, [0x10, 0xB0];
    "stdi"    => Ri, [0x10, 0xC0];
    "ldbi"    => Ir, [0x10, 0xD0];
    "ldwi"    => Ir, [0x10, 0xE0];
    "lddi"    => Ir, [0x10, 0xF0];

    "push"    => R, [0x20, 0x10];
    "pop"     => R, [0x20, 0x20];
    "j"       => R, [0x20, 0x30];
    "jt"      => R, [0x20, 0x40];
    "jf"      => R, [0x20, 0x50];
    "call"    => R, [0x20, 0x90];
    "pushi"   => I, [0x21];
    "ji"      => I, [0x23];
    "jti"     => I, [0x24];
    "jfi"     => I, [0x25];
    "calli"   => I, [0x29];

    "cgtq"    => Rr, [0x2A];
    "cltq"    => Rr, [0x2B];
    "ceq"     => Rr, [0x2C];
    "cnq"     => Rr, [0x2D];
    "cgt"     => Rr, [0x2E];
    "clt"     => Rr, [0x2F];

    "movi"    => Ir, [0x30, 0x10];
    "bal"     => R,  [0x30, 0x60];
    "cgtqi"   => Ri, [0x30, 0xA0];
    "cltqi"   => Ri, [0x30, 0xB0];
    "ceqi"    => Ri, [0x30, 0xC0];
    "cnqi"    => Ri, [0x30, 0xD0];
    "cgti"    => Ri, [0x30, 0xE0];
    "clti"    => Ri, [0x30, 0xF0];

    "mov"     => Rr, [0x31];
    "stbii"   => Ii, [0x32];
    "stwii"   => Ii, [0x33];
    "stdii"   => Ii, [0x34];
    "ret"     => Nullary, [0x35];

    "syscall" => Nullary, [0x40];
    "iret"    => Nullary, [0x41];
    "cli"     => Nullary, [0x42];
    "sti"     => Nullary, [0x43];
}

/// Looks up a mnemonic's opcode definition. `O(n)` over a table of ~50 rows;
/// not worth a `HashMap` for a table this small and this rarely queried
/// relative to the rest of assembly.
pub fn lookup(mnemonic: &str) -> Option<&'static OpcodeDef> {
    OPCODES.iter().find(|def| def.mnemonic == mnemonic)
}
