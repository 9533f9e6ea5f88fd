use core::fmt;

/// Total number of general-purpose registers exposed by the virtual ISA.
pub const REGISTER_COUNT: u8 = 16;

/// `$0` holds the integer zero; writes to it are ignored by the runtime.
pub const REG_ZERO: RegisterId = RegisterId(0);
/// `$1` holds a function's return value.
pub const REG_RETURN: RegisterId = RegisterId(1);
/// `$12` is the frame-base pointer, set at function entry to the stack pointer.
pub const REG_FRAME_BASE: RegisterId = RegisterId(12);
/// `$13` holds the result of `mul`, and the remainder of `div`.
pub const REG_MUL_HI_DIV_REM: RegisterId = RegisterId(13);
/// `$14` holds the quotient of `div`.
pub const REG_DIV_QUOT: RegisterId = RegisterId(14);
/// `$15` is the stack pointer: 4-byte aligned, grows downward.
pub const REG_STACK_PTR: RegisterId = RegisterId(15);

/// A validated register identifier in `0..=15`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct RegisterId(u8);

/// A register id outside the representable `0..=15` range.
#[derive(Debug, thiserror::Error, Clone, Copy, PartialEq, Eq)]
#[error("register id {0} is out of range (must be 0..=15)")]
pub struct RegisterOutOfRange(pub u32);

impl RegisterId {
    /// Builds a register id, rejecting anything outside `0..=15`.
    pub const fn new(id: u8) -> Result<Self, RegisterOutOfRange> {
        if id < REGISTER_COUNT {
            Ok(Self(id))
        } else {
            Err(RegisterOutOfRange(id as u32))
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    /// The register one slot above this one in the output-register
    /// convention used by the emitter (`r` holds the value, `r+1` the
    /// address for L-values). Saturates at the top of the register file,
    /// which the emitter never actually reaches in practice since it only
    /// ever uses `r` in `{1, 2}`.
    pub const fn next(self) -> Self {
        if self.0 + 1 < REGISTER_COUNT {
            Self(self.0 + 1)
        } else {
            self
        }
    }
}

impl TryFrom<u8> for RegisterId {
    type Error = RegisterOutOfRange;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl fmt::Display for RegisterId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "${}", self.0)
    }
}
