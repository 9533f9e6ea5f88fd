//! Primitive types shared by every stage of the KL toolchain: source spans,
//! node identifiers, register ids, and the closed set of fixed-width type
//! names the compiler's type-merge algebra operates over.

mod register;
mod span;
mod type_name;

pub use register::{
    RegisterId, RegisterOutOfRange, REGISTER_COUNT, REG_DIV_QUOT, REG_FRAME_BASE,
    REG_MUL_HI_DIV_REM, REG_RETURN, REG_STACK_PTR, REG_ZERO,
};
pub use span::{NodeId, Span};
pub use type_name::{TypeCheckMode, TypeName, UnknownTypeName};
