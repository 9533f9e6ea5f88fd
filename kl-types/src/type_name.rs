use strum::{Display, EnumString};

/// The closed set of concrete fixed-width integer types, plus `void` and the
/// synthetic `int` inference type assigned to untyped integer literals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeName {
    #[strum(serialize = "uint8")]
    Uint8,
    #[strum(serialize = "uint16")]
    Uint16,
    #[strum(serialize = "uint32")]
    Uint32,
    #[strum(serialize = "int8")]
    Int8,
    #[strum(serialize = "int16")]
    Int16,
    #[strum(serialize = "int32")]
    Int32,
    #[strum(serialize = "void")]
    Void,
    /// Synthetic type assigned to an untyped integer literal before it
    /// merges with a concrete type; never legal as a declared type.
    #[strum(serialize = "int")]
    Int,
}

impl TypeName {
    /// Size in bytes. `void` and the synthetic `int` have no storage size;
    /// `int` is resolved to a concrete type before any store is emitted.
    pub const fn size(self) -> usize {
        match self {
            TypeName::Uint8 | TypeName::Int8 => 1,
            TypeName::Uint16 | TypeName::Int16 => 2,
            TypeName::Uint32 | TypeName::Int32 => 4,
            TypeName::Void | TypeName::Int => 0,
        }
    }

    /// The `.byte`/`.word`/`.dword` directive name sized from this type.
    pub const fn size_directive(self) -> Option<&'static str> {
        match self.size() {
            1 => Some("byte"),
            2 => Some("word"),
            4 => Some("dword"),
            _ => None,
        }
    }

    /// The load/store mnemonic suffix (`b`, `w`, or `d`) for this type's width.
    pub const fn width_letter(self) -> Option<char> {
        match self.size() {
            1 => Some('b'),
            2 => Some('w'),
            4 => Some('d'),
            _ => None,
        }
    }

    pub const fn is_unsigned(self) -> bool {
        matches!(self, TypeName::Uint8 | TypeName::Uint16 | TypeName::Uint32)
    }

    pub const fn is_signed(self) -> bool {
        matches!(self, TypeName::Int8 | TypeName::Int16 | TypeName::Int32)
    }

    /// Ordering key among same-signedness integer types, used by the
    /// `loose` type-merge rule to pick the wider of two operands.
    pub const fn width_rank(self) -> Option<u8> {
        match self {
            TypeName::Uint8 | TypeName::Int8 => Some(0),
            TypeName::Uint16 | TypeName::Int16 => Some(1),
            TypeName::Uint32 | TypeName::Int32 => Some(2),
            _ => None,
        }
    }

    /// Every concrete (non-synthetic, non-void) type name, in declaration order.
    pub const ALL: [TypeName; 6] = [
        TypeName::Uint8,
        TypeName::Uint16,
        TypeName::Uint32,
        TypeName::Int8,
        TypeName::Int16,
        TypeName::Int32,
    ];
}

/// Type-merge diagnostic mode selected by `--type-checking`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Display, EnumString)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeCheckMode {
    #[strum(serialize = "strict")]
    Strict,
    #[default]
    #[strum(serialize = "loose")]
    Loose,
    #[strum(serialize = "off")]
    Off,
}

/// A type name that doesn't belong to the closed set understood by the compiler.
#[derive(Debug, Clone, thiserror::Error)]
#[error("unknown type '{0}'")]
pub struct UnknownTypeName(pub String);
