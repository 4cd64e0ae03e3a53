//! Type descriptors shared by the IR and the mutator configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Widest integer type the IR supports. Constants are stored in a `u64`.
pub const MAX_INT_BITS: u16 = 64;

/// Type of an IR value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Type {
    Void,
    /// Integer of the given bit width (1..=64)
    Int(u16),
    Float,
    Double,
    /// Opaque pointer
    Ptr,
}

impl Type {
    pub const I1: Type = Type::Int(1);
    pub const I8: Type = Type::Int(8);
    pub const I16: Type = Type::Int(16);
    pub const I32: Type = Type::Int(32);
    pub const I64: Type = Type::Int(64);

    pub fn is_void(&self) -> bool {
        matches!(self, Type::Void)
    }

    pub fn is_int(&self) -> bool {
        matches!(self, Type::Int(_))
    }

    pub fn is_bool(&self) -> bool {
        matches!(self, Type::Int(1))
    }

    pub fn is_float(&self) -> bool {
        matches!(self, Type::Float | Type::Double)
    }

    pub fn is_ptr(&self) -> bool {
        matches!(self, Type::Ptr)
    }

    /// Returns true if the type is well-formed (integer widths are in range)
    pub fn is_valid(&self) -> bool {
        match self {
            Type::Int(bits) => (1..=MAX_INT_BITS).contains(bits),
            _ => true,
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Type::Void => write!(f, "void"),
            Type::Int(bits) => write!(f, "i{}", bits),
            Type::Float => write!(f, "float"),
            Type::Double => write!(f, "double"),
            Type::Ptr => write!(f, "ptr"),
        }
    }
}
