//! Constant uniquing shared between modules.

use irfuzz_core::Type;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Handle to a constant interned in a [`Context`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstId(pub u32);

/// A constant value. Floating point payloads are stored as raw bits so that
/// constants can be hashed and compared exactly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Constant {
    Int { bits: u16, value: u64 },
    Float(u32),
    Double(u64),
    NullPtr,
}

impl Constant {
    /// Create an integer constant, truncating `value` to `bits`
    pub fn int(bits: u16, value: u64) -> Self {
        let value = if bits >= 64 {
            value
        } else {
            value & ((1u64 << bits) - 1)
        };
        Constant::Int { bits, value }
    }

    pub fn float(value: f32) -> Self {
        Constant::Float(value.to_bits())
    }

    pub fn double(value: f64) -> Self {
        Constant::Double(value.to_bits())
    }

    pub fn ty(&self) -> Type {
        match self {
            Constant::Int { bits, .. } => Type::Int(*bits),
            Constant::Float(_) => Type::Float,
            Constant::Double(_) => Type::Double,
            Constant::NullPtr => Type::Ptr,
        }
    }

    /// Returns true if the constant has a valid type and an integer payload
    /// that fits its width, as produced by [`Constant::int`]
    pub fn is_canonical(&self) -> bool {
        match *self {
            Constant::Int { bits, value } => {
                Type::Int(bits).is_valid() && Constant::int(bits, value) == *self
            }
            _ => true,
        }
    }
}

#[derive(Debug, Default)]
struct ConstantPool {
    constants: Vec<Constant>,
    index: HashMap<Constant, ConstId>,
}

/// Uniquing authority for constants.
///
/// A context is usually shared behind an `Arc` by every module parsed or
/// created from it. Interning takes a write lock, lookups a read lock.
#[derive(Debug, Default)]
pub struct Context {
    pool: RwLock<ConstantPool>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    /// Intern `constant`, returning the existing id if it is already known
    pub fn intern(&self, constant: Constant) -> ConstId {
        if let Some(id) = self.pool.read().index.get(&constant) {
            return *id;
        }

        let mut pool = self.pool.write();
        if let Some(id) = pool.index.get(&constant) {
            return *id;
        }
        let id = ConstId(pool.constants.len() as u32);
        pool.constants.push(constant);
        pool.index.insert(constant, id);
        id
    }

    pub fn constant(&self, id: ConstId) -> Option<Constant> {
        self.pool.read().constants.get(id.0 as usize).copied()
    }

    /// Number of interned constants
    pub fn len(&self) -> usize {
        self.pool.read().constants.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interning_is_unique() {
        let ctx = Context::new();
        let a = ctx.intern(Constant::int(32, 7));
        let b = ctx.intern(Constant::int(32, 7));
        let c = ctx.intern(Constant::int(64, 7));
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(ctx.len(), 2);
        assert_eq!(ctx.constant(c), Some(Constant::int(64, 7)));
    }

    #[test]
    fn test_int_constants_are_masked() {
        assert_eq!(Constant::int(8, 0x1ff), Constant::Int { bits: 8, value: 0xff });
        assert_eq!(Constant::int(1, 2), Constant::Int { bits: 1, value: 0 });
        assert_eq!(Constant::int(64, u64::MAX), Constant::Int { bits: 64, value: u64::MAX });
    }

    #[test]
    fn test_constant_types() {
        assert_eq!(Constant::float(1.5).ty(), Type::Float);
        assert_eq!(Constant::NullPtr.ty(), Type::Ptr);
        assert_eq!(Constant::int(16, 0).ty(), Type::I16);
    }

    #[test]
    fn test_canonical_constants() {
        assert!(Constant::int(8, 0x1ff).is_canonical());
        assert!(Constant::double(f64::NAN).is_canonical());
        assert!(!Constant::Int { bits: 8, value: 0x1ff }.is_canonical());
        assert!(!Constant::Int { bits: 0, value: 0 }.is_canonical());
        assert!(!Constant::Int { bits: 65, value: 1 }.is_canonical());
    }

    #[test]
    fn test_nan_payloads_intern_exactly() {
        let ctx = Context::new();
        let a = ctx.intern(Constant::float(f32::NAN));
        let b = ctx.intern(Constant::float(f32::NAN));
        assert_eq!(a, b);
        assert!(ctx.constant(ConstId(99)).is_none());
    }
}
