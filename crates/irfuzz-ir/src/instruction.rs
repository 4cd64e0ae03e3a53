//! Instruction set for the IR.

use crate::context::ConstId;
use irfuzz_core::Type;
use serde::{Deserialize, Serialize};

/// Identifier of an instruction, unique within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InstId(pub u32);

/// Identifier of a basic block, unique within its function
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct BlockId(pub u32);

impl InstId {
    /// Placeholder carried by instructions that are not yet inserted
    pub const UNASSIGNED: InstId = InstId(u32::MAX);

    /// Ids at or above this are rejected by the verifier, leaving headroom
    /// for fresh ids
    pub const LIMIT: u32 = 1 << 24;
}

/// Anything usable as an operand
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Value {
    /// Result of an instruction in the same function
    Inst(InstId),
    /// Function argument
    Arg(u32),
    /// Address of a module global
    Global(u32),
    /// Interned constant
    Const(ConstId),
    /// Placeholder of the given type
    Undef(Type),
}

/// Integer comparison predicate
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    pub const ALL: [IntPredicate; 10] = [
        IntPredicate::Eq,
        IntPredicate::Ne,
        IntPredicate::Ugt,
        IntPredicate::Uge,
        IntPredicate::Ult,
        IntPredicate::Ule,
        IntPredicate::Sgt,
        IntPredicate::Sge,
        IntPredicate::Slt,
        IntPredicate::Sle,
    ];
}

/// Floating point comparison predicate (ordered `O*` and unordered `U*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FloatPredicate {
    Oeq,
    Ogt,
    Oge,
    Olt,
    Ole,
    One,
    Ord,
    Ueq,
    Ugt,
    Uge,
    Ult,
    Ule,
    Une,
    Uno,
}

impl FloatPredicate {
    pub const ALL: [FloatPredicate; 14] = [
        FloatPredicate::Oeq,
        FloatPredicate::Ogt,
        FloatPredicate::Oge,
        FloatPredicate::Olt,
        FloatPredicate::Ole,
        FloatPredicate::One,
        FloatPredicate::Ord,
        FloatPredicate::Ueq,
        FloatPredicate::Ugt,
        FloatPredicate::Uge,
        FloatPredicate::Ult,
        FloatPredicate::Ule,
        FloatPredicate::Une,
        FloatPredicate::Uno,
    ];
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Predicate {
    Int(IntPredicate),
    Float(FloatPredicate),
}

/// Optional instruction flags. Which ones are legal depends on the opcode.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstFlags {
    /// No unsigned wrap
    pub nuw: bool,
    /// No signed wrap
    pub nsw: bool,
    pub exact: bool,
    /// Fast-math
    pub fast: bool,
}

impl InstFlags {
    pub fn is_legal_for(&self, opcode: Opcode) -> bool {
        ((!self.nuw && !self.nsw) || opcode.allows_wrap_flags())
            && (!self.exact || opcode.allows_exact())
            && (!self.fast || opcode.allows_fast_math())
    }
}

/// IR Opcode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    // Integer arithmetic
    Add,
    Sub,
    Mul,
    UDiv,
    SDiv,
    URem,
    SRem,
    Shl,
    LShr,
    AShr,
    And,
    Or,
    Xor,

    // Floating point arithmetic
    FAdd,
    FSub,
    FMul,
    FDiv,
    FRem,

    // Comparison
    ICmp,
    FCmp,

    // Other
    Select,
    Store,

    // Terminators
    Ret,
    Br,
    CondBr,
    Unreachable,
}

impl Opcode {
    /// Returns true if this opcode ends a basic block
    pub fn is_terminator(&self) -> bool {
        matches!(
            self,
            Opcode::Ret | Opcode::Br | Opcode::CondBr | Opcode::Unreachable
        )
    }

    pub fn is_int_binop(&self) -> bool {
        matches!(
            self,
            Opcode::Add
                | Opcode::Sub
                | Opcode::Mul
                | Opcode::UDiv
                | Opcode::SDiv
                | Opcode::URem
                | Opcode::SRem
                | Opcode::Shl
                | Opcode::LShr
                | Opcode::AShr
                | Opcode::And
                | Opcode::Or
                | Opcode::Xor
        )
    }

    pub fn is_float_binop(&self) -> bool {
        matches!(
            self,
            Opcode::FAdd | Opcode::FSub | Opcode::FMul | Opcode::FDiv | Opcode::FRem
        )
    }

    pub fn allows_wrap_flags(&self) -> bool {
        matches!(self, Opcode::Add | Opcode::Sub | Opcode::Mul | Opcode::Shl)
    }

    pub fn allows_exact(&self) -> bool {
        matches!(
            self,
            Opcode::UDiv | Opcode::SDiv | Opcode::LShr | Opcode::AShr
        )
    }

    pub fn allows_fast_math(&self) -> bool {
        self.is_float_binop() || matches!(self, Opcode::FCmp)
    }

    /// Returns the number of operands this opcode expects
    pub fn num_operands(&self) -> usize {
        match self {
            op if op.is_int_binop() || op.is_float_binop() => 2,
            Opcode::ICmp | Opcode::FCmp => 2,
            Opcode::Select => 3,
            Opcode::Store => 2, // value, pointer
            Opcode::Ret => 0,   // plus the return value in non-void functions
            Opcode::Br => 0,
            Opcode::CondBr => 1,
            Opcode::Unreachable => 0,
            _ => 0,
        }
    }

    /// Number of successor blocks
    pub fn num_targets(&self) -> usize {
        match self {
            Opcode::Br => 1,
            Opcode::CondBr => 2,
            _ => 0,
        }
    }

    /// Computes the result type from the operand types, or `None` when the
    /// operands are ill-typed. `Ret` is checked against the function instead.
    pub fn result_type(&self, operands: &[Type]) -> Option<Type> {
        if operands.len() != self.num_operands() && *self != Opcode::Ret {
            return None;
        }
        match self {
            op if op.is_int_binop() => {
                (operands[0].is_int() && operands[0] == operands[1]).then_some(operands[0])
            }
            op if op.is_float_binop() => {
                (operands[0].is_float() && operands[0] == operands[1]).then_some(operands[0])
            }
            Opcode::ICmp => ((operands[0].is_int() || operands[0].is_ptr())
                && operands[0] == operands[1])
                .then_some(Type::I1),
            Opcode::FCmp => {
                (operands[0].is_float() && operands[0] == operands[1]).then_some(Type::I1)
            }
            Opcode::Select => {
                (operands[0].is_bool() && operands[1] == operands[2] && !operands[1].is_void())
                    .then_some(operands[1])
            }
            Opcode::Store => {
                (!operands[0].is_void() && operands[1].is_ptr()).then_some(Type::Void)
            }
            Opcode::CondBr => operands[0].is_bool().then_some(Type::Void),
            Opcode::Ret | Opcode::Br | Opcode::Unreachable => Some(Type::Void),
            _ => None,
        }
    }
}

/// A single instruction in the IR
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    pub id: InstId,
    pub opcode: Opcode,
    /// Result type, `Void` if the instruction produces no value
    pub ty: Type,
    pub operands: Vec<Value>,
    pub flags: InstFlags,
    pub predicate: Option<Predicate>,
    /// Successor blocks of a branch
    pub targets: Vec<BlockId>,
}

impl Instruction {
    pub fn new(opcode: Opcode, ty: Type) -> Self {
        Self {
            id: InstId::UNASSIGNED,
            opcode,
            ty,
            operands: Vec::new(),
            flags: InstFlags::default(),
            predicate: None,
            targets: Vec::new(),
        }
    }

    pub fn with_operand(mut self, operand: Value) -> Self {
        self.operands.push(operand);
        self
    }

    pub fn with_operands(mut self, operands: Vec<Value>) -> Self {
        self.operands = operands;
        self
    }

    pub fn with_flags(mut self, flags: InstFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn with_targets(mut self, targets: Vec<BlockId>) -> Self {
        self.targets = targets;
        self
    }

    /// Create a two-operand arithmetic instruction
    pub fn binary(opcode: Opcode, ty: Type, a: Value, b: Value) -> Self {
        Self::new(opcode, ty).with_operands(vec![a, b])
    }

    pub fn icmp(predicate: IntPredicate, a: Value, b: Value) -> Self {
        Self::new(Opcode::ICmp, Type::I1)
            .with_operands(vec![a, b])
            .with_predicate(Predicate::Int(predicate))
    }

    pub fn fcmp(predicate: FloatPredicate, a: Value, b: Value) -> Self {
        Self::new(Opcode::FCmp, Type::I1)
            .with_operands(vec![a, b])
            .with_predicate(Predicate::Float(predicate))
    }

    pub fn select(ty: Type, condition: Value, if_true: Value, if_false: Value) -> Self {
        Self::new(Opcode::Select, ty).with_operands(vec![condition, if_true, if_false])
    }

    pub fn store(value: Value, pointer: Value) -> Self {
        Self::new(Opcode::Store, Type::Void).with_operands(vec![value, pointer])
    }

    pub fn return_void() -> Self {
        Self::new(Opcode::Ret, Type::Void)
    }

    pub fn return_value(value: Value) -> Self {
        Self::new(Opcode::Ret, Type::Void).with_operand(value)
    }

    pub fn branch(target: BlockId) -> Self {
        Self::new(Opcode::Br, Type::Void).with_targets(vec![target])
    }

    pub fn branch_if(condition: Value, if_true: BlockId, if_false: BlockId) -> Self {
        Self::new(Opcode::CondBr, Type::Void)
            .with_operand(condition)
            .with_targets(vec![if_true, if_false])
    }

    pub fn unreachable() -> Self {
        Self::new(Opcode::Unreachable, Type::Void)
    }

    pub fn is_terminator(&self) -> bool {
        self.opcode.is_terminator()
    }

    /// Returns true if the instruction produces a usable value
    pub fn has_result(&self) -> bool {
        !self.ty.is_void()
    }
}
