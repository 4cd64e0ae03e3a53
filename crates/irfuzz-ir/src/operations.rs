//! Catalog of operations the injector can synthesize.

use crate::instruction::{FloatPredicate, Instruction, IntPredicate, Opcode, Predicate, Value};
use irfuzz_core::{Error, Result, Type};

/// Constraint on one operand of an operation, given the operands chosen so far
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SourcePred {
    AnyType,
    AnyInt,
    AnyFloat,
    AnyPtr,
    AnyIntOrPtr,
    /// An `i1`
    Bool,
    /// Same type as the operand at this position
    MatchOperand(usize),
}

impl SourcePred {
    pub fn matches(&self, current: &[Type], ty: Type) -> bool {
        if ty.is_void() {
            return false;
        }
        match self {
            SourcePred::AnyType => true,
            SourcePred::AnyInt => ty.is_int(),
            SourcePred::AnyFloat => ty.is_float(),
            SourcePred::AnyPtr => ty.is_ptr(),
            SourcePred::AnyIntOrPtr => ty.is_int() || ty.is_ptr(),
            SourcePred::Bool => ty.is_bool(),
            SourcePred::MatchOperand(index) => current.get(*index) == Some(&ty),
        }
    }

    /// Types a new value could be created with to satisfy this predicate
    pub fn make_types(&self, current: &[Type], allowed: &[Type]) -> Vec<Type> {
        match self {
            SourcePred::MatchOperand(index) => current.get(*index).copied().into_iter().collect(),
            SourcePred::Bool => vec![Type::I1],
            _ => allowed
                .iter()
                .copied()
                .filter(|ty| self.matches(current, *ty))
                .collect(),
        }
    }
}

/// Template for an operation: what its operands must look like and how to
/// assemble it once they are chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct OpDescriptor {
    pub name: String,
    pub opcode: Opcode,
    pub predicate: Option<Predicate>,
    pub source_preds: Vec<SourcePred>,
}

impl OpDescriptor {
    pub fn new(name: impl Into<String>, opcode: Opcode, source_preds: Vec<SourcePred>) -> Self {
        Self {
            name: name.into(),
            opcode,
            predicate: None,
            source_preds,
        }
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    pub fn arity(&self) -> usize {
        self.source_preds.len()
    }

    /// Reject templates that could never build a valid instruction
    pub fn validate(&self) -> Result<()> {
        if self.opcode.is_terminator() {
            return Err(Error::Config(format!(
                "operation {} builds a terminator",
                self.name
            )));
        }
        if self.arity() != self.opcode.num_operands() {
            return Err(Error::Config(format!(
                "operation {} has {} operand predicates but {:?} takes {} operands",
                self.name,
                self.arity(),
                self.opcode,
                self.opcode.num_operands()
            )));
        }
        Ok(())
    }

    /// Assemble the instruction from operands chosen per `source_preds`.
    /// Returns `None` if the operand types do not type-check.
    pub fn build(&self, operands: &[Value], types: &[Type]) -> Option<Instruction> {
        if operands.len() != self.arity() || types.len() != self.arity() {
            return None;
        }
        let ty = self.opcode.result_type(types)?;
        let mut inst = Instruction::new(self.opcode, ty).with_operands(operands.to_vec());
        inst.predicate = self.predicate;
        Some(inst)
    }
}

/// The default operation catalog: integer and float arithmetic, every
/// comparison predicate, select and store.
pub fn default_operations() -> Vec<OpDescriptor> {
    let mut ops = Vec::new();

    let int_binops = [
        ("add", Opcode::Add),
        ("sub", Opcode::Sub),
        ("mul", Opcode::Mul),
        ("udiv", Opcode::UDiv),
        ("sdiv", Opcode::SDiv),
        ("urem", Opcode::URem),
        ("srem", Opcode::SRem),
        ("shl", Opcode::Shl),
        ("lshr", Opcode::LShr),
        ("ashr", Opcode::AShr),
        ("and", Opcode::And),
        ("or", Opcode::Or),
        ("xor", Opcode::Xor),
    ];
    for (name, opcode) in int_binops {
        ops.push(OpDescriptor::new(
            name,
            opcode,
            vec![SourcePred::AnyInt, SourcePred::MatchOperand(0)],
        ));
    }

    let float_binops = [
        ("fadd", Opcode::FAdd),
        ("fsub", Opcode::FSub),
        ("fmul", Opcode::FMul),
        ("fdiv", Opcode::FDiv),
        ("frem", Opcode::FRem),
    ];
    for (name, opcode) in float_binops {
        ops.push(OpDescriptor::new(
            name,
            opcode,
            vec![SourcePred::AnyFloat, SourcePred::MatchOperand(0)],
        ));
    }

    for pred in IntPredicate::ALL {
        ops.push(
            OpDescriptor::new(
                format!("icmp_{:?}", pred).to_lowercase(),
                Opcode::ICmp,
                vec![SourcePred::AnyIntOrPtr, SourcePred::MatchOperand(0)],
            )
            .with_predicate(Predicate::Int(pred)),
        );
    }

    for pred in FloatPredicate::ALL {
        ops.push(
            OpDescriptor::new(
                format!("fcmp_{:?}", pred).to_lowercase(),
                Opcode::FCmp,
                vec![SourcePred::AnyFloat, SourcePred::MatchOperand(0)],
            )
            .with_predicate(Predicate::Float(pred)),
        );
    }

    ops.push(OpDescriptor::new(
        "select",
        Opcode::Select,
        vec![SourcePred::Bool, SourcePred::AnyType, SourcePred::MatchOperand(1)],
    ));
    ops.push(OpDescriptor::new(
        "store",
        Opcode::Store,
        vec![SourcePred::AnyType, SourcePred::AnyPtr],
    ));

    ops
}
