//! Strategy that modifies instruction flags, operands and predicates in place.

use super::{Granularity, IrMutationStrategy};
use crate::instruction::{FloatPredicate, IntPredicate, Predicate};
use crate::program::{InstRef, Module};
use crate::random_builder::RandomIrBuilder;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Modification {
    ToggleNuw,
    ToggleNsw,
    ToggleExact,
    ToggleFast,
    ReplaceOperand(usize),
    ChangePredicate,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct InstModificationIrStrategy;

impl IrMutationStrategy for InstModificationIrStrategy {
    fn name(&self) -> &'static str {
        "inst_modification"
    }

    fn weight(&self, _current_size: usize, _max_size: usize, _current_weight: u64) -> u64 {
        4
    }

    fn granularities(&self) -> &'static [Granularity] {
        &[Granularity::Instruction]
    }

    fn mutate_instruction(&self, module: &mut Module, at: InstRef, builder: &mut RandomIrBuilder) {
        let Some(inst) = module.instruction(at) else {
            return;
        };

        let mut modifications = Vec::new();
        if inst.opcode.allows_wrap_flags() {
            modifications.push(Modification::ToggleNuw);
            modifications.push(Modification::ToggleNsw);
        }
        if inst.opcode.allows_exact() {
            modifications.push(Modification::ToggleExact);
        }
        if inst.opcode.allows_fast_math() {
            modifications.push(Modification::ToggleFast);
        }
        modifications.extend((0..inst.operands.len()).map(Modification::ReplaceOperand));
        if inst.predicate.is_some() {
            modifications.push(Modification::ChangePredicate);
        }

        let Some(&modification) = builder.choose(&modifications) else {
            trace!("Nothing to modify on {:?}", inst.opcode);
            return;
        };

        match modification {
            Modification::ReplaceOperand(slot) => {
                let current = inst.operands[slot];
                let Some(ty) = module.value_type(at.function, &current) else {
                    return;
                };
                let alternatives: Vec<_> = module
                    .visible_values(at.function, at.block, at.index)
                    .into_iter()
                    .filter(|(value, t)| *t == ty && *value != current)
                    .map(|(value, _)| value)
                    .collect();
                let replacement = match builder.choose(&alternatives) {
                    Some(value) => Some(*value),
                    None => builder.materialize_value(module.context(), ty),
                };
                if let (Some(value), Some(inst)) = (replacement, module.instruction_mut(at)) {
                    inst.operands[slot] = value;
                }
            }
            Modification::ChangePredicate => {
                let new_predicate = match inst.predicate {
                    Some(Predicate::Int(old)) => {
                        let others: Vec<_> = IntPredicate::ALL.into_iter().filter(|p| *p != old).collect();
                        builder.choose(&others).map(|p| Predicate::Int(*p))
                    }
                    Some(Predicate::Float(old)) => {
                        let others: Vec<_> = FloatPredicate::ALL.into_iter().filter(|p| *p != old).collect();
                        builder.choose(&others).map(|p| Predicate::Float(*p))
                    }
                    None => None,
                };
                if let (Some(predicate), Some(inst)) = (new_predicate, module.instruction_mut(at)) {
                    inst.predicate = Some(predicate);
                }
            }
            toggle => {
                if let Some(inst) = module.instruction_mut(at) {
                    let flags = &mut inst.flags;
                    match toggle {
                        Modification::ToggleNuw => flags.nuw = !flags.nuw,
                        Modification::ToggleNsw => flags.nsw = !flags.nsw,
                        Modification::ToggleExact => flags.exact = !flags.exact,
                        _ => flags.fast = !flags.fast,
                    }
                }
            }
        }
        debug!(
            "Applied {:?} at function {} block {} index {}",
            modification, at.function, at.block, at.index
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::instruction::{Instruction, Opcode, Value};
    use crate::program::Function;
    use crate::validation::verify_module;
    use irfuzz_core::Type;
    use std::sync::Arc;

    fn module_with(build: impl FnOnce(&mut Function)) -> Module {
        let mut module = Module::new("m", Arc::new(Context::new()));
        let mut func = Function::new("f", vec![Type::I32, Type::I32, Type::Float], Type::Void);
        build(&mut func);
        func.push_instruction(0, Instruction::return_void());
        module.add_function(func);
        module
    }

    #[test]
    fn test_fixed_weight() {
        assert_eq!(InstModificationIrStrategy.weight(0, 10, 0), 4);
        assert_eq!(InstModificationIrStrategy.weight(10, 10, 999), 4);
    }

    #[test]
    fn test_modifications_stay_type_correct() {
        let mut module = module_with(|func| {
            let sum = func.push_instruction(
                0,
                Instruction::binary(Opcode::Add, Type::I32, Value::Arg(0), Value::Arg(1)),
            );
            let cmp = func.push_instruction(
                0,
                Instruction::icmp(IntPredicate::Ult, Value::Inst(sum), Value::Arg(0)),
            );
            func.push_instruction(
                0,
                Instruction::select(Type::I32, Value::Inst(cmp), Value::Inst(sum), Value::Arg(1)),
            );
            func.push_instruction(
                0,
                Instruction::fcmp(FloatPredicate::Olt, Value::Arg(2), Value::Arg(2)),
            );
            func.push_instruction(
                0,
                Instruction::binary(Opcode::SDiv, Type::I32, Value::Arg(0), Value::Arg(1)),
            );
        });

        for seed in 0..300 {
            let mut builder = RandomIrBuilder::new(seed, vec![]);
            InstModificationIrStrategy.mutate_module(&mut module, &mut builder);
            assert!(verify_module(&module).is_ok(), "seed {} broke the module", seed);
        }
    }

    #[test]
    fn test_predicate_always_changes() {
        let mut module = module_with(|func| {
            func.push_instruction(0, Instruction::icmp(IntPredicate::Eq, Value::Arg(0), Value::Arg(0)));
        });
        let at = InstRef { function: 0, block: 0, index: 0 };
        // Operands have no alternative besides each other, so every edit is
        // visible as a change of predicate or operand
        for seed in 0..50 {
            let before = module.instruction(at).cloned().unwrap();
            let mut builder = RandomIrBuilder::new(seed, vec![]);
            InstModificationIrStrategy.mutate_instruction(&mut module, at, &mut builder);
            let after = module.instruction(at).cloned().unwrap();
            assert_ne!(before, after);
        }
    }

    #[test]
    fn test_flag_toggle() {
        let mut module = module_with(|func| {
            func.push_instruction(
                0,
                Instruction::binary(Opcode::Shl, Type::I32, Value::Arg(0), Value::Arg(0)),
            );
        });
        let at = InstRef { function: 0, block: 0, index: 0 };
        let mut toggled = false;
        for seed in 0..50 {
            let mut builder = RandomIrBuilder::new(seed, vec![]);
            InstModificationIrStrategy.mutate_instruction(&mut module, at, &mut builder);
            let flags = module.instruction(at).unwrap().flags;
            assert!(!flags.exact && !flags.fast);
            toggled |= flags.nuw || flags.nsw;
        }
        assert!(toggled);
    }

    #[test]
    fn test_plain_branch_is_left_alone() {
        let mut module = Module::new("m", Arc::new(Context::new()));
        let mut func = Function::new("f", vec![], Type::Void);
        let next = func.add_block();
        func.push_instruction(0, Instruction::branch(next));
        func.push_instruction(1, Instruction::return_void());
        module.add_function(func);
        let before = module.functions.clone();

        let mut builder = RandomIrBuilder::new(0, vec![]);
        InstModificationIrStrategy.mutate_module(&mut module, &mut builder);
        assert_eq!(module.functions, before);
    }
}
