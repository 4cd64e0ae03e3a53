//! Structural verification for IR modules.

use crate::dominance::DominatorTree;
use crate::instruction::{InstId, Instruction, Opcode, Predicate, Value};
use crate::program::{Function, Module};
use irfuzz_core::{Error, Result, Type};
use std::collections::{HashMap, HashSet};

/// Validate that a module is well-formed
pub fn verify_module(module: &Module) -> Result<()> {
    for (idx, func) in module.functions.iter().enumerate() {
        validate_function(module, func, idx)?;
    }
    Ok(())
}

fn validate_function(module: &Module, func: &Function, idx: usize) -> Result<()> {
    if func.params.iter().any(|ty| ty.is_void() || !ty.is_valid()) || !func.ret.is_valid() {
        return Err(Error::Verification(format!(
            "Function {} has an invalid signature",
            idx
        )));
    }

    // Declarations have nothing else to check
    if func.is_declaration() {
        return Ok(());
    }

    let mut block_ids = HashSet::new();
    let mut defs = HashMap::new();
    for (block_idx, block) in func.blocks.iter().enumerate() {
        if !block_ids.insert(block.id) {
            return Err(Error::Verification(format!(
                "Function {} has duplicate block id {}",
                idx, block.id.0
            )));
        }
        if !block.is_well_terminated() {
            return Err(Error::Verification(format!(
                "Function {} block {} does not end in exactly one terminator",
                idx, block_idx
            )));
        }
        for (inst_idx, inst) in block.instructions.iter().enumerate() {
            if inst.id.0 >= InstId::LIMIT {
                return Err(Error::Verification(format!(
                    "Function {} block {} instruction {}: id {} out of range",
                    idx, block_idx, inst_idx, inst.id.0
                )));
            }
            if defs.insert(inst.id, (block_idx, inst_idx, inst.ty)).is_some() {
                return Err(Error::Verification(format!(
                    "Function {} has duplicate instruction id {}",
                    idx, inst.id.0
                )));
            }
        }
    }

    let dom = DominatorTree::compute(func);
    for (block_idx, block) in func.blocks.iter().enumerate() {
        for (inst_idx, inst) in block.instructions.iter().enumerate() {
            let at = format!("Function {} block {} instruction {}", idx, block_idx, inst_idx);

            let mut operand_types = Vec::with_capacity(inst.operands.len());
            for operand in &inst.operands {
                let ty = match operand {
                    Value::Inst(id) => {
                        let (def_block, def_idx, ty) = defs.get(id).copied().ok_or_else(|| {
                            Error::Verification(format!("{}: unknown instruction {}", at, id.0))
                        })?;
                        let visible = if def_block == block_idx {
                            def_idx < inst_idx
                        } else {
                            dom.strictly_dominates(def_block, block_idx)
                        };
                        if !visible {
                            return Err(Error::Verification(format!(
                                "{}: operand {} does not dominate its use",
                                at, id.0
                            )));
                        }
                        ty
                    }
                    Value::Const(id) => {
                        let constant = module.context().constant(*id).ok_or_else(|| {
                            Error::Verification(format!("{}: unknown constant {}", at, id.0))
                        })?;
                        if !constant.is_canonical() {
                            return Err(Error::Verification(format!(
                                "{}: malformed constant {:?}",
                                at, constant
                            )));
                        }
                        constant.ty()
                    }
                    other => module
                        .value_type(idx, other)
                        .ok_or_else(|| Error::Verification(format!("{}: unknown operand {:?}", at, other)))?,
                };
                if ty.is_void() || !ty.is_valid() {
                    return Err(Error::Verification(format!(
                        "{}: operand of invalid type {}",
                        at, ty
                    )));
                }
                operand_types.push(ty);
            }

            validate_instruction(func, inst, &operand_types).map_err(|msg| {
                Error::Verification(format!("{}: {}", at, msg))
            })?;
        }
    }

    Ok(())
}

fn validate_instruction(
    func: &Function,
    inst: &Instruction,
    operand_types: &[Type],
) -> std::result::Result<(), String> {
    if !inst.ty.is_valid() {
        return Err(format!("invalid result type {}", inst.ty));
    }
    if !inst.flags.is_legal_for(inst.opcode) {
        return Err(format!("illegal flags for {:?}", inst.opcode));
    }

    match (inst.opcode, inst.predicate) {
        (Opcode::ICmp, Some(Predicate::Int(_))) | (Opcode::FCmp, Some(Predicate::Float(_))) => {}
        (Opcode::ICmp | Opcode::FCmp, _) => return Err("missing comparison predicate".to_string()),
        (_, Some(_)) => return Err(format!("unexpected predicate on {:?}", inst.opcode)),
        (_, None) => {}
    }

    if inst.targets.len() != inst.opcode.num_targets() {
        return Err(format!("wrong number of successors for {:?}", inst.opcode));
    }
    if let Some(target) = inst.targets.iter().find(|t| func.block_index(**t).is_none()) {
        return Err(format!("branch to unknown block {}", target.0));
    }

    if inst.opcode == Opcode::Ret {
        let expected: &[Type] = if func.ret.is_void() { &[] } else { std::slice::from_ref(&func.ret) };
        if operand_types != expected || !inst.ty.is_void() {
            return Err("return does not match the function signature".to_string());
        }
        return Ok(());
    }

    match inst.opcode.result_type(operand_types) {
        Some(ty) if ty == inst.ty => Ok(()),
        Some(ty) => Err(format!("result type {} should be {}", inst.ty, ty)),
        None => Err(format!("ill-typed operands for {:?}", inst.opcode)),
    }
}
