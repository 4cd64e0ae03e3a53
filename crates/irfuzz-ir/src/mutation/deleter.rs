//! Strategy that deletes instructions as the module nears its size limit.

use super::{Granularity, IrMutationStrategy};
use crate::instruction::Value;
use crate::program::{InstRef, Module};
use crate::random_builder::RandomIrBuilder;
use tracing::{debug, trace};

/// Within this many bytes of the limit, deletion takes over
const PANIC_MARGIN: usize = 200;
/// Deletion starts to be weighted this many bytes before the limit
const RAMP_LENGTH: usize = 1000;

#[derive(Debug, Clone, Copy, Default)]
pub struct InstDeleterIrStrategy;

impl IrMutationStrategy for InstDeleterIrStrategy {
    fn name(&self) -> &'static str {
        "inst_deleter"
    }

    /// Zero while the module is far from `max_size`, then a line rising to
    /// twice the weight of the preceding strategies, and a hundredfold once
    /// less than `PANIC_MARGIN` bytes remain.
    fn weight(&self, current_size: usize, max_size: usize, current_weight: u64) -> u64 {
        if current_size > max_size.saturating_sub(PANIC_MARGIN) {
            return if current_weight == 0 {
                1
            } else {
                current_weight.saturating_mul(100)
            };
        }

        let remaining = max_size - current_size;
        if remaining >= RAMP_LENGTH {
            return 0;
        }
        let line = 2 * current_weight as u128 * (RAMP_LENGTH - remaining) as u128 / RAMP_LENGTH as u128;
        line.min(u64::MAX as u128) as u64
    }

    fn granularities(&self) -> &'static [Granularity] {
        &[Granularity::Function, Granularity::Instruction]
    }

    fn mutate_function(&self, module: &mut Module, function: usize, builder: &mut RandomIrBuilder) {
        let Some(func) = module.get_function(function) else {
            return;
        };
        let candidates: Vec<InstRef> = func
            .blocks
            .iter()
            .enumerate()
            .flat_map(|(block, bb)| {
                bb.instructions
                    .iter()
                    .enumerate()
                    .filter(|(_, inst)| !inst.is_terminator())
                    .map(move |(index, _)| InstRef {
                        function,
                        block,
                        index,
                    })
            })
            .collect();

        match builder.choose(&candidates) {
            Some(&at) => self.mutate_instruction(module, at, builder),
            None => trace!("Function {} has nothing to delete", function),
        }
    }

    fn mutate_instruction(&self, module: &mut Module, at: InstRef, builder: &mut RandomIrBuilder) {
        let Some(inst) = module.instruction(at) else {
            return;
        };
        if inst.is_terminator() {
            trace!("Refusing to delete a terminator");
            return;
        }
        let id = inst.id;
        let ty = inst.ty;

        // Anything visible at the deleted instruction also dominates its users
        let replacement = if ty.is_void() {
            None
        } else {
            Some(
                builder
                    .pick_visible_value(module, at, ty)
                    .unwrap_or(Value::Undef(ty)),
            )
        };

        let Some(func) = module.get_function_mut(at.function) else {
            return;
        };
        let removed = func.remove_instruction(at.block, at.index);
        let rewired = replacement.map_or(0, |value| func.replace_all_uses(Value::Inst(id), value));
        debug!(
            "Deleted {:?} at function {} block {} index {}, rewired {} uses",
            removed.opcode, at.function, at.block, at.index, rewired
        );
    }
}
