//! Strategy that injects new operations into a block.

use super::{Granularity, IrMutationStrategy};
use crate::instruction::Value;
use crate::operations::{default_operations, OpDescriptor, SourcePred};
use crate::program::{InstRef, Module};
use crate::random_builder::RandomIrBuilder;
use irfuzz_core::{Result, Type};
use tracing::{debug, trace};

pub struct InjectorIrStrategy {
    operations: Vec<OpDescriptor>,
}

impl InjectorIrStrategy {
    /// Create an injector over `operations`, rejecting malformed templates
    pub fn new(operations: Vec<OpDescriptor>) -> Result<Self> {
        for op in &operations {
            op.validate()?;
        }
        Ok(Self { operations })
    }

    /// Injector over the default operation catalog
    pub fn with_default_ops() -> Self {
        Self {
            operations: default_operations(),
        }
    }

    pub fn operations(&self) -> &[OpDescriptor] {
        &self.operations
    }

    /// Pick an operation whose first operand accepts `source`
    fn choose_operation(&self, source: Type, builder: &mut RandomIrBuilder) -> Option<&OpDescriptor> {
        let candidates: Vec<&OpDescriptor> = self
            .operations
            .iter()
            .filter(|op| {
                op.source_preds
                    .first()
                    .is_some_and(|pred| pred.matches(&[], source))
            })
            .collect();
        builder.choose(&candidates).copied()
    }
}

impl IrMutationStrategy for InjectorIrStrategy {
    fn name(&self) -> &'static str {
        "injector"
    }

    fn weight(&self, _current_size: usize, _max_size: usize, _current_weight: u64) -> u64 {
        self.operations.len() as u64
    }

    fn granularities(&self) -> &'static [Granularity] {
        &[Granularity::Function, Granularity::BasicBlock]
    }

    fn mutate_function(&self, module: &mut Module, function: usize, builder: &mut RandomIrBuilder) {
        let num_blocks = module.get_function(function).map_or(0, |f| f.num_blocks());
        if let Some(block) = builder.choose_index(num_blocks) {
            self.mutate_block(module, function, block, builder);
        }
    }

    fn mutate_block(
        &self,
        module: &mut Module,
        function: usize,
        block: usize,
        builder: &mut RandomIrBuilder,
    ) {
        let Some(bb) = module.get_function(function).and_then(|f| f.get_block(block)) else {
            return;
        };
        let Some(index) = builder.pick_insertion_point(bb) else {
            trace!("Block {} of function {} is empty, nothing to inject", block, function);
            return;
        };
        let at = InstRef {
            function,
            block,
            index,
        };

        // The source constrains which operations are possible
        let Some((source, source_ty)) = builder.find_or_create_source(module, at, &[], SourcePred::AnyType)
        else {
            return;
        };
        let Some(op) = self.choose_operation(source_ty, builder) else {
            trace!("No operation accepts a {} source", source_ty);
            return;
        };

        let mut operands = vec![source];
        let mut types = vec![source_ty];
        for pred in op.source_preds.iter().skip(1) {
            let Some((value, ty)) = builder.find_or_create_source(module, at, &types, *pred) else {
                trace!("No operand available for {}", op.name);
                return;
            };
            operands.push(value);
            types.push(ty);
        }
        let Some(inst) = op.build(&operands, &types) else {
            return;
        };

        let ty = inst.ty;
        let Some(func) = module.get_function_mut(function) else {
            return;
        };
        let id = func.insert_instruction(block, index, inst);
        debug!("Injected {} at function {} block {} index {}", op.name, function, block, index);

        if !ty.is_void() {
            let after = InstRef {
                index: index + 1,
                ..at
            };
            builder.connect_to_sink(module, after, Value::Inst(id), ty);
        }
    }
}
