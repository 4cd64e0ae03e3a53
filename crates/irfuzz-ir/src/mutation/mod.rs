//! Mutation strategies for IR modules and the driver that picks between them.
//!
//! A strategy overrides the granularities it works at. The others keep the
//! default behaviour of picking a random child unit and descending, so a
//! mutation always narrows Module -> Function -> BasicBlock -> Instruction
//! until it reaches a level the strategy implements.

mod deleter;
mod injector;
mod modifier;
mod mutator;

pub use deleter::InstDeleterIrStrategy;
pub use injector::InjectorIrStrategy;
pub use modifier::InstModificationIrStrategy;
pub use mutator::IrMutator;

use crate::program::{InstRef, Module};
use crate::random_builder::RandomIrBuilder;
use tracing::trace;

/// Scope a strategy can operate on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Granularity {
    Module,
    Function,
    BasicBlock,
    Instruction,
}

/// A way of mutating a module.
///
/// Implementations must be stateless: one strategy object serves any number
/// of concurrent mutations, each with its own module and builder.
pub trait IrMutationStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    /// Bias towards choosing this strategy. `current_weight` is the running
    /// total of the strategies registered before this one, which lets a
    /// strategy scale itself relative to the rest.
    fn weight(&self, current_size: usize, max_size: usize, current_weight: u64) -> u64;

    /// Granularities whose `mutate_*` method this strategy overrides
    fn granularities(&self) -> &'static [Granularity];

    fn mutate_module(&self, module: &mut Module, builder: &mut RandomIrBuilder) {
        forward_module(self, module, builder)
    }

    fn mutate_function(&self, module: &mut Module, function: usize, builder: &mut RandomIrBuilder) {
        forward_function(self, module, function, builder)
    }

    fn mutate_block(
        &self,
        module: &mut Module,
        function: usize,
        block: usize,
        builder: &mut RandomIrBuilder,
    ) {
        forward_block(self, module, function, block, builder)
    }

    /// # Panics
    ///
    /// The default panics: reaching the instruction level without an override
    /// means the strategy implements no mutation at all.
    fn mutate_instruction(&self, _module: &mut Module, _at: InstRef, _builder: &mut RandomIrBuilder) {
        panic!("strategy {} does not implement any mutators", self.name());
    }
}

/// Mutate a random function that has a body
pub fn forward_module<S: IrMutationStrategy + ?Sized>(
    strategy: &S,
    module: &mut Module,
    builder: &mut RandomIrBuilder,
) {
    let defined: Vec<usize> = module
        .functions
        .iter()
        .enumerate()
        .filter(|(_, f)| !f.is_declaration())
        .map(|(i, _)| i)
        .collect();
    match builder.choose(&defined) {
        Some(&function) => strategy.mutate_function(module, function, builder),
        None => trace!("Module {} has no function bodies to mutate", module.name),
    }
}

/// Mutate a random block of the function
pub fn forward_function<S: IrMutationStrategy + ?Sized>(
    strategy: &S,
    module: &mut Module,
    function: usize,
    builder: &mut RandomIrBuilder,
) {
    let num_blocks = module.get_function(function).map_or(0, |f| f.num_blocks());
    match builder.choose_index(num_blocks) {
        Some(block) => strategy.mutate_block(module, function, block, builder),
        None => trace!("Function {} has no blocks to mutate", function),
    }
}

/// Mutate a random instruction of the block
pub fn forward_block<S: IrMutationStrategy + ?Sized>(
    strategy: &S,
    module: &mut Module,
    function: usize,
    block: usize,
    builder: &mut RandomIrBuilder,
) {
    let len = module
        .get_function(function)
        .and_then(|f| f.get_block(block))
        .map_or(0, |b| b.len());
    match builder.choose_index(len) {
        Some(index) => strategy.mutate_instruction(
            module,
            InstRef {
                function,
                block,
                index,
            },
            builder,
        ),
        None => trace!("Block {} of function {} is empty", block, function),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use crate::instruction::{Instruction, Opcode, Value};
    use crate::program::Function;
    use irfuzz_core::Type;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Records where the forwarding chain lands
    struct Recorder {
        hits: Mutex<Vec<InstRef>>,
    }

    impl IrMutationStrategy for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        fn weight(&self, _: usize, _: usize, _: u64) -> u64 {
            1
        }

        fn granularities(&self) -> &'static [Granularity] {
            &[Granularity::Instruction]
        }

        fn mutate_instruction(&self, _module: &mut Module, at: InstRef, _builder: &mut RandomIrBuilder) {
            self.hits.lock().push(at);
        }
    }

    struct Unimplemented;

    impl IrMutationStrategy for Unimplemented {
        fn name(&self) -> &'static str {
            "unimplemented"
        }

        fn weight(&self, _: usize, _: usize, _: u64) -> u64 {
            1
        }

        fn granularities(&self) -> &'static [Granularity] {
            &[]
        }
    }

    fn module() -> Module {
        let mut module = Module::new("m", Arc::new(Context::new()));
        module.add_function(Function::declaration("ext", vec![], Type::Void));
        let mut func = Function::new("f", vec![Type::I8], Type::Void);
        func.push_instruction(
            0,
            Instruction::binary(Opcode::Xor, Type::I8, Value::Arg(0), Value::Arg(0)),
        );
        func.push_instruction(0, Instruction::return_void());
        module.add_function(func);
        module
    }

    #[test]
    fn test_forwarding_reaches_instruction() {
        let recorder = Recorder { hits: Mutex::new(Vec::new()) };
        let mut module = module();
        for seed in 0..20 {
            let mut builder = RandomIrBuilder::new(seed, vec![]);
            recorder.mutate_module(&mut module, &mut builder);
        }
        let hits = recorder.hits.lock();
        assert_eq!(hits.len(), 20);
        // Declarations are never picked
        assert!(hits.iter().all(|at| at.function == 1 && at.block == 0 && at.index < 2));
    }

    #[test]
    fn test_empty_module_is_a_no_op() {
        let recorder = Recorder { hits: Mutex::new(Vec::new()) };
        let mut module = Module::new("empty", Arc::new(Context::new()));
        let mut builder = RandomIrBuilder::new(0, vec![]);
        recorder.mutate_module(&mut module, &mut builder);
        assert!(recorder.hits.lock().is_empty());
    }

    #[test]
    #[should_panic(expected = "does not implement any mutators")]
    fn test_unimplemented_strategy_panics() {
        let mut module = module();
        let mut builder = RandomIrBuilder::new(0, vec![]);
        Unimplemented.mutate_module(&mut module, &mut builder);
    }
}
