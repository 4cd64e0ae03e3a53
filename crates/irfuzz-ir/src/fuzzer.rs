//! Glue for byte-oriented fuzzers that accept a custom mutator.

use crate::codec::{parse_and_verify, write_module};
use crate::context::{Constant, Context};
use crate::instruction::Instruction;
use crate::mutation::IrMutator;
use crate::program::{Function, Module};
use irfuzz_core::Type;
use std::sync::Arc;
use tracing::debug;

/// Smallest useful module: `main` returning `i32 0`
pub fn seed_module(context: &Arc<Context>) -> Module {
    let mut module = Module::new("seed", Arc::clone(context));
    let zero = module.constant(Constant::int(32, 0));
    let mut main = Function::new("main", vec![], Type::I32);
    main.push_instruction(0, Instruction::return_value(zero));
    module.add_function(main);
    module
}

/// Mutate the encoded module in `data[..size]` in place.
///
/// Input that does not parse or verify is replaced by [`seed_module`]. Returns the size of the
/// new encoding, or the old `size` with `data` untouched if the mutant does
/// not fit in `max_size`.
pub fn custom_mutate(
    mutator: &IrMutator,
    context: &Arc<Context>,
    data: &mut [u8],
    size: usize,
    max_size: usize,
    seed: u64,
) -> usize {
    let size = size.min(data.len());
    let mut module = parse_and_verify(&data[..size], context).unwrap_or_else(|| {
        debug!("Input of {} bytes is not a valid module, starting from the seed module", size);
        seed_module(context)
    });

    mutator.mutate_module(&mut module, seed, size, max_size);

    match write_module(&module, data, max_size) {
        0 => {
            debug!("Mutant does not fit in {} bytes", max_size);
            size
        }
        written => written,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irfuzz_core::MutatorConfig;

    #[test]
    fn test_seed_module_verifies() {
        let ctx = Arc::new(Context::new());
        let module = seed_module(&ctx);
        assert!(crate::validation::verify_module(&module).is_ok());
    }

    #[test]
    fn test_custom_mutate_from_garbage() {
        let ctx = Arc::new(Context::new());
        let mutator = IrMutator::from_config(&MutatorConfig::default()).unwrap();
        let mut data = vec![0xffu8; 4096];

        let size = custom_mutate(&mutator, &ctx, &mut data, 16, 4096, 7);
        assert!(size > 0);
        assert!(parse_and_verify(&data[..size], &ctx).is_some());
    }

    #[test]
    fn test_custom_mutate_chain() {
        let ctx = Arc::new(Context::new());
        let mutator = IrMutator::from_config(&MutatorConfig::default()).unwrap();
        let mut data = vec![0u8; 2048];
        let mut size = 0;
        for seed in 0..200 {
            size = custom_mutate(&mutator, &ctx, &mut data, size, 2048, seed);
            assert!(size <= 2048);
            assert!(parse_and_verify(&data[..size], &ctx).is_some(), "seed {}", seed);
        }
    }

    #[test]
    fn test_custom_mutate_over_budget() {
        let ctx = Arc::new(Context::new());
        let mutator = IrMutator::from_config(&MutatorConfig::default()).unwrap();
        let mut data = vec![0x5au8; 8];
        let size = custom_mutate(&mutator, &ctx, &mut data, 8, 8, 1);
        assert_eq!(size, 8);
        assert!(data.iter().all(|b| *b == 0x5a));
    }
}
