//! Property tests for the mutation engine and codec.

use irfuzz_core::{MutatorConfig, Type};
use irfuzz_ir::{
    parse_and_verify, parse_module, seed_module, verify_module, write_module, Constant, Context,
    FloatPredicate, Function, InjectorIrStrategy, InstDeleterIrStrategy, Instruction,
    IrMutationStrategy, IrMutator, Module, Opcode, RandomIrBuilder, Value,
};
use proptest::prelude::*;
use std::sync::Arc;

const BUFFER: usize = 1 << 16;

fn encode(module: &Module) -> Vec<u8> {
    let mut buf = vec![0u8; BUFFER];
    let n = write_module(module, &mut buf, BUFFER);
    buf.truncate(n);
    buf
}

/// Grow the seed module with a few rounds of the default mutator
fn grown_module(context: &Arc<Context>, rounds: u64, base_seed: u64) -> Module {
    let mutator = IrMutator::from_config(&MutatorConfig::default()).unwrap();
    let mut module = seed_module(context);
    for i in 0..rounds {
        mutator.mutate_module(&mut module, base_seed.wrapping_add(i), 0, BUFFER);
    }
    module
}

/// `f(i1, i32, double) -> i32` with a diamond, a store to a global, an
/// unreachable block, and a declaration alongside it
fn diamond_module(context: &Arc<Context>) -> Module {
    let mut module = Module::new("diamond", Arc::clone(context));
    let global = module.add_global("counter");
    let seven = module.constant(Constant::int(32, 7));
    module.add_function(Function::declaration("ext", vec![Type::Ptr], Type::Void));

    let mut func = Function::new("f", vec![Type::I1, Type::I32, Type::Double], Type::I32);
    let then_block = func.add_block();
    let else_block = func.add_block();
    let join = func.add_block();
    // Unreachable: nothing branches here
    func.add_block();

    let sum = func.push_instruction(
        0,
        Instruction::binary(Opcode::Add, Type::I32, Value::Arg(1), seven),
    );
    func.push_instruction(0, Instruction::branch_if(Value::Arg(0), then_block, else_block));

    let product = func.push_instruction(
        1,
        Instruction::binary(Opcode::Mul, Type::I32, Value::Inst(sum), Value::Inst(sum)),
    );
    func.push_instruction(1, Instruction::store(Value::Inst(product), global));
    func.push_instruction(1, Instruction::branch(join));

    let cmp = func.push_instruction(
        2,
        Instruction::fcmp(FloatPredicate::Olt, Value::Arg(2), Value::Arg(2)),
    );
    func.push_instruction(
        2,
        Instruction::select(Type::I32, Value::Inst(cmp), Value::Inst(sum), Value::Arg(1)),
    );
    func.push_instruction(2, Instruction::branch(join));

    let diff = func.push_instruction(
        3,
        Instruction::binary(Opcode::Sub, Type::I32, Value::Inst(sum), Value::Arg(1)),
    );
    func.push_instruction(3, Instruction::return_value(Value::Inst(diff)));

    let dead_value = func.push_instruction(
        4,
        Instruction::binary(Opcode::Xor, Type::I32, Value::Arg(1), Value::Arg(1)),
    );
    func.push_instruction(4, Instruction::return_value(Value::Inst(dead_value)));

    module.add_function(func);
    module
}

proptest! {
    #[test]
    fn multi_block_mutation_stays_well_formed(
        seed in any::<u64>(),
        rounds in 1u64..60,
        at_limit in any::<bool>(),
    ) {
        let ctx = Arc::new(Context::new());
        let mutator = IrMutator::from_config(&MutatorConfig::default()).unwrap();
        let mut module = diamond_module(&ctx);
        prop_assert!(verify_module(&module).is_ok());

        for i in 0..rounds {
            let size = encode(&module).len();
            let max_size = if at_limit { size } else { BUFFER };
            mutator.mutate_module(&mut module, seed.wrapping_add(i), size, max_size);
            prop_assert!(verify_module(&module).is_ok(), "round {} broke the module", i);
            prop_assert_eq!(module.functions[1].num_blocks(), 5);
            prop_assert!(module.functions[0].is_declaration());
        }
    }

    #[test]
    fn multi_block_mutation_is_deterministic(seed in any::<u64>(), rounds in 1u64..30) {
        let mutator = IrMutator::from_config(&MutatorConfig::default()).unwrap();
        let mut a = diamond_module(&Arc::new(Context::new()));
        let mut b = diamond_module(&Arc::new(Context::new()));
        for i in 0..rounds {
            mutator.mutate_module(&mut a, seed.wrapping_add(i), 0, BUFFER);
            mutator.mutate_module(&mut b, seed.wrapping_add(i), 0, BUFFER);
        }
        prop_assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn mutation_is_deterministic(
        seed in any::<u64>(),
        rounds in 0u64..20,
        current_size in 0usize..4096,
        max_size in 1usize..4096,
    ) {
        let mutator = IrMutator::from_config(&MutatorConfig::default()).unwrap();
        let mut a = grown_module(&Arc::new(Context::new()), rounds, seed);
        let mut b = grown_module(&Arc::new(Context::new()), rounds, seed);
        mutator.mutate_module(&mut a, seed, current_size, max_size);
        mutator.mutate_module(&mut b, seed, current_size, max_size);
        prop_assert_eq!(encode(&a), encode(&b));
    }

    #[test]
    fn mutation_preserves_well_formedness(
        seed in any::<u64>(),
        rounds in 1u64..40,
        max_size in 256usize..8192,
    ) {
        let ctx = Arc::new(Context::new());
        let mutator = IrMutator::from_config(&MutatorConfig::default()).unwrap();
        let mut module = seed_module(&ctx);
        for i in 0..rounds {
            let size = encode(&module).len();
            mutator.mutate_module(&mut module, seed.wrapping_add(i), size, max_size);
            prop_assert!(verify_module(&module).is_ok());
            for block in module.functions.iter().flat_map(|f| f.blocks.iter()) {
                prop_assert!(block.is_well_terminated());
            }
        }
    }

    #[test]
    fn deleter_weight_is_monotonic(
        max_size in 0usize..1_000_000,
        current_weight in 0u64..1_000_000,
        a in 0usize..1_100_000,
        b in 0usize..1_100_000,
    ) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        let deleter = InstDeleterIrStrategy;
        prop_assert!(
            deleter.weight(low, max_size, current_weight)
                <= deleter.weight(high, max_size, current_weight)
        );
    }

    #[test]
    fn write_respects_budget(rounds in 0u64..30, seed in any::<u64>(), max_size in 0usize..2048) {
        let module = grown_module(&Arc::new(Context::new()), rounds, seed);
        let full = encode(&module);

        let mut dest = vec![0xA5u8; 2048];
        let written = write_module(&module, &mut dest, max_size);
        if full.len() > max_size {
            prop_assert_eq!(written, 0);
            prop_assert!(dest.iter().all(|b| *b == 0xA5));
        } else {
            prop_assert_eq!(written, full.len());
            prop_assert_eq!(&dest[..written], &full[..]);
            prop_assert!(dest[written..].iter().all(|b| *b == 0xA5));
        }
    }

    #[test]
    fn parse_never_panics(data in proptest::collection::vec(any::<u8>(), 0..512)) {
        let ctx = Arc::new(Context::new());
        let _ = parse_and_verify(&data, &ctx);
    }
}

#[test]
fn scenario_a_injects_one_instruction_before_terminator() {
    let ctx = Arc::new(Context::new());
    let mut module = seed_module(&ctx);
    let injector = InjectorIrStrategy::with_default_ops();
    let mut builder = RandomIrBuilder::new(42, MutatorConfig::default().allowed_types);

    injector.mutate_module(&mut module, &mut builder);

    let block = &module.functions[0].blocks[0];
    assert_eq!(block.len(), 2);
    assert!(!block.instructions[0].is_terminator());
    assert!(block.is_well_terminated());
    assert!(verify_module(&module).is_ok());
}

#[test]
fn scenario_b_deleter_dominates_at_the_limit() {
    let mutator = IrMutator::from_config(&MutatorConfig::default()).unwrap();
    let names = mutator.strategy_names();
    let deleter = names.iter().position(|n| *n == "inst_deleter").unwrap();

    let trials = 5000u64;
    let mut picks = [0u64; 3];
    for seed in 0..trials {
        let mut builder = RandomIrBuilder::new(seed, vec![]);
        let chosen = mutator.select_strategy(&mut builder, 10_000, 10_000).unwrap();
        picks[chosen] += 1;
    }
    // Expected share 4800 / 4848
    let share = picks[deleter] as f64 / trials as f64;
    assert!(share > 0.97 && share < 1.0, "deleter share {}", share);
    assert!(picks.iter().sum::<u64>() == trials);
}

#[test]
fn scenario_c_truncated_input_fails_cleanly() {
    let ctx = Arc::new(Context::new());
    let bytes = encode(&grown_module(&ctx, 10, 3));

    let fresh = Arc::new(Context::new());
    for cut in [1, bytes.len() / 3, bytes.len() / 2, bytes.len() - 1] {
        assert!(parse_module(&bytes[..cut], &fresh).is_none());
    }
    assert!(fresh.is_empty());

    let module = parse_and_verify(&bytes, &fresh).unwrap();
    assert_eq!(encode(&module), bytes);
}

#[test]
fn mutator_is_shareable_across_threads() {
    let mutator = Arc::new(IrMutator::from_config(&MutatorConfig::default()).unwrap());
    let ctx = Arc::new(Context::new());

    let handles: Vec<_> = (0..4u64)
        .map(|worker| {
            let mutator = Arc::clone(&mutator);
            let ctx = Arc::clone(&ctx);
            std::thread::spawn(move || {
                let mut module = seed_module(&ctx);
                for i in 0..50 {
                    mutator.mutate_module(&mut module, worker * 1000 + i, 0, BUFFER);
                }
                encode(&module)
            })
        })
        .collect();
    let shared: Vec<Vec<u8>> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    // Each worker's result matches a run on a private context
    for (worker, bytes) in shared.iter().enumerate() {
        let mut module = seed_module(&Arc::new(Context::new()));
        for i in 0..50 {
            mutator.mutate_module(&mut module, worker as u64 * 1000 + i, 0, BUFFER);
        }
        assert_eq!(&encode(&module), bytes);
    }
}

#[test]
fn allowed_types_drive_new_values() {
    let mutator = IrMutator::new(
        vec![Type::Double],
        vec![Box::new(InjectorIrStrategy::with_default_ops())],
    )
    .unwrap();

    let mut injected = 0;
    for seed in 0..100 {
        // Nothing is visible in `f`, so every operand has to be created
        let mut module = Module::new("m", Arc::new(Context::new()));
        let mut func = Function::new("f", vec![], Type::Void);
        func.push_instruction(0, Instruction::return_void());
        module.add_function(func);

        mutator.mutate_module(&mut module, seed, 0, BUFFER);
        let block = &module.functions[0].blocks[0];
        if block.len() == 1 {
            continue;
        }
        injected += 1;
        for operand in &block.instructions[0].operands {
            let ty = module.value_type(0, operand).unwrap();
            assert!(ty == Type::Double || ty == Type::I1, "seed {} made a {}", seed, ty);
        }
        assert!(verify_module(&module).is_ok());
    }
    assert!(injected > 0);
}
