//! SSA intermediate representation and the structural mutation engine used to fuzz it.
//!
//! The IR is a Module > Function > BasicBlock > Instruction tree. Mutations are:
//! - Seeded: one seed fully determines one edit
//! - Size-aware: strategy weights react to the encoded size budget
//! - Well-formed: every edit keeps operands visible and blocks terminated

pub mod context;
pub mod instruction;
pub mod program;
pub mod dominance;
pub mod validation;
pub mod codec;
pub mod operations;
pub mod random_builder;
pub mod mutation;
pub mod fuzzer;

pub use context::{ConstId, Constant, Context};
pub use instruction::{FloatPredicate, InstFlags, InstId, Instruction, IntPredicate, Opcode, Predicate};
pub use program::{BasicBlock, BlockId, Function, Global, InstRef, Module, Value};
pub use dominance::DominatorTree;
pub use validation::verify_module;
pub use codec::{parse_and_verify, parse_module, write_module};
pub use operations::{default_operations, OpDescriptor, SourcePred};
pub use random_builder::RandomIrBuilder;
pub use mutation::{
    Granularity, InjectorIrStrategy, InstDeleterIrStrategy, InstModificationIrStrategy,
    IrMutationStrategy, IrMutator,
};
pub use fuzzer::{custom_mutate, seed_module};
