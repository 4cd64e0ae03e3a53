//! Entry point for configuring and running IR mutations.

use super::{
    InjectorIrStrategy, InstDeleterIrStrategy, InstModificationIrStrategy, IrMutationStrategy,
};
use crate::program::Module;
use crate::random_builder::RandomIrBuilder;
use irfuzz_core::{Error, MutatorConfig, Result, StrategyKind, Type};
use tracing::{debug, warn};

/// Owns the allowed types and the ordered strategy list. Immutable once
/// built, so one mutator can be shared by any number of fuzzing workers.
pub struct IrMutator {
    allowed_types: Vec<Type>,
    strategies: Vec<Box<dyn IrMutationStrategy>>,
}

impl IrMutator {
    pub fn new(
        allowed_types: Vec<Type>,
        strategies: Vec<Box<dyn IrMutationStrategy>>,
    ) -> Result<Self> {
        if strategies.is_empty() {
            return Err(Error::Config("at least one strategy is required".to_string()));
        }
        if let Some(strategy) = strategies.iter().find(|s| s.granularities().is_empty()) {
            return Err(Error::Config(format!(
                "strategy {} does not implement any granularity",
                strategy.name()
            )));
        }
        if let Some(ty) = allowed_types.iter().find(|ty| ty.is_void() || !ty.is_valid()) {
            return Err(Error::Config(format!("type {} cannot be allowed", ty)));
        }
        Ok(Self {
            allowed_types,
            strategies,
        })
    }

    /// Build a mutator from configuration, using the default operation catalog
    pub fn from_config(config: &MutatorConfig) -> Result<Self> {
        let strategies = config
            .strategies
            .iter()
            .map(|kind| -> Box<dyn IrMutationStrategy> {
                match kind {
                    StrategyKind::Injector => Box::new(InjectorIrStrategy::with_default_ops()),
                    StrategyKind::InstModification => Box::new(InstModificationIrStrategy),
                    StrategyKind::InstDeleter => Box::new(InstDeleterIrStrategy),
                }
            })
            .collect();
        Self::new(config.allowed_types.clone(), strategies)
    }

    pub fn allowed_types(&self) -> &[Type] {
        &self.allowed_types
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    /// Pick a strategy by weighted draw. Each strategy sees the running total
    /// of the weights before it; ties go to the earlier strategy. Returns
    /// `None` if every weight is zero.
    pub fn select_strategy(
        &self,
        builder: &mut RandomIrBuilder,
        current_size: usize,
        max_size: usize,
    ) -> Option<usize> {
        let mut total: u64 = 0;
        let mut cumulative = Vec::with_capacity(self.strategies.len());
        for strategy in &self.strategies {
            total = total.saturating_add(strategy.weight(current_size, max_size, total));
            cumulative.push(total);
        }

        let draw = builder.uniform_draw(0..total)?;
        cumulative.iter().position(|upper| draw < *upper)
    }

    /// Apply exactly one randomly chosen structural edit to `module`.
    ///
    /// All randomness derives from `seed`, so the same inputs always produce
    /// the same mutant.
    pub fn mutate_module(&self, module: &mut Module, seed: u64, current_size: usize, max_size: usize) {
        let mut builder = RandomIrBuilder::new(seed, self.allowed_types.clone());
        let Some(index) = self.select_strategy(&mut builder, current_size, max_size) else {
            warn!("No mutation strategy has a positive weight");
            return;
        };

        let strategy = &self.strategies[index];
        debug!(
            "Mutating module {} with {} (seed {}, size {}/{})",
            module.name,
            strategy.name(),
            seed,
            current_size,
            max_size
        );
        strategy.mutate_module(module, &mut builder);
    }
}
