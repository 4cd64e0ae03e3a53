//! Configuration types for the mutation engine and harness.

use crate::types::Type;
use serde::{Deserialize, Serialize};

/// Built-in mutation strategies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyKind {
    /// Inserts new operations from the operation catalog
    Injector,
    /// Toggles flags, replaces operands and changes predicates
    InstModification,
    /// Deletes instructions, biased towards the size limit
    InstDeleter,
}

/// Mutator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutatorConfig {
    /// Types the random builder may use when it has to create new values
    pub allowed_types: Vec<Type>,
    /// Strategies in registration order. Order affects the running weight
    /// each strategy sees during selection.
    pub strategies: Vec<StrategyKind>,
}

impl Default for MutatorConfig {
    fn default() -> Self {
        Self {
            allowed_types: vec![
                Type::I1,
                Type::I8,
                Type::I16,
                Type::I32,
                Type::I64,
                Type::Float,
                Type::Double,
                Type::Ptr,
            ],
            strategies: vec![
                StrategyKind::Injector,
                StrategyKind::InstModification,
                StrategyKind::InstDeleter,
            ],
        }
    }
}

/// Harness configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarnessConfig {
    /// Base seed; iteration `i` mutates with `seed + i`
    pub seed: u64,
    /// Number of mutation rounds
    pub iterations: u64,
    /// Size budget for an encoded module (bytes)
    pub max_size: usize,
    /// Encoded module to start from. A built-in seed module is used if absent.
    pub input: Option<String>,
    /// Directory receiving accepted mutants
    pub output_dir: String,
    /// Mutator configuration
    pub mutator: MutatorConfig,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            seed: 0,
            iterations: 100,
            max_size: 4096,
            input: None,
            output_dir: "./mutants".to_string(),
            mutator: MutatorConfig::default(),
        }
    }
}

impl HarnessConfig {
    /// Load a configuration from JSON, filling missing fields with defaults
    pub fn from_json(json: &str) -> crate::Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
