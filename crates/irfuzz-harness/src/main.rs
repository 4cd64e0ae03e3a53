//! Standalone mutation loop over a module on disk.

mod telemetry;

use anyhow::{bail, Context as _, Result};
use irfuzz_core::HarnessConfig;
use irfuzz_ir::{parse_and_verify, seed_module, write_module, Context, IrMutator, Module};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

fn main() -> Result<()> {
    telemetry::init_telemetry()?;

    let config = match std::env::args().nth(1) {
        Some(path) => load_config(Path::new(&path))?,
        None => HarnessConfig::default(),
    };

    info!("Starting IRFuzz harness");
    info!(
        "Seed {}, {} iterations, max size {} bytes",
        config.seed, config.iterations, config.max_size
    );

    let mutator = IrMutator::from_config(&config.mutator)?;
    info!("Strategies: {}", mutator.strategy_names().join(", "));

    let context = Arc::new(Context::new());
    let module = load_input(&config, &context)?;

    let output_dir = PathBuf::from(&config.output_dir);
    std::fs::create_dir_all(&output_dir)
        .with_context(|| format!("creating output directory {}", output_dir.display()))?;

    let stats = run(&config, &mutator, &context, module, &output_dir)?;
    info!(
        "Done: {} accepted, {} over budget, {} rejected",
        stats.accepted, stats.over_budget, stats.rejected
    );
    Ok(())
}

#[derive(Debug, Default)]
struct Stats {
    accepted: u64,
    over_budget: u64,
    rejected: u64,
}

fn load_config(path: &Path) -> Result<HarnessConfig> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("reading config {}", path.display()))?;
    Ok(HarnessConfig::from_json(&json)?)
}

fn load_input(config: &HarnessConfig, context: &Arc<Context>) -> Result<Module> {
    let Some(input) = &config.input else {
        info!("No input given, starting from the seed module");
        return Ok(seed_module(context));
    };
    let bytes = std::fs::read(input).with_context(|| format!("reading input {}", input))?;
    match parse_and_verify(&bytes, context) {
        Some(module) => {
            info!("Loaded module {} ({} bytes)", module.name, bytes.len());
            Ok(module)
        }
        None => bail!("input {} is not a well-formed module", input),
    }
}

fn run(
    config: &HarnessConfig,
    mutator: &IrMutator,
    context: &Arc<Context>,
    mut current: Module,
    output_dir: &Path,
) -> Result<Stats> {
    let mut buffer = vec![0u8; config.max_size];
    let mut size = write_module(&current, &mut buffer, config.max_size);
    if size == 0 {
        bail!("starting module does not fit in {} bytes", config.max_size);
    }

    let mut stats = Stats::default();
    for i in 0..config.iterations {
        let mut mutant = current.clone();
        mutator.mutate_module(&mut mutant, config.seed.wrapping_add(i), size, config.max_size);

        let written = write_module(&mutant, &mut buffer, config.max_size);
        if written == 0 {
            debug!("Iteration {}: mutant over budget, discarded", i);
            stats.over_budget += 1;
            continue;
        }

        let Some(accepted) = parse_and_verify(&buffer[..written], context) else {
            warn!("Iteration {}: mutant failed verification, discarded", i);
            stats.rejected += 1;
            continue;
        };

        let path = output_dir.join(format!("mutant-{}.bin", i));
        std::fs::write(&path, &buffer[..written])
            .with_context(|| format!("writing {}", path.display()))?;
        debug!("Iteration {}: wrote {} ({} bytes)", i, path.display(), written);

        current = accepted;
        size = written;
        stats.accepted += 1;
    }
    Ok(stats)
}
