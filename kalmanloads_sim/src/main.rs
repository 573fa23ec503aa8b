// kalmanloads_sim/src/main.rs

use anyhow::{Context, Result};
use clap::Parser;

use kalmanloads_sim::cli::Cli;
use kalmanloads_sim::simulation::config::RunConfig;
use kalmanloads_sim::simulation::core::pipeline::run_simulation;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = RunConfig::load(&cli.config)
        .with_context(|| format!("loading configuration `{}`", cli.config.display()))?;
    cli.apply(&mut config);

    let artifacts = run_simulation(&config).context("estimation run failed")?;

    log::info!(
        "Done: {} samples at dt = {} s",
        artifacts.loaded.nt(),
        artifacts.loaded.dt()
    );
    if let Some(path) = &artifacts.output {
        log::info!("Results: {}", path.display());
    }
    Ok(())
}
