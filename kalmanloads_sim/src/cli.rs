// kalmanloads_sim/src/cli.rs

use clap::Parser;
use std::path::PathBuf;

use crate::simulation::config::RunConfig;

/// kalmanloads: offline Kalman estimation of wind turbine tower loads,
/// thrust and rotor-effective wind speed from recorded time series.
#[derive(Parser, Debug, Clone)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// The path to the run configuration TOML file.
    #[arg(short, long, default_value = "run.toml")]
    pub config: PathBuf,

    /// Write results to this file instead of the configured one.
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Seed for the measurement noise generator.
    #[arg(long)]
    pub seed: Option<u64>,

    /// Skip writing the results file.
    #[arg(long, default_value_t = false)]
    pub no_export: bool,
}

impl Cli {
    /// Applies the command-line overrides on top of a loaded configuration.
    pub fn apply(&self, config: &mut RunConfig) {
        if let Some(output) = &self.output {
            config.files.output = Some(output.clone());
        }
        if let Some(seed) = self.seed {
            config.measurements.seed = Some(seed);
        }
        if self.no_export {
            config.export = false;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    #[test]
    fn overrides_win_over_config() {
        let mut config = RunConfig::from_toml_str(
            r#"
            [files]
            model = "m.toml"
            measurements = "y.csv"
            aero_tables_base = "aero"
            [measurements]
            seed = 3
            "#,
            Path::new("/cases"),
        )
        .unwrap();
        let cli = Cli::parse_from(["kalmanloads", "-c", "run.toml", "--seed", "8", "--no-export", "-o", "/tmp/out.csv"]);
        cli.apply(&mut config);
        assert_eq!(config.seed(), 8);
        assert!(!config.export);
        assert_eq!(config.output_path(), PathBuf::from("/tmp/out.csv"));
    }

    #[test]
    fn defaults() {
        let cli = Cli::parse_from(["kalmanloads"]);
        assert_eq!(cli.config, PathBuf::from("run.toml"));
        assert!(cli.seed.is_none());
        assert!(!cli.no_export);
    }
}
