//! Command-line argument parsing with clap.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use clawinn_core::SimConfig;

/// Clawinn - a simulated labor marketplace of autonomous agents.
#[derive(Parser, Debug, Clone)]
#[command(name = "clawinn")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Emit logs as JSON lines.
    #[arg(long, global = true, env = "CLAWINN_LOG_JSON")]
    pub log_json: bool,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Run the simulation.
    Run(RunArgs),

    /// Write a config file with every default filled in.
    InitConfig {
        /// Path to write config.
        #[arg(short, long, default_value = "clawinn.json")]
        output: PathBuf,
    },

    /// Print marketplace totals from a state snapshot.
    Stats {
        /// Snapshot to read.
        #[arg(short, long, env = "CLAWINN_STATE")]
        state: PathBuf,
    },
}

/// Arguments for `run`.
#[derive(Args, Debug, Clone, Default)]
pub struct RunArgs {
    /// Path to a JSON config file. Defaults apply when omitted.
    #[arg(short, long, env = "CLAWINN_CONFIG")]
    pub config: Option<PathBuf>,

    /// Seed for a reproducible run.
    #[arg(long, env = "CLAWINN_SEED")]
    pub seed: Option<u64>,

    /// Override the tick interval.
    #[arg(long)]
    pub tick_interval_ms: Option<u64>,

    /// Stop after this many seconds instead of waiting for Ctrl-C.
    #[arg(long)]
    pub duration_secs: Option<u64>,

    /// Snapshot file to resume from and save to on exit.
    #[arg(short, long, env = "CLAWINN_STATE")]
    pub state: Option<PathBuf>,
}

impl RunArgs {
    /// Apply command-line overrides on top of a loaded config.
    pub fn apply(&self, mut config: SimConfig) -> SimConfig {
        if let Some(ms) = self.tick_interval_ms {
            config.tick_interval_ms = ms;
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_defaults() {
        let cli = Cli::parse_from(["clawinn", "run"]);
        assert!(!cli.log_json);
        match cli.command {
            Commands::Run(args) => {
                assert!(args.config.is_none());
                assert!(args.seed.is_none());
                assert!(args.duration_secs.is_none());
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "clawinn",
            "--log-json",
            "run",
            "--seed",
            "42",
            "--tick-interval-ms",
            "500",
            "--duration-secs",
            "30",
            "--state",
            "market.json",
        ]);
        assert!(cli.log_json);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.seed, Some(42));
                assert_eq!(args.tick_interval_ms, Some(500));
                assert_eq!(args.duration_secs, Some(30));
                assert_eq!(args.state, Some(PathBuf::from("market.json")));
            }
            _ => panic!("expected run command"),
        }
    }

    #[test]
    fn parse_init_config_default_path() {
        let cli = Cli::parse_from(["clawinn", "init-config"]);
        match cli.command {
            Commands::InitConfig { output } => assert_eq!(output, PathBuf::from("clawinn.json")),
            _ => panic!("expected init-config command"),
        }
    }

    #[test]
    fn stats_requires_a_state_file() {
        assert!(Cli::try_parse_from(["clawinn", "stats"]).is_err());
    }

    #[test]
    fn tick_override_replaces_config_value() {
        let args = RunArgs {
            tick_interval_ms: Some(750),
            ..RunArgs::default()
        };
        let config = args.apply(SimConfig::default());
        assert_eq!(config.tick_interval_ms, 750);
        assert_eq!(
            RunArgs::default().apply(SimConfig::default()).tick_interval_ms,
            SimConfig::default().tick_interval_ms
        );
    }
}
