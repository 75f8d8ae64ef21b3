//! compat - cross-version compatibility checks for the client SDK
//!
//! Builds the compat binary of every supported SDK version and checks that
//! data written by each historical version is still usable by the current
//! one.

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

mod commands;

/// compat - cross-version compatibility checks for the client SDK
#[derive(Parser, Debug)]
#[command(name = "compat")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Log level or filter directive (trace, debug, info, warn, error)
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Build every version and run all compatibility scenarios
    Run(commands::run::RunArgs),

    /// Print the (version, scenario) pairs a run would execute
    Plan {
        /// Path to a compat configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    match cli.command {
        Commands::Run(args) => commands::run::run(&args),
        Commands::Plan { config } => commands::plan::run(config.as_deref()),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_run_requires_profile() {
        assert!(Cli::try_parse_from(["compat", "run"]).is_err());

        let cli = Cli::try_parse_from([
            "compat",
            "run",
            "--profile",
            "linux-release",
            "--isolate-conan-user-home",
        ])
        .unwrap();
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.profile, "linux-release");
                assert!(args.isolate_conan_user_home);
                assert!(!args.export_tanker_dev);
            },
            Commands::Plan { .. } => panic!("expected run"),
        }
        assert_eq!(cli.log_level, "info");
    }

    #[test]
    fn test_log_level_is_global() {
        let cli = Cli::try_parse_from(["compat", "plan", "--log-level", "debug"]).unwrap();
        assert_eq!(cli.log_level, "debug");
        assert!(matches!(cli.command, Commands::Plan { config: None }));
    }
}
