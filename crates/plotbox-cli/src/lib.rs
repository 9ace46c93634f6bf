//! plotbox command-line interface.

pub mod commands;

use clap::{Parser, Subcommand};
use plotbox_core::Config;
use std::path::PathBuf;
use std::process::ExitCode;

/// plotbox - sandboxed script runner with charts
#[derive(Parser)]
#[command(name = "plotbox")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "PLOTBOX_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server
    Serve(commands::serve::ServeArgs),

    /// Run a script file once and print the result
    Run(commands::run::RunArgs),

    /// Serve one run on stdin/stdout (spawned by the server)
    #[command(hide = true)]
    Worker,

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Show version information
    Version,
}

/// Run the CLI with the given arguments.
pub async fn run(cli: Cli) -> anyhow::Result<ExitCode> {
    let load = || Config::resolve(cli.config.as_deref());

    match cli.command {
        Commands::Serve(args) => commands::serve::run(args, load()?).await?,
        Commands::Run(args) => return commands::run::run(args, load()?).await,
        Commands::Config(args) => commands::config::run(args, cli.config.as_deref())?,
        Commands::Worker => anyhow::bail!("The worker must be started as its own process"),
        Commands::Version => {
            println!("plotbox {}", env!("CARGO_PKG_VERSION"));
        }
    }
    Ok(ExitCode::SUCCESS)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_parse_version() {
        let cli = Cli::try_parse_from(["plotbox", "version"]).unwrap();
        assert!(matches!(cli.command, Commands::Version));
    }

    #[test]
    fn test_parse_worker() {
        let cli = Cli::try_parse_from(["plotbox", "worker"]).unwrap();
        assert!(matches!(cli.command, Commands::Worker));
    }

    #[test]
    fn test_parse_serve() {
        let cli = Cli::try_parse_from([
            "plotbox",
            "serve",
            "--bind",
            "0.0.0.0",
            "--port",
            "9090",
            "--in-memory",
        ])
        .unwrap();
        match cli.command {
            Commands::Serve(args) => {
                assert_eq!(args.bind.as_deref(), Some("0.0.0.0"));
                assert_eq!(args.port, Some(9090));
                assert!(args.in_memory);
            }
            _ => panic!("Expected Serve command"),
        }
    }

    #[test]
    fn test_parse_run() {
        let cli =
            Cli::try_parse_from(["plotbox", "-v", "run", "script.js", "--timeout", "1.5"]).unwrap();
        assert_eq!(cli.verbose, 1);
        match cli.command {
            Commands::Run(args) => {
                assert_eq!(args.file, PathBuf::from("script.js"));
                assert_eq!(args.timeout, Some(1.5));
            }
            _ => panic!("Expected Run command"),
        }
    }

    #[test]
    fn test_parse_config_show() {
        let cli = Cli::try_parse_from(["plotbox", "--config", "plotbox.json5", "config", "show"])
            .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("plotbox.json5")));
        match cli.command {
            Commands::Config(args) => {
                assert!(matches!(args.command, commands::config::ConfigCommand::Show));
            }
            _ => panic!("Expected Config command"),
        }
    }

    #[test]
    fn test_run_requires_file() {
        assert!(Cli::try_parse_from(["plotbox", "run"]).is_err());
    }
}
