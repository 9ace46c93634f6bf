//! Configuration management commands.

use clap::Args;
use plotbox_core::Config;
use std::path::Path;

/// Config command arguments.
#[derive(Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(clap::Subcommand)]
pub enum ConfigCommand {
    /// Show the effective configuration
    Show,

    /// Get a configuration value
    Get {
        /// Configuration key (dot-separated path)
        key: String,
    },

    /// Validate configuration
    Validate,
}

/// Run the config command.
pub fn run(args: ConfigArgs, path: Option<&Path>) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let config = Config::resolve(path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
        }

        ConfigCommand::Get { key } => {
            let config = Config::resolve(path)?;
            let json = serde_json::to_value(&config)?;
            match lookup(&json, &key) {
                Some(v) => println!("{}", serde_json::to_string_pretty(v)?),
                None => anyhow::bail!("Key not found: {}", key),
            }
        }

        ConfigCommand::Validate => {
            Config::resolve(path)?;
            println!("Configuration is valid");
        }
    }

    Ok(())
}

fn lookup<'a>(json: &'a serde_json::Value, key: &str) -> Option<&'a serde_json::Value> {
    key.split('.').try_fold(json, |acc, k| acc.get(k))
}
