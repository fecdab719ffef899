//! Configuration management commands.

use std::path::Path;

use clap::Args;
use lockbox_core::config::Config;
use lockbox_core::paths;

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

    /// Show configuration file path
    Path,

    /// Write a default configuration file
    Init {
        /// Force overwrite existing config
        #[arg(short, long)]
        force: bool,
    },

    /// Validate the configuration file
    Validate,
}

/// Run the config command against the resolved config file `path`.
pub fn run(args: ConfigArgs, path: &Path, config: &Config) -> anyhow::Result<()> {
    match args.command {
        ConfigCommand::Show => {
            let json = serde_json::to_string_pretty(config)?;
            println!("{}", json);
        }

        ConfigCommand::Path => {
            println!("{}", path.display());
        }

        ConfigCommand::Init { force } => {
            if path.exists() && !force {
                anyhow::bail!(
                    "Config file already exists: {:?}. Use --force to overwrite.",
                    path
                );
            }

            paths::ensure_dirs()?;
            Config::default().save(path)?;
            println!("Created config file: {:?}", path);
        }

        ConfigCommand::Validate => match Config::load(path) {
            Ok(config) => match config.validate() {
                Ok(()) => println!("Configuration is valid"),
                Err(e) => anyhow::bail!("Configuration error: {}", e),
            },
            Err(e) => anyhow::bail!("Failed to load config: {}", e),
        },
    }

    Ok(())
}
