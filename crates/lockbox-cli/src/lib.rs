//! Lockbox command-line interface.

pub mod commands;
pub mod session;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use lockbox_core::config::Config;
use lockbox_core::error::ConfigError;
use lockbox_core::{paths, SecretKey};

/// Lockbox - local encrypted credential store
#[derive(Parser)]
#[command(name = "lockbox")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Increase logging verbosity
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Path to config file
    #[arg(short, long, env = "LOCKBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Path to the store file, overriding the configuration
    #[arg(short, long, env = "LOCKBOX_STORE")]
    pub store: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Create an empty store
    Init,

    /// List credential names
    List,

    /// Encrypt and store a credential (prompts for value)
    Add {
        /// Credential name
        name: String,

        /// Free-form description
        #[arg(short, long, default_value = "")]
        description: String,

        /// Credential value (if omitted, prompts for hidden input)
        #[arg(long)]
        value: Option<String>,
    },

    /// Decrypt and print a credential
    Get {
        /// Credential name
        name: String,
    },

    /// Remove a credential
    Remove {
        /// Credential name
        name: String,
    },

    /// Replace the description of a credential
    Describe {
        /// Credential name
        name: String,

        /// New description
        description: String,
    },

    /// Configuration management
    Config(commands::config::ConfigArgs),

    /// Generate a random session key and print it as hex
    Keygen,

    /// Show version information
    Version,
}

impl Cli {
    /// Config file this invocation reads.
    pub fn config_path(&self) -> Result<PathBuf, ConfigError> {
        match &self.config {
            Some(path) => Ok(path.clone()),
            None => paths::config_file(),
        }
    }

    /// Load the configuration, apply environment and flag overrides, and
    /// validate the result. A missing config file yields the defaults.
    pub fn load_config(&self) -> Result<Config, ConfigError> {
        let path = self.config_path()?;
        let mut config = match Config::load(&path) {
            Ok(config) => config,
            Err(ConfigError::NotFound(_)) => Config::default(),
            Err(e) => return Err(e),
        }
        .with_env_overrides();

        if let Some(store) = &self.store {
            config.store.path = Some(store.clone());
        }
        config.validate()?;
        Ok(config)
    }
}

/// Run the CLI with the given arguments.
pub fn run(cli: Cli, config: &Config) -> anyhow::Result<()> {
    let config_path = cli.config_path()?;
    match cli.command {
        Commands::Init => commands::credentials::init(config),
        Commands::List => commands::credentials::list(config),
        Commands::Add {
            name,
            description,
            value,
        } => commands::credentials::add(config, &name, &description, value),
        Commands::Get { name } => commands::credentials::get(config, &name),
        Commands::Remove { name } => commands::credentials::remove(config, &name),
        Commands::Describe { name, description } => {
            commands::credentials::describe(config, &name, &description)
        }
        Commands::Config(args) => commands::config::run(args, &config_path, config),
        Commands::Keygen => {
            println!("{}", SecretKey::generate().to_hex());
            Ok(())
        }
        Commands::Version => {
            println!("lockbox {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
