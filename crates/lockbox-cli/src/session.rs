//! Opening a store from the command line.
//!
//! Builds a [`Context`] from the loaded configuration in a fixed sequence of
//! stages. A failure at any stage is reported as a [`StageError`] whose
//! stage decides the process exit code.

use std::fmt;
use std::path::PathBuf;

use lockbox_core::env::{self, vars};
use lockbox_core::{Config, ConfigError, SecretKey};
use lockbox_store::{
    AesGcmCryptor, ArrayRepository, Codec, CodecOptions, Context, Error, FilePersister, Ownership,
};
use tracing::{debug, info};

/// Box type for stage failure sources.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Step of context creation, in the order they run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RegisterPersister,
    RegisterRepository,
    RegisterCryptor,
    Config,
    Seal,
    Load,
    Persist,
    Key,
}

impl Stage {
    /// Process exit code reported when this stage fails.
    pub fn exit_code(self) -> u8 {
        match self {
            Stage::RegisterPersister => 2,
            Stage::RegisterRepository => 3,
            Stage::RegisterCryptor => 4,
            Stage::Config => 5,
            Stage::Seal => 6,
            Stage::Load => 7,
            Stage::Persist => 8,
            Stage::Key => 9,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::RegisterPersister => "failed to register persister",
            Stage::RegisterRepository => "failed to register repository",
            Stage::RegisterCryptor => "failed to register cryptor",
            Stage::Config => "failed to configure context",
            Stage::Seal => "failed to seal context",
            Stage::Load => "failed to load store",
            Stage::Persist => "failed to persist store",
            Stage::Key => "failed to obtain session key",
        };
        f.write_str(s)
    }
}

/// A failure while opening or saving a store.
#[derive(Debug, thiserror::Error)]
#[error("{stage}")]
pub struct StageError {
    pub stage: Stage,
    #[source]
    pub source: BoxError,
}

impl StageError {
    pub fn new(stage: Stage, source: impl Into<BoxError>) -> Self {
        Self {
            stage,
            source: source.into(),
        }
    }

    /// Status code of the underlying store error, if there is one.
    pub fn store_code(&self) -> Option<i32> {
        self.source.downcast_ref::<Error>().map(Error::code)
    }
}

trait StageExt<T> {
    fn stage(self, stage: Stage) -> Result<T, StageError>;
}

impl<T, E: Into<BoxError>> StageExt<T> for Result<T, E> {
    fn stage(self, stage: Stage) -> Result<T, StageError> {
        self.map_err(|e| StageError::new(stage, e))
    }
}

/// Whether opening found an existing store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opened {
    /// Records were loaded from the store file.
    Loaded(usize),
    /// No store existed; an empty one was written.
    Created,
}

/// Resolve the store file. Failures belong to the config stage.
fn store_path(config: &Config) -> Result<PathBuf, StageError> {
    let path = config.store_path().stage(Stage::Config)?;
    if path.file_name().is_none() {
        let reason = format!("store path {:?} does not name a file", path);
        return Err(StageError::new(Stage::Config, ConfigError::Validation(reason)));
    }
    Ok(path)
}

/// Build, seal and load a context for the configured store.
///
/// When `key` is given the context is unlocked before loading. A missing
/// store is not an error: the context starts empty and is persisted once so
/// the file exists afterwards.
pub fn open(config: &Config, key: Option<SecretKey>) -> Result<(Context, Opened), StageError> {
    let path = store_path(config)?;
    let codec = Codec::new(CodecOptions::from(&config.store));
    debug!(path = %path.display(), options = ?codec.options(), "opening store");

    let mut ctx = Context::new();
    ctx.register_persister(Box::new(FilePersister::new(&path, codec)))
        .stage(Stage::RegisterPersister)?;
    ctx.register_repository(Box::new(ArrayRepository::new()))
        .stage(Stage::RegisterRepository)?;
    ctx.register_cryptor(Box::new(AesGcmCryptor::new()))
        .stage(Stage::RegisterCryptor)?;
    ctx.config(Ownership::from(&config.ownership))
        .stage(Stage::Config)?;
    ctx.seal().stage(Stage::Seal)?;

    if let Some(key) = key {
        ctx.unlock(key);
    }

    let opened = match ctx.load() {
        Ok(count) => Opened::Loaded(count),
        Err(Error::LoadMissing(_)) => {
            eprintln!("No store at {}; creating an empty one.", path.display());
            ctx.persist().stage(Stage::Persist)?;
            info!(path = %path.display(), "created empty store");
            Opened::Created
        }
        Err(e) => return Err(StageError::new(Stage::Load, e)),
    };

    Ok((ctx, opened))
}

/// Persist the context, reporting failure as the persist stage.
pub fn save(ctx: &mut Context) -> Result<(), StageError> {
    ctx.persist().stage(Stage::Persist)
}

/// Session key from `LOCKBOX_KEY`, or prompted for when unset.
pub fn resolve_key() -> Result<SecretKey, StageError> {
    let hex = match env::get_var(vars::LOCKBOX_KEY) {
        Some(hex) => hex,
        None => rpassword::prompt_password("Session key (hex): ").stage(Stage::Key)?,
    };
    parse_key(&hex)
}

/// Parse a hex session key, ignoring surrounding whitespace.
pub fn parse_key(hex: &str) -> Result<SecretKey, StageError> {
    SecretKey::from_hex(hex.trim()).stage(Stage::Key)
}
