//! Shared fixtures for the Lockbox integration tests.

use std::path::PathBuf;

use lockbox_core::config::Config;
use lockbox_core::SecretKey;
use lockbox_store::{
    AesGcmCryptor, ArrayRepository, Codec, CodecOptions, Context, FilePersister, Ownership,
};
use serde::Serialize;
use serde_bytes::Bytes;
use tempfile::TempDir;

/// IV length of the bundled cryptor.
pub const IV_LEN: usize = 32;

/// A temporary store directory with a fresh session key.
pub struct Fixture {
    pub dir: TempDir,
    pub key: SecretKey,
}

impl Fixture {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            key: SecretKey::generate(),
        }
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("store.msgpack")
    }

    /// Default configuration pointing at this fixture's store.
    pub fn config(&self) -> Config {
        let mut config = Config::default();
        config.store.path = Some(self.store_path());
        config
    }

    /// A sealed, unlocked context over the fixture's store file. Nothing is
    /// loaded yet.
    pub fn context(&self, options: CodecOptions, ownership: Ownership) -> Context {
        let mut ctx = Context::new();
        ctx.register_persister(Box::new(FilePersister::new(
            self.store_path(),
            Codec::new(options),
        )))
        .unwrap();
        ctx.register_repository(Box::new(ArrayRepository::new()))
            .unwrap();
        ctx.register_cryptor(Box::new(AesGcmCryptor::new())).unwrap();
        ctx.config(ownership).unwrap();
        ctx.seal().unwrap();
        ctx.unlock(self.key.clone());
        ctx
    }

    pub fn write_store(&self, bytes: &[u8]) {
        std::fs::write(self.store_path(), bytes).unwrap();
    }
}

impl Default for Fixture {
    fn default() -> Self {
        Self::new()
    }
}

/// A wire record as the legacy tool wrote it: keys in fixed order.
#[derive(Serialize)]
pub struct LegacyRecord<'a> {
    pub name: &'a str,
    pub iv: &'a Bytes,
    pub description: &'a str,
    pub value: &'a Bytes,
}

/// A wire record whose second key is misspelled.
#[derive(Serialize)]
pub struct MisnamedIvRecord<'a> {
    pub name: &'a str,
    pub ivv: &'a Bytes,
    pub description: &'a str,
    pub value: &'a Bytes,
}

#[derive(Serialize)]
#[serde(untagged)]
pub enum WireRecord<'a> {
    Legacy(LegacyRecord<'a>),
    MisnamedIv(MisnamedIvRecord<'a>),
}

/// Encode a store document from hand-built records.
pub fn document(records: &[WireRecord<'_>]) -> Vec<u8> {
    rmp_serde::to_vec_named(records).unwrap()
}
