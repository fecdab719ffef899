use std::fmt;

use zeroize::Zeroize;

use super::Persister;
use crate::credential::CredentialFactory;
use crate::error::{Error, Result};
use crate::repository::Repository;
use crate::serialize::Codec;

/// Persister that keeps the encoded store in memory.
#[derive(Default)]
pub struct MemoryPersister {
    bytes: Option<Vec<u8>>,
    codec: Codec,
}

impl MemoryPersister {
    pub fn new(codec: Codec) -> Self {
        Self { bytes: None, codec }
    }

    /// Start from an already encoded store.
    pub fn with_bytes(codec: Codec, bytes: Vec<u8>) -> Self {
        Self {
            bytes: Some(bytes),
            codec,
        }
    }

    /// The last persisted bytes, if any.
    pub fn bytes(&self) -> Option<&[u8]> {
        self.bytes.as_deref()
    }
}

impl fmt::Debug for MemoryPersister {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryPersister")
            .field("len", &self.bytes.as_ref().map(Vec::len))
            .field("codec", &self.codec)
            .finish()
    }
}

impl Persister for MemoryPersister {
    fn load(
        &mut self,
        repository: &mut dyn Repository,
        factory: &CredentialFactory,
    ) -> Result<usize> {
        let bytes = self
            .bytes
            .as_deref()
            .ok_or_else(|| Error::LoadMissing("memory".to_string()))?;
        self.codec.decode_into(bytes, repository, factory)
    }

    fn persist(&mut self, repository: &dyn Repository) -> Result<()> {
        let encoded = self.codec.encode(repository)?;
        if let Some(mut old) = self.bytes.replace(encoded) {
            old.zeroize();
        }
        Ok(())
    }

    fn destroy(&mut self) {
        if let Some(mut bytes) = self.bytes.take() {
            bytes.zeroize();
        }
    }
}
