//! The composition root.
//!
//! A [`Context`] binds one persister, one repository and one cryptor, then
//! freezes that configuration with [`Context::seal`]. Loading and persisting
//! need a sealed context; anything that encrypts or decrypts also needs a
//! session key bound with [`Context::unlock`].
//!
//! ```text
//! Unconfigured -> Registering -> Sealed(Locked) <-> Sealed(Unlocked)
//! ```

use std::fmt;
use std::ops::BitOr;

use lockbox_core::config::OwnershipConfig;
use lockbox_core::{SecretKey, SecretString};
use tracing::{debug, info};

use crate::credential::{Credential, CredentialFactory};
use crate::crypto::Cryptor;
use crate::error::{Error, Result};
use crate::persister::Persister;
use crate::repository::Repository;

/// Which collaborators a context destroys at teardown.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Ownership(u8);

impl Ownership {
    /// Every collaborator stays caller-owned.
    pub const NONE: Ownership = Ownership(0);
    pub const ACQUIRE_PERSISTER: Ownership = Ownership(1);
    pub const ACQUIRE_REPOSITORY: Ownership = Ownership(1 << 1);
    pub const ACQUIRE_CRYPTOR: Ownership = Ownership(1 << 2);

    pub fn contains(self, other: Ownership) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

impl BitOr for Ownership {
    type Output = Ownership;

    fn bitor(self, rhs: Ownership) -> Ownership {
        Ownership(self.0 | rhs.0)
    }
}

impl From<&OwnershipConfig> for Ownership {
    fn from(config: &OwnershipConfig) -> Self {
        let mut ownership = Ownership::NONE;
        if config.acquire_persister {
            ownership = ownership | Ownership::ACQUIRE_PERSISTER;
        }
        if config.acquire_repository {
            ownership = ownership | Ownership::ACQUIRE_REPOSITORY;
        }
        if config.acquire_cryptor {
            ownership = ownership | Ownership::ACQUIRE_CRYPTOR;
        }
        ownership
    }
}

/// Whether a sealed context holds a session key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyState {
    Locked,
    Unlocked,
}

/// Configuration state of a [`Context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    /// Nothing registered or configured yet.
    Unconfigured,
    /// Collaborators are being registered.
    Registering,
    /// Configuration is frozen.
    Sealed(KeyState),
}

/// Collaborators handed back by [`Context::close`]: the ones the context
/// was not configured to acquire.
#[derive(Default)]
pub struct Detached {
    pub persister: Option<Box<dyn Persister>>,
    pub repository: Option<Box<dyn Repository>>,
    pub cryptor: Option<Box<dyn Cryptor>>,
}

/// Binds a persister, a repository and a cryptor under one session key.
#[derive(Default)]
pub struct Context {
    persister: Option<Box<dyn Persister>>,
    repository: Option<Box<dyn Repository>>,
    cryptor: Option<Box<dyn Cryptor>>,
    key: Option<SecretKey>,
    ownership: Ownership,
    configured: bool,
    sealed: bool,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> State {
        if self.sealed {
            let key = if self.key.is_some() {
                KeyState::Unlocked
            } else {
                KeyState::Locked
            };
            State::Sealed(key)
        } else if self.configured
            || self.persister.is_some()
            || self.repository.is_some()
            || self.cryptor.is_some()
        {
            State::Registering
        } else {
            State::Unconfigured
        }
    }

    pub fn ownership(&self) -> Ownership {
        self.ownership
    }

    fn ensure_unsealed(&self) -> Result<()> {
        if self.sealed {
            return Err(Error::AlreadySealed);
        }
        Ok(())
    }

    pub fn register_persister(&mut self, persister: Box<dyn Persister>) -> Result<()> {
        self.ensure_unsealed()?;
        self.persister = Some(persister);
        debug!("registered persister");
        Ok(())
    }

    pub fn register_repository(&mut self, repository: Box<dyn Repository>) -> Result<()> {
        self.ensure_unsealed()?;
        self.repository = Some(repository);
        debug!("registered repository");
        Ok(())
    }

    pub fn register_cryptor(&mut self, cryptor: Box<dyn Cryptor>) -> Result<()> {
        self.ensure_unsealed()?;
        self.cryptor = Some(cryptor);
        debug!("registered cryptor");
        Ok(())
    }

    /// Set which collaborators the context destroys at teardown.
    pub fn config(&mut self, ownership: Ownership) -> Result<()> {
        self.ensure_unsealed()?;
        self.ownership = ownership;
        self.configured = true;
        debug!(ownership = ownership.bits(), "configured ownership");
        Ok(())
    }

    /// Freeze the configuration. Every collaborator must be registered.
    pub fn seal(&mut self) -> Result<()> {
        self.ensure_unsealed()?;
        if self.persister.is_none() {
            return Err(Error::Unregistered("persister"));
        }
        if self.repository.is_none() {
            return Err(Error::Unregistered("repository"));
        }
        if self.cryptor.is_none() {
            return Err(Error::Unregistered("cryptor"));
        }

        self.sealed = true;
        info!(ownership = self.ownership.bits(), "context sealed");
        Ok(())
    }

    /// Bind the session key, replacing any previous one.
    pub fn unlock(&mut self, key: SecretKey) {
        self.key = Some(key);
        debug!("context unlocked");
    }

    /// Drop the session key.
    pub fn lock(&mut self) {
        if self.key.take().is_some() {
            debug!("context locked");
        }
    }

    fn parts(&self) -> Result<(&dyn Persister, &dyn Repository, &dyn Cryptor)> {
        if !self.sealed {
            return Err(Error::NotSealed);
        }
        match (
            self.persister.as_deref(),
            self.repository.as_deref(),
            self.cryptor.as_deref(),
        ) {
            (Some(p), Some(r), Some(c)) => Ok((p, r, c)),
            _ => Err(Error::NotSealed),
        }
    }

    fn parts_mut(&mut self) -> Result<(&mut dyn Persister, &mut dyn Repository, &dyn Cryptor)> {
        if !self.sealed {
            return Err(Error::NotSealed);
        }
        match (
            self.persister.as_deref_mut(),
            self.repository.as_deref_mut(),
            self.cryptor.as_deref(),
        ) {
            (Some(p), Some(r), Some(c)) => Ok((p, r, c)),
            _ => Err(Error::NotSealed),
        }
    }

    fn key(&self) -> Result<&SecretKey> {
        self.key.as_ref().ok_or(Error::Locked)
    }

    /// Populate the repository from the persister. Returns the number of
    /// records added.
    pub fn load(&mut self) -> Result<usize> {
        let (persister, repository, cryptor) = self.parts_mut()?;
        let factory = CredentialFactory::for_cryptor(cryptor);
        let count = persister.load(repository, &factory)?;
        info!(records = count, total = repository.count(), "store loaded");
        Ok(count)
    }

    /// Write the repository through the persister.
    pub fn persist(&mut self) -> Result<()> {
        let (persister, repository, _) = self.parts_mut()?;
        persister.persist(repository)?;
        info!(records = repository.count(), "store persisted");
        Ok(())
    }

    /// Encrypt `plaintext` and add it under `name`.
    pub fn store(&mut self, name: &str, description: &str, plaintext: &[u8]) -> Result<()> {
        self.parts()?;
        let key = self.key.as_ref().ok_or(Error::Locked)?;
        let (Some(repository), Some(cryptor)) =
            (self.repository.as_deref_mut(), self.cryptor.as_deref())
        else {
            return Err(Error::NotSealed);
        };

        if name.is_empty() {
            return Err(Error::InvalidName);
        }
        if repository.contains(name) {
            return Err(Error::DuplicateName(name.to_string()));
        }

        let mut credential = CredentialFactory::for_cryptor(cryptor).new_credential();
        credential.set_name(name);
        credential.set_description(description);
        credential.seal(plaintext, cryptor, key)?;
        repository.add(credential)?;

        debug!(name, "stored credential");
        Ok(())
    }

    /// Decrypt the credential stored under `name`.
    pub fn reveal(&self, name: &str) -> Result<SecretString> {
        let (_, repository, cryptor) = self.parts()?;
        let key = self.key()?;
        repository.get(name)?.reveal(cryptor, key)
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        let (_, repository, _) = self.parts_mut()?;
        repository.remove(name)?;
        debug!(name, "removed credential");
        Ok(())
    }

    pub fn update_description(&mut self, name: &str, description: &str) -> Result<()> {
        let (_, repository, _) = self.parts_mut()?;
        repository.update(name, &mut |credential| {
            credential.set_description(description);
            Ok(())
        })
    }

    /// Call `visit` for every credential in storage order, stopping at the
    /// first error.
    pub fn each_credential<F>(&self, visit: F) -> Result<()>
    where
        F: FnMut(&Credential) -> Result<()>,
    {
        let (_, repository, _) = self.parts()?;
        repository.iter().try_for_each(visit)
    }

    pub fn sort(&mut self) -> Result<()> {
        let (_, repository, _) = self.parts_mut()?;
        repository.sort();
        Ok(())
    }

    pub fn count(&self) -> Result<usize> {
        let (_, repository, _) = self.parts()?;
        Ok(repository.count())
    }

    pub fn repository(&self) -> Result<&dyn Repository> {
        let (_, repository, _) = self.parts()?;
        Ok(repository)
    }

    /// Tear the context down. Acquired collaborators are destroyed; the rest
    /// are handed back to the caller.
    pub fn close(mut self) -> Detached {
        self.teardown()
    }

    fn teardown(&mut self) -> Detached {
        self.key = None;
        let mut detached = Detached::default();

        if let Some(mut persister) = self.persister.take() {
            if self.ownership.contains(Ownership::ACQUIRE_PERSISTER) {
                persister.destroy();
            } else {
                detached.persister = Some(persister);
            }
        }
        if let Some(mut repository) = self.repository.take() {
            if self.ownership.contains(Ownership::ACQUIRE_REPOSITORY) {
                repository.destroy();
            } else {
                detached.repository = Some(repository);
            }
        }
        if let Some(cryptor) = self.cryptor.take() {
            if !self.ownership.contains(Ownership::ACQUIRE_CRYPTOR) {
                detached.cryptor = Some(cryptor);
            }
        }

        detached
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.teardown();
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("state", &self.state())
            .field("ownership", &self.ownership)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::AesGcmCryptor;
    use crate::persister::MemoryPersister;
    use crate::repository::ArrayRepository;
    use crate::serialize::Codec;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Memory persister that records whether it was destroyed.
    struct Tracked {
        inner: MemoryPersister,
        destroyed: Arc<AtomicBool>,
    }

    impl Persister for Tracked {
        fn load(
            &mut self,
            repository: &mut dyn Repository,
            factory: &CredentialFactory,
        ) -> Result<usize> {
            self.inner.load(repository, factory)
        }

        fn persist(&mut self, repository: &dyn Repository) -> Result<()> {
            self.inner.persist(repository)
        }

        fn destroy(&mut self) {
            self.destroyed.store(true, Ordering::SeqCst);
        }
    }

    fn tracked() -> (Box<Tracked>, Arc<AtomicBool>) {
        let destroyed = Arc::new(AtomicBool::new(false));
        let persister = Tracked {
            inner: MemoryPersister::default(),
            destroyed: destroyed.clone(),
        };
        (Box::new(persister), destroyed)
    }

    fn sealed_context() -> Context {
        let mut ctx = Context::new();
        ctx.register_persister(Box::new(MemoryPersister::default()))
            .unwrap();
        ctx.register_repository(Box::new(ArrayRepository::new()))
            .unwrap();
        ctx.register_cryptor(Box::new(AesGcmCryptor::new())).unwrap();
        ctx.config(Ownership::ACQUIRE_PERSISTER | Ownership::ACQUIRE_REPOSITORY)
            .unwrap();
        ctx.seal().unwrap();
        ctx
    }

    #[test]
    fn test_state_transitions() {
        let mut ctx = Context::new();
        assert_eq!(ctx.state(), State::Unconfigured);

        ctx.register_repository(Box::new(ArrayRepository::new()))
            .unwrap();
        assert_eq!(ctx.state(), State::Registering);

        ctx.register_persister(Box::new(MemoryPersister::default()))
            .unwrap();
        ctx.register_cryptor(Box::new(AesGcmCryptor::new())).unwrap();
        ctx.seal().unwrap();
        assert_eq!(ctx.state(), State::Sealed(KeyState::Locked));

        ctx.unlock(SecretKey::generate());
        assert_eq!(ctx.state(), State::Sealed(KeyState::Unlocked));

        ctx.lock();
        assert_eq!(ctx.state(), State::Sealed(KeyState::Locked));
    }

    #[test]
    fn test_config_alone_starts_registering() {
        let mut ctx = Context::new();
        ctx.config(Ownership::ACQUIRE_CRYPTOR).unwrap();
        assert_eq!(ctx.state(), State::Registering);
    }

    #[test]
    fn test_register_after_seal_fails() {
        let mut ctx = sealed_context();

        for _ in 0..2 {
            let err = ctx
                .register_persister(Box::new(MemoryPersister::default()))
                .unwrap_err();
            assert!(matches!(err, Error::AlreadySealed));
        }
        assert!(matches!(
            ctx.register_repository(Box::new(ArrayRepository::new())),
            Err(Error::AlreadySealed)
        ));
        assert!(matches!(
            ctx.register_cryptor(Box::new(AesGcmCryptor::new())),
            Err(Error::AlreadySealed)
        ));
        assert!(matches!(
            ctx.config(Ownership::NONE),
            Err(Error::AlreadySealed)
        ));
        assert!(matches!(ctx.seal(), Err(Error::AlreadySealed)));
    }

    #[test]
    fn test_seal_requires_every_collaborator() {
        let mut ctx = Context::new();
        assert!(matches!(ctx.seal(), Err(Error::Unregistered("persister"))));

        ctx.register_persister(Box::new(MemoryPersister::default()))
            .unwrap();
        assert!(matches!(ctx.seal(), Err(Error::Unregistered("repository"))));

        ctx.register_repository(Box::new(ArrayRepository::new()))
            .unwrap();
        assert!(matches!(ctx.seal(), Err(Error::Unregistered("cryptor"))));

        ctx.register_cryptor(Box::new(AesGcmCryptor::new())).unwrap();
        assert!(ctx.seal().is_ok());
    }

    #[test]
    fn test_load_and_persist_require_seal() {
        let mut ctx = Context::new();
        assert!(matches!(ctx.load(), Err(Error::NotSealed)));
        assert!(matches!(ctx.persist(), Err(Error::NotSealed)));
        assert!(matches!(ctx.count(), Err(Error::NotSealed)));
    }

    #[test]
    fn test_load_missing_then_persist() {
        let mut ctx = sealed_context();

        let err = ctx.load().unwrap_err();
        assert!(matches!(err, Error::LoadMissing(_)));

        ctx.persist().unwrap();
        assert_eq!(ctx.load().unwrap(), 0);
    }

    #[test]
    fn test_store_requires_key() {
        let mut ctx = sealed_context();

        let err = ctx.store("mail", "", b"hunter2").unwrap_err();
        assert!(matches!(err, Error::Locked));
        assert!(matches!(ctx.reveal("mail"), Err(Error::Locked)));
        assert_eq!(ctx.count().unwrap(), 0);
    }

    #[test]
    fn test_store_and_reveal() {
        let mut ctx = sealed_context();
        ctx.unlock(SecretKey::generate());

        ctx.store("mail", "work inbox", b"hunter2").unwrap();

        assert_eq!(ctx.count().unwrap(), 1);
        assert_eq!(ctx.reveal("mail").unwrap().expose_secret(), "hunter2");
        let stored = ctx.repository().unwrap().get("mail").unwrap();
        assert_eq!(stored.description(), "work inbox");
        assert_ne!(stored.value(), b"hunter2");
    }

    #[test]
    fn test_store_rejects_duplicate_and_empty_names() {
        let mut ctx = sealed_context();
        ctx.unlock(SecretKey::generate());
        ctx.store("mail", "", b"a").unwrap();

        assert!(matches!(
            ctx.store("mail", "", b"b"),
            Err(Error::DuplicateName(_))
        ));
        assert!(matches!(ctx.store("", "", b"b"), Err(Error::InvalidName)));
        assert_eq!(ctx.reveal("mail").unwrap().expose_secret(), "a");
    }

    #[test]
    fn test_reveal_with_wrong_key_fails() {
        let mut ctx = sealed_context();
        ctx.unlock(SecretKey::generate());
        ctx.store("mail", "", b"hunter2").unwrap();

        ctx.unlock(SecretKey::generate());
        assert!(matches!(
            ctx.reveal("mail"),
            Err(Error::DecryptionFailed(_))
        ));
    }

    #[test]
    fn test_remove_and_update_description() {
        let mut ctx = sealed_context();
        ctx.unlock(SecretKey::generate());
        ctx.store("a", "first", b"1").unwrap();
        ctx.store("b", "second", b"2").unwrap();

        ctx.update_description("a", "renamed").unwrap();
        assert_eq!(
            ctx.repository().unwrap().get("a").unwrap().description(),
            "renamed"
        );

        ctx.remove("b").unwrap();
        assert!(matches!(ctx.remove("b"), Err(Error::NotFound(_))));
        assert_eq!(ctx.count().unwrap(), 1);
    }

    #[test]
    fn test_each_credential_visits_sorted_names() {
        let mut ctx = sealed_context();
        ctx.unlock(SecretKey::generate());
        for name in ["passC", "passA", "passB"] {
            ctx.store(name, "", b"x").unwrap();
        }
        ctx.sort().unwrap();

        let mut names = Vec::new();
        ctx.each_credential(|c| {
            names.push(c.name().to_string());
            Ok(())
        })
        .unwrap();
        assert_eq!(names, vec!["passA", "passB", "passC"]);
    }

    #[test]
    fn test_each_credential_stops_at_first_error() {
        let mut ctx = sealed_context();
        ctx.unlock(SecretKey::generate());
        for name in ["a", "b", "c"] {
            ctx.store(name, "", b"x").unwrap();
        }

        let mut visited = 0;
        let result = ctx.each_credential(|c| {
            visited += 1;
            if c.name() == "b" {
                return Err(Error::NotFound(c.name().to_string()));
            }
            Ok(())
        });

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert_eq!(visited, 2);
    }

    #[test]
    fn test_persist_then_load_into_fresh_context() {
        let key = SecretKey::generate();
        let mut ctx = Context::new();
        ctx.register_persister(Box::new(MemoryPersister::default()))
            .unwrap();
        ctx.register_repository(Box::new(ArrayRepository::new()))
            .unwrap();
        ctx.register_cryptor(Box::new(AesGcmCryptor::new())).unwrap();
        ctx.seal().unwrap();
        ctx.unlock(key.clone());
        ctx.store("mail", "inbox", b"hunter2").unwrap();
        ctx.persist().unwrap();

        // Caller-owned persister comes back with the encoded store.
        let detached = ctx.close();
        let persister = detached.persister.unwrap();

        let mut fresh = Context::new();
        fresh.register_persister(persister).unwrap();
        fresh
            .register_repository(Box::new(ArrayRepository::new()))
            .unwrap();
        fresh
            .register_cryptor(Box::new(AesGcmCryptor::new()))
            .unwrap();
        fresh.seal().unwrap();
        fresh.unlock(key);

        assert_eq!(fresh.load().unwrap(), 1);
        assert_eq!(fresh.reveal("mail").unwrap().expose_secret(), "hunter2");
    }

    #[test]
    fn test_close_destroys_acquired_only() {
        let (persister, destroyed) = tracked();
        let mut ctx = Context::new();
        ctx.register_persister(persister).unwrap();
        ctx.register_repository(Box::new(ArrayRepository::new()))
            .unwrap();
        ctx.register_cryptor(Box::new(AesGcmCryptor::new())).unwrap();
        ctx.config(Ownership::ACQUIRE_PERSISTER).unwrap();
        ctx.seal().unwrap();

        let detached = ctx.close();
        assert!(destroyed.load(Ordering::SeqCst));
        assert!(detached.persister.is_none());
        assert!(detached.repository.is_some());
        assert!(detached.cryptor.is_some());
    }

    #[test]
    fn test_close_hands_back_caller_owned() {
        let (persister, destroyed) = tracked();
        let mut ctx = Context::new();
        ctx.register_persister(persister).unwrap();
        ctx.config(Ownership::ACQUIRE_REPOSITORY | Ownership::ACQUIRE_CRYPTOR)
            .unwrap();

        let detached = ctx.close();
        assert!(!destroyed.load(Ordering::SeqCst));
        assert!(detached.persister.is_some());
    }

    #[test]
    fn test_drop_destroys_acquired() {
        let (persister, destroyed) = tracked();
        {
            let mut ctx = Context::new();
            ctx.register_persister(persister).unwrap();
            ctx.config(Ownership::ACQUIRE_PERSISTER).unwrap();
        }
        assert!(destroyed.load(Ordering::SeqCst));
    }

    #[test]
    fn test_ownership_bits() {
        let both = Ownership::ACQUIRE_PERSISTER | Ownership::ACQUIRE_REPOSITORY;
        assert!(both.contains(Ownership::ACQUIRE_PERSISTER));
        assert!(both.contains(Ownership::ACQUIRE_REPOSITORY));
        assert!(!both.contains(Ownership::ACQUIRE_CRYPTOR));
        assert_eq!(both.bits(), 0b011);

        let from_config = Ownership::from(&OwnershipConfig::default());
        assert_eq!(from_config, both);
    }

    #[test]
    fn test_codec_options_reach_persister() {
        let mut ctx = Context::new();
        ctx.register_persister(Box::new(MemoryPersister::with_bytes(
            Codec::default(),
            vec![0x90],
        )))
        .unwrap();
        ctx.register_repository(Box::new(ArrayRepository::new()))
            .unwrap();
        ctx.register_cryptor(Box::new(AesGcmCryptor::new())).unwrap();
        ctx.seal().unwrap();

        assert_eq!(ctx.load().unwrap(), 0);
    }
}
