//! Encrypted credential storage for Lockbox.
//!
//! A [`Context`] binds one [`Repository`] (the in-memory, name-keyed set of
//! credentials), one [`Persister`] (durable MessagePack artifact) and one
//! [`Cryptor`] under a single session key.

pub mod context;
pub mod credential;
pub mod crypto;
pub mod error;
pub mod persister;
pub mod repository;
pub mod serialize;

pub use context::{Context, Detached, KeyState, Ownership, State};
pub use credential::{Credential, CredentialFactory, MAX_VALUE_LEN};
pub use crypto::{AesGcmCryptor, Cryptor};
pub use error::{Error, Field, Result};
pub use persister::{FilePersister, MemoryPersister, Persister};
pub use repository::{ArrayRepository, Cursor, Repository};
pub use serialize::{Codec, CodecOptions};
