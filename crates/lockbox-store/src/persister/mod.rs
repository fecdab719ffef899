//! Durable storage for repositories.
//!
//! A [`Persister`] moves a whole repository to and from some backing
//! artifact using a [`Codec`](crate::Codec). [`FilePersister`] writes a file
//! atomically; [`MemoryPersister`] keeps the encoded bytes in memory.

mod file;
mod memory;

pub use file::FilePersister;
pub use memory::MemoryPersister;

use crate::credential::CredentialFactory;
use crate::error::Result;
use crate::repository::Repository;

/// Loads and saves the contents of a repository.
pub trait Persister: Send {
    /// Decode the persisted artifact into `repository`, creating records with
    /// `factory`. Returns the number of records added.
    ///
    /// Fails with [`Error::LoadMissing`](crate::Error::LoadMissing) when
    /// nothing has been persisted yet and
    /// [`Error::LoadCorrupt`](crate::Error::LoadCorrupt) when the artifact
    /// cannot be decoded at all.
    fn load(&mut self, repository: &mut dyn Repository, factory: &CredentialFactory)
        -> Result<usize>;

    /// Replace the persisted artifact with a snapshot of `repository`.
    fn persist(&mut self, repository: &dyn Repository) -> Result<()>;

    /// Release whatever the persister holds. Called when a context that
    /// acquired the persister is closed.
    fn destroy(&mut self) {}
}
