//! Credential repositories.
//!
//! Defines the [`Repository`] trait and provides [`ArrayRepository`], a
//! contiguous in-memory implementation. Storage order is an implementation
//! detail: removal may move records, and [`Repository::sort`] reorders them
//! by name.

mod array;
mod cursor;

pub use array::ArrayRepository;
pub use cursor::Cursor;

use crate::credential::Credential;
use crate::error::Result;

/// A name-keyed collection of credentials that owns every record it holds.
pub trait Repository: Send {
    /// Take ownership of `credential`.
    ///
    /// Fails with [`Error::InvalidName`](crate::Error::InvalidName) for an
    /// empty name and [`Error::DuplicateName`](crate::Error::DuplicateName)
    /// when the name is already stored.
    fn add(&mut self, credential: Credential) -> Result<()>;

    /// Borrow the credential stored under `name`.
    fn get(&self, name: &str) -> Result<&Credential>;

    /// Modify the credential stored under `name` in place.
    ///
    /// A rename performed by `f` is checked like [`Repository::add`]; if it
    /// would break name uniqueness the old name is restored and the error
    /// returned. The old name is also restored when `f` itself fails.
    fn update(
        &mut self,
        name: &str,
        f: &mut dyn FnMut(&mut Credential) -> Result<()>,
    ) -> Result<()>;

    /// Remove the credential stored under `name` and hand it back.
    fn remove(&mut self, name: &str) -> Result<Credential>;

    /// Number of stored credentials.
    fn count(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.count() == 0
    }

    fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Order records by byte-wise comparison of their names.
    fn sort(&mut self);

    /// Cursor over the stored records in storage order.
    fn iter(&self) -> Cursor<'_>;

    /// Make room for `additional` records so the next that many adds cannot
    /// fail on allocation.
    fn reserve(&mut self, additional: usize) -> Result<()>;

    /// Drop every record and release the storage.
    fn destroy(&mut self);
}
