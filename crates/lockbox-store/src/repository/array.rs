use tracing::trace;

use super::{Cursor, Repository};
use crate::credential::Credential;
use crate::error::{Error, Result};

/// Capacity allocated up front.
const INITIAL_CAPACITY: usize = 25;

/// Slots added each time the array runs out of room.
const GROWTH_INCREMENT: usize = 25;

/// A repository backed by a contiguous array.
///
/// Lookups are linear scans by name. Removal swaps the last record into the
/// vacated slot, so at most one record moves.
#[derive(Debug)]
pub struct ArrayRepository {
    records: Vec<Credential>,
}

impl ArrayRepository {
    pub fn new() -> Self {
        Self {
            records: Vec::with_capacity(INITIAL_CAPACITY),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.records.iter().position(|c| c.name() == name)
    }

    /// Keep at least one free slot past the live records.
    fn grow_if_full(&mut self) -> Result<()> {
        if self.records.capacity() <= self.records.len() + 1 {
            self.records.try_reserve_exact(GROWTH_INCREMENT)?;
            trace!(capacity = self.records.capacity(), "grew credential array");
        }
        Ok(())
    }
}

impl Default for ArrayRepository {
    fn default() -> Self {
        Self::new()
    }
}

impl Repository for ArrayRepository {
    fn add(&mut self, credential: Credential) -> Result<()> {
        if credential.name().is_empty() {
            return Err(Error::InvalidName);
        }
        if self.position(credential.name()).is_some() {
            return Err(Error::DuplicateName(credential.name().to_string()));
        }

        self.grow_if_full()?;
        self.records.push(credential);
        Ok(())
    }

    fn get(&self, name: &str) -> Result<&Credential> {
        self.position(name)
            .map(|index| &self.records[index])
            .ok_or_else(|| Error::NotFound(name.to_string()))
    }

    fn update(
        &mut self,
        name: &str,
        f: &mut dyn FnMut(&mut Credential) -> Result<()>,
    ) -> Result<()> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;

        if let Err(err) = f(&mut self.records[index]) {
            self.records[index].set_name(name);
            return Err(err);
        }

        let renamed = self.records[index].name().to_string();
        if renamed == name {
            return Ok(());
        }
        let conflict = if renamed.is_empty() {
            Some(Error::InvalidName)
        } else if self
            .records
            .iter()
            .enumerate()
            .any(|(i, c)| i != index && c.name() == renamed)
        {
            Some(Error::DuplicateName(renamed))
        } else {
            None
        };

        match conflict {
            Some(err) => {
                self.records[index].set_name(name);
                Err(err)
            }
            None => Ok(()),
        }
    }

    fn remove(&mut self, name: &str) -> Result<Credential> {
        let index = self
            .position(name)
            .ok_or_else(|| Error::NotFound(name.to_string()))?;
        Ok(self.records.swap_remove(index))
    }

    fn count(&self) -> usize {
        self.records.len()
    }

    fn sort(&mut self) {
        if self.records.len() < 2 {
            return;
        }
        self.records
            .sort_unstable_by(|a, b| a.name().as_bytes().cmp(b.name().as_bytes()));
    }

    fn iter(&self) -> Cursor<'_> {
        Cursor::new(&self.records)
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        // Keep the one-slot headroom `add` maintains.
        let wanted = self.records.len() + additional + 1;
        if wanted > self.records.capacity() {
            let short = wanted - self.records.len();
            self.records
                .try_reserve_exact(short.div_ceil(GROWTH_INCREMENT) * GROWTH_INCREMENT)?;
        }
        Ok(())
    }

    fn destroy(&mut self) {
        self.records = Vec::new();
    }
}
