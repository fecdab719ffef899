use crate::credential::Credential;

/// Bidirectional cursor over a repository's records.
///
/// The cursor holds a shared borrow of the repository, so the repository
/// cannot be mutated while it is alive. Positions are indices checked against
/// the live length captured at creation.
#[derive(Debug, Clone)]
pub struct Cursor<'a> {
    records: &'a [Credential],
    front: usize,
    back: usize,
}

impl<'a> Cursor<'a> {
    pub fn new(records: &'a [Credential]) -> Self {
        Self {
            records,
            front: 0,
            back: records.len(),
        }
    }

    /// Index of the next record [`Iterator::next`] would yield.
    pub fn position(&self) -> usize {
        self.front
    }

    /// The next record without advancing.
    pub fn peek(&self) -> Option<&'a Credential> {
        if self.front < self.back {
            self.records.get(self.front)
        } else {
            None
        }
    }

    /// Step the front of the cursor back by one and return that record.
    pub fn prev(&mut self) -> Option<&'a Credential> {
        if self.front == 0 {
            return None;
        }
        self.front -= 1;
        self.records.get(self.front)
    }

    /// Names in cursor order.
    pub fn names(self) -> impl Iterator<Item = &'a str> {
        self.map(Credential::name)
    }
}

impl<'a> Iterator for Cursor<'a> {
    type Item = &'a Credential;

    fn next(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        let record = self.records.get(self.front);
        self.front += 1;
        record
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.back.saturating_sub(self.front);
        (remaining, Some(remaining))
    }
}

impl<'a> DoubleEndedIterator for Cursor<'a> {
    fn next_back(&mut self) -> Option<Self::Item> {
        if self.front >= self.back {
            return None;
        }
        self.back -= 1;
        self.records.get(self.back)
    }
}

impl<'a> ExactSizeIterator for Cursor<'a> {}
