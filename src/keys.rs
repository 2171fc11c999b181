//! Key allocation with recycling of deleted keys.
//!
//! Each record kind owns a [`DeleteSet`]: the next never-issued numeric
//! suffix (the high-water mark, starting at 1) plus a bitmap of suffixes
//! that were released and may be issued again. The smallest recycled suffix
//! is always issued first, so a released key is reissued before the
//! high-water mark moves past it.

use roaring::RoaringBitmap;
use thiserror::Error;
use tracing::debug;

use crate::record::{format_key, key_number, RecordKind};

/// Largest numeric suffix a key may carry.
pub const MAX_KEY_NUMBER: u32 = 9_999_999;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum KeyError {
    #[error("key {0} is not in use")]
    NotInUse(String),
    #[error("key {0} was already released")]
    AlreadyReleased(String),
    #[error("key {0} is beyond the largest key number {MAX_KEY_NUMBER}")]
    OutOfRange(String),
}

#[derive(Debug, Clone)]
pub struct DeleteSet {
    kind: RecordKind,
    next: u32,
    recycled: RoaringBitmap,
}

impl DeleteSet {
    pub fn new(kind: RecordKind) -> Self {
        Self { kind, next: 1, recycled: RoaringBitmap::new() }
    }
    pub fn kind(&self) -> RecordKind {
        self.kind
    }
    /// The next suffix that has never been issued.
    pub fn high_water(&self) -> u32 {
        self.next
    }
    /// Released suffixes in ascending order.
    pub fn recycled(&self) -> Vec<u32> {
        self.recycled.iter().collect()
    }
    pub fn is_in_use(&self, number: u32) -> bool {
        number >= 1 && number < self.next && !self.recycled.contains(number)
    }
    /// Number of suffixes currently in use.
    pub fn live_count(&self) -> usize {
        (self.next as usize - 1) - self.recycled.len() as usize
    }
    pub fn allocate(&mut self) -> u32 {
        if let Some(number) = self.recycled.min() {
            self.recycled.remove(number);
            return number;
        }
        let number = self.next;
        self.next += 1;
        number
    }
    pub fn release(&mut self, number: u32) -> Result<(), KeyError> {
        if number == 0 || number >= self.next {
            return Err(KeyError::NotInUse(format_key(self.kind, number)));
        }
        if self.recycled.contains(number) {
            return Err(KeyError::AlreadyReleased(format_key(self.kind, number)));
        }
        if number + 1 == self.next {
            self.next -= 1;
            // absorb recycled suffixes that now abut the high-water mark
            let run = self.recycled.iter().rev().zip((1..self.next).rev()).take_while(|(a, b)| a == b).count() as u32;
            self.recycled.remove_range(self.next - run..self.next);
            self.next -= run;
        } else {
            self.recycled.insert(number);
        }
        Ok(())
    }
    /// Marks an existing suffix as in use; used while loading stored records.
    /// Gaps opened below the new high-water mark become recyclable.
    pub fn retain(&mut self, number: u32) -> Result<(), KeyError> {
        if number == 0 || number > MAX_KEY_NUMBER {
            return Err(KeyError::OutOfRange(format_key(self.kind, number)));
        }
        if number >= self.next {
            self.recycled.insert_range(self.next..number);
            self.next = number + 1;
        } else {
            self.recycled.remove(number);
        }
        Ok(())
    }
}

/// One [`DeleteSet`] per record kind.
#[derive(Debug, Clone)]
pub struct KeyAllocator {
    sets: [DeleteSet; 5],
}

impl Default for KeyAllocator {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyAllocator {
    pub fn new() -> Self {
        Self { sets: RecordKind::ALL.map(DeleteSet::new) }
    }
    pub fn set(&self, kind: RecordKind) -> &DeleteSet {
        &self.sets[kind.index()]
    }
    pub fn allocate(&mut self, kind: RecordKind) -> String {
        let number = self.sets[kind.index()].allocate();
        let key = format_key(kind, number);
        debug!(%key, %kind, "allocated key");
        key
    }
    /// Returns a key to the pool of the kind its letter names. Keys outside
    /// the numbered key spaces were never issued here and are ignored.
    pub fn release(&mut self, key: &str) -> Result<(), KeyError> {
        let Some((kind, number)) = numbered(key) else {
            return Ok(());
        };
        self.sets[kind.index()].release(number)?;
        debug!(%key, %kind, "released key");
        Ok(())
    }
    /// Marks a loaded key as in use in the key space its letter names, so
    /// the allocator never issues it again while it lives.
    pub fn retain(&mut self, key: &str) -> Result<(), KeyError> {
        match numbered(key) {
            Some((kind, number)) => self.sets[kind.index()].retain(number),
            None => Ok(()),
        }
    }
    pub fn is_in_use(&self, key: &str) -> bool {
        numbered(key).is_some_and(|(kind, number)| self.sets[kind.index()].is_in_use(number))
    }
}

fn numbered(key: &str) -> Option<(RecordKind, u32)> {
    let (letter, number) = key_number(key)?;
    let kind = RecordKind::from_letter(letter)?;
    Some((kind, number))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    #[test]
    fn recycles_before_advancing() {
        let mut set = DeleteSet::new(RecordKind::Person);
        assert_eq!((set.allocate(), set.allocate(), set.allocate()), (1, 2, 3));
        set.release(2).expect("release");
        assert_eq!(set.allocate(), 2);
        assert_eq!(set.allocate(), 4);
    }

    #[test]
    fn abutting_release_compacts() {
        let mut set = DeleteSet::new(RecordKind::Family);
        for _ in 0..4 {
            set.allocate();
        }
        set.release(3).expect("release 3");
        set.release(4).expect("release 4");
        assert_eq!(set.high_water(), 3);
        assert!(set.recycled().is_empty());
        assert_eq!(set.allocate(), 3);
    }

    #[test]
    fn double_release_is_rejected() {
        let mut set = DeleteSet::new(RecordKind::Source);
        set.allocate();
        set.allocate();
        set.release(1).expect("first release");
        assert_eq!(set.release(1), Err(KeyError::AlreadyReleased("S1".into())));
        assert_eq!(set.release(9), Err(KeyError::NotInUse("S9".into())));
    }

    #[test]
    fn retain_opens_gaps() {
        let mut set = DeleteSet::new(RecordKind::Person);
        for number in [1, 2, 4, 6] {
            set.retain(number).expect("retain");
        }
        assert_eq!(set.recycled(), &[3, 5]);
        assert_eq!(set.live_count(), 4);
        assert_eq!(set.allocate(), 3);
    }

    // Every interleaving of allocate/release at the boundary over a few steps
    // must keep issued keys unique and reissue the smallest free key first.
    #[test]
    fn boundary_interleavings_match_a_model() {
        fn walk(set: DeleteSet, live: BTreeSet<u32>, depth: usize) {
            if depth == 0 {
                return;
            }
            // allocate
            {
                let mut next = set.clone();
                let mut model = live.clone();
                let issued = next.allocate();
                let expected = (1..).find(|n| !model.contains(n)).unwrap();
                assert_eq!(issued, expected);
                assert!(model.insert(issued));
                for n in 1..12 {
                    assert_eq!(next.is_in_use(n), model.contains(&n));
                }
                walk(next, model, depth - 1);
            }
            // release each live key
            for &victim in &live {
                let mut next = set.clone();
                let mut model = live.clone();
                next.release(victim).expect("release live key");
                model.remove(&victim);
                for n in 1..12 {
                    assert_eq!(next.is_in_use(n), model.contains(&n));
                }
                walk(next, model, depth - 1);
            }
        }
        walk(DeleteSet::new(RecordKind::Person), BTreeSet::new(), 6);
    }
}
