//! User-chosen reference strings (REFN values) mapped to record keys.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use thiserror::Error;

use crate::index::OtherHasher;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RefnError {
    #[error("REFN value is empty")]
    Empty,
    #[error("REFN value {refn} is already defined by {key}")]
    Taken { refn: String, key: String },
}

#[derive(Debug, Default)]
pub struct RefnIndex {
    refns: HashMap<String, String, OtherHasher>,
}

impl RefnIndex {
    pub fn new() -> Self {
        Self::default()
    }
    /// Maps `refn` to `key`. Re-inserting the same pair is a no-op; a refn
    /// already held by a different key is rejected and left untouched.
    pub fn insert(&mut self, refn: &str, key: &str) -> Result<(), RefnError> {
        let refn = refn.trim();
        if refn.is_empty() {
            return Err(RefnError::Empty);
        }
        match self.refns.entry(refn.to_string()) {
            Entry::Occupied(existing) if existing.get() == key => Ok(()),
            Entry::Occupied(existing) => Err(RefnError::Taken {
                refn: refn.to_string(),
                key: existing.get().clone(),
            }),
            Entry::Vacant(slot) => {
                slot.insert(key.to_string());
                Ok(())
            }
        }
    }
    /// Removes `refn` only when it belongs to `key`.
    pub fn remove(&mut self, refn: &str, key: &str) -> bool {
        let refn = refn.trim();
        if self.refns.get(refn).map(String::as_str) == Some(key) {
            self.refns.remove(refn);
            true
        } else {
            false
        }
    }
    pub fn lookup(&self, refn: &str) -> Option<&str> {
        self.refns.get(refn.trim()).map(String::as_str)
    }
    /// True when `refn` is free or already belongs to `key`.
    pub fn is_available(&self, refn: &str, key: Option<&str>) -> bool {
        match self.lookup(refn) {
            None => true,
            Some(owner) => Some(owner) == key,
        }
    }
    pub fn len(&self) -> usize {
        self.refns.len()
    }
    pub fn is_empty(&self) -> bool {
        self.refns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_refn_is_rejected_not_overwritten() {
        let mut index = RefnIndex::new();
        index.insert("smith-1", "I1").expect("insert");
        index.insert("smith-1", "I1").expect("same owner again");
        let err = index.insert("smith-1", "I2").unwrap_err();
        assert_eq!(err, RefnError::Taken { refn: "smith-1".into(), key: "I1".into() });
        assert_eq!(index.lookup("smith-1"), Some("I1"));
        assert!(!index.remove("smith-1", "I2"));
        assert!(index.remove("smith-1", "I1"));
        assert!(index.is_empty());
    }
}
