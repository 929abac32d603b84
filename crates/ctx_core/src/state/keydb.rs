//! Key/value store scoped to save/restore
//!
//! A write to a key first set in an outer save scope appends a new entry
//! that shadows the old one; lookups scan from the newest entry. A write to
//! a key already set in the current scope updates that entry in place, and
//! string values reuse their pool slot when the new value fits. A restore
//! truncates back to the lengths recorded at the matching save.

use std::hash::{Hash, Hasher};

use rustc_hash::FxHasher;

use crate::error::StateError;

/// Hash a key name
pub fn strhash(key: &str) -> u64 {
    let mut hasher = FxHasher::default();
    key.hash(&mut hasher);
    hasher.finish()
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Value {
    Float(f32),
    Str { offset: usize, len: usize, cap: usize },
}

#[derive(Clone, Debug, Default)]
pub struct KeyDb {
    entries: Vec<(u64, Value)>,
    pool: String,
    max_entries: usize,
    max_pool_bytes: usize,
    /// Mark of the innermost save; entries and pool bytes above it belong
    /// to the current scope
    scope: (usize, usize),
}

impl KeyDb {
    pub fn new(max_entries: usize, max_pool_bytes: usize) -> Self {
        Self {
            entries: Vec::new(),
            pool: String::new(),
            max_entries,
            max_pool_bytes,
            scope: (0, 0),
        }
    }

    /// Current (entries, pool bytes) lengths
    pub fn mark(&self) -> (usize, usize) {
        (self.entries.len(), self.pool.len())
    }

    pub fn truncate(&mut self, mark: (usize, usize)) {
        self.entries.truncate(mark.0);
        self.pool.truncate(mark.1);
    }

    /// Set the mark of the innermost save, below which nothing is
    /// overwritten
    pub fn set_scope(&mut self, mark: (usize, usize)) {
        self.scope = mark;
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.pool.clear();
        self.scope = (0, 0);
    }

    fn push(&mut self, key: u64, value: Value) -> Result<(), StateError> {
        if self.entries.len() >= self.max_entries {
            return Err(StateError::KeyDbFull);
        }
        self.entries.push((key, value));
        Ok(())
    }

    fn newest(&self, key: u64) -> Option<usize> {
        self.entries.iter().rposition(|(k, _)| *k == key)
    }

    fn lookup(&self, key: u64) -> Option<Value> {
        self.newest(key).map(|i| self.entries[i].1)
    }

    /// Newest entry for `key` if it was written in the current scope
    fn in_scope(&self, key: u64) -> Option<usize> {
        self.newest(key).filter(|&i| i >= self.scope.0)
    }

    pub fn set_float(&mut self, key: u64, value: f32) -> Result<(), StateError> {
        if self.lookup(key) == Some(Value::Float(value)) {
            return Ok(());
        }
        match self.in_scope(key) {
            Some(i) => {
                self.entries[i].1 = Value::Float(value);
                Ok(())
            }
            None => self.push(key, Value::Float(value)),
        }
    }

    pub fn get_float(&self, key: u64) -> Option<f32> {
        match self.lookup(key)? {
            Value::Float(v) => Some(v),
            Value::Str { .. } => None,
        }
    }

    pub fn set_string(&mut self, key: u64, value: &str) -> Result<(), StateError> {
        let slot = self.in_scope(key);
        if let Some(i) = slot {
            if let Value::Str { offset, cap, .. } = self.entries[i].1 {
                if offset >= self.scope.1 && value.len() <= cap {
                    let mut padded = String::with_capacity(cap);
                    padded.push_str(value);
                    padded.extend(std::iter::repeat(' ').take(cap - value.len()));
                    self.pool.replace_range(offset..offset + cap, &padded);
                    self.entries[i].1 = Value::Str {
                        offset,
                        len: value.len(),
                        cap,
                    };
                    return Ok(());
                }
                if offset >= self.scope.1 && offset + cap == self.pool.len() {
                    if offset + value.len() > self.max_pool_bytes {
                        return Err(StateError::StringPoolFull);
                    }
                    self.pool.truncate(offset);
                    self.pool.push_str(value);
                    self.entries[i].1 = Value::Str {
                        offset,
                        len: value.len(),
                        cap: value.len(),
                    };
                    return Ok(());
                }
            }
        }

        if self.pool.len() + value.len() > self.max_pool_bytes {
            return Err(StateError::StringPoolFull);
        }
        let entry = Value::Str {
            offset: self.pool.len(),
            len: value.len(),
            cap: value.len(),
        };
        match slot {
            Some(i) => self.entries[i].1 = entry,
            None => self.push(key, entry)?,
        }
        self.pool.push_str(value);
        Ok(())
    }

    pub fn get_string(&self, key: u64) -> Option<&str> {
        match self.lookup(key)? {
            Value::Str { offset, len, .. } => self.pool.get(offset..offset + len),
            Value::Float(_) => None,
        }
    }

    pub fn is_set(&self, key: u64) -> bool {
        self.lookup(key).is_some()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
