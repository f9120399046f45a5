//! Identifier registry for decision variables and constraints.
//!
//! Every variable and constraint in a build draws its id from one increasing
//! counter owned by an [`IdRegistry`]. The registry is passed by `&mut` into
//! each builder; it is the only shared mutable state of the build phase and
//! is never a process-wide singleton. No id is reused within a build.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Identifier of a decision variable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct VariableId(pub u64);

impl VariableId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for VariableId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}

/// Identifier of a constraint row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ConstraintId(pub u64);

impl ConstraintId {
    pub fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for ConstraintId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// A contiguous block of freshly issued ids.
#[derive(Debug, Clone, Copy)]
pub struct IdBlock {
    start: u64,
    len: u64,
}

impl IdBlock {
    /// The nth id of the block. Panics if out of range, which indicates a
    /// builder bug rather than bad input.
    pub fn nth(&self, n: usize) -> u64 {
        assert!((n as u64) < self.len, "id block overrun");
        self.start + n as u64
    }

    pub fn len(&self) -> usize {
        self.len as usize
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Iterate the raw ids of the block in order.
    pub fn iter(&self) -> impl Iterator<Item = u64> {
        self.start..self.start + self.len
    }
}

/// Issues unique increasing integer ids and maps business keys back to them.
#[derive(Debug, Default)]
pub struct IdRegistry {
    next: u64,
    keys: HashMap<String, u64>,
}

impl IdRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserve a contiguous block of `n` fresh ids and advance the counter.
    pub fn reserve(&mut self, n: usize) -> IdBlock {
        let block = IdBlock {
            start: self.next,
            len: n as u64,
        };
        self.next += n as u64;
        block
    }

    /// Reserve a single fresh id.
    pub fn next_id(&mut self) -> u64 {
        self.reserve(1).nth(0)
    }

    /// Record a reverse lookup from a business key to an id.
    ///
    /// Binding the same key twice is a builder bug and panics; business keys
    /// are unique within a build by construction.
    pub fn bind(&mut self, key: impl Into<String>, id: u64) {
        let key = key.into();
        let prev = self.keys.insert(key.clone(), id);
        assert!(prev.is_none(), "duplicate id binding for key '{key}'");
    }

    /// Look up the id previously bound to `key`.
    pub fn lookup(&self, key: &str) -> Option<u64> {
        self.keys.get(key).copied()
    }

    /// Number of ids issued so far.
    pub fn issued(&self) -> u64 {
        self.next
    }
}
