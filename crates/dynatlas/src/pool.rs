//! Freelist pooling for high-churn bookkeeping records.
//!
//! Pack and evict traffic during list scrolling recycles allocation and
//! request records every frame; pooling keeps their buffers warm instead of
//! round-tripping the allocator.

use std::fmt;

use crate::atlas::{AllocationRecord, PendingRequest};

/// Clears an object back to its blank state before it re-enters the pool.
pub trait Recycle {
    fn recycle(&mut self);
}

/// A freelist of reusable objects with unique-ownership handout.
pub struct Pool<T> {
    free: Vec<T>,
    hits: u64,
    misses: u64,
}

impl<T: Default + Recycle> Pool<T> {
    pub fn new() -> Self {
        Self { free: Vec::new(), hits: 0, misses: 0 }
    }

    /// Take an object out of the pool, constructing one if it is empty.
    pub fn acquire(&mut self) -> T {
        match self.free.pop() {
            Some(item) => {
                self.hits += 1;
                item
            }
            None => {
                self.misses += 1;
                T::default()
            }
        }
    }

    /// Return an object to the pool after wiping it.
    pub fn release(&mut self, mut item: T) {
        item.recycle();
        self.free.push(item);
    }

    pub fn clear(&mut self) {
        self.free.clear();
    }

    pub fn pooled(&self) -> usize {
        self.free.len()
    }

    pub fn hits(&self) -> u64 {
        self.hits
    }

    pub fn misses(&self) -> u64 {
        self.misses
    }
}

impl<T: Default + Recycle> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for Pool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pool")
            .field("pooled", &self.free.len())
            .field("hits", &self.hits)
            .field("misses", &self.misses)
            .finish()
    }
}

/// The record pools owned by the manager and threaded through atlas calls.
#[derive(Debug, Default)]
pub struct RecordPools {
    pub records: Pool<AllocationRecord>,
    pub requests: Pool<PendingRequest>,
}

impl RecordPools {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn clear(&mut self) {
        self.records.clear();
        self.requests.clear();
    }
}
