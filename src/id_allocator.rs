//! Stream id allocation.

use std::collections::HashSet;

use crate::error::{Result, StreamuxError};

/// Hands out stream ids in `[0, capacity)` and takes them back.
///
/// Ids are issued round-robin from a cursor, so a freshly released id is the
/// last one to be reissued. This keeps late frames for a finished stream from
/// landing on a brand new one for as long as possible.
#[derive(Debug, Clone)]
pub struct IdAllocator {
    capacity: u32,
    next: u32,
    in_use: HashSet<u32>,
}

impl IdAllocator {
    pub fn new(capacity: u32) -> Self {
        Self {
            capacity,
            next: 0,
            in_use: HashSet::new(),
        }
    }

    /// Number of ids this allocator manages.
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Number of ids currently handed out.
    pub fn in_use(&self) -> usize {
        self.in_use.len()
    }

    pub fn is_allocated(&self, id: u32) -> bool {
        self.in_use.contains(&id)
    }

    /// Reserve a free id, or `CapacityExhausted` if every id is taken.
    pub fn allocate(&mut self) -> Result<u32> {
        if self.in_use.len() as u64 >= self.capacity as u64 {
            return Err(StreamuxError::CapacityExhausted);
        }
        loop {
            let candidate = self.next;
            self.next = if candidate + 1 >= self.capacity { 0 } else { candidate + 1 };
            if self.in_use.insert(candidate) {
                return Ok(candidate);
            }
        }
    }

    /// Return an id. Returns false if it was not allocated.
    pub fn release(&mut self, id: u32) -> bool {
        self.in_use.remove(&id)
    }

    /// Release everything and rewind the cursor.
    pub fn clear(&mut self) {
        self.in_use.clear();
        self.next = 0;
    }
}
