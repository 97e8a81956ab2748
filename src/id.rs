//! Monotonic, consecutive process id allocation.
//!
//! One allocator is shared by an entire process group (see `crate::middleware::Group`).
//! Ids start at 0 and are handed out in allocation order; nothing is ever reused within
//! a `reset`-free session.

use std::sync::Mutex;

use crate::message::ProcessId;

#[derive(Default)]
struct Inner {
    next: ProcessId,
    assigned: Vec<ProcessId>,
}

pub struct IdAllocator {
    inner: Mutex<Inner>,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
        }
    }

    /// Hands out the next consecutive id, starting from 0.
    pub fn next_id(&self) -> ProcessId {
        let mut inner = self.inner.lock().unwrap();
        let id = inner.next;
        inner.next += 1;
        inner.assigned.push(id);
        id
    }

    pub fn assigned_count(&self) -> usize {
        self.inner.lock().unwrap().assigned.len()
    }

    /// Resets the counter to 0 and forgets every assignment. Only meant to be
    /// called between test scenarios, never while processes from a previous
    /// allocation are still live.
    pub fn reset(&self) {
        let mut inner = self.inner.lock().unwrap();
        inner.next = 0;
        inner.assigned.clear();
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}
