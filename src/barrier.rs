//! Counting rendezvous barrier, reusable across invocations.
//!
//! All `n` participants must call `synchronize` the same number of times in
//! lockstep; the barrier establishes a host-level happens-before between them
//! but says nothing about Lamport ordering on its own.

use std::sync::{Condvar, Mutex};

struct Inner {
    arrived: usize,
    epoch: u64,
}

pub struct Barrier {
    n: usize,
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl Barrier {
    pub fn new(n: usize) -> Self {
        Self {
            n,
            inner: Mutex::new(Inner { arrived: 0, epoch: 0 }),
            cond: Condvar::new(),
        }
    }

    pub fn participants(&self) -> usize {
        self.n
    }

    /// Blocks until all `n` participants have called `synchronize` for the
    /// current epoch, then releases everyone at once and advances the epoch.
    pub fn synchronize(&self) {
        let mut guard = self.inner.lock().unwrap();
        let epoch = guard.epoch;
        guard.arrived += 1;
        if guard.arrived == self.n {
            guard.arrived = 0;
            guard.epoch += 1;
            self.cond.notify_all();
        } else {
            while guard.epoch == epoch {
                guard = self.cond.wait(guard).unwrap();
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn releases_all_participants_together() {
        let barrier = Arc::new(Barrier::new(3));
        let after_count = Arc::new(AtomicUsize::new(0));
        let mut handles = vec![];
        for i in 0..3 {
            let barrier = barrier.clone();
            let after_count = after_count.clone();
            handles.push(thread::spawn(move || {
                thread::sleep(Duration::from_millis(i as u64 * 10));
                barrier.synchronize();
                after_count.fetch_add(1, Ordering::SeqCst);
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(after_count.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn is_reusable_across_epochs() {
        let barrier = Arc::new(Barrier::new(2));
        for _ in 0..3 {
            let b1 = barrier.clone();
            let h = thread::spawn(move || b1.synchronize());
            barrier.synchronize();
            h.join().unwrap();
        }
    }
}
