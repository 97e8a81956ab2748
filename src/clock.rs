//! Lamport scalar logical clock.
//!
//! Two update rules: a local event always advances the clock, and consuming a
//! received message advances it past whatever the sender observed. The clock
//! is deliberately a bare counter (unlike `LamportClock = (u32, u8)` in the
//! teacher's `lamport_mutex` module) because critical-section entry order here
//! is arbitrated by the token ring, not by comparing clock values.

use std::sync::{Arc, Mutex};

#[derive(Clone)]
pub struct LamportClock {
    value: Arc<Mutex<u64>>,
}

impl LamportClock {
    pub fn new() -> Self {
        Self {
            value: Arc::new(Mutex::new(0)),
        }
    }

    pub fn value(&self) -> u64 {
        *self.value.lock().unwrap()
    }

    /// Advances the clock for a local event (e.g. about to publish a message)
    /// and returns the new value.
    pub fn inc_local(&self) -> u64 {
        let mut v = self.value.lock().unwrap();
        *v += 1;
        *v
    }

    /// Advances the clock on consuming a message stamped `remote`, per
    /// Lamport's receive rule: `c' = max(c, remote) + 1`.
    pub fn update_on_receive(&self, remote: u64) -> u64 {
        let mut v = self.value.lock().unwrap();
        *v = (*v).max(remote) + 1;
        *v
    }
}

impl Default for LamportClock {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn local_increments_are_strictly_monotonic() {
        let clock = LamportClock::new();
        let a = clock.inc_local();
        let b = clock.inc_local();
        assert!(b > a);
    }

    #[test]
    fn receive_rule_jumps_past_remote() {
        let clock = LamportClock::new();
        clock.inc_local(); // value = 1
        let updated = clock.update_on_receive(10);
        assert_eq!(updated, 11);
        assert!(updated > 10);
    }

    #[test]
    fn receive_rule_keeps_local_lead() {
        let clock = LamportClock::new();
        for _ in 0..5 {
            clock.inc_local();
        }
        let updated = clock.update_on_receive(2);
        assert_eq!(updated, 6);
    }
}
