//! Token-ring mutual exclusion.
//!
//! A single token circulates around a logical ring of `n` processes,
//! `successor = (self + 1) mod n`. Whoever holds it may enter the critical
//! section; everyone else waits for it to come back around.
//!
//! The token arrives through the ordinary mailbox like any other message (see
//! `crate::distributor`), but forwarding it is handled from exactly one place:
//! the pump thread in `crate::middleware::Middleware` that selectively drains
//! `Token` messages out of the mailbox. Letting the bus-delivery path also
//! decide whether to forward would open a window where both paths try to move
//! the same token at once.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use tracing::debug;

use crate::bus::Bus;
use crate::clock::LamportClock;
use crate::message::{Message, ProcessId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CsState {
    Idle,
    HasToken,
    InCs,
}

struct Inner {
    state: CsState,
    wants: bool,
}

pub struct TokenRing {
    id: ProcessId,
    n: u32,
    bus: Arc<dyn Bus>,
    clock: LamportClock,
    alive: Arc<AtomicBool>,
    forward_delay: Duration,
    inner: Mutex<Inner>,
    cond: Condvar,
}

impl TokenRing {
    pub fn new(
        id: ProcessId,
        n: u32,
        bus: Arc<dyn Bus>,
        clock: LamportClock,
        alive: Arc<AtomicBool>,
        forward_delay: Duration,
    ) -> Self {
        let state = if id == 0 { CsState::HasToken } else { CsState::Idle };
        Self {
            id,
            n,
            bus,
            clock,
            alive,
            forward_delay,
            inner: Mutex::new(Inner { state, wants: false }),
            cond: Condvar::new(),
        }
    }

    pub fn state(&self) -> CsState {
        self.inner.lock().unwrap().state
    }

    /// Blocks until the token is held and transitions into the critical
    /// section. Returns `false` (instead of blocking forever) if the process
    /// is stopped (`alive` cleared) while waiting.
    pub fn request_sc(&self) -> bool {
        let mut guard = self.inner.lock().unwrap();
        guard.wants = true;
        loop {
            if guard.state == CsState::HasToken {
                guard.state = CsState::InCs;
                debug!(id = self.id, "entering critical section");
                return true;
            }
            if !self.alive.load(Ordering::SeqCst) {
                guard.wants = false;
                return false;
            }
            let (g, _) = self
                .cond
                .wait_timeout(guard, Duration::from_millis(200))
                .unwrap();
            guard = g;
        }
    }

    /// No-op unless currently in the critical section — a double release is
    /// silently ignored rather than treated as an error.
    pub fn release_sc(&self) {
        let mut guard = self.inner.lock().unwrap();
        if guard.state != CsState::InCs {
            return;
        }
        guard.state = CsState::Idle;
        guard.wants = false;
        drop(guard);
        debug!(id = self.id, "leaving critical section, forwarding token");
        self.forward_token();
    }

    fn forward_token(&self) {
        let successor = (self.id + 1) % self.n;
        let ts = self.clock.inc_local();
        self.bus.publish(Message::Token {
            timestamp: ts,
            from: self.id,
            to: successor,
        });
    }

    /// Called from the mailbox-consumer pump thread when a `Token` addressed
    /// to this process is dequeued. Updates the clock, marks the token held,
    /// wakes anyone blocked in `request_sc`, then — if nobody wants the
    /// section — waits the configured delay and forwards on alone.
    pub fn on_token_received(&self, timestamp: u64) {
        self.clock.update_on_receive(timestamp);
        {
            let mut guard = self.inner.lock().unwrap();
            guard.state = CsState::HasToken;
            self.cond.notify_all();
        }
        thread::sleep(self.forward_delay);
        let mut guard = self.inner.lock().unwrap();
        if guard.state == CsState::HasToken && !guard.wants {
            guard.state = CsState::Idle;
            drop(guard);
            debug!(id = self.id, "token unwanted, forwarding");
            self.forward_token();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ThreadBus;

    fn ring(id: ProcessId, n: u32) -> TokenRing {
        TokenRing::new(
            id,
            n,
            Arc::new(ThreadBus::new()),
            LamportClock::new(),
            Arc::new(AtomicBool::new(true)),
            Duration::from_millis(5),
        )
    }

    #[test]
    fn process_zero_starts_with_token() {
        assert_eq!(ring(0, 3).state(), CsState::HasToken);
        assert_eq!(ring(1, 3).state(), CsState::Idle);
    }

    #[test]
    fn request_sc_grants_when_token_already_held() {
        let r = ring(0, 3);
        assert!(r.request_sc());
        assert_eq!(r.state(), CsState::InCs);
    }

    #[test]
    fn double_release_is_a_silent_no_op() {
        let r = ring(0, 3);
        r.request_sc();
        r.release_sc();
        assert_eq!(r.state(), CsState::Idle);
        r.release_sc();
        assert_eq!(r.state(), CsState::Idle);
    }

    #[test]
    fn request_sc_aborts_when_process_stops() {
        let alive = Arc::new(AtomicBool::new(true));
        let r = TokenRing::new(
            1,
            3,
            Arc::new(ThreadBus::new()),
            LamportClock::new(),
            alive.clone(),
            Duration::from_millis(5),
        );
        let r = Arc::new(r);
        let r2 = r.clone();
        let handle = thread::spawn(move || r2.request_sc());
        thread::sleep(Duration::from_millis(50));
        alive.store(false, Ordering::SeqCst);
        assert!(!handle.join().unwrap());
    }

    #[test]
    fn unwanted_token_is_forwarded_after_delay() {
        let r = ring(1, 3); // starts Idle, not 0
        r.on_token_received(5);
        // not requested, should have forwarded and returned to Idle
        assert_eq!(r.state(), CsState::Idle);
    }

    #[test]
    fn wanted_token_is_kept_for_request_sc() {
        let alive = Arc::new(AtomicBool::new(true));
        let r = Arc::new(TokenRing::new(
            1,
            3,
            Arc::new(ThreadBus::new()),
            LamportClock::new(),
            alive,
            Duration::from_millis(50),
        ));
        let r2 = r.clone();
        let handle = thread::spawn(move || r2.request_sc());
        thread::sleep(Duration::from_millis(5));
        r.on_token_received(5);
        assert!(handle.join().unwrap());
        assert_eq!(r.state(), CsState::InCs);
    }
}
