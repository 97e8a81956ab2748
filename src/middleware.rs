//! The façade application code actually talks to, and the `Group` that builds
//! a set of them sharing one bus, one distributor, one id allocator and one
//! barrier.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use tracing::debug;

use crate::barrier::Barrier;
use crate::bus::{Bus, ThreadBus};
use crate::clock::LamportClock;
use crate::config::Config;
use crate::distributor::Distributor;
use crate::id::IdAllocator;
use crate::mailbox::Mailbox;
use crate::message::{Message, ProcessId};
use crate::mutex::TokenRing;

/// Bootstraps a simulated process group: one bus, one distributor, one id
/// allocator, one barrier, shared by every `Middleware` it spawns.
pub struct Group {
    n: usize,
    bus: Arc<dyn Bus>,
    distributor: Arc<Distributor>,
    ids: Arc<IdAllocator>,
    barrier: Arc<Barrier>,
    config: Config,
}

impl Group {
    pub fn new(n: usize, config: Config) -> Self {
        let bus: Arc<dyn Bus> = Arc::new(ThreadBus::new());
        let distributor = Distributor::new(bus.clone());
        Self {
            n,
            bus,
            distributor,
            ids: Arc::new(IdAllocator::new()),
            barrier: Arc::new(Barrier::new(n)),
            config,
        }
    }

    pub fn spawn_process(&self) -> Middleware {
        let id = self.ids.next_id();
        Middleware::new(
            id,
            self.n as u32,
            self.bus.clone(),
            self.distributor.clone(),
            self.barrier.clone(),
            self.config.clone(),
        )
    }

    pub fn shutdown(&self) {
        self.distributor.shutdown();
    }
}

pub struct Middleware {
    id: ProcessId,
    name: String,
    n: u32,
    bus: Arc<dyn Bus>,
    distributor: Arc<Distributor>,
    mailbox: Arc<Mailbox>,
    clock: LamportClock,
    cs: Arc<TokenRing>,
    barrier: Arc<Barrier>,
    alive: Arc<AtomicBool>,
    config: Config,
    pump: Mutex<Option<JoinHandle<()>>>,
}

impl Middleware {
    fn new(
        id: ProcessId,
        n: u32,
        bus: Arc<dyn Bus>,
        distributor: Arc<Distributor>,
        barrier: Arc<Barrier>,
        config: Config,
    ) -> Self {
        let mailbox = Arc::new(Mailbox::new(id));
        distributor.register(id, mailbox.clone());
        let clock = LamportClock::new();
        let alive = Arc::new(AtomicBool::new(true));
        let cs = Arc::new(TokenRing::new(
            id,
            n,
            bus.clone(),
            clock.clone(),
            alive.clone(),
            config.token_forward_delay,
        ));

        let pump = spawn_token_pump(id, mailbox.clone(), cs.clone(), alive.clone());

        Self {
            id,
            name: format!("P{id}"),
            n,
            bus,
            distributor,
            mailbox,
            clock,
            cs,
            barrier,
            alive,
            config,
            pump: Mutex::new(Some(pump)),
        }
    }

    pub fn id(&self) -> ProcessId {
        self.id
    }

    /// Human-readable label, `"P{id}"`, matching the source's per-process naming.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nb_process(&self) -> u32 {
        self.n
    }

    pub fn clock(&self) -> u64 {
        self.clock.value()
    }

    pub fn broadcast(&self, payload: impl Into<String>) {
        let ts = self.clock.inc_local();
        let payload = payload.into();
        debug!(id = self.id, %payload, "broadcasting");
        self.bus.publish(Message::Broadcast {
            timestamp: ts,
            sender: self.id,
            payload,
        });
    }

    pub fn send_to(&self, payload: impl Into<String>, to: ProcessId) {
        let ts = self.clock.inc_local();
        let payload = payload.into();
        debug!(id = self.id, to, %payload, "sending");
        self.bus.publish(Message::Directed {
            timestamp: ts,
            sender: self.id,
            to,
            payload,
        });
    }

    pub fn has_messages(&self) -> bool {
        self.mailbox.has_any()
    }

    /// Non-blocking pull of the next application message (never a `Token`,
    /// those belong to the token pump alone).
    pub fn get_message(&self) -> Option<Message> {
        let m = self.mailbox.wait_match(not_token, Some(Duration::ZERO))?;
        self.clock.update_on_receive(m.timestamp());
        Some(m)
    }

    pub fn wait_for_message(&self, timeout: Option<Duration>) -> Option<Message> {
        let m = self.mailbox.wait_match(not_token, timeout)?;
        self.clock.update_on_receive(m.timestamp());
        Some(m)
    }

    /// Blocks until the token is held locally, then enters the critical
    /// section. Returns `false` if the process was stopped while waiting.
    pub fn request_sc(&self) -> bool {
        self.cs.request_sc()
    }

    /// No-op unless currently in the critical section.
    pub fn release_sc(&self) {
        self.cs.release_sc()
    }

    pub fn synchronize(&self) {
        self.barrier.synchronize();
    }

    /// Every participant calls this with the same `(payload, sender)`. The
    /// sender broadcasts; everyone else waits for that specific sender's
    /// broadcast. All then pass through the barrier together.
    pub fn broadcast_sync(&self, payload: impl Into<String>, sender: ProcessId) {
        let payload = payload.into();
        if self.id == sender {
            self.broadcast(payload);
        } else if let Some(m) = self.mailbox.wait_match(
            |m| matches!(m, Message::Broadcast { sender: s, .. } if *s == sender),
            self.config.mailbox_timeout,
        ) {
            self.clock.update_on_receive(m.timestamp());
        }
        self.synchronize();
    }

    pub fn send_to_sync(&self, payload: impl Into<String>, to: ProcessId) {
        self.send_to(payload, to);
        self.synchronize();
    }

    /// Waits for a directed message from `sender`, matching structurally on
    /// the sender's id rather than on payload content, then rendezvous via
    /// the barrier and returns the payload.
    pub fn recv_from_sync(&self, sender: ProcessId) -> Option<String> {
        let m = self.mailbox.wait_match(
            |m| matches!(m, Message::Directed { sender: s, .. } if *s == sender),
            self.config.mailbox_timeout,
        )?;
        self.clock.update_on_receive(m.timestamp());
        self.synchronize();
        match m {
            Message::Directed { payload, .. } => Some(payload),
            _ => unreachable!("wait_match only matches Directed messages"),
        }
    }

    /// Stops this process: clears `alive`, wakes the token pump, unregisters
    /// from the distributor, joins the pump thread.
    pub fn shutdown(&self) {
        self.alive.store(false, Ordering::SeqCst);
        self.mailbox.clear();
        // Take the handle and drop the guard before joining: the mutex must
        // not be held while blocked on `join`, or a concurrent `shutdown()`
        // caller would stall behind the full join instead of a quick take.
        let handle = { self.pump.lock().unwrap().take() };
        if let Some(handle) = handle {
            let _ = handle.join();
        }
        self.distributor.unregister(self.id);
    }
}

fn not_token(m: &Message) -> bool {
    !m.is_token()
}

fn spawn_token_pump(
    id: ProcessId,
    mailbox: Arc<Mailbox>,
    cs: Arc<TokenRing>,
    alive: Arc<AtomicBool>,
) -> JoinHandle<()> {
    thread::spawn(move || {
        while alive.load(Ordering::SeqCst) {
            let token = mailbox.wait_match(
                |m| matches!(m, Message::Token { to, .. } if *to == id),
                Some(Duration::from_millis(200)),
            );
            if let Some(Message::Token { timestamp, .. }) = token {
                cs.on_token_received(timestamp);
            }
        }
    })
}
