//! Core communication middleware for a distributed-process simulation: a
//! single address space standing in for a network, with an in-process event
//! bus (`bus`) in place of sockets.
//!
//! Five pieces compose into the public [`middleware::Middleware`] façade:
//! - [`message`] — the tagged message values carried on the bus.
//! - [`id`] — monotonic process id allocation.
//! - [`mailbox`] — the thread-safe per-process inbox.
//! - [`distributor`] — the single subscriber that fans bus events out to mailboxes.
//! - [`clock`] — the Lamport logical clock.
//! - [`mutex`] — token-ring mutual exclusion for the distributed critical section.
//! - [`barrier`] — the group rendezvous barrier and synchronous send/receive built on it.
//!
//! No crash recovery, no network partitions or loss, no persistence, no
//! security, no multi-host deployment: messages are assumed reliably and
//! in-order delivered from any one publisher to any one subscriber, because
//! there is no network between them, only shared memory.

pub mod barrier;
pub mod bus;
pub mod clock;
pub mod config;
pub mod distributor;
pub mod id;
pub mod mailbox;
pub mod message;
pub mod middleware;
pub mod mutex;

pub use config::Config;
pub use message::{Message, ProcessId};
pub use middleware::{Group, Middleware};
