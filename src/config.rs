//! Tunables for the middleware. Everything here has a sensible default;
//! application code only needs to reach for `Config` when a test wants tighter
//! timeouts or a different forwarding delay.

use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Config {
    /// How long a process holding an unwanted token waits before forwarding
    /// it, giving a local `request_sc` call a chance to claim it first.
    pub token_forward_delay: Duration,
    /// Default timeout for mailbox waits used internally by the synchronous
    /// primitives (`recv_from_sync`, `broadcast_sync`). `None` blocks forever.
    pub mailbox_timeout: Option<Duration>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            token_forward_delay: Duration::from_millis(50),
            mailbox_timeout: None,
        }
    }
}
