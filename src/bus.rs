//! In-process publish/subscribe fabric standing in for the network.
//!
//! Only the distributor subscribes (see `crate::distributor`); application code
//! never touches the bus directly. `ThreadBus` gives each subscriber its own
//! dedicated dispatch thread draining an ordered queue, modelling the
//! `Mode.PARALLEL` thread mode the distributor is registered under in the
//! system this crate's protocol is based on: subscribers run concurrently with
//! respect to each other, but a single subscriber never sees two messages out
//! of the order `publish` was called in. A naive thread-per-publish-per-event
//! scheme cannot promise that — two publishes racing to spawn threads have no
//! guaranteed completion order — which would break the FIFO-per-publisher
//! invariant the middleware relies on.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::error;

use crate::message::Message;

pub type SubscriptionId = u64;
pub type Handler = Arc<dyn Fn(Message) -> anyhow::Result<()> + Send + Sync>;

pub trait Bus: Send + Sync {
    fn publish(&self, message: Message);
    fn subscribe(&self, handler: Handler) -> SubscriptionId;
    fn unsubscribe(&self, id: SubscriptionId);
}

struct Subscriber {
    queue: mpsc::Sender<Message>,
}

#[derive(Default)]
struct Inner {
    subscribers: HashMap<SubscriptionId, Subscriber>,
}

pub struct ThreadBus {
    next_id: AtomicU64,
    inner: Mutex<Inner>,
}

impl ThreadBus {
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(0),
            inner: Mutex::new(Inner::default()),
        }
    }
}

impl Default for ThreadBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Bus for ThreadBus {
    fn publish(&self, message: Message) {
        // Hold the lock across every enqueue: two threads racing to publish
        // must not interleave their sends to the same subscriber queue, or
        // the FIFO-per-publisher guarantee would depend on lock-acquisition
        // luck rather than being structural.
        let inner = self.inner.lock().unwrap();
        for subscriber in inner.subscribers.values() {
            // A closed receiver means the subscriber has unsubscribed and its
            // dispatch thread has exited; dropping the message is correct.
            let _ = subscriber.queue.send(message.clone());
        }
    }

    fn subscribe(&self, handler: Handler) -> SubscriptionId {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::channel::<Message>();
        thread::spawn(move || {
            while let Ok(message) = rx.recv() {
                if let Err(err) = handler(message) {
                    error!(%err, "bus handler failed");
                }
            }
        });
        self.inner
            .lock()
            .unwrap()
            .subscribers
            .insert(id, Subscriber { queue: tx });
        id
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        // Dropping the sender closes the channel; the dispatch thread's
        // `rx.recv()` returns `Err` on its next iteration and the thread exits.
        self.inner.lock().unwrap().subscribers.remove(&id);
    }
}
