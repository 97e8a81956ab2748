//! Single fan-out point between the bus and per-process mailboxes.
//!
//! Exactly one `Distributor` subscribes to the bus for a process group. It owns
//! the table mapping `ProcessId` to `Mailbox`, and routes each delivered message
//! by kind: `Broadcast` to everyone (including the sender), `Directed` to its
//! one destination (dropped with a warning if unregistered), `Token` to its one
//! destination (an unregistered destination there is a design error, not a
//! recoverable condition — a token that can't be delivered breaks the ring).

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use anyhow::ensure;
use tracing::{debug, warn};

use crate::bus::Bus;
use crate::mailbox::Mailbox;
use crate::message::{Message, ProcessId};

struct Table {
    mailboxes: HashMap<ProcessId, Arc<Mailbox>>,
}

pub struct Distributor {
    bus: Arc<dyn Bus>,
    subscription: crate::bus::SubscriptionId,
    table: Arc<Mutex<Table>>,
}

impl Distributor {
    pub fn new(bus: Arc<dyn Bus>) -> Arc<Self> {
        let table = Arc::new(Mutex::new(Table {
            mailboxes: HashMap::new(),
        }));
        let dispatch_table = table.clone();
        let subscription = bus.subscribe(Arc::new(move |message| dispatch(&dispatch_table, message)));
        Arc::new(Self {
            bus,
            subscription,
            table,
        })
    }

    pub fn register(&self, id: ProcessId, mailbox: Arc<Mailbox>) {
        self.table.lock().unwrap().mailboxes.insert(id, mailbox);
    }

    pub fn unregister(&self, id: ProcessId) {
        self.table.lock().unwrap().mailboxes.remove(&id);
    }

    pub fn registered_count(&self) -> usize {
        self.table.lock().unwrap().mailboxes.len()
    }

    pub fn shutdown(&self) {
        self.bus.unsubscribe(self.subscription);
    }
}

fn dispatch(table: &Mutex<Table>, message: Message) -> anyhow::Result<()> {
    // Snapshot under the lock, deposit outside of it: a deposit can wake a
    // waiter that turns around and calls back into the distributor (e.g. to
    // forward a token), which must not deadlock on this lock.
    let snapshot: Vec<(ProcessId, Arc<Mailbox>)> = {
        let table = table.lock().unwrap();
        table
            .mailboxes
            .iter()
            .map(|(id, mailbox)| (*id, mailbox.clone()))
            .collect()
    };

    match &message {
        Message::Broadcast { sender, .. } => {
            debug!(sender, "broadcasting to {} mailboxes", snapshot.len());
            for (_, mailbox) in &snapshot {
                mailbox.deposit(message.clone());
            }
        }
        Message::Directed { to, sender, .. } => {
            match snapshot.iter().find(|(id, _)| id == to) {
                Some((_, mailbox)) => mailbox.deposit(message.clone()),
                None => warn!(sender, to, "directed message dropped: unknown destination"),
            }
        }
        Message::Token { to, from, .. } => {
            let dest = snapshot.iter().find(|(id, _)| id == to).map(|(_, m)| m.clone());
            ensure!(
                dest.is_some(),
                "token lost in transit from {from} to unknown process {to}"
            );
            dest.unwrap().deposit(message.clone());
        }
        Message::Plain { .. } => {
            debug!("plain message has no routing address, dropping");
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::ThreadBus;
    use std::time::Duration;

    #[test]
    fn broadcast_reaches_every_registered_mailbox_including_sender() {
        let bus: Arc<dyn Bus> = Arc::new(ThreadBus::new());
        let distributor = Distributor::new(bus.clone());
        let mb0 = Arc::new(Mailbox::new(0));
        let mb1 = Arc::new(Mailbox::new(1));
        distributor.register(0, mb0.clone());
        distributor.register(1, mb1.clone());

        bus.publish(Message::Broadcast {
            timestamp: 1,
            sender: 0,
            payload: "hi".into(),
        });

        assert!(mb0.wait_get(Some(Duration::from_millis(200))).is_some());
        assert!(mb1.wait_get(Some(Duration::from_millis(200))).is_some());
    }

    #[test]
    fn directed_to_unknown_destination_is_dropped() {
        let bus: Arc<dyn Bus> = Arc::new(ThreadBus::new());
        let distributor = Distributor::new(bus.clone());
        let mb0 = Arc::new(Mailbox::new(0));
        distributor.register(0, mb0.clone());

        bus.publish(Message::Directed {
            timestamp: 1,
            sender: 0,
            to: 99,
            payload: "nope".into(),
        });

        assert!(mb0.wait_get(Some(Duration::from_millis(100))).is_none());
    }

    #[test]
    fn directed_to_registered_destination_arrives() {
        let bus: Arc<dyn Bus> = Arc::new(ThreadBus::new());
        let distributor = Distributor::new(bus.clone());
        let mb1 = Arc::new(Mailbox::new(1));
        distributor.register(1, mb1.clone());

        bus.publish(Message::Directed {
            timestamp: 1,
            sender: 0,
            to: 1,
            payload: "hi".into(),
        });

        let got = mb1.wait_get(Some(Duration::from_millis(200)));
        assert_eq!(got.and_then(|m| m.payload().map(str::to_owned)), Some("hi".into()));
    }
}
