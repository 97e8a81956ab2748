//! Thread-safe per-process message queue.
//!
//! Any thread may deposit; only the owning process is expected to dequeue, though
//! nothing here enforces that. `wait_match` is the workhorse behind selective
//! consumption (the token pump in `crate::middleware` pulls only `Token` messages
//! out from under the application's feet; `recv_from_sync` pulls only messages
//! from a given sender).

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::message::{Message, ProcessId};

pub struct Mailbox {
    owner: ProcessId,
    queue: Mutex<VecDeque<Message>>,
    not_empty: Condvar,
}

impl Mailbox {
    pub fn new(owner: ProcessId) -> Self {
        Self {
            owner,
            queue: Mutex::new(VecDeque::new()),
            not_empty: Condvar::new(),
        }
    }

    pub fn owner(&self) -> ProcessId {
        self.owner
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().unwrap().is_empty()
    }

    pub fn has_any(&self) -> bool {
        !self.is_empty()
    }

    pub fn count(&self) -> usize {
        self.queue.lock().unwrap().len()
    }

    pub fn deposit(&self, message: Message) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_back(message);
        self.not_empty.notify_all();
    }

    /// Pushes a message back onto the front of the queue. Used when a caller
    /// dequeues a message it does not want yet (e.g. `recv_from_sync` skipping
    /// past an unrelated message). Only preserves relative order for a single
    /// immediate redeposit; interleaved deposits from other producers may race
    /// ahead of it.
    pub fn redeposit(&self, message: Message) {
        let mut queue = self.queue.lock().unwrap();
        queue.push_front(message);
        self.not_empty.notify_all();
    }

    pub fn try_get(&self) -> Option<Message> {
        self.queue.lock().unwrap().pop_front()
    }

    /// Blocks until a message is present, or `timeout` elapses. `None` timeout
    /// blocks indefinitely; `Some(Duration::ZERO)` is a non-blocking probe.
    pub fn wait_get(&self, timeout: Option<Duration>) -> Option<Message> {
        self.wait_match(|_| true, timeout)
    }

    /// Blocks until a message matching `pred` is present, removing only that
    /// message (messages that don't match stay queued, in order, for whoever
    /// consumes them next).
    pub fn wait_match(&self, pred: impl Fn(&Message) -> bool, timeout: Option<Duration>) -> Option<Message> {
        let deadline = timeout.map(|d| Instant::now() + d);
        let mut queue = self.queue.lock().unwrap();
        loop {
            if let Some(pos) = queue.iter().position(&pred) {
                return queue.remove(pos);
            }
            match deadline {
                None => queue = self.not_empty.wait(queue).unwrap(),
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return None;
                    }
                    let (q, result) = self
                        .not_empty
                        .wait_timeout(queue, deadline - now)
                        .unwrap();
                    queue = q;
                    if result.timed_out() {
                        return queue.iter().position(&pred).and_then(|pos| queue.remove(pos));
                    }
                }
            }
        }
    }

    pub fn has_message_from(&self, sender: ProcessId) -> bool {
        self.queue
            .lock()
            .unwrap()
            .iter()
            .any(|m| m.sender() == Some(sender))
    }

    pub fn message_from(&self, sender: ProcessId) -> Option<Message> {
        let mut queue = self.queue.lock().unwrap();
        let pos = queue.iter().position(|m| m.sender() == Some(sender))?;
        queue.remove(pos)
    }

    pub fn drain(&self) -> Vec<Message> {
        let mut queue = self.queue.lock().unwrap();
        queue.drain(..).collect()
    }

    pub fn clear(&self) {
        let mut queue = self.queue.lock().unwrap();
        queue.clear();
        self.not_empty.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn plain(payload: &str) -> Message {
        Message::Plain {
            timestamp: 0,
            payload: payload.into(),
        }
    }

    #[test]
    fn fifo_within_one_producer() {
        let mb = Mailbox::new(0);
        mb.deposit(plain("a"));
        mb.deposit(plain("b"));
        assert_eq!(mb.try_get(), Some(plain("a")));
        assert_eq!(mb.try_get(), Some(plain("b")));
        assert_eq!(mb.try_get(), None);
    }

    #[test]
    fn redeposit_goes_to_front() {
        let mb = Mailbox::new(0);
        mb.deposit(plain("a"));
        let a = mb.try_get().unwrap();
        mb.deposit(plain("b"));
        mb.redeposit(a.clone());
        assert_eq!(mb.try_get(), Some(a));
    }

    #[test]
    fn wait_get_times_out_when_empty() {
        let mb = Mailbox::new(0);
        assert_eq!(mb.wait_get(Some(Duration::from_millis(20))), None);
    }

    #[test]
    fn wait_get_wakes_on_deposit() {
        let mb = Arc::new(Mailbox::new(0));
        let mb2 = mb.clone();
        let handle = thread::spawn(move || mb2.wait_get(Some(Duration::from_secs(2))));
        thread::sleep(Duration::from_millis(20));
        mb.deposit(plain("woke"));
        assert_eq!(handle.join().unwrap(), Some(plain("woke")));
    }

    #[test]
    fn wait_match_skips_non_matching() {
        let mb = Mailbox::new(0);
        mb.deposit(Message::Directed {
            timestamp: 1,
            sender: 1,
            to: 0,
            payload: "from1".into(),
        });
        mb.deposit(Message::Directed {
            timestamp: 2,
            sender: 2,
            to: 0,
            payload: "from2".into(),
        });
        let got = mb
            .wait_match(
                |m| matches!(m, Message::Directed { sender, .. } if *sender == 2),
                Some(Duration::from_millis(20)),
            )
            .unwrap();
        assert_eq!(got.sender(), Some(2));
        // the unmatched message from sender 1 is still there
        assert_eq!(mb.count(), 1);
    }

    #[test]
    fn has_message_from_and_message_from() {
        let mb = Mailbox::new(0);
        assert!(!mb.has_message_from(5));
        mb.deposit(Message::Directed {
            timestamp: 1,
            sender: 5,
            to: 0,
            payload: "hi".into(),
        });
        assert!(mb.has_message_from(5));
        let m = mb.message_from(5).unwrap();
        assert_eq!(m.sender(), Some(5));
        assert!(!mb.has_message_from(5));
    }
}
