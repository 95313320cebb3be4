//! Bounded per-channel conversation history.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use parking_lot::RwLock;

use crate::dispatch::{Direction, Dispatcher};

/// Default number of message bodies kept per channel.
pub const DEFAULT_CAPACITY: usize = 100;

/// Keeps the last N `PRIVMSG` bodies per channel.
///
/// An ordinary dispatcher subscriber; history is best-effort, so reading an
/// unknown channel just returns nothing.
pub struct ConversationLog {
    messages: RwLock<HashMap<String, VecDeque<String>>>,
    capacity: usize,
}

impl ConversationLog {
    /// Create a log keeping `capacity` bodies per channel.
    pub fn new(capacity: usize) -> Self {
        Self {
            messages: RwLock::new(HashMap::new()),
            capacity,
        }
    }

    /// Subscribe to `PRIVMSG` traffic in both directions.
    pub fn register(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let log = Arc::clone(self);
        dispatcher.observe(
            Direction::Both,
            move |message| {
                let target = message.middles().first();
                let body = message.trailing.as_deref();
                if let (Some(target), Some(body)) = (target, body) {
                    log.record(target, body);
                }
            },
            &["PRIVMSG"],
        );
    }

    /// Append a message body, trimming the front beyond capacity.
    pub fn record(&self, channel: &str, body: &str) {
        let mut messages = self.messages.write();
        let log = messages.entry(channel.to_owned()).or_default();
        log.push_back(body.to_owned());
        if log.len() > self.capacity {
            log.pop_front();
        }
    }

    /// Snapshot of the logged bodies for a channel, oldest first.
    pub fn messages(&self, channel: &str) -> Vec<String> {
        self.messages
            .read()
            .get(channel)
            .map(|log| log.iter().cloned().collect())
            .unwrap_or_default()
    }
}

impl Default for ConversationLog {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::message::Message;

    #[test]
    fn trims_from_the_front() {
        let log = ConversationLog::new(2);
        log.record("#a", "one");
        log.record("#a", "two");
        log.record("#a", "three");
        assert_eq!(log.messages("#a"), ["two", "three"]);
    }

    #[test]
    fn channels_are_independent() {
        let log = ConversationLog::new(10);
        log.record("#a", "hi");
        assert_eq!(log.messages("#b"), Vec::<String>::new());
        assert_eq!(log.messages("#a"), ["hi"]);
    }

    #[test]
    fn records_privmsg_via_dispatch() {
        let dispatcher = Dispatcher::new();
        let log = Arc::new(ConversationLog::new(10));
        log.register(&dispatcher);

        let incoming: Message = ":bob!b@h PRIVMSG #a :hello".parse().unwrap();
        dispatcher.dispatch(Direction::Incoming, &incoming);
        dispatcher.dispatch(Direction::Outgoing, &Message::privmsg("#a", "hi bob"));

        assert_eq!(log.messages("#a"), ["hello", "hi bob"]);
    }
}
