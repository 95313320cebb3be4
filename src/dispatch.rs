//! Handler registry and message fan-out.
//!
//! Independent pieces of logic subscribe to message traffic by command name
//! and direction. Dispatch is synchronous and ordered: a handler that
//! blocks delays every handler registered after it, and the read or write
//! call that triggered the dispatch. That is deliberate; it is what keeps
//! derived state (like the channel tracker) in wire order.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::message::Message;

/// The direction of traffic a handler observes.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Messages received from the server.
    Incoming,
    /// Messages sent to the server.
    Outgoing,
    /// Both directions; registering with `Both` registers the handler
    /// identically under `Incoming` and `Outgoing`.
    Both,
}

/// A subscriber callback.
///
/// Handlers are invoked synchronously with each matching message and may
/// return reply messages. Replies collected during an *incoming* dispatch
/// are written to the server by the connection after delivery completes;
/// replies from an outgoing dispatch are dropped (with a debug log), since
/// acting on the client's own writes would loop.
type Handler = Arc<dyn Fn(&Message) -> anyhow::Result<Vec<Message>> + Send + Sync>;

#[derive(Default)]
struct HandlerTable {
    /// Wildcard handlers, invoked for every message, in registration order.
    wildcard: Vec<Handler>,
    /// Command-keyed handlers. Matching is case-sensitive against the
    /// already-uppercased command field.
    by_command: HashMap<String, Vec<Handler>>,
}

impl HandlerTable {
    fn add(&mut self, handler: Handler, commands: &[&str]) {
        if commands.is_empty() {
            self.wildcard.push(handler);
            return;
        }
        for command in commands {
            self.by_command
                .entry((*command).to_owned())
                .or_default()
                .push(Arc::clone(&handler));
        }
    }

    fn dispatch(&self, message: &Message, replies: &mut Vec<Message>) {
        let exact = self.by_command.get(&message.command);
        let handlers = self
            .wildcard
            .iter()
            .chain(exact.into_iter().flatten());

        for handler in handlers {
            match handler(message) {
                Ok(mut more) => replies.append(&mut more),
                // One misbehaving subscriber must not stop delivery to the
                // rest, or kill the read loop.
                Err(err) => warn!(command = %message.command, "handler failed: {err:#}"),
            }
        }
    }
}

/// Keyed subscription table routing messages to handlers.
///
/// Registration is expected to happen once at setup; handlers cannot be
/// unregistered.
///
/// # Example
///
/// ```
/// use slirc_client::{Direction, Dispatcher, Message};
///
/// let dispatcher = Dispatcher::new();
/// dispatcher.register(Direction::Incoming, |msg: &Message| {
///     Ok(msg.trailing.as_deref().map(Message::pong).into_iter().collect())
/// }, &["PING"]);
///
/// let ping: Message = "PING :token".parse().unwrap();
/// let replies = dispatcher.dispatch(Direction::Incoming, &ping);
/// assert_eq!(replies[0].raw, "PONG :token");
/// ```
#[derive(Default)]
pub struct Dispatcher {
    incoming: RwLock<HandlerTable>,
    outgoing: RwLock<HandlerTable>,
}

impl Dispatcher {
    /// Create an empty dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for the given direction.
    ///
    /// An empty `commands` slice registers a wildcard handler invoked for
    /// every message in that direction. Command names must be given in
    /// uppercase; matching is case-sensitive against the normalized
    /// command field.
    ///
    /// Must not be called from inside a handler: dispatch holds the table
    /// lock while handlers run, and the lock is not reentrant, so
    /// registering on the same dispatcher from a handler deadlocks.
    pub fn register<H>(&self, direction: Direction, handler: H, commands: &[&str])
    where
        H: Fn(&Message) -> anyhow::Result<Vec<Message>> + Send + Sync + 'static,
    {
        let handler: Handler = Arc::new(handler);
        if matches!(direction, Direction::Incoming | Direction::Both) {
            self.incoming.write().add(Arc::clone(&handler), commands);
        }
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            self.outgoing.write().add(handler, commands);
        }
    }

    /// Register an observer that never replies.
    ///
    /// Convenience over [`register`](Self::register) for subscribers that
    /// only watch traffic, like state trackers and logs.
    pub fn observe<F>(&self, direction: Direction, observer: F, commands: &[&str])
    where
        F: Fn(&Message) + Send + Sync + 'static,
    {
        self.register(
            direction,
            move |message| {
                observer(message);
                Ok(Vec::new())
            },
            commands,
        );
    }

    /// Deliver a message to every matching handler and collect replies.
    ///
    /// Order per message: all wildcard handlers in registration order, then
    /// all handlers for that exact command in registration order. A
    /// handler's failure is logged and does not stop delivery to the rest.
    /// Dispatching with [`Direction::Both`] delivers to the incoming table,
    /// then the outgoing one.
    pub fn dispatch(&self, direction: Direction, message: &Message) -> Vec<Message> {
        let mut replies = Vec::new();
        if matches!(direction, Direction::Incoming | Direction::Both) {
            self.incoming.read().dispatch(message, &mut replies);
        }
        if matches!(direction, Direction::Outgoing | Direction::Both) {
            self.outgoing.read().dispatch(message, &mut replies);
        }
        if !replies.is_empty() && direction == Direction::Outgoing {
            debug!(
                count = replies.len(),
                "dropping replies produced by outgoing handlers"
            );
            replies.clear();
        }
        replies
    }
}
