//! High-level client facade.
//!
//! Wires a [`Connection`] to the standard subscribers: the channel
//! tracker, the conversation log, and the ping responder. User code can
//! register further handlers through [`Client::dispatcher`].

use std::sync::Arc;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpStream, ToSocketAddrs};
use tokio_rustls::client::TlsStream;

use crate::channels::ChannelTracker;
use crate::connection::{Connection, Writer};
use crate::conversations::ConversationLog;
use crate::dispatch::{Direction, Dispatcher};
use crate::error::{ChannelError, ProtocolError, SendError};
use crate::message::Message;

/// An IRC client: a connection plus the derived state subscribers.
///
/// # Example
///
/// ```no_run
/// # use slirc_client::{Client, Message};
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let mut client = Client::connect("irc.libera.chat:6667").await?;
/// client.register_user("slircbot", "slirc", "slirc client").await?;
/// client.write(Message::join("#rust")).await?;
/// loop {
///     let message = client.read().await?;
///     println!("<- {}", message.raw);
/// }
/// # }
/// ```
pub struct Client<T> {
    connection: Connection<T>,
    channels: Arc<ChannelTracker>,
    conversations: Arc<ConversationLog>,
}

impl Client<TcpStream> {
    /// Connect over plain TCP and wire up the standard subscribers.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self, ProtocolError> {
        let dispatcher = Arc::new(Dispatcher::new());
        let connection = Connection::connect(addr, dispatcher).await?;
        Ok(Self::with_connection(connection))
    }
}

impl Client<TlsStream<TcpStream>> {
    /// Connect over TLS (system root store) and wire up the standard
    /// subscribers.
    pub async fn connect_tls(
        addr: impl ToSocketAddrs,
        domain: &str,
    ) -> Result<Self, ProtocolError> {
        let dispatcher = Arc::new(Dispatcher::new());
        let connection = Connection::connect_tls(addr, domain, dispatcher).await?;
        Ok(Self::with_connection(connection))
    }
}

impl<T> Client<T>
where
    T: AsyncRead + AsyncWrite + Unpin,
{
    /// Build a client over an already-connected duplex stream.
    ///
    /// Useful for tests (`tokio::io::duplex`) and for transports this
    /// crate does not set up itself.
    pub fn new(stream: T) -> Self {
        let dispatcher = Arc::new(Dispatcher::new());
        Self::with_connection(Connection::new(stream, dispatcher))
    }

    fn with_connection(connection: Connection<T>) -> Self {
        let dispatcher = connection.dispatcher();

        let channels = Arc::new(ChannelTracker::new());
        channels.register(dispatcher);

        let conversations = Arc::new(ConversationLog::default());
        conversations.register(dispatcher);

        register_ping_responder(dispatcher);

        Self {
            channels,
            conversations,
            connection,
        }
    }

    /// The dispatcher for registering further handlers.
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        self.connection.dispatcher()
    }

    /// A clonable handle to the write side, usable from other tasks.
    pub fn writer(&self) -> Writer<T> {
        self.connection.writer()
    }

    /// The channel membership tracker.
    pub fn channels(&self) -> &Arc<ChannelTracker> {
        &self.channels
    }

    /// Send the `NICK` + `USER` registration pair.
    pub async fn register_user(
        &self,
        nick: &str,
        username: &str,
        realname: &str,
    ) -> Result<(), SendError> {
        self.writer()
            .send_all(vec![
                Message::nick(nick),
                Message::user(username, "0", "*", realname),
            ])
            .await?;
        Ok(())
    }

    /// Block until the next inbound message. See [`Connection::read`].
    pub async fn read(&mut self) -> Result<Message, ProtocolError> {
        self.connection.read().await
    }

    /// Write one message. See [`Writer::write`].
    pub async fn write(&self, message: Message) -> Result<(), ProtocolError> {
        self.connection.writer().write(message).await
    }

    /// Write a batch, stopping at the first failure. See
    /// [`Writer::send_all`].
    pub async fn send_all(&self, messages: Vec<Message>) -> Result<usize, SendError> {
        self.connection.writer().send_all(messages).await
    }

    /// Sorted snapshot of a channel's members.
    pub fn users(&self, channel: &str) -> Result<Vec<String>, ChannelError> {
        self.channels.users(channel)
    }

    /// Sorted snapshot of the channels the client occupies.
    pub fn channel_names(&self) -> Vec<String> {
        self.channels.channel_names()
    }

    /// Number of channels the client occupies.
    pub fn channel_count(&self) -> usize {
        self.channels.channel_count()
    }

    /// Recent `PRIVMSG` bodies for a channel, oldest first.
    pub fn messages(&self, channel: &str) -> Vec<String> {
        self.conversations.messages(channel)
    }
}

/// Answer `PING` with `PONG`, echoing the ping token.
fn register_ping_responder(dispatcher: &Dispatcher) {
    dispatcher.register(
        Direction::Incoming,
        |message: &Message| {
            let token = message
                .trailing
                .as_deref()
                .or_else(|| message.middles().first().map(String::as_str));
            Ok(token.map(Message::pong).into_iter().collect())
        },
        &["PING"],
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_responder_echoes_token() {
        let dispatcher = Dispatcher::new();
        register_ping_responder(&dispatcher);

        let ping: Message = "PING :tepper.freenode.net".parse().unwrap();
        let replies = dispatcher.dispatch(Direction::Incoming, &ping);
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0].raw, "PONG :tepper.freenode.net");

        let ping: Message = "PING middle-token".parse().unwrap();
        let replies = dispatcher.dispatch(Direction::Incoming, &ping);
        assert_eq!(replies[0].raw, "PONG :middle-token");
    }

    #[test]
    fn ping_without_token_gets_no_reply() {
        let dispatcher = Dispatcher::new();
        register_ping_responder(&dispatcher);
        let ping: Message = "PING".parse().unwrap();
        assert!(dispatcher.dispatch(Direction::Incoming, &ping).is_empty());
    }
}
