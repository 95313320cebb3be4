//! # slirc-client
//!
//! A client-side library for the IRC line protocol. It connects over any
//! duplex byte stream, parses raw lines into structured [`Message`] values,
//! fans messages out to subscribers keyed by command name and direction, and
//! derives channel-membership state from the observed traffic.
//!
//! ## Quick Start
//!
//! ```no_run
//! use slirc_client::{Client, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut client = Client::connect("irc.libera.chat:6667").await?;
//!     client.register_user("slircbot", "slirc", "slirc client").await?;
//!     client.write(Message::join("#rust")).await?;
//!
//!     loop {
//!         let message = client.read().await?;
//!         if message.command == "366" {
//!             println!("members: {:?}", client.users("#rust")?);
//!         }
//!     }
//! }
//! ```
//!
//! ## Parsing
//!
//! ```
//! use slirc_client::Message;
//!
//! let msg: Message = ":nick!user@host PRIVMSG #channel :Hello!".parse().unwrap();
//! assert_eq!(msg.command, "PRIVMSG");
//! assert_eq!(msg.trailing.as_deref(), Some("Hello!"));
//! ```
//!
//! ## Subscribing to traffic
//!
//! Handlers are plain closures registered on the [`Dispatcher`] for a
//! [`Direction`] and an optional set of commands. Dispatch is synchronous on
//! the reading task; handlers may return reply messages which the connection
//! sends after delivery completes.

#![warn(missing_docs)]

pub mod channels;
pub mod client;
pub mod codec;
pub mod connection;
pub mod conversations;
pub mod dispatch;
pub mod error;
pub mod line;
pub mod message;
pub mod prefix;

pub use self::channels::{Attribution, ChannelTracker};
pub use self::client::Client;
pub use self::codec::MessageCodec;
pub use self::connection::{Connection, Writer};
pub use self::conversations::ConversationLog;
pub use self::dispatch::{Direction, Dispatcher};
pub use self::error::{ChannelError, MessageParseError, ProtocolError, SendError};
pub use self::line::LineCodec;
pub use self::message::Message;
pub use self::prefix::Prefix;
