//! The owned message type and its outgoing constructors.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use chrono::{DateTime, Utc};

use super::parser::ParsedLine;
use crate::error::{MessageParseError, ProtocolError};
use crate::prefix::Prefix;

/// An owned, parsed IRC message.
///
/// One `Message` is produced per protocol line, consumed by every matching
/// subscriber, then discarded. Parsing is strict: a line that cannot yield a
/// command is a typed [`ProtocolError::InvalidMessage`], never a degenerate
/// value.
///
/// # Example
///
/// ```
/// use slirc_client::Message;
///
/// let msg: Message = ":wallyworld!~quassel@1.2.3.4 QUIT :bye".parse().unwrap();
/// assert_eq!(msg.source_nickname(), Some("wallyworld"));
/// assert_eq!(msg.command, "QUIT");
/// assert_eq!(msg.trailing.as_deref(), Some("bye"));
/// ```
#[derive(Clone, Debug)]
pub struct Message {
    /// The original line text, CR/LF stripped.
    pub raw: String,
    /// Message origin (server name or `nick!user@host`), if present.
    pub prefix: Option<Prefix>,
    /// The command, normalized to uppercase. Letters-only or 3 digits.
    pub command: String,
    /// Parameters in wire order.
    ///
    /// When a trailing parameter is present it is also the last element
    /// here, with its leading `:` retained, so that `params` alone is a
    /// faithful view of the wire form.
    pub params: Vec<String>,
    /// The trailing parameter with the leading `:` stripped, if present.
    pub trailing: Option<String>,
    /// Capture time, set when the message was parsed or constructed.
    pub timestamp: DateTime<Utc>,
}

impl Message {
    /// Build an outgoing message from a command and its parameters.
    ///
    /// `raw`, `params`, and `trailing` are kept consistent by construction.
    fn from_parts(command: &str, middles: &[&str], trailing: Option<&str>) -> Self {
        let mut raw = String::from(command);
        let mut params: Vec<String> = Vec::with_capacity(middles.len() + 1);
        for middle in middles {
            raw.push(' ');
            raw.push_str(middle);
            params.push((*middle).to_owned());
        }
        if let Some(trailing) = trailing {
            raw.push_str(" :");
            raw.push_str(trailing);
            params.push(format!(":{trailing}"));
        }

        Message {
            raw,
            prefix: None,
            command: command.to_owned(),
            params,
            trailing: trailing.map(ToOwned::to_owned),
            timestamp: Utc::now(),
        }
    }

    /// Build a `USER` registration message.
    ///
    /// `addr` and `servername` are historical placeholders; most servers
    /// ignore them. The realname goes out as the trailing parameter so it
    /// may contain spaces.
    pub fn user(username: &str, addr: &str, servername: &str, realname: &str) -> Self {
        Message::from_parts("USER", &[username, addr, servername], Some(realname))
    }

    /// Build a `NICK` message.
    pub fn nick(nick: &str) -> Self {
        Message::from_parts("NICK", &[nick], None)
    }

    /// Build a `JOIN` message for a channel.
    pub fn join(channel: &str) -> Self {
        Message::from_parts("JOIN", &[channel], None)
    }

    /// Build a `PART` message for a channel.
    pub fn part(channel: &str) -> Self {
        Message::from_parts("PART", &[channel], None)
    }

    /// Build a `PRIVMSG` to a channel or nick.
    pub fn privmsg(target: &str, body: &str) -> Self {
        Message::from_parts("PRIVMSG", &[target], Some(body))
    }

    /// Build a `PONG` reply carrying the ping token.
    pub fn pong(token: &str) -> Self {
        Message::from_parts("PONG", &[], Some(token))
    }

    /// Build a `NAMES` request for a channel.
    pub fn names(channel: &str) -> Self {
        Message::from_parts("NAMES", &[channel], None)
    }

    /// Build a `QUIT` message with an optional parting comment.
    pub fn quit(comment: Option<&str>) -> Self {
        Message::from_parts("QUIT", &[], comment)
    }

    /// Get the nickname from the message prefix, if the prefix carries one.
    ///
    /// Returns `None` for server-originated messages and for the client's
    /// own prefix-less lines.
    pub fn source_nickname(&self) -> Option<&str> {
        self.prefix.as_ref().and_then(Prefix::nick)
    }

    /// Middle parameters only: `params` without the trailing entry.
    pub fn middles(&self) -> &[String] {
        match self.trailing {
            Some(_) => &self.params[..self.params.len() - 1],
            None => &self.params[..],
        }
    }
}

impl FromStr for Message {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let line = s.trim_end_matches(&['\r', '\n'][..]).trim_start_matches(' ');
        if line.is_empty() {
            return Err(ProtocolError::InvalidMessage {
                string: s.to_owned(),
                cause: MessageParseError::EmptyMessage,
            });
        }

        let parsed = ParsedLine::parse(line).map_err(|cause| ProtocolError::InvalidMessage {
            string: s.to_owned(),
            cause,
        })?;

        let mut params: Vec<String> = Vec::with_capacity(parsed.middles.len() + 1);
        params.extend(parsed.middles.iter().map(|m| (*m).to_owned()));
        if let Some(trailing) = parsed.trailing {
            params.push(format!(":{trailing}"));
        }

        Ok(Message {
            raw: line.to_owned(),
            prefix: parsed.prefix.map(Prefix::new_from_str),
            command: parsed.command.to_ascii_uppercase(),
            params,
            trailing: parsed.trailing.map(ToOwned::to_owned),
            timestamp: Utc::now(),
        })
    }
}

impl Display for Message {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}
