//! IRC message prefix types.
//!
//! An IRC message prefix identifies the origin of a message: either a bare
//! server name, or a user's `nick!user@host` mask.
//!
//! # Reference
//! - RFC 1459 Section 2.3.1: Message format

use std::fmt;
use std::str::FromStr;

/// IRC message prefix - identifies the origin of a message.
///
/// The `!` separator alone discriminates the two forms: a prefix without a
/// `!` is a server name, even when it contains `@` or dots. This matches the
/// wire grammar, where only user prefixes carry a `nick!user` part.
#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub enum Prefix {
    /// Server name (e.g., "irc.example.com").
    ServerName(String),
    /// User prefix: (nickname, username, hostname).
    ///
    /// `user` and `host` may be empty when the wire form omitted them.
    Nickname(String, String, String),
}

impl Prefix {
    /// Parse a prefix string (without the leading `:`) into a `Prefix`.
    ///
    /// This is a lenient parser; it never fails. A `nick!user` form without
    /// `@host` yields an empty host.
    pub fn new_from_str(s: &str) -> Self {
        let Some(bang) = s.find('!') else {
            return Prefix::ServerName(s.to_owned());
        };

        let nick = &s[..bang];
        let rest = &s[bang + 1..];
        match rest.find('@') {
            Some(at) => Prefix::Nickname(
                nick.to_owned(),
                rest[..at].to_owned(),
                rest[at + 1..].to_owned(),
            ),
            None => Prefix::Nickname(nick.to_owned(), rest.to_owned(), String::new()),
        }
    }

    /// Get the nickname if this is a user prefix.
    pub fn nick(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(nick, _, _) if !nick.is_empty() => Some(nick),
            _ => None,
        }
    }

    /// Get the username if this is a user prefix.
    pub fn user(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(_, user, _) if !user.is_empty() => Some(user),
            _ => None,
        }
    }

    /// Get the hostname if this is a user prefix.
    pub fn host(&self) -> Option<&str> {
        match self {
            Prefix::Nickname(_, _, host) if !host.is_empty() => Some(host),
            _ => None,
        }
    }

    /// Get the server name if this is a server prefix.
    pub fn server_name(&self) -> Option<&str> {
        match self {
            Prefix::ServerName(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Prefix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Prefix::ServerName(name) => write!(f, "{}", name),
            Prefix::Nickname(nick, user, host) => {
                write!(f, "{}", nick)?;
                if !user.is_empty() {
                    write!(f, "!{}", user)?;
                }
                if !host.is_empty() {
                    write!(f, "@{}", host)?;
                }
                Ok(())
            }
        }
    }
}

impl FromStr for Prefix {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Prefix::new_from_str(s))
    }
}
