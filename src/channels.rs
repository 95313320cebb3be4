//! Channel membership tracking.
//!
//! The tracker is an ordinary dispatcher subscriber that derives an
//! eventually-consistent view of which channels the client occupies, and
//! who else is in them, purely from observed traffic. Its correctness
//! hinges on the NAMES-sync gate: a names reply (`353`) only seeds
//! membership while a sync is in flight for that channel, so unsolicited or
//! partial server pushes can never corrupt the view.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, trace};

use crate::dispatch::{Direction, Dispatcher};
use crate::error::ChannelError;
use crate::message::Message;

/// RPL_NAMREPLY: one page of a channel's name list.
const RPL_NAM_REPLY: &str = "353";
/// RPL_ENDOFNAMES: terminates a name list.
const RPL_END_OF_NAMES: &str = "366";

/// Commands the tracker subscribes to.
const TRACKED_COMMANDS: &[&str] = &[
    "JOIN",
    "PART",
    "KICK",
    "QUIT",
    "NAMES",
    RPL_NAM_REPLY,
    RPL_END_OF_NAMES,
];

/// Channel-name status sigils a server may prepend in a names reply.
const STATUS_SIGILS: &[char] = &['@', '+', '%', '&', '~'];

/// Who a membership-bearing message is attributed to.
///
/// The client's own lines carry no nick attribution (outgoing lines have no
/// prefix at all, and server lines may be prefixed by the server name), so
/// the distinction is made explicit here rather than inferred from an empty
/// string downstream.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Attribution {
    /// The client's own line: no nick in the prefix.
    Ourselves,
    /// A line attributed to another user by their nick.
    User(String),
}

impl Attribution {
    /// Classify a message by its prefix.
    pub fn of(message: &Message) -> Self {
        match message.source_nickname() {
            Some(nick) => Attribution::User(nick.to_owned()),
            None => Attribution::Ourselves,
        }
    }
}

/// Per-nick membership of one channel. The value is a mode-string
/// placeholder (status sigils from the names reply, not decoded further).
type Members = HashMap<String, String>;

#[derive(Default)]
struct TrackerState {
    channels: HashMap<String, Members>,
    /// Channels with a NAMES exchange in flight. While a channel is absent
    /// here, names replies for it are ignored.
    names_pending: HashSet<String>,
}

/// Tracks the channels the client occupies and their membership.
///
/// All mutation happens from the dispatch callback on the reading task;
/// snapshots may be taken concurrently from any thread. A single
/// reader/writer lock guards the map, and every accessor copies data out
/// under a read lock - no live references escape.
///
/// # Example
///
/// ```
/// use slirc_client::ChannelTracker;
///
/// let tracker = ChannelTracker::new();
/// tracker.add_channel("#rust");
/// tracker.user_joins("#rust", &["bob"]).unwrap();
/// assert_eq!(tracker.users("#rust").unwrap(), ["bob"]);
/// ```
#[derive(Default)]
pub struct ChannelTracker {
    inner: RwLock<TrackerState>,
}

impl ChannelTracker {
    /// Create an empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribe the tracker to membership-bearing traffic in both
    /// directions.
    pub fn register(self: &Arc<Self>, dispatcher: &Dispatcher) {
        let tracker = Arc::clone(self);
        dispatcher.observe(
            Direction::Both,
            move |message| tracker.apply(message),
            TRACKED_COMMANDS,
        );
    }

    /// Create an empty channel entry. Idempotent: an existing channel keeps
    /// its membership.
    pub fn add_channel(&self, channel: &str) {
        self.inner
            .write()
            .channels
            .entry(channel.to_owned())
            .or_default();
    }

    /// Drop a channel, its membership, and any pending sync flag.
    /// Idempotent.
    pub fn remove_channel(&self, channel: &str) {
        let mut state = self.inner.write();
        state.channels.remove(channel);
        state.names_pending.remove(channel);
    }

    /// Add nicks to a channel's membership.
    ///
    /// Joining an already-present nick is a no-op that keeps its mode
    /// placeholder. Fails with [`ChannelError::NotFound`] when the channel
    /// is untracked, leaving the map unmodified.
    pub fn user_joins(&self, channel: &str, nicks: &[&str]) -> Result<(), ChannelError> {
        let mut state = self.inner.write();
        let members = state
            .channels
            .get_mut(channel)
            .ok_or_else(|| ChannelError::NotFound(channel.to_owned()))?;
        for nick in nicks {
            members.entry((*nick).to_owned()).or_default();
        }
        Ok(())
    }

    /// Remove a nick from a channel's membership.
    ///
    /// Parting an absent nick is a no-op. Fails with
    /// [`ChannelError::NotFound`] when the channel is untracked.
    pub fn user_parts(&self, channel: &str, nick: &str) -> Result<(), ChannelError> {
        let mut state = self.inner.write();
        let members = state
            .channels
            .get_mut(channel)
            .ok_or_else(|| ChannelError::NotFound(channel.to_owned()))?;
        members.remove(nick);
        Ok(())
    }

    /// Remove a nick from every channel's membership. Never fails.
    pub fn user_quits(&self, nick: &str) {
        let mut state = self.inner.write();
        for members in state.channels.values_mut() {
            members.remove(nick);
        }
    }

    /// Sorted, deduplicated snapshot of a channel's nicks.
    ///
    /// An untracked channel is [`ChannelError::NotFound`]; a tracked but
    /// empty channel is `Ok` with an empty vec.
    pub fn users(&self, channel: &str) -> Result<Vec<String>, ChannelError> {
        let state = self.inner.read();
        let members = state
            .channels
            .get(channel)
            .ok_or_else(|| ChannelError::NotFound(channel.to_owned()))?;
        let mut users: Vec<String> = members.keys().cloned().collect();
        users.sort_unstable();
        Ok(users)
    }

    /// Sorted snapshot of all tracked channel names.
    pub fn channel_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.inner.read().channels.keys().cloned().collect();
        names.sort_unstable();
        names
    }

    /// Number of tracked channels.
    pub fn channel_count(&self) -> usize {
        self.inner.read().channels.len()
    }

    /// Whether a NAMES exchange is in flight for this channel.
    pub fn is_syncing(&self, channel: &str) -> bool {
        self.inner.read().names_pending.contains(channel)
    }

    /// Open a channel and arm its names gate under one write lock, so no
    /// reader can observe the channel open but ungated.
    fn open_and_arm(&self, channel: &str) {
        let mut state = self.inner.write();
        state.channels.entry(channel.to_owned()).or_default();
        state.names_pending.insert(channel.to_owned());
    }

    /// Apply one observed message to the tracked state.
    ///
    /// Called synchronously from dispatch, so events land in wire arrival
    /// order. Membership errors here are logged, not surfaced: an event for
    /// a channel we never joined is unsolicited noise at this layer.
    pub fn apply(&self, message: &Message) {
        match message.command.as_str() {
            "JOIN" => self.on_join(message),
            "PART" => self.on_part(message),
            "KICK" => self.on_kick(message),
            "QUIT" => self.on_quit(message),
            "NAMES" => self.on_names_request(message),
            RPL_NAM_REPLY => self.on_names_reply(message),
            RPL_END_OF_NAMES => self.on_end_of_names(message),
            _ => {}
        }
    }

    fn on_join(&self, message: &Message) {
        // JOIN's channel may ride in a middle param or the trailing.
        let Some(channel) = param_or_trailing(message, 0) else {
            return;
        };
        match Attribution::of(message) {
            Attribution::Ourselves => {
                // Our own join opens the channel and arms the names gate:
                // the server will follow up with a 353/366 exchange.
                self.open_and_arm(channel);
                trace!(channel, "joined, awaiting names");
            }
            Attribution::User(nick) => {
                if let Err(err) = self.user_joins(channel, &[&nick]) {
                    debug!(channel, nick, "ignoring join: {err}");
                }
            }
        }
    }

    fn on_part(&self, message: &Message) {
        let Some(channel) = param_or_trailing(message, 0) else {
            return;
        };
        match Attribution::of(message) {
            Attribution::Ourselves => self.remove_channel(channel),
            Attribution::User(nick) => {
                if let Err(err) = self.user_parts(channel, &nick) {
                    debug!(channel, nick, "ignoring part: {err}");
                }
            }
        }
    }

    fn on_kick(&self, message: &Message) {
        // KICK <channel> <target>. The target leaves regardless of who
        // issued the kick. A kick against the client itself is not
        // recognized here; the tracker never learns its own nick.
        let middles = message.middles();
        let (Some(channel), Some(target)) = (middles.first(), middles.get(1)) else {
            return;
        };
        if let Err(err) = self.user_parts(channel, target) {
            debug!(channel = %channel, target = %target, "ignoring kick: {err}");
        }
    }

    fn on_quit(&self, message: &Message) {
        match Attribution::of(message) {
            // Our own quit: the whole view is gone.
            Attribution::Ourselves => {
                let mut state = self.inner.write();
                state.channels.clear();
                state.names_pending.clear();
            }
            Attribution::User(nick) => self.user_quits(&nick),
        }
    }

    fn on_names_request(&self, message: &Message) {
        // Only our own explicit request arms the gate.
        if Attribution::of(message) != Attribution::Ourselves {
            return;
        }
        for channel in message.middles() {
            for channel in channel.split(',') {
                self.open_and_arm(channel);
            }
        }
    }

    fn on_names_reply(&self, message: &Message) {
        // 353 <me> <symbol> <channel> :[sigil]nick [sigil]nick ...
        let Some(channel) = message.middles().last().cloned() else {
            return;
        };
        let Some(names) = message.trailing.as_deref() else {
            return;
        };

        let mut state = self.inner.write();
        if !state.names_pending.contains(&channel) {
            // Unsolicited or stale reply; applying it would seed partial
            // or duplicate membership.
            trace!(channel, "ignoring names reply with no sync in flight");
            return;
        }
        let members = state.channels.entry(channel).or_default();
        for name in names.split_whitespace() {
            let nick = name.trim_start_matches(STATUS_SIGILS);
            let sigils = &name[..name.len() - nick.len()];
            members.insert(nick.to_owned(), sigils.to_owned());
        }
    }

    fn on_end_of_names(&self, message: &Message) {
        // 366 <me> <channel> :End of /NAMES list
        let Some(channel) = message.middles().last() else {
            return;
        };
        self.inner.write().names_pending.remove(channel);
    }
}

/// Nth middle parameter, falling back to the trailing parameter.
fn param_or_trailing(message: &Message, n: usize) -> Option<&str> {
    message
        .middles()
        .get(n)
        .map(String::as_str)
        .or(message.trailing.as_deref())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg(line: &str) -> Message {
        line.parse().unwrap()
    }

    #[test]
    fn join_then_users() {
        let tracker = ChannelTracker::new();
        tracker.add_channel("#a");
        tracker.user_joins("#a", &["bob"]).unwrap();
        assert_eq!(tracker.users("#a").unwrap(), ["bob"]);
    }

    #[test]
    fn missing_channel_is_a_typed_failure() {
        let tracker = ChannelTracker::new();
        assert_eq!(
            tracker.user_joins("#missing", &["bob"]),
            Err(ChannelError::NotFound("#missing".into()))
        );
        assert_eq!(tracker.channel_count(), 0);

        // Absent channel: error. Present-but-empty channel: empty success.
        assert!(tracker.users("#missing").is_err());
        tracker.add_channel("#empty");
        assert_eq!(tracker.users("#empty").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn add_channel_is_idempotent() {
        let tracker = ChannelTracker::new();
        tracker.add_channel("#a");
        tracker.user_joins("#a", &["bob"]).unwrap();
        tracker.add_channel("#a");
        assert_eq!(tracker.users("#a").unwrap(), ["bob"]);
    }

    #[test]
    fn join_is_idempotent() {
        let tracker = ChannelTracker::new();
        tracker.add_channel("#a");
        tracker.user_joins("#a", &["bob", "bob"]).unwrap();
        tracker.user_joins("#a", &["bob"]).unwrap();
        assert_eq!(tracker.users("#a").unwrap(), ["bob"]);
    }

    #[test]
    fn snapshots_are_sorted() {
        let tracker = ChannelTracker::new();
        for channel in ["#zeta", "#alpha", "#mid"] {
            tracker.add_channel(channel);
        }
        tracker
            .user_joins("#mid", &["carol", "alice", "bob"])
            .unwrap();
        assert_eq!(tracker.channel_names(), ["#alpha", "#mid", "#zeta"]);
        assert_eq!(tracker.users("#mid").unwrap(), ["alice", "bob", "carol"]);
    }

    #[test]
    fn quit_removes_from_every_channel() {
        let tracker = ChannelTracker::new();
        tracker.add_channel("#a");
        tracker.add_channel("#b");
        tracker.user_joins("#a", &["bob", "carol"]).unwrap();
        tracker.user_joins("#b", &["bob"]).unwrap();

        tracker.user_quits("bob");
        assert_eq!(tracker.users("#a").unwrap(), ["carol"]);
        assert_eq!(tracker.users("#b").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn own_join_opens_channel_and_arms_gate() {
        let tracker = ChannelTracker::new();
        tracker.apply(&msg("JOIN #a"));
        assert_eq!(tracker.channel_names(), ["#a"]);
        assert!(tracker.is_syncing("#a"));
    }

    #[test]
    fn names_reply_applies_only_while_pending() {
        let tracker = ChannelTracker::new();
        tracker.add_channel("#a");

        // Gate closed: the reply must not alter membership.
        tracker.apply(&msg(":srv 353 me = #a :bob carol"));
        assert_eq!(tracker.users("#a").unwrap(), Vec::<String>::new());

        // Gate armed by our own join: the reply seeds membership.
        tracker.apply(&msg("JOIN #a"));
        tracker.apply(&msg(":srv 353 me = #a :@carol +bob dave"));
        assert_eq!(tracker.users("#a").unwrap(), ["bob", "carol", "dave"]);

        // End of names closes the gate; later replies are ignored again.
        tracker.apply(&msg(":srv 366 me #a :End of /NAMES list"));
        assert!(!tracker.is_syncing("#a"));
        tracker.apply(&msg(":srv 353 me = #a :mallory"));
        assert_eq!(tracker.users("#a").unwrap(), ["bob", "carol", "dave"]);
    }

    #[test]
    fn names_request_arms_gate_per_channel() {
        let tracker = ChannelTracker::new();
        tracker.apply(&msg("NAMES #a,#b"));
        assert!(tracker.is_syncing("#a"));
        assert!(tracker.is_syncing("#b"));
        assert_eq!(tracker.channel_count(), 2);
    }

    #[test]
    fn attributed_join_and_part_edit_membership() {
        let tracker = ChannelTracker::new();
        tracker.apply(&msg("JOIN #a"));
        tracker.apply(&msg(":bob!b@h JOIN #a"));
        tracker.apply(&msg(":carol!c@h JOIN :#a"));
        assert_eq!(tracker.users("#a").unwrap(), ["bob", "carol"]);

        tracker.apply(&msg(":bob!b@h PART #a"));
        assert_eq!(tracker.users("#a").unwrap(), ["carol"]);
    }

    #[test]
    fn own_part_drops_channel_and_gate() {
        let tracker = ChannelTracker::new();
        tracker.apply(&msg("JOIN #a"));
        tracker.apply(&msg("PART #a"));
        assert!(tracker.users("#a").is_err());
        assert!(!tracker.is_syncing("#a"));
    }

    #[test]
    fn kick_removes_target() {
        let tracker = ChannelTracker::new();
        tracker.apply(&msg("JOIN #a"));
        tracker.apply(&msg(":bob!b@h JOIN #a"));
        tracker.apply(&msg(":op!o@h KICK #a bob :flooding"));
        assert_eq!(tracker.users("#a").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn own_quit_clears_everything() {
        let tracker = ChannelTracker::new();
        tracker.apply(&msg("JOIN #a"));
        tracker.apply(&msg("JOIN #b"));
        tracker.apply(&msg("QUIT :leaving"));
        assert_eq!(tracker.channel_count(), 0);
        assert!(!tracker.is_syncing("#a"));
    }

    #[test]
    fn attributed_quit_removes_that_nick() {
        let tracker = ChannelTracker::new();
        tracker.apply(&msg("JOIN #a"));
        tracker.apply(&msg(":bob!b@h JOIN #a"));
        tracker.apply(&msg(":wallyworld!~quassel@1.2.3.4 QUIT :bye"));
        assert_eq!(tracker.users("#a").unwrap(), ["bob"]);
        tracker.apply(&msg(":bob!b@h QUIT :gone"));
        assert_eq!(tracker.users("#a").unwrap(), Vec::<String>::new());
    }

    #[test]
    fn channel_never_observed_open_but_ungated() {
        let tracker = Arc::new(ChannelTracker::new());
        std::thread::scope(|scope| {
            {
                let tracker = Arc::clone(&tracker);
                scope.spawn(move || {
                    for _ in 0..1000 {
                        // Opening and arming happen under one write lock,
                        // so an open channel always has its gate armed.
                        if tracker.channel_names().iter().any(|c| c == "#a") {
                            assert!(tracker.is_syncing("#a"));
                        }
                    }
                });
            }
            let tracker = Arc::clone(&tracker);
            scope.spawn(move || tracker.apply(&msg("JOIN #a")));
        });
    }

    #[test]
    fn concurrent_reads_and_writes() {
        let tracker = Arc::new(ChannelTracker::new());
        tracker.add_channel("#a");
        tracker.user_joins("#a", &["bob"]).unwrap();

        std::thread::scope(|scope| {
            for _ in 0..2 {
                let tracker = Arc::clone(&tracker);
                scope.spawn(move || {
                    for _ in 0..1000 {
                        let users = tracker.users("#a").unwrap();
                        // Either pre- or post-join state, never torn.
                        assert!(users == ["bob"] || users == ["bob", "dave"]);
                    }
                });
            }
            let tracker = Arc::clone(&tracker);
            scope.spawn(move || {
                tracker.user_joins("#a", &["dave"]).unwrap();
            });
        });

        assert_eq!(tracker.users("#a").unwrap(), ["bob", "dave"]);
    }
}
