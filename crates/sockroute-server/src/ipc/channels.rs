use std::collections::HashSet;

use dashmap::{DashMap, DashSet};

use crate::ipc::types::ConnectionId;

/// Process-wide set of broadcastable channel names.
#[derive(Debug, Default)]
pub struct ChannelRegistry {
    names: DashSet<String>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self { names: DashSet::new() }
    }

    pub fn create(&self, channel: &str) {
        self.names.insert(channel.to_string());
    }

    pub fn delete(&self, channel: &str) {
        self.names.remove(channel);
    }

    pub fn exists(&self, channel: &str) -> bool {
        self.names.contains(channel)
    }
}

/// Subscriptions, indexed both ways so broadcast and disconnect are cheap.
///
/// Keyed by channel name only. Deleting a channel from the
/// [`ChannelRegistry`] leaves its subscribers in place, so re-creating the
/// name makes them members again.
#[derive(Debug, Default)]
pub struct Membership {
    members: DashMap<String, HashSet<ConnectionId>>,
    joined: DashMap<ConnectionId, HashSet<String>>,
}

impl Membership {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn join(&self, channel: &str, conn: ConnectionId) {
        self.members.entry(channel.to_owned()).or_default().insert(conn);
        self.joined.entry(conn).or_default().insert(channel.to_owned());
    }

    pub fn leave(&self, channel: &str, conn: ConnectionId) {
        self.members.remove_if_mut(channel, |_, conns| {
            conns.remove(&conn);
            conns.is_empty()
        });
        self.joined.remove_if_mut(&conn, |_, channels| {
            channels.remove(channel);
            channels.is_empty()
        });
    }

    pub fn members_of(&self, channel: &str) -> Vec<ConnectionId> {
        self.members
            .get(channel)
            .map(|conns| conns.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Sorted channel names `conn` is subscribed to.
    pub fn channels_of(&self, conn: ConnectionId) -> Vec<String> {
        let mut channels: Vec<String> = self
            .joined
            .get(&conn)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        channels.sort_unstable();
        channels
    }

    /// Drop every subscription held by `conn`.
    pub fn cleanup_connection(&self, conn: ConnectionId) {
        let Some((_, channels)) = self.joined.remove(&conn) else {
            return;
        };
        for channel in &channels {
            self.members.remove_if_mut(channel.as_str(), |_, conns| {
                conns.remove(&conn);
                conns.is_empty()
            });
        }
    }
}
