//! Lookups into the chat platform: which team a channel belongs to and
//! whether a session is on a mobile client.

use crate::models::{Channel, Session};
use crate::{Error, Result};
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{PoisonError, RwLock};

/// Default number of channels and of sessions kept by [`StaticDirectory`].
pub const DEFAULT_DIRECTORY_CAPACITY: usize = 10_000;

/// Resolves channels.
pub trait ChannelResolver: Send + Sync {
    /// Returns the channel, or [`Error::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns an error if the channel is unknown or the lookup fails.
    fn get_channel(&self, channel_id: &str) -> Result<Channel>;
}

/// Resolves client sessions.
pub trait SessionResolver: Send + Sync {
    /// Returns the session, or [`Error::NotFound`].
    ///
    /// # Errors
    ///
    /// Returns an error if the session is unknown or the lookup fails.
    fn get_session(&self, session_id: &str) -> Result<Session>;
}

/// In-memory channel and session directory.
///
/// Each map is bounded; registering past capacity evicts the least recently
/// registered entry.
#[derive(Debug)]
pub struct StaticDirectory {
    channels: RwLock<LruCache<String, Channel>>,
    sessions: RwLock<LruCache<String, Session>>,
}

impl Default for StaticDirectory {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_DIRECTORY_CAPACITY)
    }
}

impl StaticDirectory {
    /// Creates an empty directory with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty directory holding at most `capacity` channels and
    /// `capacity` sessions. Zero is treated as one.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            channels: RwLock::new(LruCache::new(capacity)),
            sessions: RwLock::new(LruCache::new(capacity)),
        }
    }

    /// Registers (or replaces) a channel.
    pub fn add_channel(&self, channel: Channel) {
        self.channels
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .put(channel.id.clone(), channel);
    }

    /// Registers (or replaces) a session.
    pub fn add_session(&self, session: Session) {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .put(session.id.clone(), session);
    }

    /// Number of registered channels.
    pub fn channel_count(&self) -> usize {
        self.channels.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Number of registered sessions.
    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }
}

impl ChannelResolver for StaticDirectory {
    fn get_channel(&self, channel_id: &str) -> Result<Channel> {
        self.channels
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peek(channel_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("channel {channel_id}")))
    }
}

impl SessionResolver for StaticDirectory {
    fn get_session(&self, session_id: &str) -> Result<Session> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .peek(session_id)
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("session {session_id}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_registered_and_missing() {
        let directory = StaticDirectory::new();
        directory.add_channel(Channel {
            id: "c1".into(),
            team_id: "t1".into(),
        });
        directory.add_session(Session {
            id: "s1".into(),
            user_id: "u1".into(),
            is_mobile_app: true,
        });

        assert_eq!(directory.get_channel("c1").unwrap().team_id, "t1");
        assert!(directory.get_session("s1").unwrap().is_mobile_app);
        assert!(matches!(directory.get_channel("c2"), Err(Error::NotFound(_))));
        assert!(matches!(directory.get_session("s2"), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_capacity_evicts_oldest_registration() {
        let directory = StaticDirectory::with_capacity(2);
        for id in ["c1", "c2", "c3"] {
            directory.add_channel(Channel {
                id: id.into(),
                team_id: "t1".into(),
            });
            directory.add_session(Session {
                id: id.into(),
                user_id: "u1".into(),
                is_mobile_app: false,
            });
        }

        assert_eq!(directory.channel_count(), 2);
        assert_eq!(directory.session_count(), 2);
        assert!(matches!(directory.get_channel("c1"), Err(Error::NotFound(_))));
        assert!(matches!(directory.get_session("c1"), Err(Error::NotFound(_))));
        assert!(directory.get_channel("c3").is_ok());
    }

    #[test]
    fn test_reregistering_refreshes_entry() {
        let directory = StaticDirectory::with_capacity(2);
        let channel = |id: &str| Channel {
            id: id.into(),
            team_id: "t1".into(),
        };
        directory.add_channel(channel("c1"));
        directory.add_channel(channel("c2"));
        directory.add_channel(channel("c1"));
        directory.add_channel(channel("c3"));

        assert!(directory.get_channel("c1").is_ok());
        assert!(matches!(directory.get_channel("c2"), Err(Error::NotFound(_))));
    }
}
