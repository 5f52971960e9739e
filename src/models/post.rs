//! Chat messages and the platform context around them.

use serde::{Deserialize, Serialize};

/// Prefix shared by all platform-generated post types.
pub const SYSTEM_POST_TYPE_PREFIX: &str = "system_";

/// A message posted to a channel.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Post {
    /// Post identifier.
    pub id: String,
    /// Channel the post was made in.
    pub channel_id: String,
    /// Author.
    pub user_id: String,
    /// Thread root, empty for top-level posts.
    #[serde(default)]
    pub root_id: String,
    /// Message text.
    pub message: String,
    /// Post type, empty for regular user posts.
    #[serde(default, rename = "type")]
    pub post_type: String,
}

impl Post {
    /// Creates a regular user post.
    #[must_use]
    pub fn new(
        id: impl Into<String>,
        channel_id: impl Into<String>,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            channel_id: channel_id.into(),
            user_id: user_id.into(),
            message: message.into(),
            ..Self::default()
        }
    }

    /// Places the post in a thread.
    #[must_use]
    pub fn in_thread(mut self, root_id: impl Into<String>) -> Self {
        self.root_id = root_id.into();
        self
    }

    /// Sets the post type.
    #[must_use]
    pub fn with_type(mut self, post_type: impl Into<String>) -> Self {
        self.post_type = post_type.into();
        self
    }

    /// Returns true for platform-generated posts (joins, header changes, ...).
    #[must_use]
    pub fn is_system_message(&self) -> bool {
        self.post_type.starts_with(SYSTEM_POST_TYPE_PREFIX)
    }
}

/// A channel and the team it belongs to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Channel {
    /// Channel identifier.
    pub id: String,
    /// Owning team.
    pub team_id: String,
}

/// A client session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Session identifier.
    pub id: String,
    /// Session owner.
    pub user_id: String,
    /// Whether the session belongs to the mobile app.
    #[serde(default)]
    pub is_mobile_app: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_system_message_detection() {
        let post = Post::new("p", "c", "u", "joined");
        assert!(!post.is_system_message());
        assert!(post.clone().with_type("system_join_channel").is_system_message());
        assert!(!post.with_type("custom_alert").is_system_message());
    }

    #[test]
    fn test_post_type_deserializes_from_type_field() {
        let post: Post = serde_json::from_str(
            r#"{"id":"p","channel_id":"c","user_id":"u","message":"m","type":"system_add_to_channel"}"#,
        )
        .unwrap();
        assert!(post.is_system_message());
        assert!(post.root_id.is_empty());
    }
}
