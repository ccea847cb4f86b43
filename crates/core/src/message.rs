//! Message types exchanged with an oracle backend.
//!
//! A request to the oracle is a short ordered list of messages: a system
//! instruction followed by one user turn, which may carry image attachments
//! (roster photos, session screenshots).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The role of a message sender.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The requesting side (Rollcall itself)
    User,
    /// The oracle's reply
    Assistant,
    /// Fixed instructions for the oracle
    System,
}

/// A raw image attached to a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    /// Where the image came from (file name), for logs and error messages
    pub source: String,

    /// IANA media type, e.g. `image/png`
    pub media_type: String,

    /// Raw bytes; providers encode them for the wire
    pub data: Vec<u8>,
}

impl ImagePayload {
    pub fn new(source: impl Into<String>, media_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            source: source.into(),
            media_type: media_type.into(),
            data,
        }
    }

    /// Guess the media type from a file extension. Returns `None` for
    /// formats vision backends do not accept.
    pub fn media_type_for_extension(ext: &str) -> Option<&'static str> {
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some("image/png"),
            "jpg" | "jpeg" => Some("image/jpeg"),
            "gif" => Some("image/gif"),
            "webp" => Some("image/webp"),
            _ => None,
        }
    }
}

/// A single message in an oracle request or response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    /// Unique message ID
    pub id: String,

    /// Who sent this message
    pub role: Role,

    /// The text content
    pub content: String,

    /// Attached images (user messages only)
    #[serde(skip)]
    pub images: Vec<ImagePayload>,

    /// Timestamp
    pub timestamp: DateTime<Utc>,
}

impl Message {
    fn with_role(role: Role, content: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            role,
            content: content.into(),
            images: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    /// Create a new user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a user message carrying one image.
    pub fn user_with_image(content: impl Into<String>, image: ImagePayload) -> Self {
        let mut msg = Self::with_role(Role::User, content);
        msg.images.push(image);
        msg
    }

    /// Create a new assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Rough token estimate (4 chars ≈ 1 token); images are not counted.
    pub fn estimated_tokens(&self) -> usize {
        self.content.len() / 4
    }
}
