//! Message types for request payloads.

use crate::Role;
use serde::{Deserialize, Serialize};

/// One message in a request payload.
///
/// The orchestration layer treats message content as opaque text; it only
/// needs enough structure to estimate token counts and hand the payload to
/// a backend unchanged.
///
/// # Examples
///
/// ```
/// use maestro_core::{Message, Role};
///
/// let message = Message {
///     role: Role::User,
///     content: "Hello!".to_string(),
/// };
///
/// assert_eq!(message.role, Role::User);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    pub content: String,
}

impl Message {
    /// Create a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    /// Create a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Create an assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
