//! Outbound collaborators invoked by the moderation lifecycle. Both are synchronous and
//! never retried automatically.

use super::domain::{ChannelPostRef, OwnerId};

/// Delivers a message to a submission owner.
pub trait Notifier: Send + Sync {
    fn send(&self, recipient: &OwnerId, content: &str) -> Result<(), NotifyError>;
}

/// Posts approved listings to the public distribution channel.
pub trait ChannelPublisher: Send + Sync {
    fn publish(&self, channel: &str, content: &str) -> Result<ChannelPostRef, PublishError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotifyError {
    #[error("notification transport unavailable: {0}")]
    Transport(String),
    #[error("recipient {0} cannot be reached")]
    Unreachable(OwnerId),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PublishError {
    #[error("channel {channel} unreachable: {reason}")]
    Unreachable { channel: String, reason: String },
    #[error("channel {channel} rejected the post: {reason}")]
    Rejected { channel: String, reason: String },
}
