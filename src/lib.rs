//! Banterbot: automated conversational agents for a shared chat channel.
//!
//! The core decides *when* an agent speaks (idle-channel timers, random
//! chance, direct mentions) and *how* a burst of replies is produced,
//! validated, and delivered. The chat platform and the completion provider
//! are collaborators behind traits; see [`gateway`] and [`llm`].

pub mod activity;
pub mod agents;
pub mod config;
pub mod error;
pub mod gateway;
pub mod inbound;
pub mod llm;
pub mod recent;
pub mod responder;

pub use error::{Error, Result};

use std::sync::Arc;

/// Channel identifier type.
pub type ChannelId = Arc<str>;

/// One fetched chat-history entry, oldest-first in a transcript.
///
/// Used only for prompt construction and duplicate comparison; never
/// persisted.
#[derive(Debug, Clone)]
pub struct TranscriptMessage {
    pub speaker_id: String,
    pub speaker_name: String,
    pub is_bot: bool,
    pub text: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

/// The event that starts a reply burst.
///
/// An idle timeout and a real inbound message both reduce to this one value
/// consumed by the responder; the variant selects the prompt-construction
/// path and the log label.
#[derive(Debug, Clone)]
pub enum Trigger {
    /// A watched channel stayed silent past its sampled idle delay.
    Timer {
        channel_id: ChannelId,
        channel_name: String,
    },
    /// A real message arrived in a channel.
    IncomingMessage {
        channel_id: ChannelId,
        channel_name: String,
        author_id: String,
        author_name: String,
        content: String,
        /// The triggering message directly mentions the responding agent.
        mentions_agent: bool,
        /// The triggering message mentions one of the agent's configured roles.
        mentions_role: bool,
    },
}

impl Trigger {
    pub fn channel_id(&self) -> &ChannelId {
        match self {
            Trigger::Timer { channel_id, .. } => channel_id,
            Trigger::IncomingMessage { channel_id, .. } => channel_id,
        }
    }

    pub fn channel_name(&self) -> &str {
        match self {
            Trigger::Timer { channel_name, .. } => channel_name,
            Trigger::IncomingMessage { channel_name, .. } => channel_name,
        }
    }

    /// Log label derived from the trigger variant.
    pub fn label(&self) -> &'static str {
        match self {
            Trigger::Timer { .. } => "Timer",
            Trigger::IncomingMessage {
                mentions_agent: true,
                ..
            } => "Mention",
            Trigger::IncomingMessage { .. } => "Random",
        }
    }
}
