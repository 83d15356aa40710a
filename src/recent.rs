//! Recent-speaker tracking per channel.
//!
//! A short bounded history of which agent spoke last in each channel. The
//! inbound router uses the boolean query to scale down an agent's random
//! response chance so it does not keep answering itself.

use crate::ChannelId;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

/// Bounded history length per channel.
const CAPACITY: usize = 5;

#[derive(Debug, Clone)]
struct SpeakerEntry {
    agent_id: String,
    #[allow(dead_code)]
    at: DateTime<Utc>,
}

/// Per-channel ring of the last few bot replies.
#[derive(Debug, Default)]
pub struct RecentSpeakers {
    history: Mutex<HashMap<ChannelId, VecDeque<SpeakerEntry>>>,
}

impl RecentSpeakers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record that an agent just spoke in a channel, evicting the oldest
    /// entry beyond capacity.
    pub fn record(&self, channel_id: &ChannelId, agent_id: &str) {
        let mut history = self.history.lock().expect("speaker history poisoned");
        let entries = history.entry(channel_id.clone()).or_default();
        if entries.len() == CAPACITY {
            entries.pop_front();
        }
        entries.push_back(SpeakerEntry {
            agent_id: agent_id.to_string(),
            at: Utc::now(),
        });
    }

    /// Whether the agent appears in the channel's bounded history.
    pub fn has_spoken_recently(&self, channel_id: &ChannelId, agent_id: &str) -> bool {
        let history = self.history.lock().expect("speaker history poisoned");
        history
            .get(channel_id)
            .is_some_and(|entries| entries.iter().any(|entry| entry.agent_id == agent_id))
    }
}
