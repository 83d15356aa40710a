//! In-process gateway for local dry runs.
//!
//! Keeps per-channel transcripts in memory and prints deliveries to stdout.
//! Every channel name resolves; the daemon's stdin loop feeds user messages
//! in through [`ConsoleGateway::push_user_message`].

use crate::error::Result;
use crate::gateway::traits::ChatGateway;
use crate::inbound::InboundEvent;
use crate::{ChannelId, TranscriptMessage};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

/// Transcript entries retained per channel.
const TRANSCRIPT_CAPACITY: usize = 50;

#[derive(Default)]
struct Inner {
    ids: HashMap<String, ChannelId>,
    names: HashMap<ChannelId, String>,
    transcripts: HashMap<ChannelId, VecDeque<TranscriptMessage>>,
}

impl Inner {
    fn channel_id(&mut self, name: &str) -> ChannelId {
        if let Some(id) = self.ids.get(name) {
            return id.clone();
        }
        let id: ChannelId = Arc::from(format!("console:{name}").as_str());
        self.ids.insert(name.to_string(), id.clone());
        self.names.insert(id.clone(), name.to_string());
        id
    }

    fn push(&mut self, channel_id: &ChannelId, message: TranscriptMessage) {
        let transcript = self.transcripts.entry(channel_id.clone()).or_default();
        if transcript.len() == TRANSCRIPT_CAPACITY {
            transcript.pop_front();
        }
        transcript.push_back(message);
    }
}

/// Gateway backed by in-memory transcripts and stdout.
#[derive(Default)]
pub struct ConsoleGateway {
    inner: Mutex<Inner>,
}

impl ConsoleGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a user message and return the inbound event it produces.
    pub fn push_user_message(&self, channel_name: &str, author: &str, text: &str) -> InboundEvent {
        let mut inner = self.inner.lock().expect("console gateway poisoned");
        let channel_id = inner.channel_id(channel_name);
        inner.push(
            &channel_id,
            TranscriptMessage {
                speaker_id: author.to_string(),
                speaker_name: author.to_string(),
                is_bot: false,
                text: text.to_string(),
                timestamp: chrono::Utc::now(),
            },
        );
        let (mentioned_user_ids, mentioned_role_ids) = InboundEvent::parse_mentions(text);
        InboundEvent {
            channel_id,
            channel_name: channel_name.to_string(),
            author_id: author.to_string(),
            author_name: author.to_string(),
            author_is_bot: false,
            content: text.to_string(),
            mentioned_user_ids,
            mentioned_role_ids,
        }
    }
}

impl ChatGateway for ConsoleGateway {
    fn name(&self) -> &str {
        "console"
    }

    async fn fetch_recent_messages(
        &self,
        channel_id: &ChannelId,
        limit: usize,
    ) -> Result<Vec<TranscriptMessage>> {
        let inner = self.inner.lock().expect("console gateway poisoned");
        let transcript = match inner.transcripts.get(channel_id) {
            Some(transcript) => transcript,
            None => return Ok(Vec::new()),
        };
        let skip = transcript.len().saturating_sub(limit);
        Ok(transcript.iter().skip(skip).cloned().collect())
    }

    async fn send_typing(&self, channel_id: &ChannelId) -> Result<()> {
        tracing::debug!(channel = %channel_id, "typing");
        Ok(())
    }

    async fn send_message(&self, channel_id: &ChannelId, text: &str) -> Result<()> {
        let name = {
            let mut inner = self.inner.lock().expect("console gateway poisoned");
            let name = inner
                .names
                .get(channel_id)
                .cloned()
                .unwrap_or_else(|| channel_id.to_string());
            inner.push(
                channel_id,
                TranscriptMessage {
                    speaker_id: "console-bot".to_string(),
                    speaker_name: "bot".to_string(),
                    is_bot: true,
                    text: text.to_string(),
                    timestamp: chrono::Utc::now(),
                },
            );
            name
        };
        println!("[{name}] {text}");
        Ok(())
    }

    async fn resolve_channel_by_name(&self, name: &str) -> Result<ChannelId> {
        let mut inner = self.inner.lock().expect("console gateway poisoned");
        Ok(inner.channel_id(name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::traits::ChatGateway;

    #[tokio::test]
    async fn resolves_stable_channel_ids() {
        let gateway = ConsoleGateway::new();
        let first = gateway.resolve_channel_by_name("general").await.unwrap();
        let second = gateway.resolve_channel_by_name("general").await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn fetch_returns_recent_messages_oldest_first() {
        let gateway = ConsoleGateway::new();
        let channel_id = gateway.resolve_channel_by_name("general").await.unwrap();
        for i in 0..12 {
            gateway.push_user_message("general", "alice", &format!("msg {i}"));
        }
        let transcript = gateway.fetch_recent_messages(&channel_id, 10).await.unwrap();
        assert_eq!(transcript.len(), 10);
        assert_eq!(transcript.first().unwrap().text, "msg 2");
        assert_eq!(transcript.last().unwrap().text, "msg 11");
    }

    #[tokio::test]
    async fn sent_messages_land_in_transcript_as_bot() {
        let gateway = ConsoleGateway::new();
        let channel_id = gateway.resolve_channel_by_name("general").await.unwrap();
        gateway.send_message(&channel_id, "hello").await.unwrap();
        let transcript = gateway.fetch_recent_messages(&channel_id, 10).await.unwrap();
        assert_eq!(transcript.len(), 1);
        assert!(transcript[0].is_bot);
        assert_eq!(transcript[0].text, "hello");
    }

    #[test]
    fn push_user_message_extracts_mentions() {
        let gateway = ConsoleGateway::new();
        let event = gateway.push_user_message("general", "alice", "hi <@111> and <@&900>");
        assert_eq!(event.mentioned_user_ids, vec!["111"]);
        assert_eq!(event.mentioned_role_ids, vec!["900"]);
    }
}
