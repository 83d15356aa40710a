//! Response orchestration: the reply-burst pipeline.
//!
//! A trigger (idle timeout or inbound message) produces a burst of 1..N
//! replies, strictly sequential. Each iteration fetches fresh history,
//! generates a candidate, rejects empty or duplicate text with a single
//! higher-temperature retry, applies configured substitutions, and delivers
//! with fixed pacing between sends. A provider failure aborts the whole
//! burst; the caller decides what the user sees.

pub mod prompt;

use crate::agents::AgentRegistry;
use crate::config::{AgentConfig, Substitution};
use crate::error::Result;
use crate::gateway::ChatGatewayDyn;
use crate::llm::CompletionProviderDyn;
use crate::recent::RecentSpeakers;
use crate::{ChannelId, TranscriptMessage, Trigger};
use regex::Regex;
use std::collections::HashSet;
use std::sync::{Arc, LazyLock, Mutex};
use std::time::Duration;

/// Transcript entries fetched for prompting and duplicate comparison.
const HISTORY_LIMIT: usize = 10;

/// Sampling temperature for the first attempt of each iteration.
const BASE_TEMPERATURE: f32 = 0.7;

/// Sampling temperature for the single retry after a rejected candidate.
const RETRY_TEMPERATURE: f32 = 1.2;

/// Bracketed speaker prefix, e.g. `[Nova] `, anywhere in a candidate.
static NAME_PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[[^\]]+\]\s*").expect("hardcoded regex"));

/// Produces and delivers reply bursts. One instance per process.
pub struct Responder {
    gateway: Arc<dyn ChatGatewayDyn>,
    provider: Arc<dyn CompletionProviderDyn>,
    registry: Arc<AgentRegistry>,
    recent: Arc<RecentSpeakers>,
    substitutions: Vec<Substitution>,
    pacing: Duration,
    busy: Arc<Mutex<HashSet<ChannelId>>>,
}

/// Clears the channel's busy flag when the burst ends, even on an early
/// error return.
struct BurstGuard {
    busy: Arc<Mutex<HashSet<ChannelId>>>,
    channel_id: ChannelId,
}

impl Drop for BurstGuard {
    fn drop(&mut self) {
        if let Ok(mut busy) = self.busy.lock() {
            busy.remove(&self.channel_id);
        }
    }
}

/// A generated candidate after cleaning and validity checks. Consumed within
/// one burst iteration.
#[derive(Debug)]
struct PendingReply {
    cleaned: String,
    is_empty: bool,
    is_duplicate: bool,
}

impl PendingReply {
    fn evaluate(raw: &str, transcript: &[TranscriptMessage], registry: &AgentRegistry) -> Self {
        let cleaned = NAME_PREFIX_RE.replace_all(raw, "").trim().to_string();
        let is_empty = cleaned.is_empty();
        let lowered = cleaned.to_lowercase();
        let is_duplicate = !is_empty
            && transcript.iter().any(|message| {
                registry
                    .rewrite_mentions(&message.text)
                    .trim()
                    .to_lowercase()
                    == lowered
            });
        Self {
            cleaned,
            is_empty,
            is_duplicate,
        }
    }

    /// Rejection reason, empty taking precedence over duplicate.
    fn rejection(&self) -> Option<&'static str> {
        if self.is_empty {
            Some("empty")
        } else if self.is_duplicate {
            Some("duplicate")
        } else {
            None
        }
    }
}

impl Responder {
    pub fn new(
        gateway: Arc<dyn ChatGatewayDyn>,
        provider: Arc<dyn CompletionProviderDyn>,
        registry: Arc<AgentRegistry>,
        recent: Arc<RecentSpeakers>,
        substitutions: Vec<Substitution>,
        pacing: Duration,
    ) -> Self {
        Self {
            gateway,
            provider,
            registry,
            recent,
            substitutions,
            pacing,
            busy: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Mark a channel as mid-burst. None when a burst is already running.
    fn try_begin(&self, channel_id: &ChannelId) -> Option<BurstGuard> {
        let mut busy = self.busy.lock().expect("busy set poisoned");
        if !busy.insert(channel_id.clone()) {
            return None;
        }
        Some(BurstGuard {
            busy: Arc::clone(&self.busy),
            channel_id: channel_id.clone(),
        })
    }

    /// Produce and deliver a reply burst for a trigger.
    ///
    /// Serialized per channel: a trigger arriving while the channel is
    /// already mid-burst is dropped with a log line. Different channels run
    /// independently.
    pub async fn respond(&self, trigger: Trigger, agent_index: usize, burst_size: u32) -> Result<()> {
        let channel_id = trigger.channel_id().clone();
        let Some(_guard) = self.try_begin(&channel_id) else {
            tracing::warn!(
                channel = %trigger.channel_name(),
                trigger = trigger.label(),
                "burst already in flight, dropping trigger"
            );
            return Ok(());
        };

        let agent = self
            .registry
            .get(agent_index)
            .ok_or_else(|| anyhow::anyhow!("unknown agent index {agent_index}"))?;

        for iteration in 0..burst_size {
            self.gateway.send_typing(&channel_id).await?;
            let transcript = self.fetch_transcript(&channel_id).await;

            let candidate = self
                .generate_candidate(&trigger, agent, &transcript, BASE_TEMPERATURE)
                .await?;

            let accepted = match candidate.rejection() {
                None => Some(candidate.cleaned),
                Some(reason) => {
                    tracing::debug!(
                        channel = %trigger.channel_name(),
                        agent = %agent.name,
                        reason,
                        "candidate rejected, retrying at higher temperature"
                    );
                    let retry = self
                        .generate_candidate(&trigger, agent, &transcript, RETRY_TEMPERATURE)
                        .await?;
                    match retry.rejection() {
                        None => Some(retry.cleaned),
                        Some(retry_reason) => {
                            tracing::info!(
                                channel = %trigger.channel_name(),
                                agent = %agent.name,
                                reason = retry_reason,
                                "retry also rejected, skipping iteration"
                            );
                            None
                        }
                    }
                }
            };

            if let Some(text) = accepted {
                let text = self.apply_substitutions(&text);
                self.gateway.send_message(&channel_id, &text).await?;
                self.recent.record(&channel_id, &agent.id);
                tracing::info!(
                    channel = %trigger.channel_name(),
                    trigger = trigger.label(),
                    agent = %agent.name,
                    reply = %text,
                    "reply delivered"
                );
            }

            // Inter-message pacing, skipped after the final iteration.
            if iteration + 1 < burst_size {
                tokio::time::sleep(self.pacing).await;
            }
        }

        Ok(())
    }

    async fn generate_candidate(
        &self,
        trigger: &Trigger,
        agent: &AgentConfig,
        transcript: &[TranscriptMessage],
        temperature: f32,
    ) -> Result<PendingReply> {
        let messages = prompt::build_prompt(&self.registry, agent, transcript, trigger);
        let raw = self
            .provider
            .complete(&messages, &agent.model, temperature)
            .await?;
        tracing::debug!(agent = %agent.name, temperature, raw = %raw, "candidate generated");
        Ok(PendingReply::evaluate(&raw, transcript, &self.registry))
    }

    /// Fetch the recent transcript; a failed fetch degrades to an empty
    /// transcript instead of aborting the burst.
    async fn fetch_transcript(&self, channel_id: &ChannelId) -> Vec<TranscriptMessage> {
        match self
            .gateway
            .fetch_recent_messages(channel_id, HISTORY_LIMIT)
            .await
        {
            Ok(messages) => messages,
            Err(error) => {
                tracing::warn!(%error, "history fetch failed, prompting with empty transcript");
                Vec::new()
            }
        }
    }

    /// Apply the configured substitutions in order, each global and
    /// case-insensitive.
    fn apply_substitutions(&self, text: &str) -> String {
        let mut out = text.to_string();
        for rule in &self.substitutions {
            out = rule
                .pattern
                .replace_all(&out, rule.replacement.as_str())
                .into_owned();
        }
        out
    }
}
