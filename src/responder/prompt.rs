//! Prompt construction for reply generation.

use crate::agents::AgentRegistry;
use crate::config::AgentConfig;
use crate::llm::PromptMessage;
use crate::{TranscriptMessage, Trigger};

/// Display label for a transcript entry. Bot authors that match a configured
/// agent get that agent's display name so labels stay consistent with
/// mention rewriting; everyone else keeps the platform display name.
fn speaker_label(registry: &AgentRegistry, message: &TranscriptMessage) -> String {
    if message.is_bot {
        if let Some(agent) = registry.by_platform_id(&message.speaker_id) {
            return agent.name.clone();
        }
    }
    message.speaker_name.clone()
}

/// Build the full prompt for one candidate generation.
///
/// Layout: persona system message listing the distinct speakers, one message
/// per transcript entry with a `[Name]` label and rewritten mentions, the
/// triggering message as a final user turn for real inbound triggers, and a
/// closing instruction demanding a natural, non-repetitive continuation.
pub fn build_prompt(
    registry: &AgentRegistry,
    agent: &AgentConfig,
    transcript: &[TranscriptMessage],
    trigger: &Trigger,
) -> Vec<PromptMessage> {
    let mut speakers: Vec<String> = Vec::new();
    for message in transcript {
        let label = speaker_label(registry, message);
        if !speakers.contains(&label) {
            speakers.push(label);
        }
    }
    if let Trigger::IncomingMessage { author_name, .. } = trigger {
        if !speakers.contains(author_name) {
            speakers.push(author_name.clone());
        }
    }

    let mut messages = Vec::with_capacity(transcript.len() + 3);
    messages.push(PromptMessage::system(format!(
        "{}\n\nOther people in this conversation include: {}. Pay attention to \
         who is speaking and respond appropriately.",
        registry.system_prompt_for(agent),
        speakers.join(", ")
    )));

    for message in transcript {
        let content = format!(
            "[{}] {}",
            speaker_label(registry, message),
            registry.rewrite_mentions(&message.text)
        );
        messages.push(if message.is_bot {
            PromptMessage::assistant(content)
        } else {
            PromptMessage::user(content)
        });
    }

    if let Trigger::IncomingMessage {
        author_name,
        content,
        ..
    } = trigger
    {
        messages.push(PromptMessage::user(format!(
            "[{}] {}",
            author_name,
            registry.rewrite_mentions(content).trim()
        )));
    }

    messages.push(PromptMessage::system(format!(
        "Respond naturally as {} would in this conversation. Be engaging, \
         authentic, and conversational at all times. You MUST respond \
         naturally, and CRITICAL: you MUST NOT repeat yourself or others.",
        agent.name
    )));

    messages
}
