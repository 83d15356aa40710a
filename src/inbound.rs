//! Inbound-event routing: decides which agents respond to a real message.
//!
//! Every inbound message resets the channel's idle timer. Bot-authored
//! messages never trigger responses. For everyone else, an agent responds
//! when it is directly mentioned (user or role mention), or by random
//! chance in watched channels, scaled down when the agent itself spoke
//! recently.

use crate::activity::SilenceScheduler;
use crate::agents::AgentRegistry;
use crate::gateway::ChatGatewayDyn;
use crate::recent::RecentSpeakers;
use crate::responder::Responder;
use crate::{ChannelId, Trigger};
use rand::Rng;
use regex::Regex;
use std::sync::{Arc, LazyLock};

/// User-mention token, e.g. `<@123>` or `<@!123>`.
static USER_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("hardcoded regex"));

/// Role-mention token, e.g. `<@&900>`.
static ROLE_MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@&(\d+)>").expect("hardcoded regex"));

/// Message shown when an inbound-triggered burst fails.
const APOLOGY: &str = "Sorry, I encountered an error while processing your request.";

/// A normalized inbound chat message event.
#[derive(Debug, Clone)]
pub struct InboundEvent {
    pub channel_id: ChannelId,
    pub channel_name: String,
    pub author_id: String,
    pub author_name: String,
    pub author_is_bot: bool,
    pub content: String,
    /// Platform user ids mentioned by the message.
    pub mentioned_user_ids: Vec<String>,
    /// Platform role ids mentioned by the message.
    pub mentioned_role_ids: Vec<String>,
}

impl InboundEvent {
    /// Extract user and role mention tokens from raw message content.
    pub fn parse_mentions(content: &str) -> (Vec<String>, Vec<String>) {
        let users = USER_MENTION_RE
            .captures_iter(content)
            .map(|caps| caps[1].to_string())
            .collect();
        let roles = ROLE_MENTION_RE
            .captures_iter(content)
            .map(|caps| caps[1].to_string())
            .collect();
        (users, roles)
    }
}

/// Routes inbound events to the scheduler and the responder.
pub struct EventRouter {
    scheduler: Arc<SilenceScheduler>,
    responder: Arc<Responder>,
    registry: Arc<AgentRegistry>,
    recent: Arc<RecentSpeakers>,
    gateway: Arc<dyn ChatGatewayDyn>,
    random_response_rate: f64,
    recent_message_multiplier: f64,
}

impl EventRouter {
    pub fn new(
        scheduler: Arc<SilenceScheduler>,
        responder: Arc<Responder>,
        registry: Arc<AgentRegistry>,
        recent: Arc<RecentSpeakers>,
        gateway: Arc<dyn ChatGatewayDyn>,
        random_response_rate: f64,
        recent_message_multiplier: f64,
    ) -> Self {
        Self {
            scheduler,
            responder,
            registry,
            recent,
            gateway,
            random_response_rate,
            recent_message_multiplier,
        }
    }

    /// Handle one inbound message: reset the idle timer, then give each
    /// agent its chance to respond.
    pub async fn handle(&self, event: InboundEvent) {
        self.scheduler
            .on_activity(&event.channel_id, &event.channel_name);

        if event.author_is_bot {
            return;
        }

        let watched = self.scheduler.is_watched(&event.channel_name);

        for (index, agent) in self.registry.iter() {
            let mentions_agent = event.mentioned_user_ids.iter().any(|id| id == &agent.id);
            let mentions_role = agent
                .role_ids
                .iter()
                .any(|role| event.mentioned_role_ids.contains(role));

            // Random chance applies in watched channels only, biased down
            // when the agent already spoke recently.
            let random_hit = watched && {
                let rate = if self.recent.has_spoken_recently(&event.channel_id, &agent.id) {
                    self.random_response_rate * self.recent_message_multiplier
                } else {
                    self.random_response_rate
                };
                let mut rng = rand::rng();
                rng.random_bool(rate.clamp(0.0, 1.0))
            };

            if !mentions_agent && !mentions_role && !random_hit {
                continue;
            }

            let burst_size = {
                let mut rng = rand::rng();
                self.registry.roll_burst_size(index, &mut rng)
            };

            let trigger = Trigger::IncomingMessage {
                channel_id: event.channel_id.clone(),
                channel_name: event.channel_name.clone(),
                author_id: event.author_id.clone(),
                author_name: event.author_name.clone(),
                content: event.content.clone(),
                mentions_agent,
                mentions_role,
            };

            if let Err(error) = self.responder.respond(trigger, index, burst_size).await {
                tracing::error!(
                    channel = %event.channel_name,
                    agent = %agent.name,
                    %error,
                    "inbound-triggered burst failed"
                );
                if let Err(send_error) = self.gateway.send_message(&event.channel_id, APOLOGY).await
                {
                    tracing::error!(%send_error, "failed to send apology message");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ActivityConfig, AgentConfig, ReplyTable};
    use crate::error::{ProviderError, Result};
    use crate::gateway::ChatGateway;
    use crate::llm::{CompletionProvider, PromptMessage};
    use crate::TranscriptMessage;
    use std::sync::Mutex as StdMutex;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::time::Duration;

    struct FixedProvider {
        calls: AtomicUsize,
        fail: AtomicBool,
    }

    impl FixedProvider {
        fn new() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                fail: AtomicBool::new(false),
            }
        }
    }

    impl CompletionProvider for FixedProvider {
        async fn complete(
            &self,
            _messages: &[PromptMessage],
            _model: &str,
            _temperature: f32,
        ) -> Result<String> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail.load(Ordering::SeqCst) {
                return Err(ProviderError::Request("down".into()).into());
            }
            Ok(format!("reply {n}"))
        }
    }

    #[derive(Default)]
    struct RecordingGateway {
        sent: StdMutex<Vec<String>>,
    }

    impl ChatGateway for RecordingGateway {
        fn name(&self) -> &str {
            "recording"
        }

        async fn fetch_recent_messages(
            &self,
            _channel_id: &ChannelId,
            _limit: usize,
        ) -> Result<Vec<TranscriptMessage>> {
            Ok(Vec::new())
        }

        async fn send_typing(&self, _channel_id: &ChannelId) -> Result<()> {
            Ok(())
        }

        async fn send_message(&self, _channel_id: &ChannelId, text: &str) -> Result<()> {
            self.sent.lock().unwrap().push(text.to_string());
            Ok(())
        }

        async fn resolve_channel_by_name(&self, name: &str) -> Result<ChannelId> {
            Ok(Arc::from(format!("chan:{name}").as_str()))
        }
    }

    struct Fixture {
        router: EventRouter,
        gateway: Arc<RecordingGateway>,
        provider: Arc<FixedProvider>,
        recent: Arc<RecentSpeakers>,
    }

    fn fixture(random_response_rate: f64, recent_message_multiplier: f64) -> Fixture {
        let gateway = Arc::new(RecordingGateway::default());
        let provider = Arc::new(FixedProvider::new());
        let registry = Arc::new(AgentRegistry::new(
            String::new(),
            vec![AgentConfig {
                id: "111".into(),
                name: "Nova".into(),
                model: "gpt-4o-mini".into(),
                prompt: "You are Nova.".into(),
                reply_counts: ReplyTable::Flat(vec![1]),
                role_ids: vec!["900".into()],
            }],
        ));
        let recent = Arc::new(RecentSpeakers::new());
        let responder = Arc::new(Responder::new(
            gateway.clone(),
            provider.clone(),
            registry.clone(),
            recent.clone(),
            Vec::new(),
            Duration::from_millis(1),
        ));
        let activity = ActivityConfig {
            silence_timeout_min_mins: 5,
            silence_timeout_max_mins: 8,
            channels: vec!["general".into()],
            random_response_rate,
            recent_message_multiplier,
            pacing_ms: 1,
        };
        let scheduler = Arc::new(SilenceScheduler::new(
            &activity,
            registry.clone(),
            responder.clone(),
            gateway.clone(),
        ));
        let router = EventRouter::new(
            scheduler,
            responder,
            registry,
            recent.clone(),
            gateway.clone(),
            random_response_rate,
            recent_message_multiplier,
        );
        Fixture {
            router,
            gateway,
            provider,
            recent,
        }
    }

    fn event(channel_name: &str, content: &str, author_is_bot: bool) -> InboundEvent {
        let (mentioned_user_ids, mentioned_role_ids) = InboundEvent::parse_mentions(content);
        InboundEvent {
            channel_id: Arc::from(format!("chan:{channel_name}").as_str()),
            channel_name: channel_name.into(),
            author_id: "u1".into(),
            author_name: "Alice".into(),
            author_is_bot,
            content: content.into(),
            mentioned_user_ids,
            mentioned_role_ids,
        }
    }

    #[test]
    fn parse_mentions_extracts_user_and_role_ids() {
        let (users, roles) = InboundEvent::parse_mentions("hi <@111> <@!222> <@&900>");
        assert_eq!(users, vec!["111", "222"]);
        assert_eq!(roles, vec!["900"]);
    }

    #[tokio::test]
    async fn bot_authors_never_trigger_responses() {
        let fixture = fixture(1.0, 1.0);
        fixture.router.handle(event("general", "hello", true)).await;
        assert!(fixture.gateway.sent.lock().unwrap().is_empty());
        assert_eq!(fixture.provider.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn mention_responds_even_in_unwatched_channel() {
        let fixture = fixture(0.0, 1.0);
        fixture
            .router
            .handle(event("private", "hey <@111>", false))
            .await;
        assert_eq!(fixture.gateway.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn role_mention_responds() {
        let fixture = fixture(0.0, 1.0);
        fixture
            .router
            .handle(event("private", "ping <@&900>", false))
            .await;
        assert_eq!(fixture.gateway.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn zero_rate_means_no_random_response() {
        let fixture = fixture(0.0, 1.0);
        fixture.router.handle(event("general", "hello", false)).await;
        assert!(fixture.gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn full_rate_responds_in_watched_channel() {
        let fixture = fixture(1.0, 1.0);
        fixture.router.handle(event("general", "hello", false)).await;
        assert_eq!(fixture.gateway.sent.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn full_rate_ignores_unwatched_channel() {
        let fixture = fixture(1.0, 1.0);
        fixture.router.handle(event("private", "hello", false)).await;
        assert!(fixture.gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn recent_speaker_multiplier_suppresses_random_response() {
        let fixture = fixture(1.0, 0.0);
        let channel_id: ChannelId = Arc::from("chan:general");
        fixture.recent.record(&channel_id, "111");
        fixture.router.handle(event("general", "hello", false)).await;
        assert!(fixture.gateway.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn failed_burst_sends_apology() {
        let fixture = fixture(0.0, 1.0);
        fixture.provider.fail.store(true, Ordering::SeqCst);
        fixture
            .router
            .handle(event("general", "hey <@111>", false))
            .await;
        let sent = fixture.gateway.sent.lock().unwrap().clone();
        assert_eq!(sent, vec![APOLOGY.to_string()]);
    }
}
