//! Silence scheduler: per-channel idle timers that keep watched channels
//! alive.
//!
//! Every message (human or bot) in a watched channel re-arms that channel's
//! timer with a fresh delay sampled from the configured idle range. When a
//! timer fires, a random agent produces a reply burst and the timer is
//! re-armed, so a tracked channel never goes permanently silent while the
//! process runs. Burst failures are logged and never break the timer chain.

use crate::agents::AgentRegistry;
use crate::config::ActivityConfig;
use crate::gateway::ChatGatewayDyn;
use crate::responder::Responder;
use crate::{ChannelId, Trigger};
use rand::Rng;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::task::JoinHandle;

/// Per-channel idle timers. One instance per process.
pub struct SilenceScheduler {
    idle_min: Duration,
    idle_max: Duration,
    watched: Vec<String>,
    registry: Arc<AgentRegistry>,
    responder: Arc<Responder>,
    gateway: Arc<dyn ChatGatewayDyn>,
    timers: Mutex<HashMap<ChannelId, JoinHandle<()>>>,
}

impl SilenceScheduler {
    pub fn new(
        activity: &ActivityConfig,
        registry: Arc<AgentRegistry>,
        responder: Arc<Responder>,
        gateway: Arc<dyn ChatGatewayDyn>,
    ) -> Self {
        let (idle_min, idle_max) = activity.idle_range();
        Self {
            idle_min,
            idle_max,
            watched: activity.channels.clone(),
            registry,
            responder,
            gateway,
            timers: Mutex::new(HashMap::new()),
        }
    }

    /// Whether a channel name is in the configured watch-list.
    pub fn is_watched(&self, channel_name: &str) -> bool {
        self.watched.iter().any(|name| name == channel_name)
    }

    fn sample_idle_delay(&self) -> Duration {
        let min_ms = self.idle_min.as_millis() as u64;
        let max_ms = self.idle_max.as_millis() as u64;
        let mut rng = rand::rng();
        Duration::from_millis(rng.random_range(min_ms..=max_ms))
    }

    /// Arm every watched channel that currently resolves. Called once at
    /// startup; unresolved channels are logged and skipped.
    pub async fn arm_watched_channels(self: &Arc<Self>) {
        for name in self.watched.clone() {
            match self.gateway.resolve_channel_by_name(&name).await {
                Ok(channel_id) => {
                    if let Some(delay) = self.on_activity(&channel_id, &name) {
                        tracing::info!(
                            channel = %name,
                            delay_mins = delay.as_secs() / 60,
                            "idle timer armed at startup"
                        );
                    }
                }
                Err(error) => {
                    tracing::warn!(channel = %name, %error, "channel not found, skipping timer");
                }
            }
        }
    }

    /// Re-arm the idle timer for a channel after activity. No-op for
    /// unwatched channels. Returns the sampled delay (diagnostics only).
    ///
    /// Synchronous on purpose: the fired timer task re-arms through this
    /// method, and keeping it out of the async call graph avoids a
    /// recursive future type.
    pub fn on_activity(
        self: &Arc<Self>,
        channel_id: &ChannelId,
        channel_name: &str,
    ) -> Option<Duration> {
        if !self.is_watched(channel_name) {
            return None;
        }

        let delay = self.sample_idle_delay();

        // Cancel any existing timer first: at most one per channel.
        // Dropping a JoinHandle only detaches it, so abort explicitly.
        let mut timers = self.timers.lock().expect("timer map poisoned");
        if let Some(old) = timers.remove(channel_id) {
            old.abort();
            tracing::debug!(channel = %channel_name, "cancelled previous idle timer");
        }

        let scheduler = Arc::clone(self);
        let id = channel_id.clone();
        let name = channel_name.to_string();
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // The burst runs on its own task: the stored handle must only
            // ever cancel a pending sleep, never a burst already sending.
            tokio::spawn(async move {
                scheduler.on_silence(id, name).await;
            });
        });
        timers.insert(channel_id.clone(), handle);

        Some(delay)
    }

    /// A watched channel went silent: have a random agent fill the gap,
    /// then re-arm.
    async fn on_silence(self: &Arc<Self>, channel_id: ChannelId, channel_name: String) {
        let (agent_index, burst_size) = {
            let mut rng = rand::rng();
            let index = self.registry.pick_agent(&mut rng);
            (index, self.registry.roll_burst_size(index, &mut rng))
        };

        tracing::info!(
            channel = %channel_name,
            agent_index,
            burst_size,
            "channel silent past idle delay, triggering burst"
        );

        let trigger = Trigger::Timer {
            channel_id: channel_id.clone(),
            channel_name: channel_name.clone(),
        };
        if let Err(error) = self.responder.respond(trigger, agent_index, burst_size).await {
            tracing::error!(channel = %channel_name, %error, "idle-triggered burst failed");
        }

        // Errors never break the timer chain: always re-arm.
        self.on_activity(&channel_id, &channel_name);
    }

    /// Cancel all outstanding timers. Process shutdown only.
    pub fn shutdown(&self) {
        let mut timers = self.timers.lock().expect("timer map poisoned");
        for (_, handle) in timers.drain() {
            handle.abort();
        }
        tracing::info!("silence scheduler shut down");
    }

    #[cfg(test)]
    fn outstanding_timers(&self) -> usize {
        self.timers.lock().expect("timer map poisoned").len()
    }
}
