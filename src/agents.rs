//! Agent registry: static per-agent configuration and lookups.

use crate::config::{AgentConfig, ReplyTable};
use rand::Rng;
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Platform user-mention token, e.g. `<@123>` or `<@!123>`.
static MENTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<@!?(\d+)>").expect("hardcoded regex"));

/// Immutable set of configured agents. Built once at startup.
pub struct AgentRegistry {
    master_prompt: String,
    agents: Vec<AgentConfig>,
}

impl AgentRegistry {
    pub fn new(master_prompt: String, agents: Vec<AgentConfig>) -> Self {
        Self {
            master_prompt,
            agents,
        }
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&AgentConfig> {
        self.agents.get(index)
    }

    /// Resolve an agent by its platform user id.
    pub fn by_platform_id(&self, id: &str) -> Option<&AgentConfig> {
        self.agents.iter().find(|agent| agent.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &AgentConfig)> {
        self.agents.iter().enumerate()
    }

    /// Master prompt and persona prompt joined for the system message.
    pub fn system_prompt_for(&self, agent: &AgentConfig) -> String {
        if self.master_prompt.is_empty() {
            agent.prompt.clone()
        } else {
            format!("{}\n\n{}", self.master_prompt, agent.prompt)
        }
    }

    /// Pick an agent index uniformly at random.
    pub fn pick_agent<R: Rng + ?Sized>(&self, rng: &mut R) -> usize {
        rng.random_range(0..self.agents.len())
    }

    /// Roll a burst size from the agent's reply table.
    pub fn roll_burst_size<R: Rng + ?Sized>(&self, index: usize, rng: &mut R) -> u32 {
        self.get(index)
            .map(|agent| roll(&agent.reply_counts, rng))
            .unwrap_or(1)
    }

    /// Rewrite user-mention tokens that reference a known agent to that
    /// agent's display name. Any other mention token is left unchanged.
    pub fn rewrite_mentions(&self, text: &str) -> String {
        MENTION_RE
            .replace_all(text, |caps: &Captures| {
                match self.by_platform_id(&caps[1]) {
                    Some(agent) => agent.name.clone(),
                    None => caps[0].to_string(),
                }
            })
            .into_owned()
    }
}

fn roll<R: Rng + ?Sized>(table: &ReplyTable, rng: &mut R) -> u32 {
    match table {
        ReplyTable::Flat(counts) => {
            if counts.is_empty() {
                return 1;
            }
            counts[rng.random_range(0..counts.len())]
        }
        ReplyTable::Weighted(entries) => {
            let total: u32 = entries.iter().map(|entry| entry.weight).sum();
            if total == 0 {
                return entries.first().map(|entry| entry.count).unwrap_or(1);
            }
            let mut remaining = rng.random_range(0..total);
            for entry in entries {
                if remaining < entry.weight {
                    return entry.count;
                }
                remaining -= entry.weight;
            }
            // Unreachable given the total above; keep the last count as a floor.
            entries.last().map(|entry| entry.count).unwrap_or(1)
        }
    }
}
