//! Configuration loading and validation.

use crate::error::{ConfigError, Result};
use regex::{Regex, RegexBuilder};
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// Banterbot configuration, parsed from a TOML file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    /// Shared prompt text prepended to every agent's persona prompt.
    #[serde(default)]
    pub master_prompt: String,

    /// Completion provider settings.
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Idle-timer and response-chance settings.
    pub activity: ActivityConfig,

    /// Agent personas. At least one is required.
    pub agents: Vec<AgentConfig>,

    /// Ordered text substitutions applied to accepted replies.
    #[serde(default)]
    pub substitutions: Vec<SubstitutionConfig>,
}

/// Completion provider settings (OpenAI-compatible endpoint).
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Environment variable holding the API key, read at startup.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f32,

    #[serde(default = "default_presence_penalty")]
    pub presence_penalty: f32,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_key_env: default_api_key_env(),
            max_tokens: default_max_tokens(),
            frequency_penalty: default_frequency_penalty(),
            presence_penalty: default_presence_penalty(),
        }
    }
}

/// Idle-timer and response-chance settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ActivityConfig {
    /// Lower bound of the idle delay, in minutes.
    pub silence_timeout_min_mins: u64,

    /// Upper bound of the idle delay, in minutes.
    pub silence_timeout_max_mins: u64,

    /// Channel names eligible for idle-timer tracking.
    pub channels: Vec<String>,

    /// Base probability that an agent answers an unaddressed message.
    #[serde(default = "default_response_rate")]
    pub random_response_rate: f64,

    /// Factor applied to the base rate when the agent spoke recently.
    #[serde(default = "default_recent_multiplier")]
    pub recent_message_multiplier: f64,

    /// Delay between consecutive replies of one burst, in milliseconds.
    #[serde(default = "default_pacing_ms")]
    pub pacing_ms: u64,
}

impl ActivityConfig {
    /// Sampled idle delay bounds.
    pub fn idle_range(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.silence_timeout_min_mins * 60),
            Duration::from_secs(self.silence_timeout_max_mins * 60),
        )
    }

    pub fn pacing(&self) -> Duration {
        Duration::from_millis(self.pacing_ms)
    }
}

/// One agent persona. Immutable after startup.
#[derive(Debug, Clone, Deserialize)]
pub struct AgentConfig {
    /// Platform user id, used for mention detection and rewriting.
    pub id: String,

    /// Display name.
    pub name: String,

    /// Model identifier passed to the completion provider.
    pub model: String,

    /// Persona prompt, appended to the master prompt.
    pub prompt: String,

    /// Reply-burst size table.
    pub reply_counts: ReplyTable,

    /// Platform role ids whose mention addresses this agent.
    #[serde(default)]
    pub role_ids: Vec<String>,
}

/// How many consecutive replies a burst produces.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyTable {
    /// Counts with explicit weights.
    Weighted(Vec<ReplyWeight>),
    /// Counts sampled uniformly.
    Flat(Vec<u32>),
}

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct ReplyWeight {
    pub count: u32,
    pub weight: u32,
}

/// One substitution rule as written in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct SubstitutionConfig {
    /// Case-insensitive regex pattern.
    pub pattern: String,
    pub replacement: String,
}

/// A substitution rule compiled for application.
#[derive(Debug, Clone)]
pub struct Substitution {
    pub pattern: Regex,
    pub replacement: String,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".into()
}

fn default_max_tokens() -> u32 {
    150
}

fn default_frequency_penalty() -> f32 {
    1.5
}

fn default_presence_penalty() -> f32 {
    1.0
}

fn default_response_rate() -> f64 {
    0.05
}

fn default_recent_multiplier() -> f64 {
    1.0
}

fn default_pacing_ms() -> u64 {
    1000
}

impl Config {
    /// Default config file location under the user config directory.
    pub fn default_path() -> std::path::PathBuf {
        dirs::config_dir()
            .map(|d| d.join("banterbot").join("banterbot.toml"))
            .unwrap_or_else(|| std::path::PathBuf::from("banterbot.toml"))
    }

    /// Load and validate configuration from a TOML file.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Load {
            path: path.display().to_string(),
            source: Arc::new(source),
        })?;
        Self::parse(&raw)
    }

    /// Parse and validate configuration from TOML text.
    pub fn parse(raw: &str) -> Result<Self> {
        let config: Config = toml::from_str(raw).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let activity = &self.activity;
        if activity.silence_timeout_min_mins < 1 {
            return Err(invalid("silence_timeout_min_mins must be at least 1"));
        }
        if activity.silence_timeout_min_mins > activity.silence_timeout_max_mins {
            return Err(invalid(
                "silence_timeout_min_mins must not exceed silence_timeout_max_mins",
            ));
        }
        if !(0.0..=1.0).contains(&activity.random_response_rate) {
            return Err(invalid("random_response_rate must be within [0, 1]"));
        }
        if activity.recent_message_multiplier < 0.0 {
            return Err(invalid("recent_message_multiplier must not be negative"));
        }

        if self.agents.is_empty() {
            return Err(invalid("at least one agent must be configured"));
        }
        for agent in &self.agents {
            match &agent.reply_counts {
                ReplyTable::Flat(counts) => {
                    if counts.is_empty() || counts.contains(&0) {
                        return Err(invalid(format!(
                            "agent '{}': reply_counts must be non-empty positive counts",
                            agent.name
                        )));
                    }
                }
                ReplyTable::Weighted(entries) => {
                    if entries.is_empty()
                        || entries.iter().any(|e| e.count == 0)
                        || entries.iter().all(|e| e.weight == 0)
                    {
                        return Err(invalid(format!(
                            "agent '{}': weighted reply_counts need positive counts and at least one positive weight",
                            agent.name
                        )));
                    }
                }
            }
        }

        // Substitution patterns must compile; fail at startup, not mid-burst.
        self.compiled_substitutions()?;

        Ok(())
    }

    /// Compile the substitution rules in configuration order.
    pub fn compiled_substitutions(&self) -> Result<Vec<Substitution>> {
        self.substitutions
            .iter()
            .map(|rule| {
                let pattern = RegexBuilder::new(&rule.pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|error| {
                        invalid(format!(
                            "substitution pattern '{}' is not a valid regex: {error}",
                            rule.pattern
                        ))
                    })?;
                Ok(Substitution {
                    pattern,
                    replacement: rule.replacement.clone(),
                })
            })
            .collect()
    }
}

fn invalid(message: impl Into<String>) -> crate::Error {
    ConfigError::Invalid(message.into()).into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indoc::indoc;

    const FULL: &str = indoc! {r#"
        master_prompt = "You are chatting in a relaxed group channel."

        [provider]
        max_tokens = 200

        [activity]
        silence_timeout_min_mins = 5
        silence_timeout_max_mins = 10
        channels = ["general", "random"]
        random_response_rate = 0.05
        recent_message_multiplier = 0.25

        [[agents]]
        id = "111"
        name = "Nova"
        model = "gpt-4o-mini"
        prompt = "You are Nova."
        reply_counts = { weighted = [{ count = 1, weight = 6 }, { count = 2, weight = 3 }] }

        [[agents]]
        id = "222"
        name = "Juno"
        model = "gpt-4o-mini"
        prompt = "You are Juno."
        reply_counts = { flat = [1, 1, 2] }
        role_ids = ["900"]

        [[substitutions]]
        pattern = "foo"
        replacement = "bar"
    "#};

    #[test]
    fn parses_full_config() {
        let config = Config::parse(FULL).expect("config should parse");
        assert_eq!(config.agents.len(), 2);
        assert_eq!(config.activity.channels, vec!["general", "random"]);
        assert_eq!(config.provider.max_tokens, 200);
        assert!(matches!(
            config.agents[0].reply_counts,
            ReplyTable::Weighted(ref entries) if entries.len() == 2
        ));
        assert!(matches!(
            config.agents[1].reply_counts,
            ReplyTable::Flat(ref counts) if counts == &[1, 1, 2]
        ));
        assert_eq!(config.agents[1].role_ids, vec!["900"]);
        assert_eq!(config.compiled_substitutions().unwrap().len(), 1);
    }

    #[test]
    fn defaults_applied() {
        let config = Config::parse(indoc! {r#"
            [activity]
            silence_timeout_min_mins = 1
            silence_timeout_max_mins = 2
            channels = []

            [[agents]]
            id = "1"
            name = "Solo"
            model = "gpt-4o-mini"
            prompt = "p"
            reply_counts = { flat = [1] }
        "#})
        .expect("config should parse");

        assert_eq!(config.activity.pacing_ms, 1000);
        assert_eq!(config.provider.base_url, "https://api.openai.com/v1");
        assert_eq!(config.provider.max_tokens, 150);
        assert_eq!(config.provider.frequency_penalty, 1.5);
        assert_eq!(config.activity.recent_message_multiplier, 1.0);
    }

    #[test]
    fn rejects_inverted_idle_range() {
        let result = Config::parse(indoc! {r#"
            [activity]
            silence_timeout_min_mins = 10
            silence_timeout_max_mins = 5
            channels = []

            [[agents]]
            id = "1"
            name = "Solo"
            model = "m"
            prompt = "p"
            reply_counts = { flat = [1] }
        "#});
        assert!(result.is_err());
    }

    #[test]
    fn rejects_empty_agent_list() {
        let result = Config::parse(indoc! {r#"
            agents = []

            [activity]
            silence_timeout_min_mins = 1
            silence_timeout_max_mins = 2
            channels = []
        "#});
        assert!(result.is_err());
    }

    #[test]
    fn rejects_zero_count_in_reply_table() {
        let result = Config::parse(indoc! {r#"
            [activity]
            silence_timeout_min_mins = 1
            silence_timeout_max_mins = 2
            channels = []

            [[agents]]
            id = "1"
            name = "Solo"
            model = "m"
            prompt = "p"
            reply_counts = { flat = [0] }
        "#});
        assert!(result.is_err());
    }

    #[test]
    fn rejects_invalid_substitution_pattern() {
        let result = Config::parse(indoc! {r#"
            [activity]
            silence_timeout_min_mins = 1
            silence_timeout_max_mins = 2
            channels = []

            [[agents]]
            id = "1"
            name = "Solo"
            model = "m"
            prompt = "p"
            reply_counts = { flat = [1] }

            [[substitutions]]
            pattern = "("
            replacement = "x"
        "#});
        assert!(result.is_err());
    }

    #[test]
    fn idle_range_converts_minutes() {
        let config = Config::parse(FULL).unwrap();
        let (min, max) = config.activity.idle_range();
        assert_eq!(min, Duration::from_secs(5 * 60));
        assert_eq!(max, Duration::from_secs(10 * 60));
    }
}
