//! Banterbot CLI entry point.

use anyhow::Context as _;
use banterbot::activity::SilenceScheduler;
use banterbot::agents::AgentRegistry;
use banterbot::config::Config;
use banterbot::gateway::{ChatGatewayDyn, ConsoleGateway};
use banterbot::inbound::EventRouter;
use banterbot::llm::{CompletionProviderDyn, OpenAiProvider};
use banterbot::recent::RecentSpeakers;
use banterbot::responder::Responder;
use clap::Parser;
use std::sync::Arc;
use tokio::io::AsyncBufReadExt as _;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "banterbot")]
#[command(about = "Automated conversational agents for a shared chat channel")]
struct Cli {
    /// Path to config file (optional)
    #[arg(short, long)]
    config: Option<std::path::PathBuf>,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.debug {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config_path = cli.config.unwrap_or_else(Config::default_path);
    let config = Config::load_from_path(&config_path)
        .with_context(|| format!("failed to load config from {}", config_path.display()))?;
    tracing::info!(
        agents = config.agents.len(),
        channels = ?config.activity.channels,
        "configuration loaded"
    );

    let provider: Arc<dyn CompletionProviderDyn> = Arc::new(
        OpenAiProvider::from_config(&config.provider)
            .context("failed to initialize completion provider")?,
    );
    let gateway = Arc::new(ConsoleGateway::new());
    let gateway_dyn: Arc<dyn ChatGatewayDyn> = gateway.clone();

    let registry = Arc::new(AgentRegistry::new(
        config.master_prompt.clone(),
        config.agents.clone(),
    ));
    let recent = Arc::new(RecentSpeakers::new());
    let responder = Arc::new(Responder::new(
        gateway_dyn.clone(),
        provider,
        registry.clone(),
        recent.clone(),
        config.compiled_substitutions()?,
        config.activity.pacing(),
    ));
    let scheduler = Arc::new(SilenceScheduler::new(
        &config.activity,
        registry.clone(),
        responder.clone(),
        gateway_dyn.clone(),
    ));
    scheduler.arm_watched_channels().await;

    let router = Arc::new(EventRouter::new(
        scheduler.clone(),
        responder,
        registry,
        recent,
        gateway_dyn,
        config.activity.random_response_rate,
        config.activity.recent_message_multiplier,
    ));

    tracing::info!("banterbot started; type 'channel: message' to chat");

    // Stdin loop: each "channel: message" line becomes an inbound event.
    let input_loop = tokio::spawn(async move {
        let stdin = tokio::io::stdin();
        let mut lines = tokio::io::BufReader::new(stdin).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            let Some((channel_name, text)) = line.split_once(':') else {
                tracing::warn!("expected input in the form 'channel: message'");
                continue;
            };
            let event = gateway.push_user_message(channel_name.trim(), "operator", text.trim());
            router.handle(event).await;
        }
    });

    tokio::select! {
        _ = input_loop => {
            tracing::info!("input stream closed");
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("shutdown signal received");
        }
    }

    scheduler.shutdown();
    tracing::info!("banterbot stopped");
    Ok(())
}
