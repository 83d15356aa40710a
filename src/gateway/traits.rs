//! Gateway trait and dynamic dispatch companion.

use crate::error::Result;
use crate::{ChannelId, TranscriptMessage};
use std::pin::Pin;

/// Static trait for chat platform adapters.
/// Use this for type-safe implementations.
pub trait ChatGateway: Send + Sync + 'static {
    /// Unique name for this adapter.
    fn name(&self) -> &str;

    /// Fetch the most recent messages in a channel, oldest first.
    fn fetch_recent_messages(
        &self,
        channel_id: &ChannelId,
        limit: usize,
    ) -> impl std::future::Future<Output = Result<Vec<TranscriptMessage>>> + Send;

    /// Show a typing indicator in a channel.
    fn send_typing(
        &self,
        channel_id: &ChannelId,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Send a message and wait for delivery.
    fn send_message(
        &self,
        channel_id: &ChannelId,
        text: &str,
    ) -> impl std::future::Future<Output = Result<()>> + Send;

    /// Resolve a channel by its configured name.
    fn resolve_channel_by_name(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<ChannelId>> + Send;
}

/// Dynamic trait for runtime polymorphism.
/// Use this when you need `Arc<dyn ChatGatewayDyn>`.
pub trait ChatGatewayDyn: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn fetch_recent_messages<'a>(
        &'a self,
        channel_id: &'a ChannelId,
        limit: usize,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<TranscriptMessage>>> + Send + 'a>>;

    fn send_typing<'a>(
        &'a self,
        channel_id: &'a ChannelId,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

    fn send_message<'a>(
        &'a self,
        channel_id: &'a ChannelId,
        text: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>>;

    fn resolve_channel_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<ChannelId>> + Send + 'a>>;
}

/// Blanket implementation: any type implementing ChatGateway automatically
/// implements ChatGatewayDyn.
impl<T: ChatGateway> ChatGatewayDyn for T {
    fn name(&self) -> &str {
        ChatGateway::name(self)
    }

    fn fetch_recent_messages<'a>(
        &'a self,
        channel_id: &'a ChannelId,
        limit: usize,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<TranscriptMessage>>> + Send + 'a>>
    {
        Box::pin(ChatGateway::fetch_recent_messages(self, channel_id, limit))
    }

    fn send_typing<'a>(
        &'a self,
        channel_id: &'a ChannelId,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(ChatGateway::send_typing(self, channel_id))
    }

    fn send_message<'a>(
        &'a self,
        channel_id: &'a ChannelId,
        text: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<()>> + Send + 'a>> {
        Box::pin(ChatGateway::send_message(self, channel_id, text))
    }

    fn resolve_channel_by_name<'a>(
        &'a self,
        name: &'a str,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<ChannelId>> + Send + 'a>> {
        Box::pin(ChatGateway::resolve_channel_by_name(self, name))
    }
}
