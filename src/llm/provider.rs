//! Completion provider trait and dynamic dispatch companion.

use crate::error::Result;
use serde::Serialize;
use std::pin::Pin;

/// Chat role for a prompt message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
}

/// One message of a structured conversation transcript sent to the provider.
#[derive(Debug, Clone, Serialize)]
pub struct PromptMessage {
    pub role: Role,
    pub content: String,
}

impl PromptMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Static trait for completion providers. One call, prompt in, text out.
/// Retry policy lives in the responder, not here.
pub trait CompletionProvider: Send + Sync + 'static {
    fn complete(
        &self,
        messages: &[PromptMessage],
        model: &str,
        temperature: f32,
    ) -> impl std::future::Future<Output = Result<String>> + Send;
}

/// Dynamic trait for runtime polymorphism.
/// Use this when you need `Arc<dyn CompletionProviderDyn>`.
pub trait CompletionProviderDyn: Send + Sync + 'static {
    fn complete<'a>(
        &'a self,
        messages: &'a [PromptMessage],
        model: &'a str,
        temperature: f32,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>>;
}

/// Blanket implementation: any type implementing CompletionProvider
/// automatically implements CompletionProviderDyn.
impl<T: CompletionProvider> CompletionProviderDyn for T {
    fn complete<'a>(
        &'a self,
        messages: &'a [PromptMessage],
        model: &'a str,
        temperature: f32,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<String>> + Send + 'a>> {
        Box::pin(CompletionProvider::complete(
            self,
            messages,
            model,
            temperature,
        ))
    }
}
