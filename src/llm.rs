//! Completion provider abstraction and adapters.

pub mod openai;
pub mod provider;

pub use openai::OpenAiProvider;
pub use provider::{CompletionProvider, CompletionProviderDyn, PromptMessage, Role};
