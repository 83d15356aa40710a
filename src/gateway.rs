//! Chat gateway: the platform collaborator the core speaks through.

pub mod console;
pub mod traits;

pub use console::ConsoleGateway;
pub use traits::{ChatGateway, ChatGatewayDyn};
