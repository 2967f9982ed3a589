pub mod client;
pub mod prompts;

pub use client::{ChatModel, OpenAiChatModel, DEFAULT_BASE_URL, DEFAULT_MODEL};
