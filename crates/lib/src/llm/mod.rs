//! Language-model completion client (OpenAI chat completions).

mod openai;

pub use openai::{CompletionError, OpenAiClient};
