//! Language-model access: the OpenAI client and the stock advisor prompts.

mod advisor;
mod client;

pub use advisor::{parse_price, parse_verdict, StockAdvisor, Verdict, ANALYSER_PROMPT, LIMIT_ORDER_PROMPT};
pub use client::{CompletionOracle, LlmError, OpenAiClient};

#[cfg(test)]
pub use client::MockCompletionOracle;
