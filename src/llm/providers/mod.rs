//! Chat completion backends behind the gateway.

pub mod openai_compat;

pub use openai_compat::OpenAiCompatibleClient;
