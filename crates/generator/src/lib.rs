//! Answer generation against a hosted language model.
//!
//! The chat layer talks to [`AnswerGenerator`]; [`OpenAiGenerator`] is the
//! production implementation. Failures are always reduced to one of the
//! [`GenerationError`] categories so callers can show a fixed advisory
//! instead of raw provider output.

mod error;
mod openai;
mod prompts;

use async_trait::async_trait;

pub use error::GenerationError;
pub use openai::{GeneratorConfig, OpenAiGenerator, DEFAULT_API_URL, DEFAULT_MODEL, EMPTY_REPLY};
pub use prompts::{build_user_prompt, NO_CONTEXT_PLACEHOLDER, SYSTEM_PROMPT};

#[async_trait]
pub trait AnswerGenerator: Send + Sync {
    /// Run one system + user exchange and return the model's text.
    async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError>;

    /// Answer `query` grounded on `context` using the standard prompts.
    async fn answer(
        &self,
        query: &str,
        intent: &str,
        context: &str,
    ) -> Result<String, GenerationError> {
        let user = build_user_prompt(query, intent, context);
        self.generate(SYSTEM_PROMPT, &user).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recording {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl AnswerGenerator for Recording {
        async fn generate(&self, system: &str, user: &str) -> Result<String, GenerationError> {
            self.calls.lock().unwrap().push((system.into(), user.into()));
            Ok("ok".into())
        }
    }

    #[tokio::test]
    async fn answer_uses_standard_prompts() {
        let gen = Recording::default();
        let reply = gen.answer("return window?", "policy_returns", "").await.unwrap();
        assert_eq!(reply, "ok");

        let calls = gen.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, SYSTEM_PROMPT);
        assert!(calls[0].1.starts_with("User query: return window?\nDetected intent: policy_returns"));
        assert!(calls[0].1.contains(NO_CONTEXT_PLACEHOLDER));
    }
}
