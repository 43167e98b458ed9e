use std::fmt::Write as _;
use std::time::Duration;

use generator::GenerationError;
use serde::{Deserialize, Serialize};

use crate::Stage;

/// Scripted answer for the `handoff` intent.
pub const HANDOFF_REPLY: &str =
    "Sure, I can help. What do you need help with (order, return, shipping, product question)?";

/// Shown when a stage fails outright.
pub const FAILURE_REPLY: &str =
    "⚠️ Something went wrong while preparing an answer. Please try again in a moment.";

/// Used instead of a generator call when there is nothing to ground on and
/// context-free generation is turned off.
pub const NO_CONTEXT_REPLY: &str =
    "Hi! I can help with products, shipping, returns and promotions. What are you looking for?";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One transcript entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
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

/// How a reply was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyOutcome {
    Answered,
    Handoff,
    /// Generation failed; the reply is an advisory plus top matches.
    Degraded(GenerationError),
    /// A stage failed; the reply is [`FAILURE_REPLY`].
    Failed,
}

impl ReplyOutcome {
    pub fn label(&self) -> &'static str {
        match self {
            ReplyOutcome::Answered => "answered",
            ReplyOutcome::Handoff => "handoff",
            ReplyOutcome::Degraded(_) => "degraded",
            ReplyOutcome::Failed => "failed",
        }
    }
}

/// Per-stage latency in milliseconds. `None` for stages that did not run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct StageTimings {
    pub intent_ms: Option<f64>,
    pub q_embed_ms: Option<f64>,
    pub search_ms: Option<f64>,
    pub filter_ms: Option<f64>,
    pub context_ms: Option<f64>,
    pub generate_ms: Option<f64>,
    pub total_ms: Option<f64>,
}

impl StageTimings {
    pub fn get(&self, stage: Stage) -> Option<f64> {
        match stage {
            Stage::Intent => self.intent_ms,
            Stage::Embedding => self.q_embed_ms,
            Stage::Search => self.search_ms,
            Stage::Filter => self.filter_ms,
            Stage::Context => self.context_ms,
            Stage::Generation => self.generate_ms,
        }
    }

    pub(crate) fn set(&mut self, stage: Stage, elapsed: Duration) {
        let ms = Some(millis(elapsed));
        match stage {
            Stage::Intent => self.intent_ms = ms,
            Stage::Embedding => self.q_embed_ms = ms,
            Stage::Search => self.search_ms = ms,
            Stage::Filter => self.filter_ms = ms,
            Stage::Context => self.context_ms = ms,
            Stage::Generation => self.generate_ms = ms,
        }
    }

    pub(crate) fn set_total(&mut self, elapsed: Duration) {
        self.total_ms = Some(millis(elapsed));
    }

    /// `⏱ intent=1.2ms | q_embed=NA | ... | total=3.4ms`
    pub fn render(&self) -> String {
        let mut line = String::from("⏱");
        for (i, stage) in Stage::ALL.iter().enumerate() {
            let sep = if i == 0 { " " } else { " | " };
            let _ = write!(line, "{sep}{}={}", stage.as_str(), fmt_ms(self.get(*stage)));
        }
        let _ = write!(line, " | total={}", fmt_ms(self.total_ms));
        line
    }
}

fn millis(d: Duration) -> f64 {
    d.as_secs_f64() * 1000.0
}

fn fmt_ms(ms: Option<f64>) -> String {
    match ms {
        Some(ms) => format!("{ms:.1}ms"),
        None => "NA".to_string(),
    }
}

/// Final reply for one user message.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatReply {
    /// Text shown to the user, including any sources or debug footer.
    pub text: String,
    /// Detected intent; `None` when classification itself failed.
    pub intent: Option<String>,
    pub score: Option<f32>,
    pub outcome: ReplyOutcome,
    /// URLs listed under "Sources:".
    pub sources: Vec<String>,
    /// Titles listed under "Top matches:".
    pub top_matches: Vec<String>,
    pub timings: StageTimings,
}

pub(crate) fn with_sources(answer: &str, sources: &[String]) -> String {
    with_bullets(answer, "Sources:", sources)
}

pub(crate) fn with_top_matches(advisory: &str, titles: &[String]) -> String {
    with_bullets(advisory, "Top matches:", titles)
}

fn with_bullets(head: &str, label: &str, items: &[String]) -> String {
    if items.is_empty() {
        return head.to_string();
    }
    format!("{head}\n\n{label}\n- {}", items.join("\n- "))
}

/// `(intent=..., score=...)` followed by the rendered timings.
pub(crate) fn debug_footer(intent: Option<&str>, score: Option<f32>, timings: &StageTimings) -> String {
    format!(
        "\n\n(intent={}, score={:.2})\n{}",
        intent.unwrap_or("unknown"),
        score.unwrap_or(0.0),
        timings.render()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_stages_render_as_na() {
        let mut t = StageTimings::default();
        t.set(Stage::Intent, Duration::from_micros(1500));
        t.set_total(Duration::from_millis(2));
        assert_eq!(
            t.render(),
            "⏱ intent=1.5ms | q_embed=NA | search=NA | filter=NA | context=NA | generate=NA | total=2.0ms"
        );
    }

    #[test]
    fn bullets_only_when_items_exist() {
        assert_eq!(with_sources("Hello", &[]), "Hello");
        assert_eq!(
            with_sources("Hello", &["u1".into(), "u2".into()]),
            "Hello\n\nSources:\n- u1\n- u2"
        );
        assert_eq!(
            with_top_matches("⚠️ x", &["A".into()]),
            "⚠️ x\n\nTop matches:\n- A"
        );
    }

    #[test]
    fn footer_defaults_when_intent_unknown() {
        let footer = debug_footer(None, None, &StageTimings::default());
        assert!(footer.starts_with("\n\n(intent=unknown, score=0.00)\n⏱ intent=NA"));
        assert!(footer.ends_with("total=NA"));

        let footer = debug_footer(Some("policy_returns"), Some(0.8123), &StageTimings::default());
        assert!(footer.contains("(intent=policy_returns, score=0.81)"));
    }

    #[test]
    fn turns_serialize_lowercase_roles() {
        let turn = ChatTurn::assistant("hi");
        let json = serde_json::to_string(&turn).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"hi"}"#);
        assert_eq!(ReplyOutcome::Degraded(GenerationError::Timeout).label(), "degraded");
    }
}
