use crate::state::ServerState;
use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use ragchat::{ChatTurn, StageTimings};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

pub const EMPTY_MESSAGE_REPLY: &str = "Your message looks empty. What would you like to ask?";
pub const TOO_LONG_REPLY: &str =
    "Your message is too long. Please shorten it and ask again.";

/// Chat request body. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct ChatRequest {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub history: Vec<ChatTurn>,
    /// Include per-stage timings in the response
    #[serde(default)]
    pub debug: bool,
}

/// Chat response body
#[derive(Debug, Serialize)]
pub struct ChatResponse {
    pub reply: String,
    pub history: Vec<ChatTurn>,
    pub intent: Option<String>,
    pub score: Option<f32>,
    pub sources: Vec<String>,
    pub outcome: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timings: Option<StageTimings>,
    #[serde(rename = "_ms")]
    pub elapsed_ms: u64,
}

impl ChatResponse {
    fn canned(reply: &str, history: Vec<ChatTurn>, started: Instant) -> Self {
        Self {
            reply: reply.to_string(),
            history,
            intent: None,
            score: None,
            sources: Vec::new(),
            outcome: "rejected",
            timings: None,
            elapsed_ms: elapsed_ms(started),
        }
    }
}

/// Answer one chat message
///
/// Malformed bodies are treated as an empty message so the widget always
/// receives a reply it can display.
pub async fn chat(
    State(state): State<Arc<ServerState>>,
    payload: Result<Json<ChatRequest>, JsonRejection>,
) -> Json<ChatResponse> {
    let started = Instant::now();
    let request = match payload {
        Ok(Json(request)) => request,
        Err(rejection) => {
            tracing::debug!(error = %rejection, "unreadable chat body");
            ChatRequest::default()
        }
    };
    let ChatRequest {
        message,
        mut history,
        debug,
    } = request;

    let message = message.trim();
    if message.is_empty() {
        return Json(ChatResponse::canned(EMPTY_MESSAGE_REPLY, history, started));
    }
    if message.chars().count() > state.config.max_message_chars {
        return Json(ChatResponse::canned(TOO_LONG_REPLY, history, started));
    }

    match state.pipeline.respond(message, &mut history).await {
        Some(reply) => Json(ChatResponse {
            reply: reply.text,
            history,
            intent: reply.intent,
            score: reply.score,
            sources: reply.sources,
            outcome: reply.outcome.label(),
            timings: debug.then_some(reply.timings),
            elapsed_ms: elapsed_ms(started),
        }),
        None => Json(ChatResponse::canned(EMPTY_MESSAGE_REPLY, history, started)),
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
