use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};

use generator::{AnswerGenerator, GenerationError, OpenAiGenerator};
use grounding::{assemble, filter_hits, top_match_titles, AssembledContext};
use index::{Hit, VectorSearch, VectorStore};
use intent::{names, IntentClassifier, IntentResult};
use semantic::{build_embedder, Embedder};
use tokio::time::timeout;

use crate::reply::{debug_footer, with_sources, with_top_matches};
use crate::{
    metrics_recorder, AppConfig, ChatReply, ChatTurn, PipelineError, ReplyOutcome, Stage,
    StageTimings, StartupError, FAILURE_REPLY, HANDOFF_REPLY, NO_CONTEXT_REPLY,
};

/// Per-request knobs, usually derived from [`AppConfig::pipeline_settings`].
#[derive(Debug, Clone, PartialEq)]
pub struct PipelineSettings {
    /// Hits kept after filtering.
    pub top_k: usize,
    /// Neighbours requested from the index.
    pub candidates: usize,
    pub max_sources: usize,
    pub max_chars_per_doc: usize,
    /// Titles shown when generation fails.
    pub fallback_preview: usize,
    pub show_debug: bool,
    /// Call the generator even when there is no context to ground on.
    pub generate_without_context: bool,
    /// Bound on each external call.
    pub stage_timeout: Duration,
    /// Bound on the whole request. Each stage gets whatever is left of it,
    /// capped by `stage_timeout`.
    pub request_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        AppConfig::default().pipeline_settings()
    }
}

/// The chat pipeline. Cheap to clone; clones share the classifier, embedder,
/// index and generator.
#[derive(Clone)]
pub struct ChatPipeline {
    classifier: Arc<IntentClassifier>,
    embedder: Arc<dyn Embedder>,
    index: Arc<dyn VectorSearch>,
    generator: Arc<dyn AnswerGenerator>,
    settings: PipelineSettings,
}

impl std::fmt::Debug for ChatPipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChatPipeline")
            .field("intents", &self.classifier.category_names())
            .field("embedder", &self.embedder.model_name())
            .field("documents", &self.index.len())
            .field("settings", &self.settings)
            .finish()
    }
}

/// Intent and timings gathered so far, kept when a later stage fails.
struct Trace {
    intent: Option<IntentResult>,
    timings: StageTimings,
    deadline: Instant,
}

impl Trace {
    fn new(deadline: Instant) -> Self {
        Self {
            intent: None,
            timings: StageTimings::default(),
            deadline,
        }
    }
}

struct Body {
    text: String,
    outcome: ReplyOutcome,
    sources: Vec<String>,
    top_matches: Vec<String>,
}

impl ChatPipeline {
    pub fn new(
        classifier: Arc<IntentClassifier>,
        embedder: Arc<dyn Embedder>,
        index: Arc<dyn VectorSearch>,
        generator: Arc<dyn AnswerGenerator>,
        settings: PipelineSettings,
    ) -> Self {
        Self {
            classifier,
            embedder,
            index,
            generator,
            settings,
        }
    }

    /// Build every collaborator from `config`, failing fast on missing or
    /// inconsistent index files, a dimension disagreement between embedder
    /// and index, or missing generator credentials.
    pub async fn from_config(config: &AppConfig) -> Result<Self, StartupError> {
        config.validate()?;

        let embedder = build_embedder(&config.semantic)?;

        let index_cfg = &config.index;
        let (index_path, meta_path, ann) = (
            index_cfg.index_path.clone(),
            index_cfg.metadata_path.clone(),
            index_cfg.ann,
        );
        let store = tokio::task::spawn_blocking(move || {
            VectorStore::load(index_path, meta_path, ann)
        })
        .await
        .map_err(|e| StartupError::Index(index::IndexError::Io(e.to_string())))??;

        let embed_dim = embedder.dimension();
        if embed_dim != 0 && embed_dim != store.dimension() {
            return Err(StartupError::DimensionMismatch {
                embedder: embed_dim,
                index: store.dimension(),
            });
        }

        let classifier =
            IntentClassifier::new(embedder.clone(), config.intent.categories.clone()).await?;
        let generator = OpenAiGenerator::from_env(config.generator.clone())?;

        tracing::info!(
            documents = store.len(),
            dimension = store.dimension(),
            hnsw = store.ann().uses_hnsw(),
            intents = classifier.len(),
            model = generator.model(),
            "chat pipeline ready"
        );

        Ok(Self::new(
            Arc::new(classifier),
            embedder,
            Arc::new(store),
            Arc::new(generator),
            config.pipeline_settings(),
        ))
    }

    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    pub fn classifier(&self) -> &IntentClassifier {
        &self.classifier
    }

    pub fn index(&self) -> &dyn VectorSearch {
        self.index.as_ref()
    }

    /// Answer one message. `None` for empty or whitespace-only input.
    pub async fn process(&self, message: &str) -> Option<ChatReply> {
        let message = message.trim();
        if message.is_empty() {
            return None;
        }

        let started = Instant::now();
        let mut trace = Trace::new(started + self.settings.request_timeout);
        let body = match self.run(message, &mut trace).await {
            Ok(body) => body,
            Err(err) => {
                tracing::error!(
                    error = %err,
                    intent = trace.intent.as_ref().map(|i| i.category.as_str()),
                    "chat pipeline failed"
                );
                Body {
                    text: FAILURE_REPLY.to_string(),
                    outcome: ReplyOutcome::Failed,
                    sources: Vec::new(),
                    top_matches: Vec::new(),
                }
            }
        };

        let elapsed = started.elapsed();
        trace.timings.set_total(elapsed);
        if let Some(recorder) = metrics_recorder() {
            recorder.record_reply(&body.outcome, elapsed);
        }

        let (intent, score) = match trace.intent {
            Some(r) => (Some(r.category), Some(r.score)),
            None => (None, None),
        };
        let mut text = body.text;
        if self.settings.show_debug {
            text.push_str(&debug_footer(intent.as_deref(), score, &trace.timings));
        }

        tracing::info!(
            intent = intent.as_deref().unwrap_or("unknown"),
            outcome = body.outcome.label(),
            sources = body.sources.len(),
            latency_ms = trace.timings.total_ms,
            "reply ready"
        );

        Some(ChatReply {
            text,
            intent,
            score,
            outcome: body.outcome,
            sources: body.sources,
            top_matches: body.top_matches,
            timings: trace.timings,
        })
    }

    /// [`process`](Self::process) and append the exchange to `history`.
    /// Empty input leaves `history` untouched.
    pub async fn respond(&self, message: &str, history: &mut Vec<ChatTurn>) -> Option<ChatReply> {
        let reply = self.process(message).await?;
        history.push(ChatTurn::user(message.trim()));
        history.push(ChatTurn::assistant(reply.text.clone()));
        Some(reply)
    }

    async fn run(&self, message: &str, trace: &mut Trace) -> Result<Body, PipelineError> {
        let detected = self
            .bounded(Stage::Intent, trace, self.classifier.detect(message))
            .await?;
        tracing::debug!(intent = %detected.category, score = detected.score, "intent detected");
        let intent = detected.category.clone();
        trace.intent = Some(detected);

        if intent == names::HANDOFF {
            return Ok(Body {
                text: HANDOFF_REPLY.to_string(),
                outcome: ReplyOutcome::Handoff,
                sources: Vec::new(),
                top_matches: Vec::new(),
            });
        }

        let query = self
            .bounded(Stage::Embedding, trace, self.embedder.encode_one(message))
            .await?;

        let raw_hits = self.search(query, trace).await?;

        let hits = measured(Stage::Filter, &mut trace.timings, || {
            filter_hits(&raw_hits, &intent, self.settings.top_k)
        });
        tracing::debug!(raw = raw_hits.len(), kept = hits.len(), "hits filtered");

        let context = measured(Stage::Context, &mut trace.timings, || {
            assemble(
                &hits,
                self.settings.max_chars_per_doc,
                self.settings.max_sources,
            )
        });

        Ok(self.generate(message, &intent, &hits, context, trace).await)
    }

    async fn search(
        &self,
        query: Vec<f32>,
        trace: &mut Trace,
    ) -> Result<Vec<Hit>, PipelineError> {
        let index = Arc::clone(&self.index);
        let k = self.settings.candidates;
        let task = async move {
            tokio::task::spawn_blocking(move || index.search(&query, k))
                .await
                .map_err(|e| PipelineError::Join(e.to_string()))?
                .map_err(PipelineError::from)
        };
        self.bounded(Stage::Search, trace, task).await
    }

    async fn generate(
        &self,
        message: &str,
        intent: &str,
        hits: &[Hit],
        context: AssembledContext,
        trace: &mut Trace,
    ) -> Body {
        if context.is_empty() && !self.settings.generate_without_context {
            return Body {
                text: NO_CONTEXT_REPLY.to_string(),
                outcome: ReplyOutcome::Answered,
                sources: Vec::new(),
                top_matches: Vec::new(),
            };
        }

        let start = Instant::now();
        let budget = self.budget(trace.deadline, start);
        let result = if budget.is_zero() {
            Err(GenerationError::Timeout)
        } else {
            match timeout(budget, self.generator.answer(message, intent, &context.text)).await {
                Ok(result) => result,
                Err(_) => Err(GenerationError::Timeout),
            }
        };
        let elapsed = start.elapsed();
        trace.timings.set(Stage::Generation, elapsed);
        record_stage(Stage::Generation, elapsed, result.is_ok());

        match result {
            Ok(answer) => Body {
                text: with_sources(&answer, &context.sources),
                outcome: ReplyOutcome::Answered,
                sources: context.sources,
                top_matches: Vec::new(),
            },
            Err(err) => {
                tracing::warn!(kind = err.kind(), error = %err, "generation failed, showing top matches");
                let top_matches = top_match_titles(hits, self.settings.fallback_preview);
                Body {
                    text: with_top_matches(err.advisory(), &top_matches),
                    outcome: ReplyOutcome::Degraded(err),
                    sources: Vec::new(),
                    top_matches,
                }
            }
        }
    }

    /// Time left for a stage starting at `now`: the stage timeout, cut short
    /// by the request deadline.
    fn budget(&self, deadline: Instant, now: Instant) -> Duration {
        self.settings
            .stage_timeout
            .min(deadline.saturating_duration_since(now))
    }

    /// Run `fut` under the stage budget, recording its latency. Fails without
    /// polling `fut` once the request deadline has passed.
    async fn bounded<T, E, F>(
        &self,
        stage: Stage,
        trace: &mut Trace,
        fut: F,
    ) -> Result<T, PipelineError>
    where
        F: Future<Output = Result<T, E>>,
        E: Into<PipelineError>,
    {
        let start = Instant::now();
        let budget = self.budget(trace.deadline, start);
        let result = if budget.is_zero() {
            Err(PipelineError::Timeout {
                stage,
                timeout: budget,
            })
        } else {
            match timeout(budget, fut).await {
                Ok(result) => result.map_err(Into::into),
                Err(_) => Err(PipelineError::Timeout {
                    stage,
                    timeout: budget,
                }),
            }
        };
        let elapsed = start.elapsed();
        trace.timings.set(stage, elapsed);
        record_stage(stage, elapsed, result.is_ok());
        result
    }
}

fn measured<T>(stage: Stage, timings: &mut StageTimings, f: impl FnOnce() -> T) -> T {
    let start = Instant::now();
    let out = f();
    let elapsed = start.elapsed();
    timings.set(stage, elapsed);
    record_stage(stage, elapsed, true);
    out
}

fn record_stage(stage: Stage, latency: Duration, ok: bool) {
    if let Some(recorder) = metrics_recorder() {
        recorder.record_stage(stage, latency, ok);
    }
}
