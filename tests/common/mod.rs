//! In-process fakes for the embedding provider, vector index and answer
//! generator, shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use ragchat::{
    default_intents, AnswerGenerator, ChatPipeline, Document, Embedder, GenerationError, Hit,
    IndexError, IntentClassifier, IntentDefinition, PipelineSettings, SemanticError, VectorSearch,
};

/// Exact bag-of-words over the exemplar vocabulary, L2-normalized.
pub struct VocabEmbedder {
    words: Vec<String>,
    calls: AtomicUsize,
}

impl VocabEmbedder {
    pub fn from_definitions(defs: &[IntentDefinition]) -> Self {
        let mut words: Vec<String> = Vec::new();
        for phrase in defs.iter().flat_map(|d| d.exemplars.iter()) {
            for w in tokens(phrase) {
                if !words.contains(&w) {
                    words.push(w);
                }
            }
        }
        Self {
            words,
            calls: AtomicUsize::new(0),
        }
    }

    /// Number of `encode` calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

fn tokens(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl Embedder for VocabEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(texts
            .iter()
            .map(|t| {
                let mut v = vec![0.0f32; self.words.len()];
                for w in tokens(t) {
                    if let Some(i) = self.words.iter().position(|x| *x == w) {
                        v[i] += 1.0;
                    }
                }
                semantic::l2_normalize_in_place(&mut v);
                v
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.words.len()
    }

    fn model_name(&self) -> &str {
        "vocabulary"
    }
}

/// Classifies like [`VocabEmbedder`] but fails every query embedding after
/// the centroids are built.
pub struct FlakyEmbedder {
    inner: VocabEmbedder,
    allowed: AtomicUsize,
}

impl FlakyEmbedder {
    /// Succeeds for the first `allowed` calls.
    pub fn new(inner: VocabEmbedder, allowed: usize) -> Self {
        Self {
            inner,
            allowed: AtomicUsize::new(allowed),
        }
    }
}

#[async_trait]
impl Embedder for FlakyEmbedder {
    async fn encode(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, SemanticError> {
        let left = self.allowed.load(Ordering::SeqCst);
        if left == 0 {
            return Err(SemanticError::Request("connection reset by peer".into()));
        }
        self.allowed.store(left - 1, Ordering::SeqCst);
        self.inner.encode(texts).await
    }

    fn dimension(&self) -> usize {
        self.inner.dimension()
    }

    fn model_name(&self) -> &str {
        "flaky"
    }
}

/// Returns a fixed, best-first hit list regardless of the query.
pub struct FixedIndex {
    hits: Vec<Hit>,
    dimension: usize,
    delay: Option<Duration>,
    fail: bool,
    calls: AtomicUsize,
}

impl FixedIndex {
    pub fn new(hits: Vec<Hit>, dimension: usize) -> Self {
        Self {
            hits,
            dimension,
            delay: None,
            fail: false,
            calls: AtomicUsize::new(0),
        }
    }

    /// Block the calling thread for `delay` before answering.
    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl VectorSearch for FixedIndex {
    fn search(&self, query: &[f32], k: usize) -> Result<Vec<Hit>, IndexError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail {
            return Err(IndexError::Io("index file vanished".into()));
        }
        if query.len() != self.dimension {
            return Err(IndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        Ok(self.hits.iter().take(k).cloned().collect())
    }

    fn len(&self) -> usize {
        self.hits.len()
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Replays one scripted result and records the prompts it was given.
pub struct ScriptedGenerator {
    result: Result<String, GenerationError>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedGenerator {
    pub fn answering(text: &str) -> Self {
        Self::with_result(Ok(text.to_string()))
    }

    pub fn failing(err: GenerationError) -> Self {
        Self::with_result(Err(err))
    }

    fn with_result(result: Result<String, GenerationError>) -> Self {
        Self {
            result,
            delay: None,
            calls: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn slow(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// User prompts received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }
}

#[async_trait]
impl AnswerGenerator for ScriptedGenerator {
    async fn generate(&self, _system: &str, user: &str) -> Result<String, GenerationError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prompts.lock().unwrap().push(user.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.result.clone()
    }
}

pub fn faq(id: &str, title: &str, url: &str, body: &str) -> Document {
    Document::new(id, body)
        .with_type("faq")
        .with_title(title)
        .with_url(url)
}

pub fn product(id: &str, title: &str, url: &str, body: &str) -> Document {
    Document::new(id, body)
        .with_type("product")
        .with_title(title)
        .with_url(url)
}

pub fn hit(doc: Document, score: f32) -> Hit {
    Hit::new(Arc::new(doc), score)
}

/// Product first, then two FAQs, best-first.
pub fn returns_hits() -> Vec<Hit> {
    vec![
        hit(
            product(
                "p-1",
                "Leather weekender bag",
                "https://shop.example/p/weekender",
                "Full-grain leather, 45 L.",
            ),
            0.9,
        ),
        hit(
            faq(
                "faq-returns",
                "Return policy",
                "https://shop.example/faq/returns",
                "Unused items can be returned within 30 days.",
            ),
            0.8,
        ),
        hit(
            faq(
                "faq-refunds",
                "Refund timing",
                "https://shop.example/faq/refunds",
                "Refunds are issued within 5 business days.",
            ),
            0.7,
        ),
    ]
}

/// Everything a test needs to drive and inspect one pipeline.
pub struct Harness {
    pub pipeline: ChatPipeline,
    pub embedder: Arc<VocabEmbedder>,
    pub index: Arc<FixedIndex>,
    pub generator: Arc<ScriptedGenerator>,
}

pub async fn harness(
    hits: Vec<Hit>,
    generator: ScriptedGenerator,
    settings: PipelineSettings,
) -> Harness {
    let defs = default_intents();
    let embedder = Arc::new(VocabEmbedder::from_definitions(&defs));
    let index = Arc::new(FixedIndex::new(hits, embedder.dimension()));
    harness_with_index(embedder, index, generator, settings).await
}

pub async fn harness_with_index(
    embedder: Arc<VocabEmbedder>,
    index: Arc<FixedIndex>,
    generator: ScriptedGenerator,
    settings: PipelineSettings,
) -> Harness {
    let classifier = IntentClassifier::new(embedder.clone(), default_intents())
        .await
        .expect("default intents build");
    let generator = Arc::new(generator);
    let pipeline = ChatPipeline::new(
        Arc::new(classifier),
        embedder.clone(),
        index.clone(),
        generator.clone(),
        settings,
    );
    Harness {
        pipeline,
        embedder,
        index,
        generator,
    }
}
