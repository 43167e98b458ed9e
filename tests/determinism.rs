mod common;

use std::sync::Arc;

use common::{harness, returns_hits, ScriptedGenerator};
use ragchat::{
    build_embedder, default_intents, Embedder, IntentClassifier, PipelineSettings, SemanticConfig,
};

#[tokio::test]
async fn identical_messages_produce_identical_replies() {
    let h = harness(
        returns_hits(),
        ScriptedGenerator::answering("Same answer."),
        PipelineSettings::default(),
    )
    .await;

    let a = h.pipeline.process("what is your return policy").await.unwrap();
    let b = h.pipeline.process("  what is your return policy ").await.unwrap();

    assert_eq!(a.text, b.text);
    assert_eq!(a.intent, b.intent);
    assert_eq!(a.score, b.score);
    assert_eq!(a.sources, b.sources);

    let prompts = h.generator.prompts();
    assert_eq!(prompts[0], prompts[1]);
}

#[tokio::test]
async fn stub_embedder_classifies_deterministically() {
    let cfg = SemanticConfig::default();
    let first: Arc<dyn Embedder> = build_embedder(&cfg).unwrap();
    let second: Arc<dyn Embedder> = build_embedder(&cfg).unwrap();

    let a = IntentClassifier::new(first, default_intents()).await.unwrap();
    let b = IntentClassifier::new(second, default_intents()).await.unwrap();

    for query in ["do you ship to Canada?", "any coupon today", "hello there"] {
        let ra = a.detect(query).await.unwrap();
        let rb = b.detect(query).await.unwrap();
        assert_eq!(ra, rb, "query {query:?}");
    }
    assert_eq!(a.categories(), b.categories());
}
