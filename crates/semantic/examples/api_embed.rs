use std::{env, error::Error};

use semantic::{build_embedder, dot, SemanticConfig};

/// Embeds two texts through a remote endpoint and prints their cosine similarity.
///
/// ```bash
/// RAGCHAT_EMBED_API_URL=https://router.huggingface.co/hf-inference/models/BAAI/bge-small-en-v1.5/pipeline/feature-extraction \
/// RAGCHAT_EMBED_API_TOKEN=hf_xxx \
/// cargo run -p ragchat-semantic --example api_embed -- "do you ship abroad" "international shipping"
/// ```
///
/// Without `RAGCHAT_EMBED_API_URL` the deterministic stub provider is used.
#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    let mut args = env::args().skip(1);
    let a = args.next().unwrap_or_else(|| "do you ship abroad".into());
    let b = args.next().unwrap_or_else(|| "international shipping".into());

    let cfg = match env::var("RAGCHAT_EMBED_API_URL") {
        Ok(url) => SemanticConfig {
            mode: "api".into(),
            api_url: Some(url),
            api_provider: Some("hf".into()),
            ..Default::default()
        },
        Err(_) => SemanticConfig::default(),
    };

    let embedder = build_embedder(&cfg)?;
    let vectors = embedder.encode(&[a.clone(), b.clone()]).await?;

    println!("model: {} (dim {})", embedder.model_name(), embedder.dimension());
    println!("cos({a:?}, {b:?}) = {:.4}", dot(&vectors[0], &vectors[1]));
    Ok(())
}
