use std::error::Error;

use ragchat::{AppConfig, ChatPipeline, ChatTurn};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn,ragchat=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let config = match std::env::args().nth(1).or_else(|| std::env::var("RAGCHAT_CONFIG").ok()) {
        Some(path) => AppConfig::from_file(&path)?,
        None => AppConfig::default(),
    };
    let pipeline = ChatPipeline::from_config(&config).await?;

    let mut stdout = tokio::io::stdout();
    stdout
        .write_all(b"Ask about products, shipping, returns... (:clear resets, :quit exits)\n> ")
        .await?;
    stdout.flush().await?;

    let mut history: Vec<ChatTurn> = Vec::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        match line.trim() {
            ":quit" | ":q" => break,
            ":clear" => {
                history.clear();
            }
            _ => {
                if let Some(reply) = pipeline.respond(&line, &mut history).await {
                    stdout.write_all(reply.text.as_bytes()).await?;
                    stdout.write_all(b"\n").await?;
                }
            }
        }
        stdout.write_all(b"> ").await?;
        stdout.flush().await?;
    }

    Ok(())
}
