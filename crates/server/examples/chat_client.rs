//! Send a short conversation to a running ragchat server.
//!
//! ```text
//! cargo run -p ragchat-server --example chat_client -- http://127.0.0.1:7860
//! ```

use reqwest::Client;
use serde_json::{json, Value};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let base = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "http://127.0.0.1:7860".to_string());
    let client = Client::new();

    let ready: Value = client.get(format!("{base}/ready")).send().await?.json().await?;
    println!("ready: {ready}");

    let mut history = Value::Array(Vec::new());
    for message in ["hi!", "what is your return policy?", "I want to talk to an agent"] {
        let resp: Value = client
            .post(format!("{base}/api/v1/chat"))
            .json(&json!({ "message": message, "history": history, "debug": true }))
            .send()
            .await?
            .json()
            .await?;

        println!("> {message}");
        println!("{}", resp["reply"].as_str().unwrap_or_default());
        println!("  intent={} _ms={}\n", resp["intent"], resp["_ms"]);
        history = resp["history"].clone();
    }

    Ok(())
}
