//! ragchat server: HTTP API for the retrieval-augmented shop assistant
//!
//! Wraps [`ragchat::ChatPipeline`] in an axum router:
//!
//! - **Chat**: `POST /chat` and `POST /api/v1/chat`
//! - **Health & Metrics**: liveness/readiness probes and Prometheus text
//!
//! Requests pass through request-ID tracking, structured logging, a timeout,
//! compression, permissive CORS and a body size limit. Configuration comes
//! from `.env`, an optional `server.toml` and `RAGCHAT_SERVER__*` variables.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use server::ServerConfig;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ServerConfig::load()?;
//!     server::start_server(config).await?;
//!     Ok(())
//! }
//! ```
//!
//! # API Endpoints
//!
//! - `GET /` - API information
//! - `GET /health` - Liveness probe
//! - `GET /ready` - Readiness probe (documents loaded, intent count)
//! - `GET /metrics` - Prometheus metrics
//! - `POST /chat`, `POST /api/v1/chat` - `{message, history?, debug?}`

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod server;
pub mod state;
pub mod telemetry;

pub use config::ServerConfig;
pub use error::{ServerError, ServerResult};
pub use server::{build_router, start_server};
pub use state::ServerState;
