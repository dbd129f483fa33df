//! # paychat-llm-api
//!
//! Client side of the paychat streaming chat protocol.
//!
//! ## Features
//!
//! - **Streaming sessions**: `StreamSession` sends one message and yields
//!   typed `StreamEvent`s as the response arrives
//! - **Incremental decoding**: `data: ` framed lines are reassembled across
//!   arbitrary chunk boundaries, malformed frames are skipped
//! - **History budgeting**: oversized requests drop the oldest history until
//!   they fit the server's request size limit
//! - **Model catalog**: per-model completion limits fetched from the server
//!
//! ## Example
//!
//! ```rust,no_run
//! use futures_util::StreamExt;
//! use paychat_llm_api::{ApiConfig, SendIntent, SessionFactory};
//! use paychat_types::{Message, StreamEvent};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApiConfig::new("http://localhost:3000/api")
//!         .with_token(Some("your-token".to_string()));
//!     let session = SessionFactory::new(config).create();
//!
//!     let intent = SendIntent::new("openai/gpt-4o-mini", Message::user("Hello!"));
//!     let mut events = session.begin(intent);
//!     while let Some(event) = events.next().await {
//!         if let StreamEvent::ContentDelta(text) = event? {
//!             print!("{}", text);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod budget;
pub mod catalog;
pub mod client;
pub mod config;
pub mod decoder;
pub mod error;
pub mod session;

#[cfg(test)]
mod tests;

// Re-export commonly used types
pub use auth::{CredentialProvider, EnvCredential, StaticCredential};
pub use budget::{BudgetOutcome, HistoryBudgeter};
pub use catalog::{HttpModelCatalog, LlmModel, ModelCatalog, ModelPage, ModelQuery, StaticCatalog};
pub use client::{ChatTransport, HttpTransport, ScriptedResponse, ScriptedTransport, TransportRequest};
pub use config::{normalize_api_url, ApiConfig, SessionFactory, DEFAULT_API_URL};
pub use decoder::{decode_line, FrameDecoder};
pub use error::{ChatError, Result};
pub use session::{PreparedRequest, SendIntent, SessionStream, StreamSession};
