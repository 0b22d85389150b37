//! Resilient event-stream client for the lightwire cloud.
//!
//! Authenticates against the cloud, opens a long-lived server-push event
//! stream, and keeps it alive across network failures, server-initiated
//! closures and token expiry, delivering every event to a single
//! registered callback in arrival order.
//!
//! ```no_run
//! use lightwire_sse::{SseClient, SseConfig};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let client = SseClient::new(SseConfig::default());
//! client.login("user@example.com", "hunter2").await?;
//! client
//!     .start(Box::new(|event| println!("{event:?}")))
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod client;
pub mod transport;
pub mod types;

mod credentials;
mod dispatch;
mod pump;

pub use auth::LoginError;
pub use client::{SseClient, StartError};
pub use transport::{
    Connector, EventStreamHandle, StreamControl, StreamNotice, TransportError, http_connector,
};
pub use types::{CachedLogin, ConnectionState, EventCallback, SseConfig};
