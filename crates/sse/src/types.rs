//! Public types for the event-stream client.

use std::time::Duration;

use lightwire_protocol::SseEvent;
use lightwire_protocol::constants::{LIVENESS_TIMEOUT, RECONNECT_DELAY, TOKEN_SETTLE_DELAY};

/// Default event stream endpoint.
pub const DEFAULT_SSE_URL: &str = "https://events.lightwire.io/sse";
/// Default user login endpoint.
pub const DEFAULT_LOGIN_URL: &str = "https://cloud.lightwire.io/api/users/login";
/// Default base URL for hub token logins. A hub id and `/login` are
/// appended per request.
pub const DEFAULT_HUB_LOGIN_BASE: &str = "https://cloud.lightwire.io/api/hubs/";

/// Callback invoked for every delivered stream event.
pub type EventCallback = Box<dyn Fn(SseEvent) + Send + Sync>;

/// Connection state of the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// No stream has been started yet, or the last one ended without a
    /// pending recovery.
    Idle,
    /// Stream establishment in progress.
    Connecting,
    /// Stream open and delivering events.
    Open,
    /// Stream lost, a delayed reconnect attempt is pending.
    Reconnecting,
    /// Explicitly shut down. Only a fresh `start` leaves this state.
    Stopped,
}

/// How to authenticate again without caller involvement.
///
/// Written immediately before every authentication attempt so it always
/// reflects the latest credentials. Absent when the caller injected a token
/// directly, in which case automatic re-authentication is impossible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CachedLogin {
    User {
        email: String,
        hashed_password: String,
    },
    Hub {
        hub_id: String,
        hub_token: String,
    },
}

/// Client configuration. Every field has a sensible default.
#[derive(Debug, Clone)]
pub struct SseConfig {
    /// Event stream endpoint.
    pub sse_url: String,
    /// User login endpoint.
    pub login_url: String,
    /// Base URL for hub token logins. Normalized to end with `/`.
    pub hub_login_base: String,
    /// Reconnect automatically on transport failures.
    pub autoreconnect: bool,
    /// Require a bearer token before opening the stream.
    pub require_authentication: bool,
    /// Maximum silence tolerated on an open stream.
    pub liveness_timeout: Duration,
    /// Fixed delay before each reconnect attempt.
    pub reconnect_delay: Duration,
    /// Delay between a token refresh and reopening the stream.
    pub token_settle_delay: Duration,
}

impl Default for SseConfig {
    fn default() -> Self {
        Self {
            sse_url: DEFAULT_SSE_URL.to_string(),
            login_url: DEFAULT_LOGIN_URL.to_string(),
            hub_login_base: DEFAULT_HUB_LOGIN_BASE.to_string(),
            autoreconnect: true,
            require_authentication: true,
            liveness_timeout: LIVENESS_TIMEOUT,
            reconnect_delay: RECONNECT_DELAY,
            token_settle_delay: TOKEN_SETTLE_DELAY,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = SseConfig::default();
        assert!(config.autoreconnect);
        assert!(config.require_authentication);
        assert!(config.hub_login_base.ends_with('/'));
        assert_eq!(config.liveness_timeout, Duration::from_secs(40));
        assert_eq!(config.reconnect_delay, Duration::from_secs(2));
    }

    #[test]
    fn connection_state_equality() {
        assert_eq!(ConnectionState::Idle, ConnectionState::Idle);
        assert_ne!(ConnectionState::Open, ConnectionState::Connecting);
    }
}
