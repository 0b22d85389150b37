//! Public client: configuration, login surface, and the start/stop
//! lifecycle around the supervised event stream.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::oneshot;
use tracing::{debug, info, warn};

use crate::auth::{Authenticator, LoginError};
use crate::credentials::CredentialStore;
use crate::pump::{self, SseContext};
use crate::transport::{Connector, TransportError, http_connector};
use crate::types::{ConnectionState, EventCallback, SseConfig};

/// Errors from [`SseClient::start`].
#[derive(Debug, thiserror::Error)]
pub enum StartError {
    #[error("access token is required; log in or set a token first")]
    MissingToken,

    #[error("transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("superseded by a newer start call")]
    Superseded,

    #[error("client stopped")]
    Stopped,
}

/// Resilient event-stream client.
///
/// Authenticates against the cloud, opens the push stream, and keeps it
/// alive across transport failures and token expiry. Every received event
/// goes to the single callback registered via [`Self::start`], in arrival
/// order.
pub struct SseClient {
    ctx: SseContext,
}

impl SseClient {
    /// Creates a client with the default HTTP transport.
    pub fn new(config: SseConfig) -> Self {
        Self::with_connector(config, http_connector())
    }

    /// Creates a client with a custom stream connector. Tests and embedders
    /// with their own transport plug in here.
    pub fn with_connector(mut config: SseConfig, connector: Connector) -> Self {
        if !config.hub_login_base.ends_with('/') {
            config.hub_login_base.push('/');
        }
        let credentials = Arc::new(CredentialStore::new());
        let auth = Arc::new(Authenticator::new(&config, credentials.clone()));
        let autoreconnect = config.autoreconnect;

        Self {
            ctx: SseContext {
                config,
                credentials,
                auth,
                connector,
                state: Arc::new(RwLock::new(ConnectionState::Idle)),
                callback: Arc::new(RwLock::new(None)),
                handle: Arc::new(Mutex::new(None)),
                settle: Arc::new(Mutex::new(None)),
                reconnect_cancel: Arc::new(Mutex::new(None)),
                autoreconnect: Arc::new(AtomicBool::new(autoreconnect)),
            },
        }
    }

    /// Logs in with an email and plaintext password. The password is
    /// SHA-1-hashed locally and never transmitted.
    pub async fn login(&self, email: &str, password: &str) -> Result<(), LoginError> {
        self.ctx.auth.login(email, password).await
    }

    /// Logs in with an email and a precomputed SHA-1 password digest.
    pub async fn login_hashed(&self, email: &str, sha1_hash: &str) -> Result<(), LoginError> {
        self.ctx.auth.login_hashed(email, sha1_hash).await
    }

    /// Logs in with a pre-shared hub token.
    pub async fn hub_login(&self, hub_id: &str, hub_token: &str) -> Result<(), LoginError> {
        self.ctx.auth.hub_login(hub_id, hub_token).await
    }

    /// Injects a bearer token directly, bypassing the login flows. With no
    /// cached login the client cannot re-authenticate when this token
    /// expires; expiry then surfaces as a synthetic system event.
    pub fn set_access_token(&self, token: &str) {
        self.ctx.credentials.set_token(token);
    }

    /// The currently held bearer token, if any.
    pub fn access_token(&self) -> Option<String> {
        self.ctx.credentials.token()
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.ctx.state()
    }

    /// Opens the event stream and registers the consumer callback,
    /// resolving once the stream is open.
    ///
    /// Replaces any previous stream and callback; a still-pending earlier
    /// `start` resolves with [`StartError::Superseded`]. With autoreconnect
    /// enabled the call keeps waiting across failed attempts until a stream
    /// opens; otherwise the first failure is returned.
    pub async fn start(&self, callback: EventCallback) -> Result<(), StartError> {
        if self.ctx.config.require_authentication && self.ctx.credentials.token().is_none() {
            warn!("start refused: no access token set");
            return Err(StartError::MissingToken);
        }

        // A fresh start leaves Stopped and restores the configured
        // reconnect behavior.
        self.ctx
            .autoreconnect
            .store(self.ctx.config.autoreconnect, Ordering::Relaxed);
        *self.ctx.callback.write().unwrap() = Some(Arc::from(callback));

        let (tx, rx) = oneshot::channel();
        drop(self.ctx.settle.lock().unwrap().replace(tx));

        pump::start_attempt(self.ctx.clone()).await;

        match rx.await {
            Ok(result) => result,
            Err(_) => Err(StartError::Superseded),
        }
    }

    /// Shuts the stream down: cancels all timers, disables reconnection,
    /// closes the transport, and drops the callback. A no-op when nothing
    /// is running. A later [`Self::start`] brings the client back.
    pub fn stop(&self) {
        let state = self.state();
        if matches!(state, ConnectionState::Idle | ConnectionState::Stopped) {
            debug!("stop ignored, client not running");
            return;
        }

        info!("stopping event stream client");
        self.ctx.autoreconnect.store(false, Ordering::Relaxed);
        pump::cancel_reconnect(&self.ctx.reconnect_cancel);
        pump::close_handle(&self.ctx.handle);
        *self.ctx.callback.write().unwrap() = None;
        if let Some(tx) = self.ctx.settle.lock().unwrap().take() {
            let _ = tx.send(Err(StartError::Stopped));
        }
        self.ctx.set_state(ConnectionState::Stopped);
    }
}
