//! Connection supervision: the per-stream event pump, liveness deadline,
//! reconnect scheduling, and the token-refresh recovery path.
//!
//! Contains the shared [`SseContext`], cancellation helpers, and the pump
//! loop driving one live stream.

use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, RwLock};

use tokio::sync::{mpsc, oneshot};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use lightwire_protocol::constants::HEALTH_POLL_INTERVAL;
use lightwire_protocol::{SseEvent, SystemEvent};

use crate::auth::Authenticator;
use crate::client::StartError;
use crate::credentials::CredentialStore;
use crate::dispatch::{self, CallbackSlot, Outcome};
use crate::transport::{
    Connector, EventStreamHandle, StreamControl, StreamNotice, TransportError,
};
use crate::types::{ConnectionState, SseConfig};

/// Shared state threaded to the pump and recovery tasks. Avoids passing a
/// pile of separate `Arc` parameters around.
#[derive(Clone)]
pub(crate) struct SseContext {
    pub(crate) config: SseConfig,
    pub(crate) credentials: Arc<CredentialStore>,
    pub(crate) auth: Arc<Authenticator>,
    pub(crate) connector: Connector,
    pub(crate) state: Arc<RwLock<ConnectionState>>,
    pub(crate) callback: CallbackSlot,
    /// Control half of the single live stream, if any.
    pub(crate) handle: Arc<Mutex<Option<StreamControl>>>,
    /// Settlement for the pending `start` call. Taken exactly once.
    pub(crate) settle: Arc<Mutex<Option<oneshot::Sender<Result<(), StartError>>>>>,
    /// Cancel token for the single pending reconnect timer, if any.
    pub(crate) reconnect_cancel: Arc<Mutex<Option<CancellationToken>>>,
    pub(crate) autoreconnect: Arc<AtomicBool>,
}

impl SseContext {
    pub(crate) fn state(&self) -> ConnectionState {
        *self.state.read().unwrap()
    }

    pub(crate) fn set_state(&self, state: ConnectionState) {
        let mut current = self.state.write().unwrap();
        if *current != state {
            debug!(from = ?*current, to = ?state, "connection state changed");
            *current = state;
        }
    }

    /// Stream URL with the bearer token appended when one is held.
    pub(crate) fn stream_url(&self) -> String {
        match self.credentials.token() {
            Some(token) => format!("{}?accessToken={}", self.config.sse_url, token),
            None => self.config.sse_url.clone(),
        }
    }
}

/// Cancels the pending reconnect timer, if any.
pub(crate) fn cancel_reconnect(slot: &Arc<Mutex<Option<CancellationToken>>>) {
    if let Some(token) = slot.lock().unwrap().take() {
        token.cancel();
    }
}

/// Closes and forgets the live stream, if any.
pub(crate) fn close_handle(slot: &Arc<Mutex<Option<StreamControl>>>) {
    if let Some(control) = slot.lock().unwrap().take() {
        control.close();
    }
}

/// Resolves the pending `start` call, if one is still waiting.
pub(crate) fn settle_start(ctx: &SseContext, result: Result<(), StartError>) {
    if let Some(tx) = ctx.settle.lock().unwrap().take() {
        let _ = tx.send(result);
    }
}

/// Opens a stream and spawns its pump.
///
/// Returns a boxed future to break the recursive type cycle: the pump's
/// recovery paths call back into `start_attempt`.
pub(crate) fn start_attempt(ctx: SseContext) -> Pin<Box<dyn Future<Output = ()> + Send>> {
    Box::pin(async move {
        cancel_reconnect(&ctx.reconnect_cancel);
        close_handle(&ctx.handle);
        ctx.set_state(ConnectionState::Connecting);

        debug!(url = %ctx.config.sse_url, "opening event stream");
        match (ctx.connector)(ctx.stream_url()).await {
            Ok(EventStreamHandle { notices, control }) => {
                *ctx.handle.lock().unwrap() = Some(control.clone());
                tokio::spawn(run(ctx.clone(), notices, control));
            }
            Err(e) => {
                warn!(error = %e, "failed to open event stream");
                if ctx.autoreconnect.load(Ordering::Relaxed) {
                    ctx.set_state(ConnectionState::Reconnecting);
                    schedule_reconnect(ctx.clone());
                } else {
                    ctx.set_state(ConnectionState::Idle);
                    settle_start(&ctx, Err(StartError::Transport(e)));
                }
            }
        }
    })
}

/// Drives one live stream until it ends.
///
/// The liveness deadline is rearmed by every inbound notice, keep-alive
/// pings included. If nothing arrives within the window the stream is
/// assumed dead even though the transport never reported an error; a
/// half-open connection may never produce one.
pub(crate) async fn run(
    ctx: SseContext,
    mut notices: mpsc::Receiver<StreamNotice>,
    control: StreamControl,
) {
    let deadline = tokio::time::sleep(ctx.config.liveness_timeout);
    tokio::pin!(deadline);
    let mut health = tokio::time::interval(HEALTH_POLL_INTERVAL);
    health.tick().await; // Skip immediate first tick.

    loop {
        tokio::select! {
            _ = control.cancelled() => {
                debug!("event pump cancelled");
                return;
            }

            () = &mut deadline => {
                warn!("liveness deadline elapsed, assuming dead stream");
                on_stream_lost(&ctx, &control, None);
                return;
            }

            _ = health.tick() => {
                if control.is_closed() {
                    warn!("transport closed without an error notice");
                    on_stream_lost(&ctx, &control, Some(TransportError::Closed));
                    return;
                }
            }

            notice = notices.recv() => match notice {
                Some(StreamNotice::Open) => {
                    deadline.as_mut().reset(Instant::now() + ctx.config.liveness_timeout);
                    ctx.set_state(ConnectionState::Open);
                    settle_start(&ctx, Ok(()));
                    info!("event stream open");
                }
                Some(StreamNotice::Message(data)) => {
                    deadline.as_mut().reset(Instant::now() + ctx.config.liveness_timeout);
                    if let Outcome::TokenExpired = dispatch::handle_payload(&ctx.callback, &data) {
                        on_token_expired(&ctx, &control).await;
                        return;
                    }
                }
                Some(StreamNotice::Error(e)) => {
                    warn!(error = %e, "stream error");
                    on_stream_lost(&ctx, &control, Some(e));
                    return;
                }
                None => {
                    debug!("stream notice channel closed");
                    on_stream_lost(&ctx, &control, None);
                    return;
                }
            }
        }
    }
}

/// Handles a dead stream: tear down, then either schedule one delayed
/// reconnect (keeping the current token) or report the loss.
fn on_stream_lost(ctx: &SseContext, control: &StreamControl, error: Option<TransportError>) {
    control.close();
    {
        let mut slot = ctx.handle.lock().unwrap();
        let ours = slot.as_ref().is_some_and(|current| current.same(control));
        if !ours {
            // A newer attempt owns the connection; not ours to recover.
            return;
        }
        slot.take();
    }

    if ctx.autoreconnect.load(Ordering::Relaxed) {
        ctx.set_state(ConnectionState::Reconnecting);
        schedule_reconnect(ctx.clone());
    } else {
        ctx.set_state(ConnectionState::Idle);
        settle_start(
            ctx,
            Err(StartError::Transport(
                error.unwrap_or(TransportError::Closed),
            )),
        );
    }
}

/// Schedules a single delayed reconnect attempt, replacing any pending one.
fn schedule_reconnect(ctx: SseContext) {
    let cancel = CancellationToken::new();
    {
        let mut slot = ctx.reconnect_cancel.lock().unwrap();
        if let Some(prev) = slot.take() {
            prev.cancel();
        }
        *slot = Some(cancel.clone());
    }

    let delay = ctx.config.reconnect_delay;
    info!(delay_ms = delay.as_millis() as u64, "scheduling reconnect");
    tokio::spawn(async move {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("reconnect cancelled");
                return;
            }
            _ = tokio::time::sleep(delay) => {}
        }
        if cancel.is_cancelled() {
            return;
        }
        start_attempt(ctx).await;
    });
}

/// Handles a server-side token expiry signal: refresh the token through the
/// cached login and reopen the stream, or deliver a synthetic failure event
/// and stay disconnected.
async fn on_token_expired(ctx: &SseContext, control: &StreamControl) {
    info!("cloud reports the access token expired");
    control.close();
    {
        let mut slot = ctx.handle.lock().unwrap();
        let ours = slot.as_ref().is_some_and(|current| current.same(control));
        if !ours {
            return;
        }
        slot.take();
    }
    cancel_reconnect(&ctx.reconnect_cancel);

    let can_refresh = ctx.autoreconnect.load(Ordering::Relaxed)
        && ctx.credentials.cached_login().is_some();
    if !can_refresh {
        warn!("no cached credentials for automatic token refresh");
        emit_refresh_failure(ctx);
        ctx.set_state(ConnectionState::Idle);
        return;
    }

    ctx.set_state(ConnectionState::Connecting);
    match ctx.auth.retry_login().await {
        Ok(token) => {
            if ctx.state() == ConnectionState::Stopped {
                debug!("discarding token refresh resolved after stop");
                return;
            }
            ctx.credentials.set_token(&token);
            tokio::time::sleep(ctx.config.token_settle_delay).await;
            if ctx.state() == ConnectionState::Stopped {
                return;
            }
            info!("token refreshed, reopening event stream");
            start_attempt(ctx.clone()).await;
        }
        Err(e) => {
            if ctx.state() == ConnectionState::Stopped {
                return;
            }
            warn!(error = %e, "automatic token refresh failed");
            emit_refresh_failure(ctx);
            ctx.set_state(ConnectionState::Idle);
        }
    }
}

/// Delivers the synthetic recovery-failure event through the ordinary
/// event channel; no caller is waiting synchronously once the stream has
/// been open.
fn emit_refresh_failure(ctx: &SseContext) {
    dispatch::deliver(
        &ctx.callback,
        SseEvent::System(SystemEvent::could_not_refresh_token()),
    );
}
