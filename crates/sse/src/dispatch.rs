//! Event dispatch: raw payload in, callback invocation out.
//!
//! Pure pass-through with two exceptions: payloads that fail to parse are
//! dropped, and a system payload signalling token expiry is routed to the
//! supervisor instead of the consumer.

use std::sync::{Arc, RwLock};

use tracing::{debug, warn};

use lightwire_protocol::SseEvent;

/// The single registered consumer callback.
pub(crate) type SharedCallback = Arc<dyn Fn(SseEvent) + Send + Sync>;
pub(crate) type CallbackSlot = Arc<RwLock<Option<SharedCallback>>>;

/// What became of one raw payload.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum Outcome {
    Delivered,
    Dropped,
    /// The payload was a token-expiry signal; the supervisor takes over.
    TokenExpired,
}

/// Parses a raw payload and delivers it, intercepting expiry signals.
pub(crate) fn handle_payload(callback: &CallbackSlot, raw: &str) -> Outcome {
    let event = match SseEvent::parse(raw) {
        Ok(event) => event,
        Err(e) => {
            debug!(error = %e, "dropping unparseable event payload");
            return Outcome::Dropped;
        }
    };

    if let SseEvent::System(sys) = &event {
        if sys.is_token_expired() {
            return Outcome::TokenExpired;
        }
    }

    deliver(callback, event)
}

/// Invokes the registered callback with an already-typed event.
pub(crate) fn deliver(callback: &CallbackSlot, event: SseEvent) -> Outcome {
    let cb = callback.read().unwrap().clone();
    match cb {
        Some(cb) => {
            cb(event);
            Outcome::Delivered
        }
        None => {
            warn!("no event callback registered, dropping event");
            Outcome::Dropped
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    fn recording_slot() -> (CallbackSlot, Arc<Mutex<Vec<SseEvent>>>) {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = received.clone();
        let cb: SharedCallback = Arc::new(move |event| {
            sink.lock().unwrap().push(event);
        });
        (Arc::new(RwLock::new(Some(cb))), received)
    }

    #[test]
    fn delivers_domain_payload() {
        let (slot, received) = recording_slot();
        let outcome = handle_payload(&slot, r#"{"type":"ping","counter":1}"#);
        assert_eq!(outcome, Outcome::Delivered);
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn drops_malformed_payload() {
        let (slot, received) = recording_slot();
        let outcome = handle_payload(&slot, "not json");
        assert_eq!(outcome, Outcome::Dropped);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn drops_payload_without_type_tag() {
        let (slot, received) = recording_slot();
        let outcome = handle_payload(&slot, r#"{"code":401}"#);
        assert_eq!(outcome, Outcome::Dropped);
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn intercepts_token_expiry() {
        let (slot, received) = recording_slot();
        let outcome = handle_payload(
            &slot,
            r#"{"type":"system","code":401,"subType":"TOKEN_EXPIRED"}"#,
        );
        assert_eq!(outcome, Outcome::TokenExpired);
        // The expiry signal itself is not delivered to the consumer.
        assert!(received.lock().unwrap().is_empty());
    }

    #[test]
    fn other_system_events_pass_through() {
        let (slot, received) = recording_slot();
        let outcome = handle_payload(&slot, r#"{"type":"system","code":200}"#);
        assert_eq!(outcome, Outcome::Delivered);
        assert_eq!(received.lock().unwrap().len(), 1);
    }

    #[test]
    fn no_callback_drops_event() {
        let slot: CallbackSlot = Arc::new(RwLock::new(None));
        let outcome = handle_payload(&slot, r#"{"type":"ping"}"#);
        assert_eq!(outcome, Outcome::Dropped);
    }
}
