use std::time::Duration;

/// Cadence of the keep-alive ping the cloud emits on an open stream.
///
/// Informational: the client never sends pings itself, it only relies on
/// their arrival to judge stream health.
pub const KEEP_ALIVE_PERIOD: Duration = Duration::from_secs(30);

/// Maximum silence tolerated on an open stream before it is assumed dead.
///
/// Must be longer than [`KEEP_ALIVE_PERIOD`]. A half-open connection may
/// never surface a transport error, so the deadline is the only reliable
/// signal for that case.
pub const LIVENESS_TIMEOUT: Duration = Duration::from_secs(40);

/// Fixed delay before a reconnect attempt after a transport failure.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

/// Delay between a successful token refresh and reopening the stream,
/// giving the cloud time to propagate the new token.
pub const TOKEN_SETTLE_DELAY: Duration = Duration::from_secs(2);

/// Cadence of the poll that notices a transport which closed without
/// surfacing an error notice.
pub const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// System event code for authorization failures.
pub const SYSTEM_CODE_UNAUTHORIZED: i32 = 401;

/// System sub-type: the bearer token expired server-side.
pub const SUBTYPE_TOKEN_EXPIRED: &str = "TOKEN_EXPIRED";

/// System sub-type: automatic re-authentication failed. Generated by the
/// client itself, never sent by the cloud.
pub const SUBTYPE_COULD_NOT_REFRESH_TOKEN: &str = "COULD_NOT_REFRESH_TOKEN";

/// Login rejection code: incorrect credentials.
pub const ERR_LOGIN_FAILED: &str = "LOGIN_FAILED";

/// Login rejection code: the account email has not been verified.
pub const ERR_LOGIN_EMAIL_NOT_VERIFIED: &str = "LOGIN_FAILED_EMAIL_NOT_VERIFIED";
