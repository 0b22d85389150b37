pub mod constants;
pub mod events;
pub mod filter;

// Re-export primary types for convenience.
pub use events::{
    ChangeOperation, CommandEvent, CommandKind, DataChangeEvent, DataScope, ItemRef, NodeRef,
    ParseError, PingEvent, PresenceEvent, PresenceKind, SseEvent, SystemEvent, ZoneRef,
};
pub use filter::{EventFilter, FilterScope, RoutingMap};
