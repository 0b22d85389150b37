//! Client-side event filtering declarations.
//!
//! These types describe the intended subscription-filter surface. No
//! dispatch logic consumes them yet; they exist so filter configuration can
//! be exchanged and persisted in a stable shape.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Which event family a filter applies to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum FilterScope {
    #[serde(rename = "presence")]
    Presence,
    #[serde(rename = "command")]
    Command,
    #[serde(rename = "all")]
    All,
}

/// A single subscription filter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventFilter {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub scope: Option<FilterScope>,
    /// Zones the filter admits, keyed by zone id.
    #[serde(rename = "zoneIds", default, skip_serializing_if = "HashMap::is_empty")]
    pub zone_ids: HashMap<String, bool>,
}

/// Routing table from event family to subscriber ids per zone.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoutingMap {
    #[serde(default)]
    pub all: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub presence: HashMap<String, Vec<String>>,
    #[serde(default)]
    pub command: HashMap<String, Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_json_roundtrip() {
        let filter = EventFilter {
            scope: Some(FilterScope::Presence),
            zone_ids: HashMap::from([("z-1".to_string(), true)]),
        };
        let json = serde_json::to_string(&filter).unwrap();
        assert!(json.contains("\"type\":\"presence\""));
        let parsed: EventFilter = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, filter);
    }

    #[test]
    fn empty_routing_map_deserializes() {
        let map: RoutingMap = serde_json::from_str("{}").unwrap();
        assert!(map.all.is_empty());
        assert!(map.presence.is_empty());
        assert!(map.command.is_empty());
    }
}
