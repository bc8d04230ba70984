use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Service status returned by `GET /api/heartbeat`.
///
/// The upper-cased field names are a wire contract shared with the web UI
/// and older CLI builds; they predate the snake_case used everywhere else.
/// Subsystem reports are carried as raw JSON so the server can extend them
/// without breaking clients that only relay or display them.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct HeartbeatResponse {
    pub version: String,
    pub new_version: String,
    pub watcher: Value,
    pub scheduler: Value,
    pub any_source_enabled: bool,
    pub metadata_sources: Value,
}

impl HeartbeatResponse {
    /// True when the server reports a newer release than it is running.
    pub fn update_available(&self) -> bool {
        !self.new_version.is_empty() && self.new_version != self.version
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const FIXTURE: &str = r#"{
        "VERSION": "0.5.0",
        "NEW_VERSION": "0.5.1",
        "WATCHER": {
            "ENABLED": true,
            "TITLE": "Rescan on filesystem change",
            "MESSAGE": "Runs a quick scan 5 minutes after a change is detected"
        },
        "SCHEDULER": {
            "RESCAN": {"ENABLED": false, "CRON": "0 0 3 * * *"},
            "SWITCH_TITLEDB": {"ENABLED": true, "CRON": "0 0 4 * * *"}
        },
        "ANY_SOURCE_ENABLED": true,
        "METADATA_SOURCES": {
            "IGDB_API_ENABLED": true,
            "MOBY_API_ENABLED": false
        }
    }"#;

    #[test]
    fn parses_and_round_trips_subsystem_payloads() {
        let heartbeat: HeartbeatResponse = serde_json::from_str(FIXTURE).unwrap();
        assert_eq!(heartbeat.version, "0.5.0");
        assert_eq!(heartbeat.new_version, "0.5.1");
        assert!(heartbeat.any_source_enabled);
        assert!(heartbeat.update_available());

        // Nested reports are opaque: whatever the server sent must survive
        // a serialize/deserialize cycle untouched, unknown keys included.
        let reserialized = serde_json::to_string(&heartbeat).unwrap();
        let a: Value = serde_json::from_str(FIXTURE).unwrap();
        let b: Value = serde_json::from_str(&reserialized).unwrap();
        assert_eq!(a, b);

        assert_eq!(heartbeat.watcher["ENABLED"], Value::Bool(true));
        assert_eq!(
            heartbeat.scheduler["SWITCH_TITLEDB"]["CRON"],
            Value::String("0 0 4 * * *".to_string())
        );
    }

    #[test]
    fn serializes_with_legacy_field_casing() {
        let heartbeat = HeartbeatResponse {
            version: "0.5.0".to_string(),
            new_version: String::new(),
            watcher: serde_json::json!({}),
            scheduler: serde_json::json!({}),
            any_source_enabled: false,
            metadata_sources: serde_json::json!({}),
        };

        let value = serde_json::to_value(&heartbeat).unwrap();
        let keys: Vec<&str> = value.as_object().unwrap().keys().map(String::as_str).collect();
        for key in [
            "VERSION",
            "NEW_VERSION",
            "WATCHER",
            "SCHEDULER",
            "ANY_SOURCE_ENABLED",
            "METADATA_SOURCES",
        ] {
            assert!(keys.contains(&key), "missing key {key}");
        }
        assert_eq!(keys.len(), 6);
        assert!(!heartbeat.update_available());
    }

    #[test]
    fn rejects_payloads_with_missing_fields() {
        // Every field is mandatory; a server that omits one is broken and
        // the client should fail loudly rather than fill in defaults.
        let partial = r#"{"VERSION": "0.5.0", "NEW_VERSION": ""}"#;
        assert!(serde_json::from_str::<HeartbeatResponse>(partial).is_err());

        let wrong_case = r#"{
            "version": "0.5.0",
            "new_version": "",
            "watcher": {},
            "scheduler": {},
            "any_source_enabled": false,
            "metadata_sources": {}
        }"#;
        assert!(serde_json::from_str::<HeartbeatResponse>(wrong_case).is_err());
    }
}
