use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const EVENT_SCAN: &str = "scan";
pub const EVENT_SCAN_STOP: &str = "scan:stop";
pub const EVENT_SCANNING_PLATFORM: &str = "scan:scanning_platform";
pub const EVENT_SCANNING_FIRMWARE: &str = "scan:scanning_firmware";
pub const EVENT_SCANNING_ROM: &str = "scan:scanning_rom";
pub const EVENT_SCAN_DONE: &str = "scan:done";
pub const EVENT_SCAN_DONE_KO: &str = "scan:done_ko";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ScanType {
    /// Only scan roms not yet in the database.
    Quick,
    /// Rescan everything, refreshing metadata for known roms too.
    Complete,
    /// Only scan platforms not yet in the database.
    NewPlatforms,
    /// Rescan roms that are missing metadata from at least one source.
    Partial,
    /// Rescan roms with no metadata match at all.
    Unidentified,
    /// Sync the filesystem state without fetching any metadata.
    NoScan,
}

impl Default for ScanType {
    fn default() -> Self {
        ScanType::Quick
    }
}

impl ScanType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ScanType::Quick => "quick",
            ScanType::Complete => "complete",
            ScanType::NewPlatforms => "new_platforms",
            ScanType::Partial => "partial",
            ScanType::Unidentified => "unidentified",
            ScanType::NoScan => "no_scan",
        }
    }

    pub fn from_str(s: &str) -> Result<Self, String> {
        match s.to_lowercase().as_str() {
            "quick" => Ok(ScanType::Quick),
            "complete" => Ok(ScanType::Complete),
            "new_platforms" => Ok(ScanType::NewPlatforms),
            "partial" => Ok(ScanType::Partial),
            "unidentified" => Ok(ScanType::Unidentified),
            "no_scan" => Ok(ScanType::NoScan),
            _ => Err(format!(
                "Invalid scan type: {}. Choose from quick, complete, new_platforms, partial, unidentified, no_scan",
                s
            )),
        }
    }
}

/// Options accepted by the `scan` socket event.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ScanRequest {
    /// Platform ids to scan; empty means every platform on disk.
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(rename = "type", default)]
    pub scan_type: ScanType,
    /// Rom ids to rescan regardless of the scan type.
    #[serde(default)]
    pub roms: Vec<String>,
    /// Metadata sources to query; empty means all enabled sources.
    #[serde(default)]
    pub apis: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScanStats {
    pub scanned_platforms: u32,
    pub added_platforms: u32,
    pub metadata_platforms: u32,
    pub scanned_roms: u32,
    pub added_roms: u32,
    pub metadata_roms: u32,
    pub scanned_firmware: u32,
    pub added_firmware: u32,
}

/// Envelope for every message on the `/ws` socket, both directions.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct SocketMessage {
    pub event: String,
    #[serde(default)]
    pub data: Value,
}

impl SocketMessage {
    pub fn new(event: &str, data: impl Serialize) -> Self {
        SocketMessage {
            event: event.to_string(),
            data: serde_json::to_value(data).unwrap_or(Value::Null),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scan_request_fills_defaults() {
        // The UI sends only what the user picked; everything else defaults.
        let request: ScanRequest =
            serde_json::from_str(r#"{"platforms": ["ps2"], "type": "complete"}"#).unwrap();
        assert_eq!(request.platforms, vec!["ps2".to_string()]);
        assert_eq!(request.scan_type, ScanType::Complete);
        assert!(request.roms.is_empty());
        assert!(request.apis.is_empty());

        let empty: ScanRequest = serde_json::from_str("{}").unwrap();
        assert_eq!(empty.scan_type, ScanType::Quick);
    }

    #[test]
    fn scan_type_names_match_wire_values() {
        assert_eq!(ScanType::from_str("new_platforms"), Ok(ScanType::NewPlatforms));
        assert_eq!(ScanType::from_str("QUICK"), Ok(ScanType::Quick));
        assert!(ScanType::from_str("full").is_err());
        assert_eq!(
            serde_json::to_value(ScanType::NoScan).unwrap(),
            Value::String("no_scan".to_string())
        );
    }
}
