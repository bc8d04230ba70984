use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Library exclusion rules and platform bindings as served by `GET /api/config`.
///
/// Upper-cased keys are a wire contract with the web UI.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct ConfigResponse {
    pub excluded_platforms: Vec<String>,
    pub excluded_single_ext: Vec<String>,
    pub excluded_single_files: Vec<String>,
    pub excluded_multi_files: Vec<String>,
    pub excluded_multi_parts_ext: Vec<String>,
    pub excluded_multi_parts_files: Vec<String>,
    pub platforms_binding: HashMap<String, String>,
    pub roms_folder_name: String,
    pub firmware_folder_name: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddExclusionBody {
    pub exclusion_type: String,
    pub exclusion_value: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_serializes_with_legacy_keys() {
        let config = ConfigResponse {
            roms_folder_name: "roms".to_string(),
            firmware_folder_name: "bios".to_string(),
            ..Default::default()
        };

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["ROMS_FOLDER_NAME"], "roms");
        assert_eq!(value["FIRMWARE_FOLDER_NAME"], "bios");
        assert_eq!(value["EXCLUDED_PLATFORMS"], serde_json::json!([]));
        assert_eq!(value["PLATFORMS_BINDING"], serde_json::json!({}));
        assert!(value.get("EXCLUDED_MULTI_PARTS_EXT").is_some());
    }
}
