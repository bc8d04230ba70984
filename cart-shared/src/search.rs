use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// One metadata match returned by `GET /api/search/roms`.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SearchRomSchema {
    #[serde(default)]
    pub igdb_id: Option<i64>,
    #[serde(default)]
    pub moby_id: Option<i64>,
    pub slug: String,
    pub name: String,
    pub summary: String,
    #[serde(default)]
    pub igdb_url_cover: String,
    #[serde(default)]
    pub moby_url_cover: String,
    #[serde(default)]
    pub url_screenshots: Vec<String>,
}

impl Display for SearchRomSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", json)
    }
}
