use serde::{Deserialize, Serialize};

/// Library totals as served by `GET /api/stats`. Upper-cased keys are a wire
/// contract with the web UI.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StatsResponse {
    pub platforms: u64,
    pub roms: u64,
    pub saves: u64,
    pub states: u64,
    pub screenshots: u64,
    pub filesize: u64,
}
