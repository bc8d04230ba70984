use std::fmt::Display;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::assets::{SaveSchema, ScreenshotSchema, StateSchema};

/// One file inside a multi-part game directory.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq)]
pub struct RomFile {
    pub filename: String,
    pub size: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct RomSchema {
    pub id: String,
    #[serde(default)]
    pub igdb_id: Option<i64>,
    #[serde(default)]
    pub moby_id: Option<i64>,
    pub platform_id: String,
    pub platform_slug: String,
    pub platform_name: String,
    pub file_name: String,
    pub file_name_no_tags: String,
    pub file_name_no_ext: String,
    pub file_extension: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url_cover: String,
    #[serde(default)]
    pub url_screenshots: Vec<String>,
    #[serde(default)]
    pub revision: String,
    #[serde(default)]
    pub regions: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    pub multi: bool,
    #[serde(default)]
    pub files: Vec<RomFile>,
    pub full_path: String,
    pub download_path: String,
    /// Raw per-source metadata as returned by the provider.
    #[serde(default)]
    pub igdb_metadata: Option<Value>,
    #[serde(default)]
    pub moby_metadata: Option<Value>,
    #[serde(default)]
    pub user_saves: Vec<SaveSchema>,
    #[serde(default)]
    pub user_states: Vec<StateSchema>,
    #[serde(default)]
    pub user_screenshots: Vec<ScreenshotSchema>,
    pub created_at: String,
    pub updated_at: String,
}

impl RomSchema {
    fn metadata_strings(&self, igdb_key: &str, moby_key: &str) -> Vec<String> {
        let from = |meta: &Option<Value>, key: &str| -> Option<Vec<String>> {
            let list = meta.as_ref()?.get(key)?.as_array()?;
            Some(
                list.iter()
                    .filter_map(|v| v.as_str().map(str::to_string))
                    .collect(),
            )
        };
        from(&self.igdb_metadata, igdb_key)
            .filter(|v| !v.is_empty())
            .or_else(|| from(&self.moby_metadata, moby_key))
            .unwrap_or_default()
    }

    /// Genres merged across sources, IGDB first.
    pub fn genres(&self) -> Vec<String> {
        self.metadata_strings("genres", "genres")
    }

    pub fn alternative_names(&self) -> Vec<String> {
        self.metadata_strings("alternative_names", "alternate_titles")
    }

    pub fn franchises(&self) -> Vec<String> {
        self.metadata_strings("franchises", "franchises")
    }

    pub fn companies(&self) -> Vec<String> {
        self.metadata_strings("companies", "companies")
    }

    pub fn first_release_date(&self) -> Option<i64> {
        self.igdb_metadata
            .as_ref()?
            .get("first_release_date")?
            .as_i64()
    }
}

impl Display for RomSchema {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let json = serde_json::to_string_pretty(self).unwrap();
        write!(f, "{}", json)
    }
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UpdateRomBody {
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default)]
    pub url_cover: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct DeleteRomsBody {
    pub roms: Vec<String>,
    #[serde(default)]
    pub delete_from_fs: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct NoteSchema {
    pub id: String,
    pub rom_id: String,
    pub user_id: String,
    pub user_username: String,
    pub raw_markdown: String,
    pub is_public: bool,
    pub last_edited_at: String,
}

#[derive(Debug, Serialize, Deserialize, Default)]
pub struct UpdateNoteBody {
    #[serde(default)]
    pub raw_markdown: Option<String>,
    #[serde(default)]
    pub is_public: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metadata_accessors_prefer_igdb_and_fall_back() {
        let mut rom = RomSchema::default();
        rom.igdb_metadata = Some(serde_json::json!({
            "genres": ["Platform"],
            "first_release_date": 824083200
        }));
        rom.moby_metadata = Some(serde_json::json!({
            "genres": ["Action"],
            "alternate_titles": ["Supa Mario"]
        }));

        assert_eq!(rom.genres(), vec!["Platform".to_string()]);
        assert_eq!(rom.alternative_names(), vec!["Supa Mario".to_string()]);
        assert_eq!(rom.first_release_date(), Some(824083200));
        assert!(rom.franchises().is_empty());
    }
}
