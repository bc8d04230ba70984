use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SaveSchema {
    pub id: String,
    pub rom_id: String,
    pub user_id: String,
    pub file_name: String,
    pub file_name_no_tags: String,
    pub file_name_no_ext: String,
    pub file_extension: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    pub full_path: String,
    pub download_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emulator: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct StateSchema {
    pub id: String,
    pub rom_id: String,
    pub user_id: String,
    pub file_name: String,
    pub file_name_no_tags: String,
    pub file_name_no_ext: String,
    pub file_extension: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    pub full_path: String,
    pub download_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emulator: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ScreenshotSchema {
    pub id: String,
    pub rom_id: String,
    pub user_id: String,
    pub file_name: String,
    pub file_name_no_tags: String,
    pub file_name_no_ext: String,
    pub file_extension: String,
    pub file_path: String,
    pub file_size_bytes: u64,
    pub full_path: String,
    pub download_path: String,
    pub created_at: String,
    pub updated_at: String,
}
