use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use cart_shared::config::ConfigResponse;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::response::{ServerError, ServerResult};

/// Fixed library folder names. The scanner accepts both
/// `<library>/roms/<platform>` and `<library>/<platform>/roms`.
pub const ROMS_FOLDER_NAME: &str = "roms";
pub const FIRMWARE_FOLDER_NAME: &str = "bios";

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub mongo_uri: String,
    pub mongo_db: String,
    pub host: String,
    pub port: u16,
    pub auth_secret_key: String,
    pub library_path: PathBuf,
    pub resources_path: PathBuf,
    pub assets_path: PathBuf,
    pub config_path: PathBuf,
    pub admin_username: String,
    pub admin_password: String,
    pub igdb_client_id: Option<String>,
    pub igdb_client_secret: Option<String>,
    pub moby_api_key: Option<String>,
    pub enable_rescan_on_filesystem_change: bool,
    pub rescan_on_filesystem_change_delay: u64,
    pub enable_scheduled_rescan: bool,
    pub scheduled_rescan_cron: String,
    pub enable_scheduled_update_switch_titledb: bool,
    pub scheduled_update_switch_titledb_cron: String,
    pub enable_scheduled_update_mame_xml: bool,
    pub scheduled_update_mame_xml_cron: String,
    pub scan_timeout_secs: u64,
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.into())
}

fn env_flag(key: &str, default: bool) -> bool {
    match std::env::var(key) {
        Ok(v) => matches!(v.to_lowercase().as_str(), "1" | "true" | "yes"),
        Err(_) => default,
    }
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

impl AppConfig {
    pub fn from_env() -> ServerResult<Self> {
        // Keep it simple: read from env; in prod you might use figment/envy.
        let mongo_uri = env_or("MONGO_URI", "mongodb://localhost:27017");
        let mongo_db = env_or("MONGO_DB", "cartridge");
        let host = env_or("HOST", "0.0.0.0");
        let port = env_or("PORT", "5000")
            .parse()
            .map_err(|_| ServerError::internal_error("PORT must be a number"))?;

        let auth_secret_key = env_or("AUTH_SECRET_KEY", "change_me_in_prod");
        let library_path = PathBuf::from(env_or("LIBRARY_PATH", "./library"));
        let resources_path = PathBuf::from(env_or("RESOURCES_PATH", "./resources"));
        let assets_path = PathBuf::from(env_or("ASSETS_PATH", "./assets"));
        let config_path = PathBuf::from(env_or("CONFIG_PATH", "./config.yml"));

        let admin_username = env_or("ADMIN_USERNAME", "admin");
        let admin_password = env_or("ADMIN_PASSWORD", "admin");

        let scan_timeout_secs = env_or("SCAN_TIMEOUT", "14400")
            .parse()
            .map_err(|_| ServerError::internal_error("SCAN_TIMEOUT must be seconds"))?;

        Ok(Self {
            mongo_uri,
            mongo_db,
            host,
            port,
            auth_secret_key,
            library_path,
            resources_path,
            assets_path,
            config_path,
            admin_username,
            admin_password,
            igdb_client_id: env_opt("IGDB_CLIENT_ID"),
            igdb_client_secret: env_opt("IGDB_CLIENT_SECRET"),
            moby_api_key: env_opt("MOBYGAMES_API_KEY"),
            enable_rescan_on_filesystem_change: env_flag(
                "ENABLE_RESCAN_ON_FILESYSTEM_CHANGE",
                false,
            ),
            rescan_on_filesystem_change_delay: env_or("RESCAN_ON_FILESYSTEM_CHANGE_DELAY", "5")
                .parse()
                .unwrap_or(5),
            enable_scheduled_rescan: env_flag("ENABLE_SCHEDULED_RESCAN", false),
            scheduled_rescan_cron: env_or("SCHEDULED_RESCAN_CRON", "0 0 3 * * *"),
            enable_scheduled_update_switch_titledb: env_flag(
                "ENABLE_SCHEDULED_UPDATE_SWITCH_TITLEDB",
                false,
            ),
            scheduled_update_switch_titledb_cron: env_or(
                "SCHEDULED_UPDATE_SWITCH_TITLEDB_CRON",
                "0 0 4 * * *",
            ),
            enable_scheduled_update_mame_xml: env_flag("ENABLE_SCHEDULED_UPDATE_MAME_XML", false),
            scheduled_update_mame_xml_cron: env_or(
                "SCHEDULED_UPDATE_MAME_XML_CRON",
                "0 0 5 * * *",
            ),
            scan_timeout_secs,
        })
    }
}

/// `config.yml` shape, matching the structure the web UI documents:
/// exclusions for platforms, single-file roms, multi-file roms and their
/// parts, plus folder-to-slug platform bindings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LibraryConfig {
    #[serde(default)]
    pub exclude: ExcludeConfig,
    #[serde(default)]
    pub system: SystemConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ExcludeConfig {
    #[serde(default)]
    pub platforms: Vec<String>,
    #[serde(default)]
    pub roms: RomsExcludeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RomsExcludeConfig {
    #[serde(default)]
    pub single_file: FileExcludeConfig,
    #[serde(default)]
    pub multi_file: MultiFileExcludeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileExcludeConfig {
    #[serde(default)]
    pub extensions: Vec<String>,
    #[serde(default)]
    pub names: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MultiFileExcludeConfig {
    #[serde(default)]
    pub names: Vec<String>,
    #[serde(default)]
    pub parts: FileExcludeConfig,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SystemConfig {
    /// Maps a filesystem folder name to the canonical platform slug.
    #[serde(default)]
    pub platforms: HashMap<String, String>,
}

/// Owns the parsed `config.yml` and writes mutations back to disk.
pub struct LibraryConfigManager {
    path: PathBuf,
    config: RwLock<LibraryConfig>,
}

impl LibraryConfigManager {
    pub fn load(path: &Path) -> ServerResult<Self> {
        let config = if path.exists() {
            let raw = std::fs::read_to_string(path)?;
            serde_yaml::from_str(&raw)?
        } else {
            warn!("No config file at {}, starting empty", path.display());
            LibraryConfig::default()
        };

        Ok(Self {
            path: path.to_path_buf(),
            config: RwLock::new(config),
        })
    }

    pub fn snapshot(&self) -> LibraryConfig {
        self.config.read().expect("config lock poisoned").clone()
    }

    pub fn to_response(&self) -> ConfigResponse {
        let cfg = self.snapshot();
        ConfigResponse {
            excluded_platforms: cfg.exclude.platforms.clone(),
            excluded_single_ext: cfg.exclude.roms.single_file.extensions.clone(),
            excluded_single_files: cfg.exclude.roms.single_file.names.clone(),
            excluded_multi_files: cfg.exclude.roms.multi_file.names.clone(),
            excluded_multi_parts_ext: cfg.exclude.roms.multi_file.parts.extensions.clone(),
            excluded_multi_parts_files: cfg.exclude.roms.multi_file.parts.names.clone(),
            platforms_binding: cfg.system.platforms.clone(),
            roms_folder_name: ROMS_FOLDER_NAME.to_string(),
            firmware_folder_name: FIRMWARE_FOLDER_NAME.to_string(),
        }
    }

    pub fn add_exclusion(&self, kind: &str, value: &str) -> ServerResult<()> {
        self.mutate(|cfg| {
            let list = exclusion_list(cfg, kind)?;
            if !list.iter().any(|v| v == value) {
                list.push(value.to_string());
            }
            Ok(())
        })
    }

    pub fn remove_exclusion(&self, kind: &str, value: &str) -> ServerResult<()> {
        self.mutate(|cfg| {
            let list = exclusion_list(cfg, kind)?;
            list.retain(|v| v != value);
            Ok(())
        })
    }

    pub fn add_platform_binding(&self, fs_slug: &str, slug: &str) -> ServerResult<()> {
        self.mutate(|cfg| {
            cfg.system
                .platforms
                .insert(fs_slug.to_string(), slug.to_string());
            Ok(())
        })
    }

    pub fn remove_platform_binding(&self, fs_slug: &str) -> ServerResult<()> {
        self.mutate(|cfg| {
            cfg.system.platforms.remove(fs_slug);
            Ok(())
        })
    }

    fn mutate(&self, f: impl FnOnce(&mut LibraryConfig) -> ServerResult<()>) -> ServerResult<()> {
        let updated = {
            let mut cfg = self.config.write().expect("config lock poisoned");
            f(&mut cfg)?;
            cfg.clone()
        };
        let raw = serde_yaml::to_string(&updated)?;
        std::fs::write(&self.path, raw)?;
        Ok(())
    }
}

fn exclusion_list<'a>(cfg: &'a mut LibraryConfig, kind: &str) -> ServerResult<&'a mut Vec<String>> {
    match kind {
        "platforms" => Ok(&mut cfg.exclude.platforms),
        "single_ext" => Ok(&mut cfg.exclude.roms.single_file.extensions),
        "single_file" => Ok(&mut cfg.exclude.roms.single_file.names),
        "multi_file" => Ok(&mut cfg.exclude.roms.multi_file.names),
        "multi_part_ext" => Ok(&mut cfg.exclude.roms.multi_file.parts.extensions),
        "multi_part_file" => Ok(&mut cfg.exclude.roms.multi_file.parts.names),
        other => Err(ServerError::bad_request(&format!(
            "Unknown exclusion type: {}",
            other
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_config_yaml() {
        let raw = r#"
exclude:
  platforms:
    - backups
  roms:
    single_file:
      extensions:
        - xml
        - txt
      names:
        - info.txt
    multi_file:
      names:
        - DLC
      parts:
        extensions:
          - sav
        names:
          - patch.ips
system:
  platforms:
    gc: ngc
    psx: ps
"#;
        let cfg: LibraryConfig = serde_yaml::from_str(raw).unwrap();
        assert_eq!(cfg.exclude.platforms, vec!["backups".to_string()]);
        assert_eq!(
            cfg.exclude.roms.single_file.extensions,
            vec!["xml".to_string(), "txt".to_string()]
        );
        assert_eq!(cfg.exclude.roms.multi_file.parts.names, vec!["patch.ips".to_string()]);
        assert_eq!(cfg.system.platforms.get("gc"), Some(&"ngc".to_string()));
    }

    #[test]
    fn empty_yaml_gives_defaults() {
        let cfg: LibraryConfig = serde_yaml::from_str("{}").unwrap();
        assert!(cfg.exclude.platforms.is_empty());
        assert!(cfg.system.platforms.is_empty());
    }

    #[test]
    fn response_reports_folder_names() {
        let manager = LibraryConfigManager {
            path: PathBuf::from("/tmp/unused.yml"),
            config: RwLock::new(LibraryConfig::default()),
        };
        let response = manager.to_response();
        assert_eq!(response.roms_folder_name, "roms");
        assert_eq!(response.firmware_folder_name, "bios");
        assert!(response.excluded_platforms.is_empty());
    }
}
