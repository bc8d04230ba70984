//! Metadata source clients. A source is enabled iff its credentials are
//! configured; the heartbeat reports enablement so the UI can grey out
//! what is not available.

pub mod igdb;
pub mod moby;

use cart_shared::search::SearchRomSchema;
use serde_json::{Value, json};

use crate::config::AppConfig;
use crate::response::{ServerError, ServerResult};

pub use igdb::IgdbClient;
pub use moby::MobyClient;

pub struct MetadataSources {
    pub igdb: Option<IgdbClient>,
    pub moby: Option<MobyClient>,
}

impl MetadataSources {
    pub fn from_config(config: &AppConfig) -> Self {
        let igdb = match (&config.igdb_client_id, &config.igdb_client_secret) {
            (Some(id), Some(secret)) => Some(IgdbClient::new(id, secret)),
            _ => None,
        };
        let moby = config.moby_api_key.as_deref().map(MobyClient::new);
        Self { igdb, moby }
    }

    pub fn igdb_enabled(&self) -> bool {
        self.igdb.is_some()
    }

    pub fn moby_enabled(&self) -> bool {
        self.moby.is_some()
    }

    pub fn any_enabled(&self) -> bool {
        self.igdb_enabled() || self.moby_enabled()
    }

    /// The `METADATA_SOURCES` heartbeat slot.
    pub fn heartbeat_report(&self) -> Value {
        json!({
            "IGDB_API_ENABLED": self.igdb_enabled(),
            "MOBY_API_ENABLED": self.moby_enabled(),
        })
    }

    /// Search one source by name or id, as `GET /api/search/roms` does.
    pub async fn search(
        &self,
        source: &str,
        search_by: &str,
        term: &str,
        igdb_platform_id: Option<i64>,
        moby_platform_id: Option<i64>,
    ) -> ServerResult<Vec<SearchRomSchema>> {
        match source {
            "igdb" => {
                let igdb = self
                    .igdb
                    .as_ref()
                    .ok_or_else(|| ServerError::bad_request("IGDB source is not enabled"))?;
                match search_by {
                    "id" => {
                        let id = term
                            .parse::<i64>()
                            .map_err(|_| ServerError::bad_request("Search term must be an id"))?;
                        Ok(igdb.rom_by_id(id).await?.into_iter().collect())
                    }
                    _ => igdb.search_roms(term, igdb_platform_id).await,
                }
            }
            "moby" => {
                let moby = self
                    .moby
                    .as_ref()
                    .ok_or_else(|| ServerError::bad_request("MobyGames source is not enabled"))?;
                moby.search_roms(term, moby_platform_id).await
            }
            other => Err(ServerError::bad_request(&format!(
                "Unknown metadata source: {}",
                other
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn base_config() -> AppConfig {
        AppConfig {
            mongo_uri: String::new(),
            mongo_db: String::new(),
            host: String::new(),
            port: 0,
            auth_secret_key: String::new(),
            library_path: PathBuf::new(),
            resources_path: PathBuf::new(),
            assets_path: PathBuf::new(),
            config_path: PathBuf::new(),
            admin_username: String::new(),
            admin_password: String::new(),
            igdb_client_id: None,
            igdb_client_secret: None,
            moby_api_key: None,
            enable_rescan_on_filesystem_change: false,
            rescan_on_filesystem_change_delay: 5,
            enable_scheduled_rescan: false,
            scheduled_rescan_cron: String::new(),
            enable_scheduled_update_switch_titledb: false,
            scheduled_update_switch_titledb_cron: String::new(),
            enable_scheduled_update_mame_xml: false,
            scheduled_update_mame_xml_cron: String::new(),
            scan_timeout_secs: 0,
        }
    }

    #[test]
    fn enablement_follows_credentials() {
        let mut config = base_config();
        let sources = MetadataSources::from_config(&config);
        assert!(!sources.any_enabled());
        assert_eq!(
            sources.heartbeat_report(),
            json!({ "IGDB_API_ENABLED": false, "MOBY_API_ENABLED": false })
        );

        config.moby_api_key = Some("key".into());
        let sources = MetadataSources::from_config(&config);
        assert!(sources.any_enabled());
        assert!(!sources.igdb_enabled());
        assert!(sources.moby_enabled());

        // IGDB needs both halves of the credential pair.
        config.igdb_client_id = Some("id".into());
        let sources = MetadataSources::from_config(&config);
        assert!(!sources.igdb_enabled());

        config.igdb_client_secret = Some("secret".into());
        let sources = MetadataSources::from_config(&config);
        assert!(sources.igdb_enabled());
    }
}
