//! Release update check. Polls the GitHub releases API in the background
//! and caches the newest version; the heartbeat reads the cache so it
//! never blocks on the network.

use std::sync::Arc;
use std::time::Duration;

use arc_swap::ArcSwap;
use serde::Deserialize;
use tracing::{debug, warn};

const RELEASES_URL: &str = "https://api.github.com/repos/cartridge-app/cartridge/releases/latest";
const CHECK_INTERVAL: Duration = Duration::from_secs(60 * 60);

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Deserialize)]
struct LatestRelease {
    tag_name: String,
}

pub struct UpdateChecker {
    /// Empty until a check has found a release newer than [`VERSION`].
    new_version: ArcSwap<String>,
    http: reqwest::Client,
}

impl UpdateChecker {
    pub fn new() -> Self {
        Self {
            new_version: ArcSwap::from_pointee(String::new()),
            http: reqwest::Client::builder()
                .user_agent(format!("cartridge/{}", VERSION))
                .build()
                .unwrap_or_default(),
        }
    }

    /// The `NEW_VERSION` heartbeat field. Empty string means current or
    /// unknown; the field itself is always present.
    pub fn new_version(&self) -> String {
        self.new_version.load().as_ref().clone()
    }

    pub fn spawn(self: &Arc<Self>) {
        let checker = self.clone();
        tokio::spawn(async move {
            loop {
                match checker.fetch_latest().await {
                    Ok(latest) => {
                        if is_newer(&latest, VERSION) {
                            debug!("Update available: {} -> {}", VERSION, latest);
                            checker.new_version.store(Arc::new(latest));
                        } else {
                            checker.new_version.store(Arc::new(String::new()));
                        }
                    }
                    Err(e) => warn!("Release check failed: {}", e),
                }
                tokio::time::sleep(CHECK_INTERVAL).await;
            }
        });
    }

    async fn fetch_latest(&self) -> Result<String, reqwest::Error> {
        let release: LatestRelease = self
            .http
            .get(RELEASES_URL)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(release.tag_name.trim_start_matches('v').to_string())
    }
}

/// Dotted-numeric comparison, ignoring any pre-release suffix. Unparsable
/// versions are never "newer".
fn is_newer(candidate: &str, current: &str) -> bool {
    fn parts(v: &str) -> Vec<u64> {
        v.split(['-', '+'])
            .next()
            .unwrap_or("")
            .split('.')
            .map(|p| p.parse().unwrap_or(0))
            .collect()
    }
    let (a, b) = (parts(candidate), parts(current));
    if a.iter().all(|&n| n == 0) {
        return false;
    }
    a > b
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_comparison() {
        assert!(is_newer("0.5.1", "0.5.0"));
        assert!(is_newer("1.0.0", "0.9.9"));
        assert!(is_newer("0.5.1", "0.5.0-dev0"));
        assert!(!is_newer("0.5.0", "0.5.0"));
        assert!(!is_newer("0.4.9", "0.5.0"));
        assert!(!is_newer("not-a-version", "0.5.0"));
    }

    #[test]
    fn release_tags_parse() {
        let release: LatestRelease =
            serde_json::from_str(r#"{"tag_name": "v0.5.1", "name": "Cartridge 0.5.1"}"#).unwrap();
        assert_eq!(release.tag_name.trim_start_matches('v'), "0.5.1");
    }

    #[test]
    fn checker_starts_empty() {
        let checker = UpdateChecker::new();
        assert_eq!(checker.new_version(), "");
    }
}
