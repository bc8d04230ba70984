//! Filesystem watcher over the library root. Changes queue a quick scan
//! of the affected platforms after a configurable delay, so a batch copy
//! of a hundred roms triggers one scan, not a hundred.

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::config::{AppConfig, FIRMWARE_FOLDER_NAME, ROMS_FOLDER_NAME};
use crate::models::platform::PlatformDoc;
use crate::response::ServerResult;
use crate::scanner::ScanError;
use crate::scanner::queue::ScanQueue;
use crate::scanner::scan::ScanContext;
use cart_shared::scan::{ScanRequest, ScanType};

/// The `WATCHER` heartbeat slot; built from config alone so the report is
/// available whether or not the watcher thread is running.
pub fn status(config: &AppConfig) -> Value {
    json!({
        "ENABLED": config.enable_rescan_on_filesystem_change,
        "TITLE": "Rescan on filesystem change",
        "MESSAGE": format!(
            "Runs a scan when a change is detected in the library path, with a {} minute delay",
            config.rescan_on_filesystem_change_delay
        ),
    })
}

/// Folder name of the platform a changed path belongs to, for either
/// library layout. Dotfiles and paths outside a platform folder yield
/// `None`.
fn platform_fs_slug(library: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(library).ok()?;
    let parts: Vec<&str> = rel
        .components()
        .filter_map(|c| match c {
            Component::Normal(part) => part.to_str(),
            _ => None,
        })
        .collect();

    let slug = match parts.as_slice() {
        // roms/<platform>/... or bios/<platform>/...
        [first, platform, ..] if *first == ROMS_FOLDER_NAME || *first == FIRMWARE_FOLDER_NAME => {
            platform
        }
        // <platform>/roms/... or <platform>/bios/...
        [platform, second, ..] if *second == ROMS_FOLDER_NAME || *second == FIRMWARE_FOLDER_NAME => {
            platform
        }
        _ => return None,
    };
    if slug.starts_with('.') {
        return None;
    }
    Some(slug.to_string())
}

fn is_relevant(event: &Event) -> bool {
    matches!(
        event.kind,
        EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
    )
}

/// Starts watching the library. No-op when disabled by config.
pub fn spawn(ctx: &ScanContext, queue: Arc<ScanQueue>) -> ServerResult<()> {
    if !ctx.config.enable_rescan_on_filesystem_change {
        return Ok(());
    }

    let library = ctx.config.library_path.clone();
    let delay = Duration::from_secs(ctx.config.rescan_on_filesystem_change_delay * 60);

    let (tx, mut rx) = mpsc::unbounded_channel::<Vec<PathBuf>>();
    let mut watcher = RecommendedWatcher::new(
        move |result: notify::Result<Event>| match result {
            Ok(event) if is_relevant(&event) => {
                let _ = tx.send(event.paths);
            }
            Ok(_) => {}
            Err(e) => warn!("Watcher error: {:?}", e),
        },
        notify::Config::default(),
    )?;
    watcher.watch(&library, RecursiveMode::Recursive)?;
    info!(
        "Watching {} (rescan delay {} min)",
        library.display(),
        ctx.config.rescan_on_filesystem_change_delay
    );

    let db = ctx.db.clone();
    tokio::spawn(async move {
        // Keeps the watcher alive for the lifetime of the task.
        let _watcher = watcher;

        while let Some(paths) = rx.recv().await {
            let mut slugs: Vec<String> = paths
                .iter()
                .filter_map(|p| platform_fs_slug(&library, p))
                .collect();

            // Debounce: absorb everything arriving during the delay into
            // the same scan.
            let deadline = tokio::time::sleep(delay);
            tokio::pin!(deadline);
            loop {
                tokio::select! {
                    _ = &mut deadline => break,
                    more = rx.recv() => match more {
                        Some(paths) => slugs.extend(
                            paths.iter().filter_map(|p| platform_fs_slug(&library, p)),
                        ),
                        None => return,
                    },
                }
            }

            slugs.sort();
            slugs.dedup();

            // Known platforms are rescanned by id; a brand-new folder
            // falls back to a full quick scan that will discover it.
            let mut platform_ids = Vec::new();
            let mut unknown = false;
            for slug in &slugs {
                match PlatformDoc::get_by_fs_slug(&db, slug).await {
                    Ok(Some(platform)) => {
                        if let Some(id) = platform.id {
                            platform_ids.push(id.to_string());
                        }
                    }
                    Ok(None) => unknown = true,
                    Err(e) => warn!("Watcher platform lookup failed: {}", e),
                }
            }
            if unknown {
                platform_ids.clear();
            }

            info!(
                "Filesystem change detected, queueing rescan ({} platforms)",
                if platform_ids.is_empty() { "all".to_string() } else { platform_ids.len().to_string() }
            );
            match queue.submit(ScanRequest {
                platforms: platform_ids,
                scan_type: ScanType::Quick,
                ..Default::default()
            }) {
                Ok(()) => {}
                Err(ScanError::AlreadyRunning) => {
                    info!("Skipping watcher rescan, a scan is already running")
                }
                Err(e) => warn!("Watcher rescan failed to queue: {}", e),
            }
        }
    });

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn changed_paths_resolve_to_platforms() {
        let library = Path::new("/library");
        assert_eq!(
            platform_fs_slug(library, Path::new("/library/roms/n64/Game.z64")),
            Some("n64".to_string())
        );
        assert_eq!(
            platform_fs_slug(library, Path::new("/library/gba/roms/Game.gba")),
            Some("gba".to_string())
        );
        assert_eq!(
            platform_fs_slug(library, Path::new("/library/bios/gba/gba_bios.bin")),
            Some("gba".to_string())
        );
        assert_eq!(
            platform_fs_slug(library, Path::new("/library/ps1/bios/scph1001.bin")),
            Some("ps1".to_string())
        );
    }

    #[test]
    fn non_library_paths_are_ignored() {
        let library = Path::new("/library");
        assert_eq!(platform_fs_slug(library, Path::new("/etc/passwd")), None);
        assert_eq!(platform_fs_slug(library, Path::new("/library/stray.txt")), None);
        assert_eq!(
            platform_fs_slug(library, Path::new("/library/roms/.tmp/x")),
            None
        );
    }
}
