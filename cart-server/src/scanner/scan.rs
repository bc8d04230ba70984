//! The scan orchestrator.
//!
//! Walks the library, upserts platforms, firmware and roms, fetches
//! metadata for roms that need it and purges database entries whose
//! files are gone. Progress is broadcast as socket events so every
//! connected client sees the same scan.

use std::sync::Arc;

use cart_shared::scan::{
    EVENT_SCAN_DONE, EVENT_SCAN_DONE_KO, EVENT_SCANNING_FIRMWARE, EVENT_SCANNING_PLATFORM,
    EVENT_SCANNING_ROM, ScanRequest, ScanStats, ScanType, SocketMessage,
};
use md5::Md5;
use mongodb::bson::{DateTime, oid::ObjectId};
use serde::Serialize;
use sha1::{Digest, Sha1};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

use crate::config::{AppConfig, LibraryConfig, LibraryConfigManager};
use crate::db::Mongo;
use crate::metadata::MetadataSources;
use crate::models::firmware::FirmwareDoc;
use crate::models::platform::PlatformDoc;
use crate::models::rom::RomDoc;
use crate::response::ServerResult;
use crate::scanner::filename;
use crate::scanner::fs::{self, FsFirmware, FsRom};

/// Everything a scan needs, bundled so the queue, the watcher and the
/// scheduler can all kick one off.
#[derive(Clone)]
pub struct ScanContext {
    pub db: Arc<Mongo>,
    pub config: Arc<AppConfig>,
    pub library_config: Arc<LibraryConfigManager>,
    pub metadata: Arc<MetadataSources>,
}

/// Digests of dumps verified against known-good firmware sets. Grows as
/// platforms gain redump coverage.
const KNOWN_FIRMWARE_SHA1: &[&str] = &[
    // GBA bios
    "300c20df6731a33952ded8c436f7f186d25d3492",
    // NDS bios7 / bios9
    "24f67bdea115a2c847c8813a262502ee1607b7df",
    "bfaac75f101c135e32e2aaf541de6b1be4c8c62d",
    // PS1 scph1001 / scph5501 / scph7001
    "10155d8d6e6e832d6ea66db9bc098321fb5e8ebf",
    "0555c6fae8906f3f09baf5988f00e55f88e9f30b",
    "14df4f6c1e367ce097c11deae21566b4fe5647a9",
];

fn emit(events: &broadcast::Sender<SocketMessage>, event: &str, data: impl Serialize) {
    // No subscribers is fine; scheduled scans run unattended.
    let _ = events.send(SocketMessage::new(event, data));
}

/// Runs one scan end to end. Failures are reported through `scan:done_ko`
/// rather than returned, mirroring how clients expect the socket to behave.
pub async fn run_scan(
    ctx: &ScanContext,
    request: &ScanRequest,
    events: &broadcast::Sender<SocketMessage>,
) {
    // A no-scan only syncs files, so it works without any source.
    if !ctx.metadata.any_enabled() && request.scan_type != ScanType::NoScan {
        error!("Scan error: no metadata providers enabled");
        emit(events, EVENT_SCAN_DONE_KO, "No metadata providers enabled");
        return;
    }

    match scan_platforms(ctx, request, events).await {
        Ok(stats) => {
            info!(
                "Scan completed: {} platforms, {} roms ({} new), {} firmware files",
                stats.scanned_platforms, stats.scanned_roms, stats.added_roms,
                stats.scanned_firmware
            );
            emit(events, EVENT_SCAN_DONE, stats);
        }
        Err(e) => {
            error!("Scan failed: {}", e);
            emit(events, EVENT_SCAN_DONE_KO, e.to_string());
        }
    }
}

async fn scan_platforms(
    ctx: &ScanContext,
    request: &ScanRequest,
    events: &broadcast::Sender<SocketMessage>,
) -> ServerResult<ScanStats> {
    let library = ctx.config.library_path.clone();
    let config = ctx.library_config.snapshot();

    let fs_platforms = fs::get_platforms(&library, &config)?;

    // Explicit platform selection maps ids back to folder names; an empty
    // selection scans everything found on disk.
    let mut platform_list = Vec::new();
    for id in &request.platforms {
        let platform_id = ObjectId::parse_str(id)?;
        if let Some(platform) = PlatformDoc::get(&ctx.db, &platform_id).await? {
            platform_list.push(platform.fs_slug);
        }
    }
    if platform_list.is_empty() {
        platform_list = fs_platforms.clone();
    }

    if platform_list.is_empty() {
        warn!("No platforms found; check the folder structure and volume mount");
    } else {
        info!("Found {} platforms in the file system", platform_list.len());
    }

    let mut stats = ScanStats::default();

    for fs_slug in &platform_list {
        let existing = PlatformDoc::get_by_fs_slug(&ctx.db, fs_slug).await?;
        if existing.is_some() && request.scan_type == ScanType::NewPlatforms {
            continue;
        }

        let platform = scan_platform(ctx, fs_slug, &config, existing.as_ref(), &mut stats).await?;
        let platform_id = platform
            .id
            .ok_or_else(|| crate::response::ServerError::internal_error("Platform missing id"))?;

        let rom_count = PlatformDoc::rom_count(&ctx.db, &platform_id).await?;
        emit(
            events,
            EVENT_SCANNING_PLATFORM,
            platform.clone().to_schema(rom_count),
        );

        // Firmware first; most platforms have none.
        let fs_firmware = fs::get_firmware(&library, fs_slug)?;
        for fs_fw in &fs_firmware {
            let known = FirmwareDoc::list(&ctx.db, Some(&platform_id))
                .await?
                .into_iter()
                .any(|f| f.file_name == fs_fw.file_name);

            let scanned = scan_firmware(&library, &platform_id, fs_slug, fs_fw).await?;
            stats.scanned_firmware += 1;
            if !known {
                stats.added_firmware += 1;
            }

            let stored = FirmwareDoc::upsert_from_scan(&ctx.db, scanned).await?;
            emit(
                events,
                EVENT_SCANNING_FIRMWARE,
                serde_json::json!({
                    "platform_name": platform.name,
                    "platform_slug": platform.slug,
                    "firmware": stored.to_schema(),
                }),
            );
        }

        let fs_roms = match fs::get_roms(&library, fs_slug, &config) {
            Ok(roms) => roms,
            Err(e) => {
                error!("{}", e);
                continue;
            }
        };
        if fs_roms.is_empty() {
            warn!("No roms found for {}; check the folder structure", fs_slug);
        } else {
            info!("{}: {} roms found", fs_slug, fs_roms.len());
        }

        for fs_rom in &fs_roms {
            let rom = RomDoc::get_by_filename(&ctx.db, &platform_id, &fs_rom.file_name).await?;
            if !should_scan_rom(rom.as_ref(), request) {
                continue;
            }

            let scanned = scan_rom(ctx, &platform, fs_rom, rom.as_ref(), request).await?;
            stats.scanned_roms += 1;
            if rom.is_none() {
                stats.added_roms += 1;
            }
            if scanned.igdb_id.is_some() || scanned.moby_id.is_some() {
                stats.metadata_roms += 1;
            }

            let stored = RomDoc::upsert_from_scan(&ctx.db, scanned).await?;
            emit(
                events,
                EVENT_SCANNING_ROM,
                serde_json::json!({
                    "platform_name": platform.name,
                    "platform_slug": platform.slug,
                    "rom": stored.to_schema(Vec::new(), Vec::new(), Vec::new()),
                }),
            );
        }

        let keep_roms: Vec<String> = fs_roms.iter().map(|r| r.file_name.clone()).collect();
        RomDoc::purge_missing(&ctx.db, &platform_id, &keep_roms).await?;
        let keep_firmware: Vec<String> =
            fs_firmware.iter().map(|f| f.file_name.clone()).collect();
        FirmwareDoc::purge_missing(&ctx.db, &platform_id, &keep_firmware).await?;
    }

    // Only a full scan is allowed to conclude that a platform is gone.
    if request.platforms.is_empty() {
        PlatformDoc::purge_missing(&ctx.db, &fs_platforms).await?;
    }

    Ok(stats)
}

/// Whether a file on disk gets a scan pass under the requested type.
/// This decision rule is tricky; only touch it if you know what you are
/// doing.
fn should_scan_rom(existing: Option<&RomDoc>, request: &ScanRequest) -> bool {
    let selected = |r: &RomDoc| {
        r.id.map(|id| request.roms.contains(&id.to_string()))
            .unwrap_or(false)
    };
    match (existing, request.scan_type) {
        (None, ScanType::NewPlatforms | ScanType::Quick) => true,
        // A no-scan still syncs new files into the database; it just
        // never queries the metadata sources.
        (None, ScanType::NoScan) => true,
        (_, ScanType::Complete) => true,
        // An explicitly selected rom is rescanned whatever state its
        // metadata is in.
        (Some(r), ScanType::Unidentified) => {
            (r.igdb_id.is_none() && r.moby_id.is_none()) || selected(r)
        }
        (Some(r), ScanType::Partial) => {
            r.igdb_id.is_none() || r.moby_id.is_none() || selected(r)
        }
        (Some(r), _) => selected(r),
        (None, _) => false,
    }
}

async fn scan_platform(
    ctx: &ScanContext,
    fs_slug: &str,
    config: &LibraryConfig,
    existing: Option<&PlatformDoc>,
    stats: &mut ScanStats,
) -> ServerResult<PlatformDoc> {
    let slug = config
        .system
        .platforms
        .get(fs_slug)
        .cloned()
        .unwrap_or_else(|| fs_slug.to_string());

    let mut igdb_id = existing.and_then(|p| p.igdb_id);
    let mut name = existing
        .filter(|p| !p.name.is_empty())
        .map(|p| p.name.clone());

    if igdb_id.is_none() {
        if let Some(igdb) = &ctx.metadata.igdb {
            match igdb.platform_by_slug(&slug).await {
                Ok(Some(platform)) => {
                    igdb_id = Some(platform.id);
                    name = Some(platform.name);
                }
                Ok(None) => {}
                Err(e) => warn!("IGDB platform lookup failed for {}: {}", slug, e),
            }
        }
    }

    let name = name.unwrap_or_else(|| prettify_slug(&slug));
    let moby_id = existing.and_then(|p| p.moby_id);

    stats.scanned_platforms += 1;
    if existing.is_none() {
        stats.added_platforms += 1;
    }
    if igdb_id.is_some() || moby_id.is_some() {
        stats.metadata_platforms += 1;
    }

    PlatformDoc::upsert_from_scan(&ctx.db, fs_slug, &slug, &name, igdb_id, moby_id).await
}

async fn scan_rom(
    ctx: &ScanContext,
    platform: &PlatformDoc,
    fs_rom: &FsRom,
    existing: Option<&RomDoc>,
    request: &ScanRequest,
) -> ServerResult<RomDoc> {
    let parsed = filename::parse(&fs_rom.file_name);
    let platform_id = platform.id.unwrap_or_default();

    let mut rom = RomDoc {
        id: existing.and_then(|r| r.id),
        igdb_id: existing.and_then(|r| r.igdb_id),
        moby_id: existing.and_then(|r| r.moby_id),
        platform_id,
        platform_slug: platform.slug.clone(),
        platform_name: platform.name.clone(),
        file_name: fs_rom.file_name.clone(),
        file_name_no_tags: parsed.no_tags.clone(),
        file_name_no_ext: parsed.no_ext,
        file_extension: parsed.extension,
        file_path: fs::roms_rel_path(&ctx.config.library_path, &platform.fs_slug),
        file_size_bytes: fs_rom.file_size_bytes,
        name: existing.and_then(|r| r.name.clone()),
        slug: existing.and_then(|r| r.slug.clone()),
        summary: existing.and_then(|r| r.summary.clone()),
        url_cover: existing.map(|r| r.url_cover.clone()).unwrap_or_default(),
        url_screenshots: existing
            .map(|r| r.url_screenshots.clone())
            .unwrap_or_default(),
        revision: parsed.revision,
        regions: parsed.regions,
        languages: parsed.languages,
        tags: parsed.tags,
        multi: fs_rom.multi,
        files: fs_rom.files.clone(),
        igdb_metadata: existing.and_then(|r| r.igdb_metadata.clone()),
        moby_metadata: existing.and_then(|r| r.moby_metadata.clone()),
        created_at: existing.map(|r| r.created_at).unwrap_or_else(DateTime::now),
        updated_at: DateTime::now(),
    };

    if request.scan_type == ScanType::NoScan {
        return Ok(rom);
    }

    // Another dump of the same game may already carry a match; reuse it
    // instead of burning API calls.
    if rom.igdb_id.is_none() && rom.moby_id.is_none() {
        if let Some(sibling) =
            RomDoc::sibling_with_metadata(&ctx.db, &platform_id, &parsed.no_tags).await?
        {
            rom.igdb_id = sibling.igdb_id;
            rom.moby_id = sibling.moby_id;
            rom.name = sibling.name;
            rom.slug = sibling.slug;
            rom.summary = sibling.summary;
            rom.url_cover = sibling.url_cover;
            rom.url_screenshots = sibling.url_screenshots;
            rom.igdb_metadata = sibling.igdb_metadata;
            rom.moby_metadata = sibling.moby_metadata;
            return Ok(rom);
        }
    }

    let wants = |source: &str| request.apis.is_empty() || request.apis.iter().any(|a| a == source);

    if rom.igdb_id.is_none() && wants("igdb") {
        if let Some(igdb) = &ctx.metadata.igdb {
            match igdb.best_match(&parsed.no_tags, platform.igdb_id).await {
                Ok(Some(matched)) => {
                    rom.igdb_id = matched.schema.igdb_id;
                    rom.name = Some(matched.schema.name);
                    rom.slug = Some(matched.schema.slug);
                    rom.summary = Some(matched.schema.summary);
                    if !matched.schema.igdb_url_cover.is_empty() {
                        rom.url_cover = matched.schema.igdb_url_cover;
                    }
                    rom.url_screenshots = matched.schema.url_screenshots;
                    rom.igdb_metadata = Some(matched.metadata);
                }
                Ok(None) => {}
                Err(e) => warn!("IGDB search failed for {}: {}", rom.file_name, e),
            }
        }
    }

    if rom.moby_id.is_none() && wants("moby") {
        if let Some(moby) = &ctx.metadata.moby {
            match moby.best_match(&parsed.no_tags, platform.moby_id).await {
                Ok(Some(matched)) => {
                    rom.moby_id = matched.schema.moby_id;
                    if rom.name.is_none() {
                        rom.name = Some(matched.schema.name);
                        rom.slug = Some(matched.schema.slug);
                        rom.summary = Some(matched.schema.summary);
                    }
                    if rom.url_cover.is_empty() {
                        rom.url_cover = matched.schema.moby_url_cover;
                    }
                    rom.moby_metadata = Some(matched.metadata);
                }
                Ok(None) => {}
                Err(e) => warn!("MobyGames search failed for {}: {}", rom.file_name, e),
            }
        }
    }

    Ok(rom)
}

async fn scan_firmware(
    library: &std::path::Path,
    platform_id: &ObjectId,
    fs_slug: &str,
    fs_fw: &FsFirmware,
) -> ServerResult<FirmwareDoc> {
    let data = tokio::fs::read(&fs_fw.path).await?;
    let md5_hash = hex::encode(Md5::digest(&data));
    let sha1_hash = hex::encode(Sha1::digest(&data));
    let is_verified = KNOWN_FIRMWARE_SHA1.contains(&sha1_hash.as_str());

    let parsed = filename::parse(&fs_fw.file_name);
    Ok(FirmwareDoc {
        id: None,
        platform_id: *platform_id,
        file_name: fs_fw.file_name.clone(),
        file_name_no_tags: parsed.no_tags,
        file_name_no_ext: parsed.no_ext,
        file_extension: parsed.extension,
        file_path: fs::firmware_rel_path(library, fs_slug),
        file_size_bytes: fs_fw.file_size_bytes,
        md5_hash: Some(md5_hash),
        sha1_hash: Some(sha1_hash),
        is_verified,
        created_at: DateTime::now(),
        updated_at: DateTime::now(),
    })
}

/// `super-nintendo` becomes `Super Nintendo`; used when no metadata
/// source knows the platform.
fn prettify_slug(slug: &str) -> String {
    slug.split(['-', '_'])
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stored_rom(id: ObjectId, igdb_id: Option<i64>, moby_id: Option<i64>) -> RomDoc {
        RomDoc {
            id: Some(id),
            igdb_id,
            moby_id,
            platform_id: ObjectId::new(),
            platform_slug: "n64".to_string(),
            platform_name: "Nintendo 64".to_string(),
            file_name: "Game.z64".to_string(),
            file_name_no_tags: "Game".to_string(),
            file_name_no_ext: "Game".to_string(),
            file_extension: "z64".to_string(),
            file_path: "roms/n64".to_string(),
            file_size_bytes: 8,
            name: None,
            slug: None,
            summary: None,
            url_cover: String::new(),
            url_screenshots: Vec::new(),
            revision: String::new(),
            regions: Vec::new(),
            languages: Vec::new(),
            tags: Vec::new(),
            multi: false,
            files: Vec::new(),
            igdb_metadata: None,
            moby_metadata: None,
            created_at: DateTime::now(),
            updated_at: DateTime::now(),
        }
    }

    fn request(scan_type: ScanType, roms: Vec<String>) -> ScanRequest {
        ScanRequest {
            scan_type,
            roms,
            ..Default::default()
        }
    }

    #[test]
    fn new_files_are_synced_by_discovering_scan_types() {
        for scan_type in [
            ScanType::Quick,
            ScanType::NewPlatforms,
            ScanType::NoScan,
            ScanType::Complete,
        ] {
            assert!(should_scan_rom(None, &request(scan_type, Vec::new())));
        }
        for scan_type in [ScanType::Unidentified, ScanType::Partial] {
            assert!(!should_scan_rom(None, &request(scan_type, Vec::new())));
        }
    }

    #[test]
    fn unidentified_and_partial_skip_matched_roms() {
        let id = ObjectId::new();
        let matched = stored_rom(id, Some(1), Some(2));
        let half = stored_rom(id, Some(1), None);
        let unmatched = stored_rom(id, None, None);

        let unidentified = request(ScanType::Unidentified, Vec::new());
        assert!(should_scan_rom(Some(&unmatched), &unidentified));
        assert!(!should_scan_rom(Some(&half), &unidentified));
        assert!(!should_scan_rom(Some(&matched), &unidentified));

        let partial = request(ScanType::Partial, Vec::new());
        assert!(should_scan_rom(Some(&unmatched), &partial));
        assert!(should_scan_rom(Some(&half), &partial));
        assert!(!should_scan_rom(Some(&matched), &partial));
    }

    #[test]
    fn selected_roms_are_rescanned_under_every_type() {
        let id = ObjectId::new();
        let matched = stored_rom(id, Some(1), Some(2));
        let selection = vec![id.to_string()];

        for scan_type in [
            ScanType::Quick,
            ScanType::Unidentified,
            ScanType::Partial,
            ScanType::NoScan,
        ] {
            assert!(should_scan_rom(
                Some(&matched),
                &request(scan_type, selection.clone())
            ));
        }
        // A different selection does not drag unrelated matched roms in.
        let other = vec![ObjectId::new().to_string()];
        assert!(!should_scan_rom(
            Some(&matched),
            &request(ScanType::Quick, other)
        ));
    }

    #[test]
    fn slugs_prettify_into_names() {
        assert_eq!(prettify_slug("super-nintendo"), "Super Nintendo");
        assert_eq!(prettify_slug("n64"), "N64");
        assert_eq!(prettify_slug("sega_mega_drive"), "Sega Mega Drive");
    }

    #[test]
    fn known_firmware_digests_verify() {
        assert!(KNOWN_FIRMWARE_SHA1.contains(&"300c20df6731a33952ded8c436f7f186d25d3492"));
        assert!(!KNOWN_FIRMWARE_SHA1.contains(&"deadbeef"));
    }
}
