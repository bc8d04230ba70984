//! Filesystem discovery for the library scanner.
//!
//! Two layouts are supported. When `<library>/roms` exists it wins:
//!
//! ```text
//! library/roms/n64/Game.z64        library/n64/roms/Game.z64
//! library/bios/n64/pif.rom         library/n64/bios/pif.rom
//! ```
//!
//! A rom is either a single file or a directory of parts (multi-disc
//! dumps, split bins). Exclusion patterns from `config.yml` are applied
//! here so the rest of the scanner never sees filtered entries.

use std::fs;
use std::path::{Path, PathBuf};

use cart_shared::rom::RomFile;
use regex::Regex;

use crate::config::{FIRMWARE_FOLDER_NAME, FileExcludeConfig, LibraryConfig, ROMS_FOLDER_NAME};
use crate::scanner::ScanError;
use crate::scanner::filename::split_extension;

#[derive(Debug, Clone)]
pub struct FsRom {
    pub file_name: String,
    pub multi: bool,
    pub files: Vec<RomFile>,
    pub file_size_bytes: u64,
}

#[derive(Debug, Clone)]
pub struct FsFirmware {
    pub file_name: String,
    pub file_size_bytes: u64,
    pub path: PathBuf,
}

fn roms_first(library: &Path) -> bool {
    library.join(ROMS_FOLDER_NAME).is_dir()
}

/// Path of a platform's rom folder, relative to the library root.
/// This is what gets stored as `file_path` on each rom.
pub fn roms_rel_path(library: &Path, fs_slug: &str) -> String {
    if roms_first(library) {
        format!("{}/{}", ROMS_FOLDER_NAME, fs_slug)
    } else {
        format!("{}/{}", fs_slug, ROMS_FOLDER_NAME)
    }
}

pub fn firmware_rel_path(library: &Path, fs_slug: &str) -> String {
    if roms_first(library) {
        format!("{}/{}", FIRMWARE_FOLDER_NAME, fs_slug)
    } else {
        format!("{}/{}", fs_slug, FIRMWARE_FOLDER_NAME)
    }
}

/// Platform folder names found on disk, already filtered by the
/// excluded-platforms config, sorted for stable scan order.
pub fn get_platforms(library: &Path, config: &LibraryConfig) -> Result<Vec<String>, ScanError> {
    let roms_root = library.join(ROMS_FOLDER_NAME);
    let root = if roms_root.is_dir() {
        roms_root
    } else if library.is_dir() {
        library.to_path_buf()
    } else {
        return Err(ScanError::FolderStructureNotMatch);
    };

    let mut platforms = Vec::new();
    for entry in fs::read_dir(&root)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || name == FIRMWARE_FOLDER_NAME || name == ROMS_FOLDER_NAME {
            continue;
        }
        if matches_any(&config.exclude.platforms, &name) {
            continue;
        }
        platforms.push(name);
    }
    platforms.sort();
    Ok(platforms)
}

pub fn get_roms(
    library: &Path,
    fs_slug: &str,
    config: &LibraryConfig,
) -> Result<Vec<FsRom>, ScanError> {
    let dir = library.join(roms_rel_path(library, fs_slug));
    let entries =
        fs::read_dir(&dir).map_err(|_| ScanError::RomsNotFound(fs_slug.to_string()))?;
    let exclude = &config.exclude.roms;

    let mut roms = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let metadata = entry.metadata()?;

        if metadata.is_dir() {
            if matches_any(&exclude.multi_file.names, &name) {
                continue;
            }
            let files = collect_parts(&entry.path(), &exclude.multi_file.parts)?;
            if files.is_empty() {
                continue;
            }
            let file_size_bytes = files.iter().map(|f| f.size).sum();
            roms.push(FsRom {
                file_name: name,
                multi: true,
                files,
                file_size_bytes,
            });
        } else {
            if is_excluded(&name, &exclude.single_file) {
                continue;
            }
            let size = metadata.len();
            roms.push(FsRom {
                file_name: name.clone(),
                multi: false,
                files: vec![RomFile {
                    filename: name,
                    size,
                }],
                file_size_bytes: size,
            });
        }
    }
    roms.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(roms)
}

/// Firmware files for one platform. A missing firmware folder is not an
/// error, most platforms have none.
pub fn get_firmware(library: &Path, fs_slug: &str) -> Result<Vec<FsFirmware>, ScanError> {
    let dir = library.join(firmware_rel_path(library, fs_slug));
    let entries = match fs::read_dir(&dir) {
        Ok(entries) => entries,
        Err(_) => return Ok(Vec::new()),
    };

    let mut firmware = Vec::new();
    for entry in entries {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') || !entry.file_type()?.is_file() {
            continue;
        }
        firmware.push(FsFirmware {
            file_name: name,
            file_size_bytes: entry.metadata()?.len(),
            path: entry.path(),
        });
    }
    firmware.sort_by(|a, b| a.file_name.cmp(&b.file_name));
    Ok(firmware)
}

fn collect_parts(dir: &Path, exclude: &FileExcludeConfig) -> Result<Vec<RomFile>, ScanError> {
    let mut parts = Vec::new();
    collect_parts_into(dir, Path::new(""), exclude, &mut parts)?;
    parts.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(parts)
}

fn collect_parts_into(
    dir: &Path,
    prefix: &Path,
    exclude: &FileExcludeConfig,
    out: &mut Vec<RomFile>,
) -> Result<(), ScanError> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with('.') {
            continue;
        }
        let rel = prefix.join(&name);
        let metadata = entry.metadata()?;
        if metadata.is_dir() {
            collect_parts_into(&entry.path(), &rel, exclude, out)?;
        } else if !is_excluded(&name, exclude) {
            out.push(RomFile {
                filename: rel.to_string_lossy().to_string(),
                size: metadata.len(),
            });
        }
    }
    Ok(())
}

fn is_excluded(file_name: &str, exclude: &FileExcludeConfig) -> bool {
    let (_, extension) = split_extension(file_name);
    let last_part = extension.rsplit('.').next().unwrap_or(&extension);
    let ext_match = exclude.extensions.iter().any(|e| {
        let e = e.trim_start_matches('.');
        e.eq_ignore_ascii_case(&extension) || e.eq_ignore_ascii_case(last_part)
    });
    ext_match || matches_any(&exclude.names, file_name)
}

/// Shell-style patterns where `*` matches any run of characters.
fn matches_any(patterns: &[String], name: &str) -> bool {
    patterns.iter().any(|pattern| glob_match(pattern, name))
}

fn glob_match(pattern: &str, name: &str) -> bool {
    let escaped: Vec<String> = pattern.split('*').map(regex::escape).collect();
    let re = format!("^{}$", escaped.join(".*"));
    Regex::new(&re)
        .map(|re| re.is_match(name))
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::{File, create_dir_all};
    use std::io::Write;
    use tempfile::TempDir;

    fn touch(path: &Path, bytes: usize) {
        create_dir_all(path.parent().unwrap()).unwrap();
        let mut file = File::create(path).unwrap();
        file.write_all(&vec![0u8; bytes]).unwrap();
    }

    #[test]
    fn roms_first_layout_wins() {
        let dir = TempDir::new().unwrap();
        let library = dir.path();
        touch(&library.join("roms/n64/Game.z64"), 8);
        touch(&library.join("roms/gba/Other.gba"), 8);

        let platforms = get_platforms(library, &LibraryConfig::default()).unwrap();
        assert_eq!(platforms, vec!["gba".to_string(), "n64".to_string()]);
        assert_eq!(roms_rel_path(library, "n64"), "roms/n64");
        assert_eq!(firmware_rel_path(library, "n64"), "bios/n64");
    }

    #[test]
    fn platforms_first_layout_is_the_fallback() {
        let dir = TempDir::new().unwrap();
        let library = dir.path();
        touch(&library.join("gba/roms/Game.gba"), 8);
        touch(&library.join("gba/bios/gba_bios.bin"), 8);

        let platforms = get_platforms(library, &LibraryConfig::default()).unwrap();
        assert_eq!(platforms, vec!["gba".to_string()]);
        assert_eq!(roms_rel_path(library, "gba"), "gba/roms");

        let firmware = get_firmware(library, "gba").unwrap();
        assert_eq!(firmware.len(), 1);
        assert_eq!(firmware[0].file_name, "gba_bios.bin");
    }

    #[test]
    fn missing_library_is_a_structure_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("nope");
        let err = get_platforms(&missing, &LibraryConfig::default()).unwrap_err();
        assert!(matches!(err, ScanError::FolderStructureNotMatch));
    }

    #[test]
    fn single_and_multi_roms_are_listed() {
        let dir = TempDir::new().unwrap();
        let library = dir.path();
        touch(&library.join("roms/ps1/Single Game.chd"), 100);
        touch(&library.join("roms/ps1/Multi Game/disc1.bin"), 40);
        touch(&library.join("roms/ps1/Multi Game/disc2.bin"), 60);
        touch(&library.join("roms/ps1/.hidden.chd"), 10);

        let roms = get_roms(library, "ps1", &LibraryConfig::default()).unwrap();
        assert_eq!(roms.len(), 2);

        let multi = &roms[0];
        assert_eq!(multi.file_name, "Multi Game");
        assert!(multi.multi);
        assert_eq!(multi.file_size_bytes, 100);
        assert_eq!(multi.files.len(), 2);
        assert_eq!(multi.files[0].filename, "disc1.bin");

        let single = &roms[1];
        assert_eq!(single.file_name, "Single Game.chd");
        assert!(!single.multi);
        assert_eq!(single.files.len(), 1);
    }

    #[test]
    fn exclusions_filter_files_and_platforms() {
        let dir = TempDir::new().unwrap();
        let library = dir.path();
        touch(&library.join("roms/n64/Game.z64"), 8);
        touch(&library.join("roms/n64/notes.txt"), 8);
        touch(&library.join("roms/n64/skipme.z64"), 8);
        touch(&library.join("roms/ignored/Game.bin"), 8);

        let mut config = LibraryConfig::default();
        config.exclude.platforms.push("ignored".to_string());
        config
            .exclude
            .roms
            .single_file
            .extensions
            .push("txt".to_string());
        config
            .exclude
            .roms
            .single_file
            .names
            .push("skip*".to_string());

        let platforms = get_platforms(library, &config).unwrap();
        assert_eq!(platforms, vec!["n64".to_string()]);

        let roms = get_roms(library, "n64", &config).unwrap();
        assert_eq!(roms.len(), 1);
        assert_eq!(roms[0].file_name, "Game.z64");
    }

    #[test]
    fn multi_part_exclusions_apply_inside_directories() {
        let dir = TempDir::new().unwrap();
        let library = dir.path();
        touch(&library.join("roms/ps1/Game/track1.bin"), 10);
        touch(&library.join("roms/ps1/Game/save.sav"), 10);

        let mut config = LibraryConfig::default();
        config
            .exclude
            .roms
            .multi_file
            .parts
            .extensions
            .push("sav".to_string());

        let roms = get_roms(library, "ps1", &config).unwrap();
        assert_eq!(roms.len(), 1);
        assert_eq!(roms[0].files.len(), 1);
        assert_eq!(roms[0].files[0].filename, "track1.bin");
        assert_eq!(roms[0].file_size_bytes, 10);
    }
}
