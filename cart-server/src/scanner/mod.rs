pub mod filename;
pub mod fs;
pub mod queue;
pub mod scan;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("Folder structure does not match any supported library layout")]
    FolderStructureNotMatch,
    #[error("Roms not found for platform {0}")]
    RomsNotFound(String),
    #[error("A scan is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Io(#[from] std::io::Error),
}
