// Rotation module - archive shifting, compression, hooks, retention

mod archive;
mod engine;

pub use archive::{archive_path, find_all, ArchiveFile};
pub use engine::RotationEngine;
