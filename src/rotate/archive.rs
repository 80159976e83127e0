// Archive files: `<output>.<index>[.gz]`, index 1 = newest

use crate::error::{LogTeeError, Result};
use std::path::{Path, PathBuf};

/// One rotated archive of the output file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveFile {
    pub base: PathBuf,
    pub index: u64,
    pub compressed: bool,
}

impl ArchiveFile {
    pub fn new(base: &Path, index: u64, compressed: bool) -> Self {
        Self {
            base: base.to_path_buf(),
            index,
            compressed,
        }
    }

    pub fn path(&self) -> PathBuf {
        archive_path(&self.base, self.index, self.compressed)
    }
}

/// Path of the archive at `index`, with or without the gzip suffix
pub fn archive_path(base: &Path, index: u64, compressed: bool) -> PathBuf {
    if compressed {
        PathBuf::from(format!("{}.{}.gz", base.display(), index))
    } else {
        PathBuf::from(format!("{}.{}", base.display(), index))
    }
}

/// Whether the archive at `index` exists, and in which variant.
///
/// Archives can be compressed or plain depending on the config the rotation
/// ran under; if both variants exist the compressed one wins.
pub async fn probe(base: &Path, index: u64) -> Option<bool> {
    if tokio::fs::metadata(archive_path(base, index, true)).await.is_ok() {
        return Some(true);
    }
    if tokio::fs::metadata(archive_path(base, index, false)).await.is_ok() {
        return Some(false);
    }
    None
}

/// Enumerate archives by probing indices upward until the first missing one.
///
/// The stop-at-gap walk is what keeps indices contiguous: the returned list
/// ends exactly at the first free slot a shifted archive can move into.
pub async fn find_all(base: &Path) -> Vec<ArchiveFile> {
    let mut archives = Vec::new();
    let mut index = 1u64;
    while let Some(compressed) = probe(base, index).await {
        archives.push(ArchiveFile::new(base, index, compressed));
        index += 1;
    }
    archives
}

/// Rename one archive from index i to i+1.
///
/// Refuses to overwrite: a file already sitting at the target index aborts
/// the whole rotation rather than destroying it.
pub async fn shift_up(archive: &mut ArchiveFile) -> Result<()> {
    let source = archive.path();
    let target = archive_path(&archive.base, archive.index + 1, archive.compressed);

    if tokio::fs::metadata(&target).await.is_ok() {
        return Err(LogTeeError::ArchiveCollision(
            target.display().to_string(),
        ));
    }

    tokio::fs::rename(&source, &target).await.map_err(|e| {
        LogTeeError::RotationError(format!(
            "Cannot move {} to {}: {}",
            source.display(),
            target.display(),
            e
        ))
    })?;

    archive.index += 1;
    Ok(())
}

/// Gzip `source` into `target` on the blocking pool
pub async fn gzip_file(source: &Path, target: &Path) -> Result<()> {
    let source = source.to_path_buf();
    let target = target.to_path_buf();

    let result = tokio::task::spawn_blocking(move || -> std::io::Result<()> {
        use flate2::write::GzEncoder;
        use flate2::Compression;
        use std::io::BufReader;

        let mut input = BufReader::new(std::fs::File::open(&source)?);
        let output = std::fs::File::create(&target)?;
        let mut encoder = GzEncoder::new(output, Compression::default());
        std::io::copy(&mut input, &mut encoder)?;
        encoder.finish()?;
        Ok(())
    })
    .await
    .map_err(|e| LogTeeError::RotationError(format!("Compression task failed: {}", e)))?;

    result.map_err(|e| LogTeeError::RotationError(format!("Cannot gzip archive: {}", e)))
}

/// Copy `source` into `target` without compression
pub async fn copy_file(source: &Path, target: &Path) -> Result<()> {
    tokio::fs::copy(source, target).await.map_err(|e| {
        LogTeeError::RotationError(format!(
            "Cannot copy {} to {}: {}",
            source.display(),
            target.display(),
            e
        ))
    })?;
    Ok(())
}
