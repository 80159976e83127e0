use super::archive::{self, ArchiveFile};
use crate::activity::ActivityLog;
use crate::config::RotateConfig;
use crate::error::{LogTeeError, Result};
use crate::state::OutputState;
use std::path::Path;
use std::sync::Arc;
use tokio::process::Command;
use tokio::sync::Mutex;

/// The rotation engine: swaps the live output file aside, renumbers the
/// archive chain, materializes the new archive, runs the user hooks, and
/// prunes by count and age.
///
/// All of `rotate()` runs under one process-wide lock, so concurrent trigger
/// sources serialize here; a blocked caller waits for the in-flight rotation
/// instead of skipping or queueing another request.
pub struct RotationEngine {
    output: Arc<OutputState>,
    config: RotateConfig,
    activity: ActivityLog,
    lock: Mutex<()>,
}

impl RotationEngine {
    pub fn new(output: Arc<OutputState>, config: RotateConfig, activity: ActivityLog) -> Self {
        Self {
            output,
            config,
            activity,
            lock: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &RotateConfig {
        &self.config
    }

    /// Perform one full rotation.
    ///
    /// Any failing step aborts the remaining ones and surfaces the error to
    /// the trigger source; files already produced are left in place for
    /// inspection, never rolled back.
    pub async fn rotate(&self) -> Result<()> {
        let _guard = self.lock.lock().await;
        self.activity.record("rotation started", "");

        // Move the output file aside quickly; the writer only blocks for the
        // rename. Everything after this line works on the temp file.
        let temp_path = self.output.swap().await?;

        if let Some(script) = configured(&self.config.pre_script) {
            self.run_hook(script, self.output.path(), "pre").await?;

            // The script was handed the output path, not the temp file; if
            // the temp file is gone anyway, assume the script interfered and
            // stop before archiving nothing.
            if tokio::fs::metadata(&temp_path).await.is_err() {
                return Err(LogTeeError::HookError(format!(
                    "File being rotated disappeared after pre-rotate script: {}",
                    temp_path.display()
                )));
            }
        }

        // Renumber existing archives highest-first so no rename lands on an
        // index that still holds un-shifted data.
        let mut archives = archive::find_all(self.output.path()).await;
        self.activity
            .record("shifting archives", &format!("{} present", archives.len()));
        for entry in archives.iter_mut().rev() {
            archive::shift_up(entry).await?;
        }

        let newest = ArchiveFile::new(self.output.path(), 1, self.config.compress);
        if self.config.compress {
            archive::gzip_file(&temp_path, &newest.path()).await?;
        } else {
            archive::copy_file(&temp_path, &newest.path()).await?;
        }

        // The archive holds the data now; the temp copy is expendable.
        if let Err(e) = tokio::fs::remove_file(&temp_path).await {
            self.activity.record(
                "failed to remove temp file",
                &format!("{}: {}", temp_path.display(), e),
            );
        }
        archives.insert(0, newest);

        if let Some(script) = configured(&self.config.post_script) {
            self.run_hook(script, &archives[0].path(), "post").await?;
        }

        self.apply_count_retention(&archives).await;
        self.apply_age_retention(&archives).await;

        self.activity.record("rotation finished", "");
        Ok(())
    }

    /// Await the rotation lock once, so shutdown can let an in-flight
    /// rotation finish before the process exits
    pub async fn wait_idle(&self) {
        drop(self.lock.lock().await);
    }

    /// Run a user hook as `/bin/sh -c <script>` with the absolute file path
    /// as its positional argument
    async fn run_hook(&self, script: &str, file: &Path, label: &str) -> Result<()> {
        let file = std::path::absolute(file).map_err(|e| {
            LogTeeError::HookError(format!(
                "Cannot resolve path for {}-rotate script: {}",
                label, e
            ))
        })?;

        self.activity.record(
            &format!("running {}-rotate script", label),
            &file.display().to_string(),
        );

        let status = Command::new("/bin/sh")
            .arg("-c")
            .arg(script)
            .arg(&file)
            .status()
            .await
            .map_err(|e| {
                LogTeeError::HookError(format!("Cannot start {}-rotate script: {}", label, e))
            })?;

        if !status.success() {
            return Err(LogTeeError::HookError(format!(
                "{}-rotate script exited with {}",
                label, status
            )));
        }

        Ok(())
    }

    /// Delete archives beyond the configured count. Deletion errors are
    /// recorded and ignored.
    async fn apply_count_retention(&self, archives: &[ArchiveFile]) {
        let Some(max_files) = self.config.max_files else {
            return;
        };

        self.activity
            .record("applying count retention", &format!("keep {}", max_files));
        for entry in archives.iter().filter(|a| a.index > max_files) {
            let path = entry.path();
            if let Err(e) = tokio::fs::remove_file(&path).await {
                self.activity
                    .record("failed to delete archive", &format!("{}: {}", path.display(), e));
            }
        }
    }

    /// Delete archives whose creation time is at least `max_age_days` old.
    /// Filesystems without creation-time metadata skip the file; deletion
    /// errors are recorded and ignored.
    async fn apply_age_retention(&self, archives: &[ArchiveFile]) {
        let Some(max_age_days) = self.config.max_age_days else {
            return;
        };

        self.activity.record(
            "applying age retention",
            &format!("max {} days", max_age_days),
        );
        let now = chrono::Local::now();

        for entry in archives {
            let path = entry.path();
            let created = match tokio::fs::metadata(&path).await.and_then(|m| m.created()) {
                Ok(created) => created,
                Err(_) => {
                    self.activity.record(
                        "cannot determine archive creation time",
                        &path.display().to_string(),
                    );
                    continue;
                }
            };

            let age = now.signed_duration_since(chrono::DateTime::<chrono::Local>::from(created));
            if age.num_days() >= max_age_days as i64 {
                if let Err(e) = tokio::fs::remove_file(&path).await {
                    self.activity.record(
                        "failed to delete archive",
                        &format!("{}: {}", path.display(), e),
                    );
                }
            }
        }
    }
}

fn configured(script: &Option<String>) -> Option<&str> {
    script.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn test_config() -> RotateConfig {
        RotateConfig {
            max_files: None,
            max_age_days: None,
            scan_interval: std::time::Duration::from_millis(10),
            compress: false,
            pre_script: None,
            post_script: None,
        }
    }

    async fn engine_with(
        dir: &TempDir,
        config: RotateConfig,
    ) -> (RotationEngine, Arc<OutputState>, PathBuf) {
        let path = dir.path().join("out.log");
        let state = Arc::new(OutputState::open(&path, false).await.unwrap());
        let engine = RotationEngine::new(Arc::clone(&state), config, ActivityLog::disabled());
        (engine, state, path)
    }

    fn read_gz(path: &Path) -> String {
        let mut decoder = flate2::read::GzDecoder::new(std::fs::File::open(path).unwrap());
        let mut decoded = String::new();
        decoder.read_to_string(&mut decoded).unwrap();
        decoded
    }

    #[tokio::test]
    async fn test_rotate_creates_first_archive() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, state, path) = engine_with(&temp_dir, test_config()).await;

        state.write(b"batch one\n").await.unwrap();
        engine.rotate().await.unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "");
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.1")).unwrap(),
            "batch one\n"
        );
        // Temp file is gone after successful materialization
        assert!(!temp_dir.path().join("out.log.tmp.1").exists());
    }

    #[tokio::test]
    async fn test_rotate_compressed_archive() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.compress = true;
        let (engine, state, _path) = engine_with(&temp_dir, config).await;

        state.write(b"compressed batch\n").await.unwrap();
        engine.rotate().await.unwrap();

        let archive = temp_dir.path().join("out.log.1.gz");
        assert!(archive.exists());
        assert_eq!(read_gz(&archive), "compressed batch\n");
        assert!(!temp_dir.path().join("out.log.1").exists());
    }

    #[tokio::test]
    async fn test_successive_rotations_shift_archives() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, state, _path) = engine_with(&temp_dir, test_config()).await;

        state.write(b"first\n").await.unwrap();
        engine.rotate().await.unwrap();
        state.write(b"second\n").await.unwrap();
        engine.rotate().await.unwrap();
        state.write(b"third\n").await.unwrap();
        engine.rotate().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.1")).unwrap(),
            "third\n"
        );
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.2")).unwrap(),
            "second\n"
        );
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.3")).unwrap(),
            "first\n"
        );
        assert!(!temp_dir.path().join("out.log.4").exists());
    }

    #[tokio::test]
    async fn test_shift_collision_aborts_without_overwriting() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, state, _path) = engine_with(&temp_dir, test_config()).await;

        state.write(b"live\n").await.unwrap();
        std::fs::write(temp_dir.path().join("out.log.1"), "archived\n").unwrap();
        // Stray blocker where index 1 would shift to
        std::fs::write(temp_dir.path().join("out.log.2"), "blocker\n").unwrap();

        let err = engine.rotate().await.unwrap_err();
        assert!(matches!(err, LogTeeError::ArchiveCollision(_)));

        // Nothing destroyed: blocker and archive intact, swapped-out bytes
        // still inspectable in the temp file
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.1")).unwrap(),
            "archived\n"
        );
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.2")).unwrap(),
            "blocker\n"
        );
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.tmp.1")).unwrap(),
            "live\n"
        );
    }

    #[tokio::test]
    async fn test_rotate_missing_output_fails_cleanly() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, _state, path) = engine_with(&temp_dir, test_config()).await;

        std::fs::remove_file(&path).unwrap();
        assert!(engine.rotate().await.is_err());
        assert!(!temp_dir.path().join("out.log.1").exists());
    }

    #[tokio::test]
    async fn test_pre_hook_receives_output_path() {
        let temp_dir = TempDir::new().unwrap();
        let seen = temp_dir.path().join("hook-arg");
        let mut config = test_config();
        config.pre_script = Some(format!("echo \"$0\" > {}", seen.display()));
        let (engine, state, path) = engine_with(&temp_dir, config).await;

        state.write(b"data\n").await.unwrap();
        engine.rotate().await.unwrap();

        let arg = std::fs::read_to_string(&seen).unwrap();
        assert_eq!(arg.trim(), std::path::absolute(&path).unwrap().display().to_string());
    }

    #[tokio::test]
    async fn test_pre_hook_failure_aborts_and_keeps_temp() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.pre_script = Some("exit 1".to_string());
        let (engine, state, _path) = engine_with(&temp_dir, config).await;

        state.write(b"data\n").await.unwrap();
        let err = engine.rotate().await.unwrap_err();
        assert!(matches!(err, LogTeeError::HookError(_)));

        assert!(!temp_dir.path().join("out.log.1").exists());
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.tmp.1")).unwrap(),
            "data\n"
        );
    }

    #[tokio::test]
    async fn test_pre_hook_deleting_temp_aborts() {
        let temp_dir = TempDir::new().unwrap();
        let temp_path = temp_dir.path().join("out.log.tmp.1");
        let mut config = test_config();
        config.pre_script = Some(format!("rm {}", temp_path.display()));
        let (engine, state, _path) = engine_with(&temp_dir, config).await;

        state.write(b"data\n").await.unwrap();
        let err = engine.rotate().await.unwrap_err();
        assert!(matches!(err, LogTeeError::HookError(_)));
        assert!(!temp_dir.path().join("out.log.1").exists());
    }

    #[tokio::test]
    async fn test_post_hook_failure_keeps_archive() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.post_script = Some("exit 1".to_string());
        let (engine, state, _path) = engine_with(&temp_dir, config).await;

        state.write(b"data\n").await.unwrap();
        let err = engine.rotate().await.unwrap_err();
        assert!(matches!(err, LogTeeError::HookError(_)));

        // Failure is reported but the archive is already retained
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.1")).unwrap(),
            "data\n"
        );
        assert!(!temp_dir.path().join("out.log.tmp.1").exists());
    }

    #[tokio::test]
    async fn test_post_hook_receives_archive_path() {
        let temp_dir = TempDir::new().unwrap();
        let seen = temp_dir.path().join("hook-arg");
        let mut config = test_config();
        config.post_script = Some(format!("echo \"$0\" > {}", seen.display()));
        let (engine, state, _path) = engine_with(&temp_dir, config).await;

        state.write(b"data\n").await.unwrap();
        engine.rotate().await.unwrap();

        let arg = std::fs::read_to_string(&seen).unwrap();
        assert!(arg.trim().ends_with("out.log.1"));
    }

    #[tokio::test]
    async fn test_count_retention_caps_archives() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.max_files = Some(2);
        let (engine, state, _path) = engine_with(&temp_dir, config).await;

        for batch in ["a\n", "b\n", "c\n", "d\n"] {
            state.write(batch.as_bytes()).await.unwrap();
            engine.rotate().await.unwrap();
        }

        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.1")).unwrap(),
            "d\n"
        );
        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.2")).unwrap(),
            "c\n"
        );
        assert!(!temp_dir.path().join("out.log.3").exists());
    }

    #[tokio::test]
    async fn test_count_retention_zero_prunes_everything() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.max_files = Some(0);
        let (engine, state, _path) = engine_with(&temp_dir, config).await;

        state.write(b"gone\n").await.unwrap();
        engine.rotate().await.unwrap();

        assert!(!temp_dir.path().join("out.log.1").exists());
    }

    #[tokio::test]
    async fn test_age_retention_zero_prunes_everything() {
        let temp_dir = TempDir::new().unwrap();

        // Skip on filesystems without creation-time metadata
        let probe = temp_dir.path().join("btime-probe");
        std::fs::write(&probe, "").unwrap();
        if std::fs::metadata(&probe).unwrap().created().is_err() {
            return;
        }

        let mut config = test_config();
        config.max_age_days = Some(0);
        let (engine, state, _path) = engine_with(&temp_dir, config).await;

        state.write(b"gone\n").await.unwrap();
        engine.rotate().await.unwrap();

        assert!(!temp_dir.path().join("out.log.1").exists());
    }

    #[tokio::test]
    async fn test_age_retention_keeps_young_archives() {
        let temp_dir = TempDir::new().unwrap();
        let mut config = test_config();
        config.max_age_days = Some(7);
        let (engine, state, _path) = engine_with(&temp_dir, config).await;

        state.write(b"young\n").await.unwrap();
        engine.rotate().await.unwrap();

        assert_eq!(
            std::fs::read_to_string(temp_dir.path().join("out.log.1")).unwrap(),
            "young\n"
        );
    }

    #[tokio::test]
    async fn test_rotations_serialize_under_the_lock() {
        let temp_dir = TempDir::new().unwrap();
        let (engine, state, _path) = engine_with(&temp_dir, test_config()).await;
        let engine = Arc::new(engine);

        state.write(b"contended\n").await.unwrap();

        // Both calls complete; exactly one archives the data, the other
        // rotates an already-empty file
        let a = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.rotate().await }
        });
        let b = tokio::spawn({
            let engine = Arc::clone(&engine);
            async move { engine.rotate().await }
        });
        a.await.unwrap().unwrap();
        b.await.unwrap().unwrap();

        let combined = format!(
            "{}{}",
            std::fs::read_to_string(temp_dir.path().join("out.log.2")).unwrap(),
            std::fs::read_to_string(temp_dir.path().join("out.log.1")).unwrap(),
        );
        assert_eq!(combined, "contended\n");
    }
}
