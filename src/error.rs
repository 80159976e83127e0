use thiserror::Error;

/// Main error type for the logtee pipeline and rotation engine
#[derive(Debug, Error)]
pub enum LogTeeError {
    // Configuration errors
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Invalid configuration file: {0}")]
    InvalidConfig(String),

    // Output file errors
    #[error("Cannot write to output file: {0}")]
    OutputFileError(String),

    // Rotation errors
    #[error("Rotation failed: {0}")]
    RotationError(String),

    #[error("Rotate target file exists: {0}")]
    ArchiveCollision(String),

    #[error("Hook script failed: {0}")]
    HookError(String),

    // Trigger protocol errors
    #[error("Trigger file error: {0}")]
    TriggerError(String),

    // Activity log errors
    #[error("Activity log error: {0}")]
    ActivityLogError(String),

    // IO errors (automatically converted from std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for logtee operations
pub type Result<T> = std::result::Result<T, LogTeeError>;

/// Terminate the process after a condition where continuing risks data loss.
///
/// Fatal conditions (a failed primary write, an unacknowledged trigger request,
/// a failed size- or timer-driven rotation) are logged and converted into a
/// clean nonzero exit instead of unwinding across task boundaries.
pub fn fail_fast(context: &str, err: &LogTeeError) -> ! {
    tracing::error!(error = %err, "{}", context);
    eprintln!("✗ {}: {}", context, err);
    std::process::exit(1);
}
