// CLI module - argument parsing, validation, and pipeline wiring

use crate::activity::{self, ActivityLog};
use crate::config::{RotateConfig, Settings};
use crate::error::{fail_fast, Result};
use crate::pipeline;
use crate::rotate::RotationEngine;
use crate::state::OutputState;
use crate::trigger::{self, Shutdown};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::BufReader;

/// logtee - copy stdin to a file and stdout, with trigger-driven rotation
#[derive(Debug, Parser)]
#[command(name = "logtee")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// File to redirect output to
    #[arg(short = 'o', long)]
    output_file: Option<PathBuf>,

    /// Write 1 to this file to request a rotation; 0 is written back on
    /// success, 2 on failure
    #[arg(short = 't', long)]
    trigger_file: Option<PathBuf>,

    /// Max number of archives to keep; omit to disable the rule
    #[arg(short = 'n', long)]
    max_files: Option<u64>,

    /// Delete archives older than this many days; omit to disable the rule
    #[arg(short = 'd', long)]
    max_days: Option<u64>,

    /// Truncate the output file on startup instead of appending
    #[arg(short = 'x', long)]
    truncate: bool,

    /// Seconds between trigger-file and size checks
    #[arg(short = 'f', long)]
    scan_frequency: Option<f64>,

    /// Gzip archives instead of copying them
    #[arg(short = 'c', long)]
    compress: bool,

    /// Script to run before rotating; receives the absolute output file path
    #[arg(short = 's', long)]
    pre_script: Option<String>,

    /// Script to run after rotating; receives the absolute archive path
    #[arg(short = 'p', long)]
    post_script: Option<String>,

    /// Rotate unconditionally every this many seconds; omit to disable
    #[arg(short = 'a', long)]
    auto_rotate_frequency: Option<f64>,

    /// Rotate once the output file reaches this many bytes; omit to disable
    #[arg(short = 'm', long)]
    max_logfile_size: Option<u64>,

    /// Append activity logging to this file
    #[arg(short = 'v', long)]
    verbose_output_file: Option<PathBuf>,

    /// Load settings from a TOML or JSON file; explicit flags override it
    #[arg(long)]
    config: Option<PathBuf>,
}

impl Cli {
    /// Parse arguments and run the pipeline until the input stream ends
    pub async fn run() -> Result<()> {
        let cli = Cli::parse();
        cli.execute().await
    }

    async fn execute(self) -> Result<()> {
        let settings = self.into_settings()?;
        let activity = activity::init(settings.activity_path.as_deref())?;
        run_pipeline(settings, activity).await
    }

    /// Merge the optional config file and explicit flags into validated settings
    fn into_settings(self) -> Result<Settings> {
        let mut settings = match &self.config {
            Some(path) => Settings::from_file(path)?,
            None => Settings {
                output_path: PathBuf::new(),
                trigger_path: None,
                max_files: None,
                max_age_days: None,
                truncate_on_start: false,
                scan_interval_secs: 1.0,
                compress: false,
                pre_script: None,
                post_script: None,
                timer_interval_secs: None,
                size_threshold_bytes: None,
                activity_path: None,
            },
        };

        if let Some(output) = self.output_file {
            settings.output_path = output;
        }
        if let Some(trigger) = self.trigger_file {
            settings.trigger_path = Some(trigger);
        }
        if let Some(max_files) = self.max_files {
            settings.max_files = Some(max_files);
        }
        if let Some(max_days) = self.max_days {
            settings.max_age_days = Some(max_days);
        }
        if self.truncate {
            settings.truncate_on_start = true;
        }
        if let Some(frequency) = self.scan_frequency {
            settings.scan_interval_secs = frequency;
        }
        if self.compress {
            settings.compress = true;
        }
        if let Some(script) = self.pre_script {
            settings.pre_script = Some(script);
        }
        if let Some(script) = self.post_script {
            settings.post_script = Some(script);
        }
        if let Some(frequency) = self.auto_rotate_frequency {
            settings.timer_interval_secs = Some(frequency);
        }
        if let Some(size) = self.max_logfile_size {
            settings.size_threshold_bytes = Some(size);
        }
        if let Some(path) = self.verbose_output_file {
            settings.activity_path = Some(path);
        }

        settings.validate()?;
        Ok(settings)
    }
}

/// Wire up file state, rotation engine, trigger pollers, and the copy
/// pipeline, then run until end-of-stream or a termination signal
async fn run_pipeline(settings: Settings, activity: ActivityLog) -> Result<()> {
    let state = Arc::new(OutputState::open(&settings.output_path, settings.truncate_on_start).await?);
    let engine = Arc::new(RotationEngine::new(
        Arc::clone(&state),
        RotateConfig::from(&settings),
        activity.clone(),
    ));
    let shutdown = Shutdown::new();

    // Trigger sources coordinate only through the engine's rotation lock
    if let Some(interval) = settings.timer_interval() {
        trigger::spawn_timer_poller(
            Arc::clone(&engine),
            interval,
            shutdown.clone(),
            activity.clone(),
        );
    }
    if let Some(threshold) = settings.size_threshold_bytes {
        trigger::spawn_size_poller(
            Arc::clone(&engine),
            settings.output_path.clone(),
            threshold,
            settings.scan_interval(),
            shutdown.clone(),
            activity.clone(),
        );
    }
    if let Some(trigger_path) = settings.trigger_path.clone() {
        trigger::spawn_control_poller(
            Arc::clone(&engine),
            trigger_path,
            settings.scan_interval(),
            shutdown.clone(),
            activity.clone(),
        );
    }

    let (queue_tx, queue_rx) = pipeline::channel();
    activity.record("pipeline started", &settings.output_path.display().to_string());

    let reader = tokio::spawn(async move {
        pipeline::read_chunks(BufReader::new(tokio::io::stdin()), queue_tx).await;
    });
    let writer = tokio::spawn({
        let state = Arc::clone(&state);
        async move {
            if let Err(e) = pipeline::write_chunks(queue_rx, state, tokio::io::stdout()).await {
                fail_fast("Cannot write to output file", &e);
            }
        }
    });

    tokio::select! {
        _ = writer => {
            activity.record("input stream ended", "");
        }
        _ = wait_for_termination() => {
            activity.record("termination signal received", "");
        }
    }

    // Refuse new rotations and let an in-flight one finish before exiting
    shutdown.begin();
    engine.wait_idle().await;
    reader.abort();
    activity.record("pipeline stopped", "");

    Ok(())
}

/// Resolve on SIGINT or SIGTERM
async fn wait_for_termination() {
    #[cfg(unix)]
    {
        let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to setup SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {}
            _ = sigterm.recv() => {}
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
    }
}
