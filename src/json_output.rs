//! JSON output for front-end integration
//!
//! When --json-progress flag is enabled, all progress and status information
//! is emitted as JSON lines to stdout, suppressing all other output.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::image_processing::{BucketOutcome, ConversionResult};
use crate::progress::LogEntry;

/// Last progress emission timestamp (milliseconds since epoch)
/// Used for throttling progress updates to ~25 FPS (40ms between updates)
static LAST_PROGRESS_MS: AtomicU64 = AtomicU64::new(0);

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum JsonMessage {
    /// Progress update
    Progress {
        stage: String,
        fraction: f32,
        current: String,
    },
    /// Run log entry
    Log {
        timestamp: String,
        level: String,
        message: String,
    },
    /// One output bucket finished
    BucketCompleted {
        bucket: String,
        output_path: String,
        attempted: usize,
        embedded: usize,
        skipped: usize,
        error: Option<String>,
    },
    /// Processing summary
    Summary {
        discovered: usize,
        embedded: usize,
        skipped: usize,
        outputs: Vec<String>,
        duration_secs: f64,
    },
    /// Run failed before any output was written
    Failed { error: String },
}

impl JsonMessage {
    /// Emit JSON message to stdout
    pub fn emit(&self) {
        if let Ok(json) = serde_json::to_string(self) {
            println!("{}", json);
        }
    }

    /// Create and emit progress message (throttled to ~25 FPS)
    ///
    /// The final update (fraction 1.0) is always emitted.
    pub fn progress(stage: impl Into<String>, fraction: f32, current: impl Into<String>) {
        let now_ms = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);

        let last_ms = LAST_PROGRESS_MS.load(Ordering::Relaxed);

        if now_ms.saturating_sub(last_ms) >= 40 || fraction >= 1.0 {
            LAST_PROGRESS_MS.store(now_ms, Ordering::Relaxed);
            Self::Progress {
                stage: stage.into(),
                fraction,
                current: current.into(),
            }
            .emit();
        }
    }

    pub fn log(entry: &LogEntry) {
        Self::Log {
            timestamp: entry.timestamp.to_rfc3339(),
            level: entry.level.to_string(),
            message: entry.message.clone(),
        }
        .emit();
    }

    pub fn bucket_completed(outcome: &BucketOutcome) {
        Self::BucketCompleted {
            bucket: outcome.bucket.to_string(),
            output_path: outcome.output.display().to_string(),
            attempted: outcome.attempted,
            embedded: outcome.embedded,
            skipped: outcome.skipped,
            error: outcome.error.clone(),
        }
        .emit();
    }

    /// Create and emit summary message
    pub fn summary(result: &ConversionResult) {
        Self::Summary {
            discovered: result.discovered,
            embedded: result.embedded(),
            skipped: result.skipped(),
            outputs: result
                .written_files()
                .iter()
                .map(|path| path.display().to_string())
                .collect(),
            duration_secs: result.elapsed.as_secs_f64(),
        }
        .emit();
    }

    pub fn failed(error: impl Into<String>) {
        Self::Failed {
            error: error.into(),
        }
        .emit();
    }
}
