//! Run progress reporting
//!
//! The conversion worker is the only writer; the interactive surface reads
//! whatever arrived last. Messages travel over a plain mpsc channel so the
//! worker never blocks on the surface.

use chrono::{DateTime, Local};
use log::Level;
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

use crate::image_processing::orientation::AspectBucket;

/// Coarse state of a conversion run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStage {
    Idle,
    Discovering,
    Classifying,
    Converting(AspectBucket),
    Cleaning,
    Done,
    Failed,
}

impl fmt::Display for RunStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunStage::Idle => write!(f, "Idle"),
            RunStage::Discovering => write!(f, "Discovering images"),
            RunStage::Classifying => write!(f, "Classifying by aspect ratio"),
            RunStage::Converting(bucket) => write!(f, "Converting {} images", bucket),
            RunStage::Cleaning => write!(f, "Cleaning temporary files"),
            RunStage::Done => write!(f, "Done"),
            RunStage::Failed => write!(f, "Failed"),
        }
    }
}

/// One line of the append-only run log
#[derive(Debug, Clone)]
pub struct LogEntry {
    pub timestamp: DateTime<Local>,
    pub level: Level,
    pub message: String,
}

impl LogEntry {
    pub fn new(level: Level, message: impl Into<String>) -> Self {
        Self {
            timestamp: Local::now(),
            level,
            message: message.into(),
        }
    }
}

impl fmt::Display for LogEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {:<5} {}",
            self.timestamp.format("%H:%M:%S"),
            self.level,
            self.message
        )
    }
}

#[derive(Debug, Clone)]
pub enum ProgressMessage {
    Stage(RunStage),
    Progress { fraction: f32, current: String },
    Log(LogEntry),
    Finished,
}

/// Latest known state of a run, as seen by the surface
#[derive(Debug, Clone)]
pub struct RunProgress {
    pub stage: RunStage,
    pub fraction: f32,
    pub current_item: String,
    pub log: Vec<LogEntry>,
    pub finished: bool,
}

impl Default for RunProgress {
    fn default() -> Self {
        Self {
            stage: RunStage::Idle,
            fraction: 0.0,
            current_item: String::new(),
            log: Vec::new(),
            finished: false,
        }
    }
}

impl RunProgress {
    /// Fold a message into the current state.
    pub fn apply(&mut self, message: ProgressMessage) {
        match message {
            ProgressMessage::Stage(stage) => {
                self.stage = stage;
                if stage == RunStage::Done {
                    self.fraction = 1.0;
                }
            }
            ProgressMessage::Progress { fraction, current } => {
                // Never move backwards within a run
                self.fraction = fraction.clamp(0.0, 1.0).max(self.fraction);
                self.current_item = current;
            }
            ProgressMessage::Log(entry) => self.log.push(entry),
            ProgressMessage::Finished => self.finished = true,
        }
    }

    /// Number of log entries at warning level or worse
    pub fn problem_count(&self) -> usize {
        self.log
            .iter()
            .filter(|entry| entry.level <= Level::Warn)
            .count()
    }
}

/// Sending half handed to the library code.
///
/// A `Reporter` built with [`Reporter::silent`] drops every message but
/// still mirrors log entries to the `log` facade.
#[derive(Debug, Clone, Default)]
pub struct Reporter {
    sender: Option<Sender<ProgressMessage>>,
}

impl Reporter {
    pub fn channel() -> (Self, Receiver<ProgressMessage>) {
        let (tx, rx) = channel();
        (Self { sender: Some(tx) }, rx)
    }

    pub fn silent() -> Self {
        Self { sender: None }
    }

    fn send(&self, message: ProgressMessage) {
        if let Some(sender) = &self.sender {
            // The surface may have gone away; the run still completes
            let _ = sender.send(message);
        }
    }

    pub fn stage(&self, stage: RunStage) {
        self.send(ProgressMessage::Stage(stage));
    }

    pub fn progress(&self, fraction: f32, current: impl Into<String>) {
        self.send(ProgressMessage::Progress {
            fraction,
            current: current.into(),
        });
    }

    pub fn log(&self, level: Level, message: impl Into<String>) {
        let entry = LogEntry::new(level, message);
        log::log!(target: "folder2pdf", level, "{}", entry.message);
        self.send(ProgressMessage::Log(entry));
    }

    pub fn info(&self, message: impl Into<String>) {
        self.log(Level::Info, message);
    }

    pub fn warn(&self, message: impl Into<String>) {
        self.log(Level::Warn, message);
    }

    pub fn error(&self, message: impl Into<String>) {
        self.log(Level::Error, message);
    }

    pub fn finished(&self) {
        self.send(ProgressMessage::Finished);
    }
}
