//! Background conversion thread
//!
//! The run executes on its own thread while the caller drains the progress
//! channel. There is no cancellation; a started run goes to completion.

use std::sync::mpsc::Receiver;
use std::thread::{self, JoinHandle};

use crate::error::{ConvertError, Result};
use crate::image_processing::{ConversionConfig, ConversionEngine, ConversionResult};
use crate::progress::{ProgressMessage, Reporter};
use crate::temp_session::TempSession;

pub struct ConversionHandle {
    thread: JoinHandle<Result<ConversionResult>>,
    messages: Receiver<ProgressMessage>,
}

impl ConversionHandle {
    pub fn messages(&self) -> &Receiver<ProgressMessage> {
        &self.messages
    }

    /// Wait for the run to end and return its result.
    pub fn join(self) -> Result<ConversionResult> {
        self.thread.join().unwrap_or(Err(ConvertError::WorkerPanicked))
    }
}

/// Start a run on a new thread. The session is owned by the worker for
/// the duration of the run.
pub fn spawn_conversion(config: ConversionConfig, mut session: TempSession) -> ConversionHandle {
    let (reporter, messages) = Reporter::channel();

    let thread = thread::spawn(move || {
        let engine = ConversionEngine::new(config);
        engine.run(&mut session, &reporter)
    });

    ConversionHandle { thread, messages }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::{RunProgress, RunStage};
    use image::{Rgb, RgbImage};
    use tempfile::TempDir;

    fn session_in(tmp: &TempDir) -> TempSession {
        let system = tmp.path().join("system");
        std::fs::create_dir_all(&system).unwrap();
        TempSession::with_roots(system.join("app"), &system).unwrap()
    }

    #[test]
    fn test_worker_reports_until_finished() {
        let tmp = TempDir::new().unwrap();
        let input = tmp.path().join("in");
        std::fs::create_dir(&input).unwrap();
        for name in ["a.jpg", "b.png"] {
            RgbImage::from_pixel(40, 30, Rgb([9, 9, 9]))
                .save(input.join(name))
                .unwrap();
        }

        let config = ConversionConfig::new(&input, tmp.path().join("out.pdf"));
        let handle = spawn_conversion(config, session_in(&tmp));

        let mut progress = RunProgress::default();
        for message in handle.messages().iter() {
            progress.apply(message);
            if progress.finished {
                break;
            }
        }

        let result = handle.join().unwrap();
        assert_eq!(result.embedded(), 2);
        assert_eq!(progress.stage, RunStage::Done);
        assert_eq!(progress.fraction, 1.0);
        assert!(!progress.log.is_empty());
    }

    #[test]
    fn test_worker_surfaces_discovery_error() {
        let tmp = TempDir::new().unwrap();
        let config = ConversionConfig::new(tmp.path().join("missing"), tmp.path().join("out.pdf"));
        let handle = spawn_conversion(config, session_in(&tmp));

        let mut progress = RunProgress::default();
        for message in handle.messages().iter() {
            progress.apply(message);
        }

        assert!(matches!(handle.join(), Err(ConvertError::InputNotFound(_))));
        assert_eq!(progress.stage, RunStage::Failed);
        assert!(!tmp.path().join("out.pdf").exists());
    }
}
