// Library exports for reuse by the CLI and other front ends
pub mod accelerator;
pub mod cli;
pub mod config_file;
pub mod error;
pub mod image_processing;
pub mod json_output;
pub mod pdf;
pub mod progress;
pub mod report;
pub mod temp_session;
pub mod utils;
pub mod worker;

// Re-export commonly used types
pub use error::{ConvertError, Result};
pub use image_processing::orientation::{classify, AspectBucket};
pub use image_processing::{
    BucketOutcome, ConversionConfig, ConversionEngine, ConversionResult, ImageRef,
};
pub use json_output::JsonMessage;
pub use pdf::{AssemblyStrategy, EmbedSource};
pub use progress::{LogEntry, ProgressMessage, Reporter, RunProgress, RunStage};
pub use temp_session::{CleanupReport, TempSession, TempUsage};
pub use worker::{spawn_conversion, ConversionHandle};
