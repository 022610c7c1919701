use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConvertError {
    #[error("Input folder does not exist: {0}")]
    InputNotFound(PathBuf),
    #[error("Input path is not a folder: {0}")]
    InputNotDirectory(PathBuf),
    #[error("No images found in folder: {0}")]
    NoImagesFound(PathBuf),
    #[error("No images processed successfully")]
    NoImagesProcessed,
    #[error("Every output bucket ended up empty; no PDF was written")]
    AllBucketsFailed,
    #[error("Pixel format cannot be embedded directly: {0}")]
    UnsupportedPixelFormat(String),
    #[error("Image error: {0}")]
    Image(#[from] image::ImageError),
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Conversion worker stopped unexpectedly")]
    WorkerPanicked,
}

impl ConvertError {
    /// Discovery errors abort the run before any output is written.
    pub fn is_discovery_error(&self) -> bool {
        matches!(
            self,
            ConvertError::InputNotFound(_)
                | ConvertError::InputNotDirectory(_)
                | ConvertError::NoImagesFound(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, ConvertError>;
