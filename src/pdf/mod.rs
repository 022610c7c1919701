pub mod assemble;
pub mod builder;

use std::borrow::Cow;
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::Result;

pub use assemble::{assemble, assemble_with, AssemblyReport, AssemblyStrategy};
pub use builder::{page_count, PdfBuilder, PdfColorSpace};

/// An image ready to be placed on a PDF page
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EmbedSource {
    /// Image file on disk, embeddable as-is
    Path(PathBuf),
    /// Encoded image held in memory
    Buffer { name: String, bytes: Vec<u8> },
}

impl EmbedSource {
    pub fn display_name(&self) -> String {
        match self {
            EmbedSource::Path(path) => path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string()),
            EmbedSource::Buffer { name, .. } => name.clone(),
        }
    }

    pub fn as_path(&self) -> Option<&Path> {
        match self {
            EmbedSource::Path(path) => Some(path),
            EmbedSource::Buffer { .. } => None,
        }
    }

    /// Encoded bytes of the image
    pub fn bytes(&self) -> Result<Cow<'_, [u8]>> {
        match self {
            EmbedSource::Path(path) => Ok(Cow::Owned(fs::read(path)?)),
            EmbedSource::Buffer { bytes, .. } => Ok(Cow::Borrowed(bytes)),
        }
    }
}
