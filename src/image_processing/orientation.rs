use serde::Serialize;
use strum_macros::{AsRefStr, Display, EnumIter};

/// Output group for an image, decided by its aspect ratio
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Display, AsRefStr, EnumIter, Serialize,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum AspectBucket {
    /// Wide images, roughly 16:9 and wider
    Landscape,
    /// Tall images, roughly 9:16 and taller
    Portrait,
    /// Everything between, including squares
    Other,
    /// Single bucket used when ratio splitting is disabled
    All,
}

impl AspectBucket {
    /// Buckets produced by [`classify`], in output order
    pub const SPLIT: [AspectBucket; 3] = [
        AspectBucket::Landscape,
        AspectBucket::Portrait,
        AspectBucket::Other,
    ];

    /// Suffix appended to the output base name in split mode
    pub fn file_suffix(&self) -> Option<&'static str> {
        match self {
            AspectBucket::Landscape => Some("_16x9"),
            AspectBucket::Portrait => Some("_9x16"),
            AspectBucket::Other => Some("_other"),
            AspectBucket::All => None,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            AspectBucket::Landscape => "16:9 (landscape)",
            AspectBucket::Portrait => "9:16 (portrait)",
            AspectBucket::Other => "other ratio",
            AspectBucket::All => "all images",
        }
    }
}

/// Classify pixel dimensions into an aspect bucket.
///
/// Wider than tall: landscape when `w / h > 1.5`, otherwise other.
/// Taller or square: portrait when `h / w > 1.5`, otherwise other.
/// The ratio test is done in integers (`2w > 3h`), so scaling both
/// sides by the same factor never changes the answer.
pub fn classify(width: u32, height: u32) -> AspectBucket {
    let (w, h) = (width as u64, height as u64);

    if w > h {
        if 2 * w > 3 * h {
            AspectBucket::Landscape
        } else {
            AspectBucket::Other
        }
    } else if 2 * h > 3 * w {
        AspectBucket::Portrait
    } else {
        AspectBucket::Other
    }
}
