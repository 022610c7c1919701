pub mod batch;
pub mod normalize;
pub mod orientation;

use image::{ImageFormat, ImageReader};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};
use walkdir::WalkDir;

use self::batch::{group_by_aspect, BatchProgress};
use self::normalize::{normalize_batch, NormalizeMode};
use self::orientation::{classify, AspectBucket};
use crate::accelerator;
use crate::error::{ConvertError, Result};
use crate::pdf::{assemble, AssemblyStrategy};
use crate::progress::{Reporter, RunStage};
use crate::temp_session::{CleanupReport, TempSession};
use crate::utils::{get_file_extension, has_valid_extension};

/// Extensions picked up when none are configured
pub const DEFAULT_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// A discovered image file. Dimensions are read on first use only.
#[derive(Debug, Clone)]
pub struct ImageRef {
    path: PathBuf,
    format: Option<ImageFormat>,
    dimensions: OnceLock<(u32, u32)>,
}

impl PartialEq for ImageRef {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for ImageRef {}

impl ImageRef {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = ImageFormat::from_path(&path).ok();
        Self {
            path,
            format,
            dimensions: OnceLock::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    /// Format inferred from the extension
    pub fn format(&self) -> Option<ImageFormat> {
        self.format
    }

    pub fn extension(&self) -> Option<String> {
        get_file_extension(&self.path)
    }

    pub fn has_extension_in(&self, extensions: &[&str]) -> bool {
        self.extension()
            .map(|ext| extensions.contains(&ext.as_str()))
            .unwrap_or(false)
    }

    /// Pixel size, read from the file header the first time it is asked for
    pub fn dimensions(&self) -> Result<(u32, u32)> {
        if let Some(dimensions) = self.dimensions.get() {
            return Ok(*dimensions);
        }

        let dimensions = ImageReader::open(&self.path)?
            .with_guessed_format()?
            .into_dimensions()?;
        Ok(*self.dimensions.get_or_init(|| dimensions))
    }

    pub fn aspect_bucket(&self) -> Result<AspectBucket> {
        let (width, height) = self.dimensions()?;
        Ok(classify(width, height))
    }
}

/// Find the images directly inside `dir` (not recursive), in file system order.
pub fn discover_images(dir: &Path, extensions: &[String]) -> Result<Vec<ImageRef>> {
    if !dir.exists() {
        return Err(ConvertError::InputNotFound(dir.to_path_buf()));
    }
    if !dir.is_dir() {
        return Err(ConvertError::InputNotDirectory(dir.to_path_buf()));
    }

    let mut images = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(io::Error::from)?;
        let path = entry.path();
        if path.is_file() && has_valid_extension(path, extensions) {
            images.push(ImageRef::new(path));
        }
    }

    if images.is_empty() {
        return Err(ConvertError::NoImagesFound(dir.to_path_buf()));
    }
    Ok(images)
}

/// Destination path with a `.pdf` extension, appended when missing
pub fn pdf_output_path(output: &Path) -> PathBuf {
    let has_pdf_extension = output
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.eq_ignore_ascii_case("pdf"))
        .unwrap_or(false);

    if has_pdf_extension {
        output.to_path_buf()
    } else {
        let mut name = output.as_os_str().to_os_string();
        name.push(".pdf");
        PathBuf::from(name)
    }
}

/// Destination for one bucket: `<base><suffix>.pdf` in split mode,
/// otherwise the chosen path itself.
pub fn bucket_output_path(output: &Path, bucket: AspectBucket) -> PathBuf {
    let output = pdf_output_path(output);
    match bucket.file_suffix() {
        None => output,
        Some(suffix) => {
            let stem = output
                .file_stem()
                .map(|stem| stem.to_string_lossy().into_owned())
                .unwrap_or_default();
            output.with_file_name(format!("{}{}.pdf", stem, suffix))
        }
    }
}

/// Options for one conversion run
#[derive(Debug, Clone)]
pub struct ConversionConfig {
    pub input_dir: PathBuf,
    pub output: PathBuf,
    pub sort_by_name: bool,
    /// Keep converted images as temp files; otherwise they stay in memory
    pub preserve_aspect_ratio: bool,
    pub split_by_ratio: bool,
    /// Only reported, no conversion step uses the GPU
    pub force_accelerator: bool,
    pub auto_clean_temp: bool,
    pub extensions: Vec<String>,
}

impl ConversionConfig {
    pub fn new(input_dir: impl Into<PathBuf>, output: impl Into<PathBuf>) -> Self {
        Self {
            input_dir: input_dir.into(),
            output: output.into(),
            sort_by_name: true,
            preserve_aspect_ratio: true,
            split_by_ratio: false,
            force_accelerator: false,
            auto_clean_temp: true,
            extensions: DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect(),
        }
    }

    fn normalize_mode(&self) -> NormalizeMode {
        if self.preserve_aspect_ratio {
            NormalizeMode::TempFiles
        } else {
            NormalizeMode::InMemory
        }
    }
}

/// What happened to one output bucket
#[derive(Debug, Clone)]
pub struct BucketOutcome {
    pub bucket: AspectBucket,
    pub output: PathBuf,
    pub attempted: usize,
    pub converted: usize,
    pub embedded: usize,
    pub skipped: usize,
    pub strategy: Option<AssemblyStrategy>,
    pub bytes_written: u64,
    /// Set when no PDF was written for this bucket
    pub error: Option<String>,
}

impl BucketOutcome {
    pub fn is_written(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug)]
pub struct ConversionResult {
    pub outputs: BTreeMap<AspectBucket, BucketOutcome>,
    pub discovered: usize,
    /// Images dropped before conversion because their size could not be read
    pub unclassified: Vec<PathBuf>,
    pub session_dir: Option<PathBuf>,
    pub cleanup: Option<CleanupReport>,
    pub elapsed: Duration,
}

impl ConversionResult {
    pub fn embedded(&self) -> usize {
        self.outputs.values().map(|o| o.embedded).sum()
    }

    pub fn skipped(&self) -> usize {
        self.outputs.values().map(|o| o.skipped).sum::<usize>() + self.unclassified.len()
    }

    pub fn written_files(&self) -> Vec<&Path> {
        self.outputs
            .values()
            .filter(|o| o.is_written())
            .map(|o| o.output.as_path())
            .collect()
    }
}

/// Drives one run: discover, classify, normalize, assemble, clean up.
pub struct ConversionEngine {
    config: ConversionConfig,
}

impl ConversionEngine {
    pub fn new(config: ConversionConfig) -> Self {
        Self { config }
    }

    /// Run the whole batch. The session is reset first, so leftovers of an
    /// earlier run are never touched by this run's cleanup.
    pub fn run(&self, session: &mut TempSession, reporter: &Reporter) -> Result<ConversionResult> {
        session.reset();

        let result = self.run_stages(session, reporter);
        match &result {
            Ok(result) => {
                reporter.info(format!(
                    "Done: {} page(s) in {} file(s), {} image(s) skipped",
                    result.embedded(),
                    result.written_files().len(),
                    result.skipped()
                ));
                reporter.stage(RunStage::Done);
            }
            Err(e) => {
                reporter.error(e.to_string());
                reporter.stage(RunStage::Failed);
            }
        }
        reporter.finished();
        result
    }

    fn run_stages(&self, session: &mut TempSession, reporter: &Reporter) -> Result<ConversionResult> {
        let start_time = Instant::now();
        let config = &self.config;

        reporter.stage(RunStage::Discovering);
        reporter.progress(0.0, config.input_dir.display().to_string());
        if config.force_accelerator {
            reporter.info(accelerator::probe().summary());
        }

        let mut images = discover_images(&config.input_dir, &config.extensions)?;
        if config.sort_by_name {
            images.sort_by(|a, b| a.path().cmp(b.path()));
        }
        let discovered = images.len();
        reporter.info(format!("Found {} image(s) in {}", discovered, config.input_dir.display()));

        let session_dir = session.begin_session()?;
        reporter.info(format!("Temp session: {}", session_dir.display()));

        let mut unclassified = Vec::new();
        let (buckets, convert_start) = if config.split_by_ratio {
            reporter.stage(RunStage::Classifying);
            let progress = BatchProgress::new(reporter, 0.0, 0.5, images.len());
            let grouped = group_by_aspect(images, &progress, ImageRef::aspect_bucket);
            unclassified = grouped
                .unreadable
                .iter()
                .map(|(image, _)| image.path().to_path_buf())
                .collect();
            (grouped.into_non_empty(), 0.5)
        } else {
            (vec![(AspectBucket::All, images)], 0.0)
        };

        let mut outputs = BTreeMap::new();
        let share = (1.0 - convert_start) / buckets.len().max(1) as f32;
        for (index, (bucket, images)) in buckets.into_iter().enumerate() {
            let start = convert_start + share * index as f32;
            let progress = BatchProgress::new(reporter, start, start + share, images.len());
            let outcome = self.convert_bucket(bucket, &images, session, &progress);
            outputs.insert(bucket, outcome);
        }

        let cleanup = if config.auto_clean_temp {
            reporter.stage(RunStage::Cleaning);
            let report = session.cleanup(false);
            reporter.info(format!(
                "Removed {} temp file(s), {:.2} MB freed",
                report.files_removed,
                report.megabytes_freed()
            ));
            Some(report)
        } else {
            None
        };

        if !outputs.values().any(BucketOutcome::is_written) {
            return Err(ConvertError::AllBucketsFailed);
        }

        Ok(ConversionResult {
            outputs,
            discovered,
            unclassified,
            session_dir: Some(session_dir),
            cleanup,
            elapsed: start_time.elapsed(),
        })
    }

    fn convert_bucket(
        &self,
        bucket: AspectBucket,
        images: &[ImageRef],
        session: &mut TempSession,
        progress: &BatchProgress,
    ) -> BucketOutcome {
        let reporter = progress.reporter();
        let output = bucket_output_path(&self.config.output, bucket);
        reporter.stage(RunStage::Converting(bucket));
        reporter.info(format!(
            "Converting {} image(s) [{}] to {}",
            images.len(),
            bucket.description(),
            output.display()
        ));

        let normalized = normalize_batch(images, self.config.normalize_mode(), session, progress);
        let mut outcome = BucketOutcome {
            bucket,
            output,
            attempted: images.len(),
            converted: normalized.converted,
            embedded: 0,
            skipped: normalized.failed.len(),
            strategy: None,
            bytes_written: 0,
            error: None,
        };

        if normalized.sources.is_empty() {
            reporter.warn(format!("No usable images left for {}, no PDF written", bucket));
            outcome.error = Some(ConvertError::NoImagesProcessed.to_string());
            return outcome;
        }

        if let Some(parent) = outcome.output.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = fs::create_dir_all(parent) {
                reporter.error(format!("Cannot create {}: {}", parent.display(), e));
                outcome.error = Some(e.to_string());
                return outcome;
            }
        }

        match assemble(&normalized.sources, &outcome.output, reporter) {
            Ok(report) => {
                outcome.embedded = report.pages;
                outcome.skipped += report.skipped.len();
                outcome.strategy = Some(report.strategy);
                outcome.bytes_written = report.bytes_written;
            }
            Err(e) => {
                reporter.error(format!("Failed to create {}: {}", outcome.output.display(), e));
                outcome.error = Some(e.to_string());
            }
        }
        outcome
    }
}
