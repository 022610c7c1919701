use clap::Parser;
use std::path::PathBuf;

use crate::image_processing::{pdf_output_path, ConversionConfig, DEFAULT_EXTENSIONS};

#[derive(Parser, Debug)]
#[command(
    name = "folder2pdf",
    version,
    about = "Batch a folder of images into PDF files",
    long_about = "
folder2pdf - Image folder to PDF converter

Collects the images in a folder and writes them into a PDF, one page per
image at its native size. Images that cannot be embedded directly (WebP,
images with transparency) are converted to JPEG first.

Key Features:
• One PDF per folder, or one per aspect ratio (16:9, 9:16, other)
• Lossless embedding of JPEG, PNG and grayscale images
• Automatic fallback when an image cannot be embedded as-is
• Temp file tracking with manual and automatic cleanup

Example Usage:
  # Convert a folder into album.pdf
  folder2pdf -i ~/Photos/trip -o ~/album.pdf

  # Split into album_16x9.pdf, album_9x16.pdf and album_other.pdf
  folder2pdf -i ~/Photos/trip -o ~/album --split-by-ratio

  # Keep the file system order and leave converted images on disk
  folder2pdf -i ~/Photos/trip -o ~/album.pdf --no-sort --no-auto-clean

  # Show how much temp storage is in use, then clear it
  folder2pdf --temp-status
  folder2pdf --clean-all-temp"
)]
pub struct Args {
    /// Folder containing the images to convert
    #[arg(short = 'i', long = "input", value_name = "DIR")]
    pub input: Option<PathBuf>,

    /// Destination PDF (".pdf" is appended when missing)
    #[arg(short = 'o', long = "output", value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Sort images by file name (default)
    #[arg(long = "sort-by-name", overrides_with = "no_sort")]
    pub sort_by_name: bool,

    /// Keep the order in which the file system lists the images
    #[arg(long = "no-sort", overrides_with = "sort_by_name")]
    pub no_sort: bool,

    /// Keep converted images as temp files (default)
    #[arg(long = "preserve-ratio", overrides_with = "no_preserve_ratio")]
    pub preserve_ratio: bool,

    /// Keep converted images in memory instead of temp files
    #[arg(long = "no-preserve-ratio", overrides_with = "preserve_ratio")]
    pub no_preserve_ratio: bool,

    /// Write one PDF per aspect ratio: <base>_16x9.pdf, <base>_9x16.pdf, <base>_other.pdf
    #[arg(long = "split-by-ratio")]
    pub split_by_ratio: bool,

    /// Report the GPU probe result at the start of the run
    #[arg(long = "force-gpu")]
    pub force_gpu: bool,

    /// Remove the run's temp files when it finishes (default)
    #[arg(long = "auto-clean", overrides_with = "no_auto_clean")]
    pub auto_clean: bool,

    /// Leave the run's temp files on disk
    #[arg(long = "no-auto-clean", overrides_with = "auto_clean")]
    pub no_auto_clean: bool,

    /// Comma-separated list of image extensions to process
    #[arg(long = "extensions", default_value = "jpg,jpeg,png,webp")]
    pub extensions_str: String,

    /// Show temp storage usage and exit
    #[arg(long = "temp-status")]
    pub temp_status: bool,

    /// Remove temp files tracked by this program and exit
    #[arg(long = "clean-temp", conflicts_with = "clean_all_temp")]
    pub clean_temp: bool,

    /// Remove all of this program's temp files plus stray temp files older than one hour, then exit
    #[arg(long = "clean-all-temp")]
    pub clean_all_temp: bool,

    /// Probe for a GPU and exit
    #[arg(long = "gpu-info")]
    pub gpu_info: bool,

    /// JSON configuration file; command-line options take precedence
    #[arg(long = "config", value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Append the run log to this file
    #[arg(long = "log-file", value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Emit progress as JSON lines on stdout instead of a progress bar
    #[arg(long = "json-progress")]
    pub json_progress: bool,

    /// Verbose output
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

impl Args {
    /// True when a maintenance option was given; no conversion runs then
    pub fn is_maintenance(&self) -> bool {
        self.temp_status || self.clean_temp || self.clean_all_temp || self.gpu_info
    }

    pub fn sort_by_name(&self) -> bool {
        !self.no_sort
    }

    pub fn preserve_ratio(&self) -> bool {
        !self.no_preserve_ratio
    }

    pub fn auto_clean(&self) -> bool {
        !self.no_auto_clean
    }

    /// Parse extensions into a vector, lowercased and without leading dots
    pub fn parse_extensions(&self) -> Vec<String> {
        let extensions: Vec<String> = self
            .extensions_str
            .split(',')
            .map(|s| s.trim().trim_start_matches('.').to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();

        if extensions.is_empty() {
            DEFAULT_EXTENSIONS.iter().map(|ext| ext.to_string()).collect()
        } else {
            extensions
        }
    }

    /// Final destination, with `.pdf` appended when missing
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output.as_deref().map(pdf_output_path)
    }

    /// Build the run configuration. Fails when input or output is missing.
    pub fn conversion_config(&self) -> Result<ConversionConfig, String> {
        let input = self
            .input
            .clone()
            .ok_or_else(|| "An input folder is required (-i/--input)".to_string())?;
        let output = self
            .output_path()
            .ok_or_else(|| "An output file is required (-o/--output)".to_string())?;

        Ok(ConversionConfig {
            input_dir: input,
            output,
            sort_by_name: self.sort_by_name(),
            preserve_aspect_ratio: self.preserve_ratio(),
            split_by_ratio: self.split_by_ratio,
            force_accelerator: self.force_gpu,
            auto_clean_temp: self.auto_clean(),
            extensions: self.parse_extensions(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_extensions() {
        let args = Args {
            extensions_str: "jpg,png,webp".to_string(),
            ..Default::default()
        };
        assert_eq!(args.parse_extensions(), vec!["jpg", "png", "webp"]);

        let args = Args {
            extensions_str: "JPG, .PNG , WebP ".to_string(),
            ..Default::default()
        };
        assert_eq!(args.parse_extensions(), vec!["jpg", "png", "webp"]);

        let args = Args {
            extensions_str: " , ".to_string(),
            ..Default::default()
        };
        assert_eq!(args.parse_extensions(), vec!["jpg", "jpeg", "png", "webp"]);
    }

    #[test]
    fn test_defaults_from_command_line() {
        let args = Args::parse_from(["folder2pdf", "-i", "photos", "-o", "album"]);
        assert!(args.sort_by_name());
        assert!(args.preserve_ratio());
        assert!(args.auto_clean());
        assert!(!args.split_by_ratio);
        assert!(!args.is_maintenance());
        assert_eq!(args.output_path(), Some(PathBuf::from("album.pdf")));
    }

    #[test]
    fn test_negated_flags() {
        let args = Args::parse_from([
            "folder2pdf",
            "-i",
            "photos",
            "-o",
            "album.pdf",
            "--no-sort",
            "--no-preserve-ratio",
            "--no-auto-clean",
            "--split-by-ratio",
        ]);
        let config = args.conversion_config().unwrap();
        assert!(!config.sort_by_name);
        assert!(!config.preserve_aspect_ratio);
        assert!(!config.auto_clean_temp);
        assert!(config.split_by_ratio);
    }

    #[test]
    fn test_last_flag_wins() {
        let args = Args::parse_from(["folder2pdf", "--no-sort", "--sort-by-name"]);
        assert!(args.sort_by_name());
    }

    #[test]
    fn test_conversion_config_requires_paths() {
        let args = Args {
            output: Some(PathBuf::from("out.pdf")),
            ..Default::default()
        };
        assert!(args.conversion_config().is_err());

        let args = Args {
            input: Some(PathBuf::from("photos")),
            ..Default::default()
        };
        assert!(args.conversion_config().is_err());
    }

    #[test]
    fn test_maintenance_modes() {
        let args = Args::parse_from(["folder2pdf", "--temp-status"]);
        assert!(args.is_maintenance());
        assert!(Args::try_parse_from(["folder2pdf", "--clean-temp", "--clean-all-temp"]).is_err());
    }
}

// Default implementation for tests
#[cfg(test)]
impl Default for Args {
    fn default() -> Self {
        Self {
            input: None,
            output: None,
            sort_by_name: false,
            no_sort: false,
            preserve_ratio: false,
            no_preserve_ratio: false,
            split_by_ratio: false,
            force_gpu: false,
            auto_clean: false,
            no_auto_clean: false,
            extensions_str: "jpg,jpeg,png,webp".to_string(),
            temp_status: false,
            clean_temp: false,
            clean_all_temp: false,
            gpu_info: false,
            config_file: None,
            log_file: None,
            json_progress: false,
            verbose: false,
        }
    }
}
