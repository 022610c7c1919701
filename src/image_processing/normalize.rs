//! Bring images into a form the PDF assembler can embed directly
//!
//! Images in a container PDF cannot carry (WebP and friends) or with an
//! alpha channel are flattened to RGB and re-encoded as JPEG. Everything
//! else passes through untouched.

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ImageDecoder, ImageReader, RgbImage};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use super::batch::BatchProgress;
use super::ImageRef;
use crate::error::Result;
use crate::pdf::EmbedSource;
use crate::temp_session::TempSession;

/// Extensions whose containers are always re-encoded
pub const NON_EMBEDDABLE_EXTENSIONS: [&str; 6] = ["webp", "gif", "bmp", "tif", "tiff", "ico"];

pub const JPEG_QUALITY: u8 = 90;

/// Where converted images are kept until assembly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NormalizeMode {
    /// Write converted images into the temp session directory
    TempFiles,
    /// Keep converted images as in-memory JPEG buffers
    InMemory,
}

/// Drop any alpha channel and convert to 8-bit RGB
pub fn flatten(image: &DynamicImage) -> RgbImage {
    image.to_rgb8()
}

pub fn encode_jpeg(rgb: &RgbImage) -> Result<Vec<u8>> {
    let mut bytes = Vec::new();
    JpegEncoder::new_with_quality(&mut bytes, JPEG_QUALITY).encode_image(rgb)?;
    Ok(bytes)
}

/// File name for a converted image: `temp_<index>_<basename>.jpg`
pub fn temp_file_name(index: usize, source: &Path) -> String {
    let basename = source
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("image");
    format!("temp_{}_{}.jpg", index, basename)
}

/// Whether the image must be re-encoded before embedding.
///
/// Reads only the header, so the image is not decoded.
pub fn needs_flattening(image: &ImageRef) -> Result<bool> {
    if image.has_extension_in(&NON_EMBEDDABLE_EXTENSIONS) {
        return Ok(true);
    }

    let decoder = ImageReader::open(image.path())?
        .with_guessed_format()?
        .into_decoder()?;
    Ok(decoder.color_type().has_alpha())
}

fn load_flat(image: &ImageRef) -> Result<RgbImage> {
    let decoded = image::open(image.path())?;
    Ok(flatten(&decoded))
}

/// Normalize one image into the session directory.
///
/// Returns the original path when no conversion is needed; no temp
/// artifact is created in that case.
pub fn normalize_to_file(image: &ImageRef, index: usize, session: &mut TempSession) -> Result<PathBuf> {
    if !needs_flattening(image)? {
        return Ok(image.path().to_path_buf());
    }

    let rgb = load_flat(image)?;
    let dir = match session.session_dir() {
        Some(dir) => dir.to_path_buf(),
        None => session.begin_session()?,
    };

    let target = dir.join(temp_file_name(index, image.path()));
    fs::write(&target, encode_jpeg(&rgb)?)?;
    session.register(&target);
    Ok(target)
}

/// Normalize one image without touching the disk.
pub fn normalize_in_memory(image: &ImageRef) -> Result<EmbedSource> {
    if !needs_flattening(image)? {
        return Ok(EmbedSource::Path(image.path().to_path_buf()));
    }

    let rgb = load_flat(image)?;
    Ok(EmbedSource::Buffer {
        name: image.file_name(),
        bytes: encode_jpeg(&rgb)?,
    })
}

/// Outcome of normalizing one bucket
#[derive(Debug, Default)]
pub struct NormalizedBatch {
    /// Embeddable images in input order, without duplicate paths
    pub sources: Vec<EmbedSource>,
    /// Number of images that had to be re-encoded
    pub converted: usize,
    /// Images dropped because they could not be opened or converted
    pub failed: Vec<(PathBuf, String)>,
}

/// Normalize a list of images, skipping any that fail.
pub fn normalize_batch(
    images: &[ImageRef],
    mode: NormalizeMode,
    session: &mut TempSession,
    progress: &BatchProgress,
) -> NormalizedBatch {
    let reporter = progress.reporter();
    let mut batch = NormalizedBatch::default();

    for (index, image) in images.iter().enumerate() {
        let name = image.file_name();
        progress.advance(index, &name);

        let result = match mode {
            NormalizeMode::TempFiles => normalize_to_file(image, index, session).map(EmbedSource::Path),
            NormalizeMode::InMemory => normalize_in_memory(image),
        };

        match result {
            Ok(source) => {
                let converted = source.as_path() != Some(image.path());
                if converted {
                    batch.converted += 1;
                    reporter.info(format!("Converted: {}", name));
                } else {
                    reporter.info(format!("Processed: {}", name));
                }
                batch.sources.push(source);
            }
            Err(e) => {
                reporter.warn(format!("Error processing {}: {}", name, e));
                batch.failed.push((image.path().to_path_buf(), e.to_string()));
            }
        }
    }

    progress.finish();
    batch.sources = retain_embeddable(batch.sources);
    batch
}

/// Keep the first occurrence of each path and drop paths that vanished.
/// In-memory buffers are always kept.
fn retain_embeddable(sources: Vec<EmbedSource>) -> Vec<EmbedSource> {
    let mut seen = HashSet::new();
    sources
        .into_iter()
        .filter(|source| match source.as_path() {
            Some(path) => path.exists() && seen.insert(path.to_path_buf()),
            None => true,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::progress::Reporter;
    use image::{Rgb, Rgba, RgbaImage};
    use tempfile::TempDir;

    struct Fixture {
        tmp: TempDir,
        session: TempSession,
    }

    impl Fixture {
        fn new() -> Self {
            let tmp = TempDir::new().unwrap();
            let system = tmp.path().join("system");
            fs::create_dir_all(&system).unwrap();
            let session = TempSession::with_roots(system.join("app"), &system).unwrap();
            Self { tmp, session }
        }

        fn write_rgb(&self, name: &str) -> ImageRef {
            let path = self.tmp.path().join(name);
            RgbImage::from_pixel(30, 20, Rgb([1, 2, 3])).save(&path).unwrap();
            ImageRef::new(path)
        }

        fn write_rgba(&self, name: &str) -> ImageRef {
            let path = self.tmp.path().join(name);
            RgbaImage::from_pixel(30, 20, Rgba([1, 2, 3, 100])).save(&path).unwrap();
            ImageRef::new(path)
        }
    }

    #[test]
    fn test_temp_file_name() {
        assert_eq!(
            temp_file_name(3, Path::new("/photos/cat.webp")),
            "temp_3_cat.webp.jpg"
        );
    }

    #[test]
    fn test_plain_image_passes_through_unchanged() {
        let mut fx = Fixture::new();
        let image = fx.write_rgb("photo.png");

        let first = normalize_to_file(&image, 0, &mut fx.session).unwrap();
        let second = normalize_to_file(&image, 0, &mut fx.session).unwrap();

        assert_eq!(first, image.path());
        assert_eq!(first, second);
        assert!(fx.session.tracked_files().is_empty());
        assert!(fx.session.session_dir().is_none());
    }

    #[test]
    fn test_alpha_image_is_flattened_into_session() {
        let mut fx = Fixture::new();
        let image = fx.write_rgba("overlay.png");
        assert!(needs_flattening(&image).unwrap());

        let out = normalize_to_file(&image, 4, &mut fx.session).unwrap();

        assert!(out.starts_with(fx.session.session_dir().unwrap()));
        assert_eq!(out.file_name().unwrap(), "temp_4_overlay.png.jpg");
        assert_eq!(fx.session.tracked_files(), &[out.clone()]);

        let reloaded = image::open(&out).unwrap();
        assert!(!reloaded.color().has_alpha());
        assert_eq!((reloaded.width(), reloaded.height()), (30, 20));
    }

    #[test]
    fn test_webp_is_always_converted() {
        let fx = Fixture::new();
        let image = fx.write_rgb("frame.webp");
        assert!(needs_flattening(&image).unwrap());

        let source = normalize_in_memory(&image).unwrap();
        match source {
            EmbedSource::Buffer { name, bytes } => {
                assert_eq!(name, "frame.webp");
                assert_eq!(image::guess_format(&bytes).unwrap(), image::ImageFormat::Jpeg);
            }
            other => panic!("expected an in-memory buffer, got {:?}", other),
        }
        assert!(fx.session.tracked_files().is_empty());
    }

    #[test]
    fn test_batch_skips_broken_and_deduplicates() {
        let mut fx = Fixture::new();
        let good = fx.write_rgb("good.jpg");
        let alpha = fx.write_rgba("alpha.png");
        let broken_path = fx.tmp.path().join("broken.png");
        fs::write(&broken_path, b"garbage").unwrap();
        let broken = ImageRef::new(broken_path);

        let images = vec![good.clone(), broken, alpha, good.clone()];
        let reporter = Reporter::silent();
        let progress = BatchProgress::new(&reporter, 0.0, 1.0, images.len());

        let batch = normalize_batch(&images, NormalizeMode::TempFiles, &mut fx.session, &progress);

        assert_eq!(batch.failed.len(), 1);
        assert_eq!(batch.converted, 1);
        assert_eq!(batch.sources.len(), 2);
        assert_eq!(batch.sources[0], EmbedSource::Path(good.path().to_path_buf()));
        assert!(batch.sources[1].as_path().unwrap().starts_with(fx.session.app_root()));
    }
}
