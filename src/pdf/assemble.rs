//! Image list to PDF, with a re-encoding fallback
//!
//! The direct strategy wraps the encoded bytes (JPEG) or the decoded
//! samples (everything else) into page XObjects without touching pixel
//! data. If it fails, every image is decoded again, flattened to RGB,
//! re-encoded as JPEG and appended page by page.

use image::{DynamicImage, ImageFormat};
use std::path::Path;
use strum_macros::Display;
use zune_jpeg::zune_core::bytestream::ZCursor;
use zune_jpeg::zune_core::colorspace::ColorSpace;
use zune_jpeg::zune_core::options::DecoderOptions;
use zune_jpeg::JpegDecoder;

use super::builder::{page_count, PdfBuilder, PdfColorSpace};
use super::EmbedSource;
use crate::error::{ConvertError, Result};
use crate::image_processing::normalize::{encode_jpeg, flatten};
use crate::progress::Reporter;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum AssemblyStrategy {
    #[strum(serialize = "direct embed")]
    DirectEmbed,
    #[strum(serialize = "re-encode and append")]
    ReencodeAndAppend,
}

impl AssemblyStrategy {
    /// Tried in this order; the first success wins
    pub const ORDER: [AssemblyStrategy; 2] = [
        AssemblyStrategy::DirectEmbed,
        AssemblyStrategy::ReencodeAndAppend,
    ];

    fn build(&self, sources: &[EmbedSource], reporter: &Reporter) -> Result<Built> {
        match self {
            AssemblyStrategy::DirectEmbed => build_direct(sources, reporter),
            AssemblyStrategy::ReencodeAndAppend => build_reencoded(sources, reporter),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AssemblyReport {
    pub strategy: AssemblyStrategy,
    pub inputs: usize,
    pub pages: usize,
    /// Display names of images that could not be read
    pub skipped: Vec<String>,
    pub bytes_written: u64,
    /// Page count read back from the written file, if it could be parsed
    pub verified_pages: Option<usize>,
}

struct Built {
    builder: PdfBuilder,
    skipped: Vec<String>,
}

/// Write `sources` to `dest` as one page per image.
pub fn assemble(sources: &[EmbedSource], dest: &Path, reporter: &Reporter) -> Result<AssemblyReport> {
    assemble_with(sources, dest, reporter, &AssemblyStrategy::ORDER)
}

/// Same as [`assemble`] with an explicit strategy order.
pub fn assemble_with(
    sources: &[EmbedSource],
    dest: &Path,
    reporter: &Reporter,
    strategies: &[AssemblyStrategy],
) -> Result<AssemblyReport> {
    let mut last_error = None;

    for (attempt, strategy) in strategies.iter().enumerate() {
        if attempt > 0 {
            reporter.info(format!("Retrying with {} strategy...", strategy));
        }

        match write_with(*strategy, sources, dest, reporter) {
            Ok(report) => return Ok(report),
            Err(e) => {
                reporter.warn(format!("PDF assembly ({}) failed: {}", strategy, e));
                last_error = Some(e);
            }
        }
    }

    Err(last_error.unwrap_or(ConvertError::NoImagesProcessed))
}

fn write_with(
    strategy: AssemblyStrategy,
    sources: &[EmbedSource],
    dest: &Path,
    reporter: &Reporter,
) -> Result<AssemblyReport> {
    let Built { builder, skipped } = strategy.build(sources, reporter)?;
    let pages = builder.page_count();
    let bytes_written = builder.save(dest)?;

    reporter.info(format!(
        "PDF written: {} ({:.2} kB, {} pages)",
        dest.display(),
        bytes_written as f64 / 1024.0,
        pages
    ));

    let verified_pages = match page_count(dest) {
        Ok(count) => {
            if count != sources.len() {
                reporter.warn(format!(
                    "Page count mismatch in {}: {} pages for {} images",
                    dest.display(),
                    count,
                    sources.len()
                ));
            }
            Some(count)
        }
        Err(e) => {
            reporter.warn(format!("Could not verify page count of {}: {}", dest.display(), e));
            None
        }
    };

    Ok(AssemblyReport {
        strategy,
        inputs: sources.len(),
        pages,
        skipped,
        bytes_written,
        verified_pages,
    })
}

fn build_direct(sources: &[EmbedSource], reporter: &Reporter) -> Result<Built> {
    let mut builder = PdfBuilder::new();
    let mut skipped = Vec::new();

    for source in sources {
        match embed_direct(&mut builder, source) {
            Ok(()) => {}
            // Unusable input for this strategy as a whole
            Err(e @ ConvertError::UnsupportedPixelFormat(_)) => return Err(e),
            Err(e) => {
                reporter.warn(format!("Skipping {}: {}", source.display_name(), e));
                skipped.push(source.display_name());
            }
        }
    }

    if builder.page_count() == 0 {
        return Err(ConvertError::NoImagesProcessed);
    }
    Ok(Built { builder, skipped })
}

fn embed_direct(builder: &mut PdfBuilder, source: &EmbedSource) -> Result<()> {
    let bytes = source.bytes()?;
    let format = image::guess_format(&bytes)?;

    if format == ImageFormat::Jpeg {
        let header = read_jpeg_header(&bytes)?;
        builder.add_jpeg_page(
            bytes.into_owned(),
            header.width,
            header.height,
            header.color_space,
        );
        return Ok(());
    }

    let image = image::load_from_memory_with_format(&bytes, format)?;
    let (width, height) = (image.width(), image.height());
    match image {
        DynamicImage::ImageLuma8(buffer) => {
            builder.add_raw_page(buffer.into_raw(), width, height, PdfColorSpace::Gray, 8)
        }
        DynamicImage::ImageRgb8(buffer) => {
            builder.add_raw_page(buffer.into_raw(), width, height, PdfColorSpace::Rgb, 8)
        }
        DynamicImage::ImageLuma16(buffer) => builder.add_raw_page(
            to_big_endian(buffer.as_raw()),
            width,
            height,
            PdfColorSpace::Gray,
            16,
        ),
        DynamicImage::ImageRgb16(buffer) => builder.add_raw_page(
            to_big_endian(buffer.as_raw()),
            width,
            height,
            PdfColorSpace::Rgb,
            16,
        ),
        other => Err(ConvertError::UnsupportedPixelFormat(format!(
            "{:?} in {}",
            other.color(),
            source.display_name()
        ))),
    }
}

fn to_big_endian(samples: &[u16]) -> Vec<u8> {
    samples.iter().flat_map(|s| s.to_be_bytes()).collect()
}

fn build_reencoded(sources: &[EmbedSource], reporter: &Reporter) -> Result<Built> {
    let mut builder = PdfBuilder::new();
    let mut skipped = Vec::new();

    for source in sources {
        let page = source
            .bytes()
            .and_then(|bytes| image::load_from_memory(&bytes).map_err(ConvertError::from))
            .and_then(|image| {
                let rgb = flatten(&image);
                let jpeg = encode_jpeg(&rgb)?;
                Ok((jpeg, rgb.width(), rgb.height()))
            });

        match page {
            Ok((jpeg, width, height)) => {
                builder.add_jpeg_page(jpeg, width, height, PdfColorSpace::Rgb)
            }
            Err(e) => {
                reporter.warn(format!("Skipping unreadable image {}: {}", source.display_name(), e));
                skipped.push(source.display_name());
            }
        }
    }

    if builder.page_count() == 0 {
        return Err(ConvertError::NoImagesProcessed);
    }
    Ok(Built { builder, skipped })
}

struct JpegHeader {
    width: u32,
    height: u32,
    color_space: PdfColorSpace,
}

/// Read the frame header of a JPEG that is about to be wrapped unchanged.
///
/// Anything the decoder cannot parse, or a colour model the PDF page cannot
/// carry as-is, rules out the direct strategy for the whole batch.
fn read_jpeg_header(bytes: &[u8]) -> Result<JpegHeader> {
    let options = DecoderOptions::default()
        .set_strict_mode(false)
        .set_max_width(usize::MAX)
        .set_max_height(usize::MAX);
    let mut decoder = JpegDecoder::new_with_options(ZCursor::new(bytes), options);
    decoder.decode_headers().map_err(|e| {
        ConvertError::UnsupportedPixelFormat(format!("unreadable JPEG header: {}", e))
    })?;

    let (info, input) = match (decoder.info(), decoder.input_colorspace()) {
        (Some(info), Some(input)) => (info, input),
        _ => {
            return Err(ConvertError::UnsupportedPixelFormat(
                "JPEG header without frame information".to_string(),
            ))
        }
    };
    let color_space = pass_through_color_space(input).ok_or_else(|| {
        ConvertError::UnsupportedPixelFormat(format!(
            "{:?} JPEG with {} components",
            input, info.components
        ))
    })?;

    Ok(JpegHeader {
        width: u32::from(info.width),
        height: u32::from(info.height),
        color_space,
    })
}

/// PDF colour space for DCT data embedded without decoding
fn pass_through_color_space(input: ColorSpace) -> Option<PdfColorSpace> {
    match input {
        ColorSpace::Luma => Some(PdfColorSpace::Gray),
        ColorSpace::YCbCr | ColorSpace::RGB => Some(PdfColorSpace::Rgb),
        // Only an Adobe APP14 marker yields YCCK, so the samples are stored inverted.
        // Plain CMYK may or may not be inverted and is re-encoded instead.
        ColorSpace::YCCK => Some(PdfColorSpace::Cmyk),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::codecs::jpeg::JpegEncoder;
    use image::{GrayImage, Luma, Rgb, RgbImage, Rgba, RgbaImage};
    use std::io::Cursor;
    use tempfile::TempDir;

    fn jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = RgbImage::from_pixel(width, height, Rgb([200, 100, 50]));
        encode_jpeg(&img).unwrap()
    }

    fn png_bytes(img: DynamicImage) -> Vec<u8> {
        let mut buffer = Cursor::new(Vec::new());
        img.write_to(&mut buffer, ImageFormat::Png).unwrap();
        buffer.into_inner()
    }

    fn gray_jpeg_bytes(width: u32, height: u32) -> Vec<u8> {
        let img = GrayImage::from_pixel(width, height, Luma([128]));
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, 90)
            .encode_image(&img)
            .unwrap();
        bytes
    }

    fn image_xobjects(doc: &lopdf::Document) -> Vec<&lopdf::Dictionary> {
        doc.objects
            .values()
            .filter_map(|object| object.as_stream().ok())
            .map(|stream| &stream.dict)
            .filter(|dict| {
                dict.get(b"Subtype")
                    .and_then(|subtype| subtype.as_name())
                    .map(|name| name == b"Image")
                    .unwrap_or(false)
            })
            .collect()
    }

    fn buffer(name: &str, bytes: Vec<u8>) -> EmbedSource {
        EmbedSource::Buffer {
            name: name.to_string(),
            bytes,
        }
    }

    #[test]
    fn test_jpeg_header_reads_dimensions() {
        let header = read_jpeg_header(&jpeg_bytes(64, 32)).unwrap();
        assert_eq!((header.width, header.height), (64, 32));
        assert_eq!(header.color_space, PdfColorSpace::Rgb);

        let header = read_jpeg_header(&gray_jpeg_bytes(10, 20)).unwrap();
        assert_eq!((header.width, header.height), (10, 20));
        assert_eq!(header.color_space, PdfColorSpace::Gray);
    }

    #[test]
    fn test_unparseable_jpeg_header_rules_out_direct_embed() {
        for bytes in [&b"not a jpeg"[..], &[0xFF, 0xD8, 0xFF][..], &[][..]] {
            let err = read_jpeg_header(bytes).err().unwrap();
            assert!(matches!(err, ConvertError::UnsupportedPixelFormat(_)));
        }
    }

    #[test]
    fn test_pass_through_color_spaces() {
        assert_eq!(
            pass_through_color_space(ColorSpace::Luma),
            Some(PdfColorSpace::Gray)
        );
        assert_eq!(
            pass_through_color_space(ColorSpace::YCbCr),
            Some(PdfColorSpace::Rgb)
        );
        assert_eq!(
            pass_through_color_space(ColorSpace::YCCK),
            Some(PdfColorSpace::Cmyk)
        );
        assert_eq!(pass_through_color_space(ColorSpace::CMYK), None);
        assert_eq!(pass_through_color_space(ColorSpace::RGBA), None);
    }

    #[test]
    fn test_padded_jpeg_is_not_dropped() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("padded.pdf");

        // Stray bytes between the first segment and the next marker
        let jpeg = jpeg_bytes(40, 20);
        let first_segment_end = 4 + u16::from_be_bytes([jpeg[4], jpeg[5]]) as usize;
        let padded = [
            &jpeg[..first_segment_end],
            &[0u8; 4][..],
            &jpeg[first_segment_end..],
        ]
        .concat();
        assert!(image::load_from_memory(&padded).is_ok());

        let sources = vec![
            buffer("good.jpg", jpeg_bytes(40, 20)),
            buffer("padded.jpg", padded),
        ];
        let report = assemble(&sources, &dest, &Reporter::silent()).unwrap();
        assert_eq!(report.pages, 2);
        assert!(report.skipped.is_empty());
        assert_eq!(report.verified_pages, Some(2));
    }

    #[test]
    fn test_gray_jpeg_is_embedded_as_device_gray() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("gray.pdf");
        let sources = vec![buffer("gray.jpg", gray_jpeg_bytes(24, 16))];

        let report = assemble(&sources, &dest, &Reporter::silent()).unwrap();
        assert_eq!(report.strategy, AssemblyStrategy::DirectEmbed);

        let doc = lopdf::Document::load(&dest).unwrap();
        let xobject = image_xobjects(&doc).into_iter().next().unwrap();
        assert_eq!(
            xobject.get(b"ColorSpace").unwrap().as_name().unwrap(),
            b"DeviceGray"
        );
        assert_eq!(
            xobject.get(b"Filter").unwrap().as_name().unwrap(),
            b"DCTDecode"
        );
        assert!(xobject.get(b"Decode").is_err());
    }

    #[test]
    fn test_direct_embed_mixed_formats() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("out.pdf");
        let sources = vec![
            buffer("a.jpg", jpeg_bytes(40, 20)),
            buffer("b.png", png_bytes(DynamicImage::ImageRgb8(RgbImage::new(10, 30)))),
            buffer("c.png", png_bytes(DynamicImage::ImageLuma8(image::GrayImage::new(5, 5)))),
        ];

        let report = assemble(&sources, &dest, &Reporter::silent()).unwrap();
        assert_eq!(report.strategy, AssemblyStrategy::DirectEmbed);
        assert_eq!(report.pages, 3);
        assert_eq!(report.verified_pages, Some(3));
        assert!(report.skipped.is_empty());
        assert!(dest.exists());
    }

    #[test]
    fn test_alpha_input_falls_back_to_reencoding() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("alpha.pdf");
        let rgba = RgbaImage::from_pixel(8, 8, Rgba([10, 20, 30, 128]));
        let sources = vec![
            buffer("a.jpg", jpeg_bytes(16, 16)),
            buffer("alpha.png", png_bytes(DynamicImage::ImageRgba8(rgba))),
        ];

        let report = assemble(&sources, &dest, &Reporter::silent()).unwrap();
        assert_eq!(report.strategy, AssemblyStrategy::ReencodeAndAppend);
        assert_eq!(report.pages, 2);
        assert_eq!(page_count(&dest).unwrap(), 2);
    }

    #[test]
    fn test_unreadable_image_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("skip.pdf");
        let sources = vec![
            buffer("good.jpg", jpeg_bytes(16, 16)),
            buffer("broken.jpg", b"definitely not an image".to_vec()),
            EmbedSource::Path(tmp.path().join("missing.jpg")),
        ];

        let report = assemble(&sources, &dest, &Reporter::silent()).unwrap();
        assert_eq!(report.pages, 1);
        assert_eq!(report.skipped.len(), 2);
        assert_eq!(report.verified_pages, Some(1));
    }

    #[test]
    fn test_empty_input_fails_both_strategies() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("empty.pdf");

        let err = assemble(&[], &dest, &Reporter::silent()).unwrap_err();
        assert!(matches!(err, ConvertError::NoImagesProcessed));
        assert!(!dest.exists());
    }

    #[test]
    fn test_fallback_only_order() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("fallback.pdf");
        let sources = vec![buffer("a.jpg", jpeg_bytes(12, 12))];

        let report = assemble_with(
            &sources,
            &dest,
            &Reporter::silent(),
            &[AssemblyStrategy::ReencodeAndAppend],
        )
        .unwrap();
        assert_eq!(report.strategy, AssemblyStrategy::ReencodeAndAppend);
        assert_eq!(report.pages, 1);
    }
}
