//! Low-level PDF document construction
//!
//! Each image becomes one page whose MediaBox matches the image size, with
//! the image XObject drawn over the whole page.

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use std::fs;
use std::path::Path;

use crate::error::Result;

/// Resolution assumed when converting pixels to points
pub const DEFAULT_DPI: f32 = 96.0;

pub fn px_to_pt(px: u32) -> f32 {
    px as f32 * 72.0 / DEFAULT_DPI
}

/// Color space of an embedded image
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PdfColorSpace {
    Gray,
    Rgb,
    /// Adobe CMYK: JPEG samples are stored inverted and drawn through an
    /// inverting `Decode` array
    Cmyk,
}

impl PdfColorSpace {
    fn name(&self) -> &'static [u8] {
        match self {
            PdfColorSpace::Gray => b"DeviceGray",
            PdfColorSpace::Rgb => b"DeviceRGB",
            PdfColorSpace::Cmyk => b"DeviceCMYK",
        }
    }

    pub fn components(&self) -> usize {
        match self {
            PdfColorSpace::Gray => 1,
            PdfColorSpace::Rgb => 3,
            PdfColorSpace::Cmyk => 4,
        }
    }
}

pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    pages: Vec<ObjectId>,
}

impl Default for PdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PdfBuilder {
    pub fn new() -> Self {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            pages: Vec::new(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Add a page wrapping already-encoded JPEG bytes (DCTDecode).
    ///
    /// `Cmyk` data must come from an Adobe encoder (APP14 marker present).
    pub fn add_jpeg_page(
        &mut self,
        jpeg_bytes: Vec<u8>,
        width: u32,
        height: u32,
        color_space: PdfColorSpace,
    ) {
        let mut xobject = image_dictionary(width, height, color_space, 8);
        xobject.set("Filter", Object::Name(b"DCTDecode".to_vec()));
        if color_space == PdfColorSpace::Cmyk {
            let decode = (0..4)
                .flat_map(|_| [Object::Integer(1), Object::Integer(0)])
                .collect::<Vec<_>>();
            xobject.set("Decode", Object::Array(decode));
        }

        let mut stream = Stream::new(xobject, jpeg_bytes);
        // The bytes are already compressed
        stream.allows_compression = false;
        self.add_image_page(stream, width, height);
    }

    /// Add a page from raw, unpremultiplied samples, stored losslessly
    /// with FlateDecode. 16-bit samples must be big-endian.
    pub fn add_raw_page(
        &mut self,
        samples: Vec<u8>,
        width: u32,
        height: u32,
        color_space: PdfColorSpace,
        bits_per_component: u8,
    ) -> Result<()> {
        let xobject = image_dictionary(width, height, color_space, bits_per_component);
        let mut stream = Stream::new(xobject, samples);
        stream.compress()?;
        self.add_image_page(stream, width, height);
        Ok(())
    }

    fn add_image_page(&mut self, image: Stream, width: u32, height: u32) {
        let image_id = self.doc.add_object(image);
        let resource_name = format!("Im{}", self.pages.len() + 1);

        let page_width = px_to_pt(width);
        let page_height = px_to_pt(height);

        let contents = format!(
            "q\n{} 0 0 {} 0 0 cm\n/{} Do\nQ\n",
            page_width, page_height, resource_name
        );
        let contents_id = self
            .doc
            .add_object(Stream::new(Dictionary::new(), contents.into_bytes()));

        let mut xobjects = Dictionary::new();
        xobjects.set(resource_name, Object::Reference(image_id));
        let mut resources = Dictionary::new();
        resources.set("XObject", Object::Dictionary(xobjects));

        let mut page = Dictionary::new();
        page.set("Type", Object::Name(b"Page".to_vec()));
        page.set("Parent", Object::Reference(self.pages_id));
        page.set(
            "MediaBox",
            Object::Array(vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_width),
                Object::Real(page_height),
            ]),
        );
        page.set("Resources", Object::Dictionary(resources));
        page.set("Contents", Object::Reference(contents_id));

        let page_id = self.doc.add_object(page);
        self.pages.push(page_id);
    }

    /// Build the page tree and catalog, then serialize the document.
    pub fn into_bytes(mut self) -> Result<Vec<u8>> {
        let kids = self.pages.iter().map(|id| Object::Reference(*id)).collect();
        let pages_dict = Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(self.pages.len() as i64)),
        ]);
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages_dict));

        let catalog_id = self.doc.add_object(Dictionary::from_iter(vec![
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        self.doc.trailer.set("Root", catalog_id);

        let mut buffer = Vec::new();
        self.doc.save_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Serialize and write to `path`, returning the number of bytes written.
    pub fn save(self, path: &Path) -> Result<u64> {
        let bytes = self.into_bytes()?;
        fs::write(path, &bytes)?;
        Ok(bytes.len() as u64)
    }
}

fn image_dictionary(
    width: u32,
    height: u32,
    color_space: PdfColorSpace,
    bits_per_component: u8,
) -> Dictionary {
    let mut xobject = Dictionary::new();
    xobject.set("Type", Object::Name(b"XObject".to_vec()));
    xobject.set("Subtype", Object::Name(b"Image".to_vec()));
    xobject.set("Width", Object::Integer(width as i64));
    xobject.set("Height", Object::Integer(height as i64));
    xobject.set("ColorSpace", Object::Name(color_space.name().to_vec()));
    xobject.set("BitsPerComponent", Object::Integer(bits_per_component as i64));
    xobject
}

/// Number of pages in a PDF file on disk
pub fn page_count(path: &Path) -> Result<usize> {
    let doc = Document::load(path)?;
    Ok(doc.get_pages().len())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_px_to_pt() {
        assert_eq!(px_to_pt(96), 72.0);
        assert_eq!(px_to_pt(0), 0.0);
    }

    #[test]
    fn test_empty_builder_serializes() {
        let builder = PdfBuilder::new();
        assert_eq!(builder.page_count(), 0);
        let bytes = builder.into_bytes().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));
    }

    #[test]
    fn test_raw_pages_round_trip_page_count() {
        let mut builder = PdfBuilder::new();
        builder
            .add_raw_page(vec![255u8; 4 * 3 * 3], 4, 3, PdfColorSpace::Rgb, 8)
            .unwrap();
        builder
            .add_raw_page(vec![0u8; 2 * 2], 2, 2, PdfColorSpace::Gray, 8)
            .unwrap();
        assert_eq!(builder.page_count(), 2);

        let bytes = builder.into_bytes().unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 2);
    }

    fn image_xobject(doc: &Document) -> &Dictionary {
        doc.objects
            .values()
            .filter_map(|object| object.as_stream().ok())
            .map(|stream| &stream.dict)
            .find(|dict| {
                matches!(
                    dict.get(b"Subtype").and_then(Object::as_name),
                    Ok(b"Image")
                )
            })
            .unwrap()
    }

    #[test]
    fn test_cmyk_jpeg_page_is_drawn_inverted() {
        let mut builder = PdfBuilder::new();
        // Header bytes only; the stream is passed through untouched
        builder.add_jpeg_page(vec![0xFF, 0xD8, 0xFF, 0xEE], 8, 4, PdfColorSpace::Cmyk);
        let doc = Document::load_mem(&builder.into_bytes().unwrap()).unwrap();

        let xobject = image_xobject(&doc);
        assert_eq!(
            xobject.get(b"ColorSpace").unwrap().as_name().unwrap(),
            b"DeviceCMYK"
        );
        let decode: Vec<i64> = xobject
            .get(b"Decode")
            .unwrap()
            .as_array()
            .unwrap()
            .iter()
            .map(|value| value.as_i64().unwrap())
            .collect();
        assert_eq!(decode, vec![1, 0, 1, 0, 1, 0, 1, 0]);
    }

    #[test]
    fn test_rgb_and_gray_jpeg_pages_have_no_decode_array() {
        for color_space in [PdfColorSpace::Rgb, PdfColorSpace::Gray] {
            let mut builder = PdfBuilder::new();
            builder.add_jpeg_page(vec![0xFF, 0xD8], 2, 2, color_space);
            let doc = Document::load_mem(&builder.into_bytes().unwrap()).unwrap();

            let xobject = image_xobject(&doc);
            assert_eq!(
                xobject.get(b"ColorSpace").unwrap().as_name().unwrap(),
                color_space.name()
            );
            assert!(xobject.get(b"Decode").is_err());
        }
    }

    #[test]
    fn test_page_media_box_matches_image_size() {
        let mut builder = PdfBuilder::new();
        builder
            .add_raw_page(vec![0u8; 192 * 96 * 3], 192, 96, PdfColorSpace::Rgb, 8)
            .unwrap();
        let doc = Document::load_mem(&builder.into_bytes().unwrap()).unwrap();

        let (_, page_id) = doc.get_pages().into_iter().next().unwrap();
        let page = doc.get_dictionary(page_id).unwrap();
        let media_box = page.get(b"MediaBox").unwrap().as_array().unwrap();
        assert_eq!(media_box[2].as_float().unwrap(), 144.0);
        assert_eq!(media_box[3].as_float().unwrap(), 72.0);
    }
}
