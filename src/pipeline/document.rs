//! PDF assembly: one full-bleed image page per converted entry.
//!
//! The document is built from scratch with `lopdf`, so there is no default
//! blank page to remove. Each page's MediaBox equals the image size in
//! pixels (1 px = 1 pt) and the JPEG bytes are embedded unchanged through the
//! `DCTDecode` filter. The page tree is written once, in [`PdfBuilder::finish`].

use crate::error::KindlePdfError;
use crate::output::PageOrientation;
use crate::pipeline::encode::EncodedImage;
use chrono::{DateTime, Utc};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, ObjectId, Stream, StringFormat};
use tracing::debug;

/// Producer string written to the document Info dictionary.
pub const PRODUCER: &str = concat!("kindle-pdf ", env!("CARGO_PKG_VERSION"));

const PDF_VERSION: &str = "1.5";
const IMAGE_RESOURCE: &str = "Im0";

/// Incremental builder for the output document.
pub struct PdfBuilder {
    doc: Document,
    pages_id: ObjectId,
    page_ids: Vec<ObjectId>,
    title: String,
    created_at: DateTime<Utc>,
}

impl PdfBuilder {
    pub fn new(title: impl Into<String>) -> Self {
        let mut doc = Document::with_version(PDF_VERSION);
        let pages_id = doc.new_object_id();
        Self {
            doc,
            pages_id,
            page_ids: Vec::new(),
            title: title.into(),
            created_at: Utc::now(),
        }
    }

    /// Override the creation timestamp written to the Info dictionary.
    pub fn with_created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn page_count(&self) -> usize {
        self.page_ids.len()
    }

    /// Append a page sized exactly to `image` and return its orientation.
    pub fn add_page(&mut self, image: EncodedImage) -> Result<PageOrientation, KindlePdfError> {
        let (w, h) = (i64::from(image.width), i64::from(image.height));
        let orientation = PageOrientation::for_dimensions(image.width, image.height);

        let image_stream = Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => w,
                "Height" => h,
                "ColorSpace" => image.color.pdf_color_space(),
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            image.data,
        );
        let image_id = self.doc.add_object(image_stream);

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![w.into(), 0.into(), 0.into(), h.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_RESOURCE.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let encoded = content
            .encode()
            .map_err(|e| KindlePdfError::DocumentFailed(format!("content stream: {e}")))?;
        let content_id = self.doc.add_object(Stream::new(dictionary! {}, encoded));

        let page_id = self.doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => self.pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w.into(), h.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_RESOURCE => image_id },
            },
        });
        self.page_ids.push(page_id);

        debug!(
            "Added page {} ({}x{} pt, {})",
            self.page_ids.len(),
            w,
            h,
            orientation
        );
        Ok(orientation)
    }

    /// Write the page tree, catalog and Info dictionary and serialise.
    ///
    /// A document without pages is rejected.
    pub fn finish(mut self) -> Result<Vec<u8>, KindlePdfError> {
        if self.page_ids.is_empty() {
            return Err(KindlePdfError::DocumentFailed(
                "document has no pages".to_string(),
            ));
        }

        let kids: Vec<Object> = self.page_ids.iter().map(|&id| id.into()).collect();
        let pages = dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => self.page_ids.len() as i64,
        };
        self.doc
            .objects
            .insert(self.pages_id, Object::Dictionary(pages));

        let catalog_id = self.doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => self.pages_id,
        });
        self.doc.trailer.set("Root", catalog_id);

        let info_id = self.doc.add_object(dictionary! {
            "Title" => text_string(&self.title),
            "Producer" => Object::string_literal(PRODUCER),
            "CreationDate" => Object::string_literal(pdf_date(&self.created_at)),
        });
        self.doc.trailer.set("Info", info_id);

        let mut out = Vec::new();
        self.doc
            .save_to(&mut out)
            .map_err(|e| KindlePdfError::DocumentFailed(format!("serialise: {e}")))?;
        Ok(out)
    }
}

/// PDF date string, e.g. `D:20240307090500Z`.
fn pdf_date(at: &DateTime<Utc>) -> String {
    at.format("D:%Y%m%d%H%M%SZ").to_string()
}

/// PDF text string: a literal for ASCII, UTF-16BE with a byte-order mark
/// otherwise.
fn text_string(text: &str) -> Object {
    if text.is_ascii() {
        return Object::string_literal(text);
    }
    let mut bytes = vec![0xFE, 0xFF];
    for unit in text.encode_utf16() {
        bytes.extend_from_slice(&unit.to_be_bytes());
    }
    Object::String(bytes, StringFormat::Hexadecimal)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::encode::{JpegColor, JpegWriter};
    use chrono::TimeZone;
    use image::{Rgba, RgbaImage};

    fn jpeg(w: u32, h: u32, color: JpegColor) -> EncodedImage {
        JpegWriter::new(70, color)
            .encode("t", &RgbaImage::from_pixel(w, h, Rgba([50, 60, 70, 255])))
            .unwrap()
    }

    #[test]
    fn empty_document_is_rejected() {
        let err = PdfBuilder::new("x").finish().unwrap_err();
        assert!(matches!(err, KindlePdfError::DocumentFailed(_)));
    }

    #[test]
    fn pages_match_image_sizes_in_order() {
        let mut b = PdfBuilder::new("book");
        assert_eq!(
            b.add_page(jpeg(30, 40, JpegColor::Rgb)).unwrap(),
            PageOrientation::Portrait
        );
        assert_eq!(
            b.add_page(jpeg(50, 20, JpegColor::Gray)).unwrap(),
            PageOrientation::Landscape
        );
        assert_eq!(b.page_count(), 2);
        let bytes = b.finish().unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);

        let boxes: Vec<Vec<i64>> = pages
            .values()
            .map(|&id| {
                doc.get_dictionary(id)
                    .unwrap()
                    .get(b"MediaBox")
                    .unwrap()
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|o| o.as_i64().unwrap())
                    .collect()
            })
            .collect();
        assert_eq!(boxes, vec![vec![0, 0, 30, 40], vec![0, 0, 50, 20]]);
    }

    #[test]
    fn image_is_embedded_as_dct_with_matching_colour_space() {
        let data = jpeg(10, 10, JpegColor::Gray);
        let original = data.data.clone();
        let mut b = PdfBuilder::new("g");
        b.add_page(data).unwrap();
        let doc = Document::load_mem(&b.finish().unwrap()).unwrap();

        let image = doc
            .objects
            .values()
            .filter_map(|o| o.as_stream().ok())
            .find(|s| s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Image".as_slice()))
            .unwrap();
        assert_eq!(image.dict.get(b"Filter").unwrap().as_name().unwrap(), b"DCTDecode");
        assert_eq!(image.dict.get(b"ColorSpace").unwrap().as_name().unwrap(), b"DeviceGray");
        assert_eq!(image.content, original);
    }

    #[test]
    fn info_dictionary_carries_title_and_date() {
        let at = Utc.with_ymd_and_hms(2024, 3, 7, 9, 5, 0).unwrap();
        let mut b = PdfBuilder::new("kindle_optimized").with_created_at(at);
        b.add_page(jpeg(4, 4, JpegColor::Rgb)).unwrap();
        let doc = Document::load_mem(&b.finish().unwrap()).unwrap();
        let info_id = doc.trailer.get(b"Info").unwrap().as_reference().unwrap();
        let info = doc.get_dictionary(info_id).unwrap();
        assert_eq!(info.get(b"Title").unwrap().as_str().unwrap(), b"kindle_optimized");
        assert_eq!(
            info.get(b"CreationDate").unwrap().as_str().unwrap(),
            b"D:20240307090500Z"
        );
    }

    #[test]
    fn non_ascii_titles_are_utf16() {
        match text_string("漫画") {
            Object::String(bytes, StringFormat::Hexadecimal) => {
                assert_eq!(&bytes[..2], &[0xFE, 0xFF]);
                assert_eq!(bytes.len(), 2 + 4);
            }
            other => panic!("unexpected object: {other:?}"),
        }
    }
}
