//! Per-page resize transform.
//!
//! Each source page becomes a Form XObject (its full content and resources,
//! bounding box = source MediaBox) drawn onto a new page of the target size
//! through a single scale matrix:
//!
//! ```text
//! q
//! sx 0 0 sy 0 0 cm
//! /Pg Do
//! Q
//! ```
//!
//! `sx` and `sy` come from the page's own CropBox, so pages of different sizes
//! in one document each get their own factors. The `q`/`Q` pair keeps the
//! matrix from reaching any other page.

use lopdf::{Dictionary, Object, Stream};
use tracing::warn;

use super::document::{SourceDocument, SourcePage};
use super::geometry::{PageBox, PageSize};
use super::page_index::PageNumber;
use super::writer::DestinationDocument;

/// Resource name of the embedded source page
const PAGE_XOBJECT_NAME: &str = "Pg";

/// The transform applied to one page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageTransform {
    pub page: PageNumber,
    pub x_scale: f32,
    pub y_scale: f32,
    /// Page box of the emitted page
    pub media_box: PageBox,
}

impl PageTransform {
    /// Scale factors that stretch the page's crop box onto `target`.
    ///
    /// Aspect ratio is not preserved. A zero-area crop box yields infinite
    /// factors; well-formed documents never have one.
    pub fn compute(page: &SourcePage, target: PageSize) -> Self {
        Self {
            page: page.number,
            x_scale: target.width / page.crop_box.width,
            y_scale: target.height / page.crop_box.height,
            media_box: page.media_box.with_size(target),
        }
    }

    /// Content stream of the emitted page.
    pub fn content_stream(&self) -> Vec<u8> {
        format!(
            "q\n{} 0 0 {} 0 0 cm\n/{PAGE_XOBJECT_NAME} Do\nQ\n",
            self.x_scale, self.y_scale
        )
        .into_bytes()
    }
}

/// Emit one source page into `destination` at `target` size.
///
/// Appends exactly one page. Missing or unreadable parts of the source page
/// degrade to empty content rather than failing.
pub fn render_page(
    destination: &mut DestinationDocument,
    source: &SourceDocument,
    page: &SourcePage,
    target: PageSize,
) -> PageTransform {
    let transform = PageTransform::compute(page, target);

    let empty = Dictionary::new();
    let page_dict = source.inner().get_dictionary(page.id).unwrap_or_else(|e| {
        warn!("Page {} has no readable dictionary: {}", page.number, e);
        &empty
    });

    let form_id = embed_page(destination, source, page, page_dict);

    let resources = Dictionary::from_iter([(
        "XObject",
        Object::Dictionary(Dictionary::from_iter([(
            PAGE_XOBJECT_NAME,
            Object::Reference(form_id),
        )])),
    )]);
    destination.append_page(transform.media_box, transform.content_stream(), resources);

    transform
}

/// Copy a page's content and resources into a Form XObject.
fn embed_page(
    destination: &mut DestinationDocument,
    source: &SourceDocument,
    page: &SourcePage,
    page_dict: &Dictionary,
) -> lopdf::ObjectId {
    let content = PageContent::collect(source, page, page_dict);

    let mut form = Dictionary::from_iter([
        ("Type", Object::Name(b"XObject".to_vec())),
        ("Subtype", Object::Name(b"Form".to_vec())),
        ("FormType", Object::Integer(1)),
        ("BBox", Object::Array(page.media_box.to_pdf_array())),
    ]);

    // Indirect resources stay references so the import cache shares them.
    if let Some(resources) = source.inherited_entry(page_dict, b"Resources") {
        let resources = destination.import(source.inner(), resources);
        form.set("Resources", resources);
    }

    let raw = content.filter.is_some();
    if let Some(filter) = &content.filter {
        let filter = destination.import(source.inner(), filter);
        form.set("Filter", filter);
    }
    if let Some(parms) = &content.decode_parms {
        let parms = destination.import(source.inner(), parms);
        form.set("DecodeParms", parms);
    }

    let mut stream = Stream::new(form, content.data);
    if raw {
        // Already encoded; recompressing would stack a second filter.
        stream.allows_compression = false;
    }
    destination.add_object(stream)
}

/// Decoded page content, or a single still-encoded stream with its filter.
struct PageContent {
    data: Vec<u8>,
    filter: Option<Object>,
    decode_parms: Option<Object>,
}

impl PageContent {
    fn collect(source: &SourceDocument, page: &SourcePage, page_dict: &Dictionary) -> Self {
        let streams = content_streams(source, page_dict);

        if let [stream] = streams.as_slice()
            && let Ok(filter) = stream.dict.get(b"Filter")
            && stream.decompressed_content().is_err()
        {
            warn!(
                "Page {} content uses an undecodable filter; copying it encoded",
                page.number
            );
            return Self {
                data: stream.content.clone(),
                filter: Some(filter.clone()),
                decode_parms: stream.dict.get(b"DecodeParms").ok().cloned(),
            };
        }

        let mut data = Vec::new();
        for stream in streams {
            let decoded = if stream.dict.has(b"Filter") {
                stream.decompressed_content().unwrap_or_else(|e| {
                    warn!("Page {} content stream could not be decoded: {}", page.number, e);
                    Vec::new()
                })
            } else {
                stream.content.clone()
            };
            data.extend_from_slice(&decoded);
            data.push(b'\n');
        }

        Self {
            data,
            filter: None,
            decode_parms: None,
        }
    }
}

/// `/Contents` may be one stream or an array of streams, possibly behind references.
fn content_streams<'a>(source: &'a SourceDocument, page_dict: &'a Dictionary) -> Vec<&'a Stream> {
    let Some(contents) = page_dict.get(b"Contents").ok().and_then(|c| source.resolve(c)) else {
        return Vec::new();
    };

    match contents {
        Object::Stream(stream) => vec![stream],
        Object::Array(items) => items
            .iter()
            .filter_map(|item| source.resolve(item))
            .filter_map(|obj| obj.as_stream().ok())
            .collect(),
        _ => Vec::new(),
    }
}
