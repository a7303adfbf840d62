//! Integration tests for pdf-resize-core
//!
//! These tests run whole resize operations against PDFs built on the fly:
//! - Page counts, page sizes and per-page scale factors of the output
//! - Re-entry and cancellation
//! - Source and destination failures
//! - The background task API

use std::path::{Path, PathBuf};
use std::sync::Arc;

use lopdf::content::Content;
use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use pdf_resize_core::{
    Error, OperationState, PageBox, PageSize, ProgressSnapshot, ResizeOperation, ResizeOptions,
    ResizeOutcome, ResizeRequest,
};
use tempfile::TempDir;

// =============================================================================
// Test Fixtures
// =============================================================================

/// Page boxes of one fixture page, as `[llx, lly, urx, ury]`
#[derive(Clone, Copy)]
struct FixturePage {
    media: [i64; 4],
    crop: Option<[i64; 4]>,
}

const fn page(w: i64, h: i64) -> FixturePage {
    FixturePage {
        media: [0, 0, w, h],
        crop: None,
    }
}

fn rect(r: [i64; 4]) -> Object {
    Object::Array(r.iter().map(|&v| Object::Integer(v)).collect())
}

/// Build a PDF whose pages share one font and each draw their page number.
fn build_pdf(pages: &[FixturePage]) -> Vec<u8> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let font_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Font".to_vec())),
        ("Subtype", Object::Name(b"Type1".to_vec())),
        ("BaseFont", Object::Name(b"Helvetica".to_vec())),
    ]));
    let resources_id = doc.add_object(Dictionary::from_iter([(
        "Font",
        Object::Dictionary(Dictionary::from_iter([("F1", Object::Reference(font_id))])),
    )]));

    let mut kids = Vec::new();
    for (i, fixture) in pages.iter().enumerate() {
        let content = format!("BT /F1 12 Tf 10 10 Td (Page {}) Tj ET", i + 1);
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content.into_bytes()));

        let mut page_dict = Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(pages_id)),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Reference(resources_id)),
            ("MediaBox", rect(fixture.media)),
        ]);
        if let Some(crop) = fixture.crop {
            page_dict.set("CropBox", rect(crop));
        }
        kids.push(Object::Reference(doc.add_object(page_dict)));
    }

    let count = i64::try_from(kids.len()).unwrap();
    doc.objects.insert(
        pages_id,
        Object::Dictionary(Dictionary::from_iter([
            ("Type", Object::Name(b"Pages".to_vec())),
            ("Kids", Object::Array(kids)),
            ("Count", Object::Integer(count)),
        ])),
    );

    let catalog_id = doc.add_object(Dictionary::from_iter([
        ("Type", Object::Name(b"Catalog".to_vec())),
        ("Pages", Object::Reference(pages_id)),
    ]));
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut output = Vec::new();
    doc.save_to(&mut output).unwrap();
    output
}

struct Fixture {
    dir: TempDir,
    input: PathBuf,
    output: PathBuf,
}

impl Fixture {
    fn new(pages: &[FixturePage]) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("input.pdf");
        let output = dir.path().join("output.pdf");
        std::fs::write(&input, build_pdf(pages)).unwrap();
        Self { dir, input, output }
    }

    fn request(&self, width: f32, height: f32) -> ResizeRequest {
        ResizeRequest::new(&self.input, &self.output, PageSize::new(width, height))
    }

    fn operation(&self, width: f32, height: f32) -> ResizeOperation {
        ResizeOperation::new(self.request(width, height), ResizeOptions::default()).unwrap()
    }
}

fn number(obj: &Object) -> f32 {
    match obj {
        #[allow(clippy::cast_precision_loss)]
        Object::Integer(i) => *i as f32,
        Object::Real(r) => *r,
        other => panic!("not a number: {other:?}"),
    }
}

/// Output pages in order, as (page id, media box)
fn output_pages(path: &Path) -> (Document, Vec<(ObjectId, PageBox)>) {
    let doc = Document::load(path).unwrap();
    let pages = doc
        .get_pages()
        .values()
        .map(|&id| {
            let dict = doc.get_dictionary(id).unwrap();
            let media_box = dict.get(b"MediaBox").unwrap().as_array().unwrap();
            let media_box = PageBox::from_pdf_array(media_box).unwrap();
            (id, media_box)
        })
        .collect();
    (doc, pages)
}

/// The `cm` scale factors of an output page's content stream
fn page_scale(doc: &Document, page_id: ObjectId) -> (f32, f32) {
    let content = Content::decode(&doc.get_page_content(page_id).unwrap()).unwrap();
    let cm = content
        .operations
        .iter()
        .find(|op| op.operator == "cm")
        .expect("page has a cm operator");
    (number(&cm.operands[0]), number(&cm.operands[3]))
}

// =============================================================================
// Full Runs
// =============================================================================

#[test]
#[allow(clippy::float_cmp)]
fn test_three_page_scenario() {
    let fixture = Fixture::new(&[page(200, 200), page(100, 400), page(400, 100)]);
    let op = fixture.operation(100.0, 100.0);

    let outcome = op.run().unwrap();
    assert!(outcome.is_success(), "unexpected outcome: {outcome:?}");
    assert_eq!(op.progress(), ProgressSnapshot { completed: 3, total: 3 });
    assert_eq!(op.state(), OperationState::Finished);

    let (doc, pages) = output_pages(&fixture.output);
    assert_eq!(pages.len(), 3);
    for (_, media_box) in &pages {
        assert_eq!(media_box.size(), PageSize::new(100.0, 100.0));
    }

    let scales: Vec<(f32, f32)> = pages.iter().map(|(id, _)| page_scale(&doc, *id)).collect();
    assert_eq!(scales, vec![(0.5, 0.5), (1.0, 0.25), (0.25, 1.0)]);
}

#[test]
#[allow(clippy::float_cmp)]
fn test_scale_uses_each_page_crop_box() {
    let fixture = Fixture::new(&[
        FixturePage {
            media: [0, 0, 612, 792],
            crop: Some([100, 100, 300, 500]),
        },
        page(612, 792),
    ]);
    let op = fixture.operation(306.0, 396.0);
    assert!(op.run().unwrap().is_success());

    let (doc, pages) = output_pages(&fixture.output);
    assert_eq!(page_scale(&doc, pages[0].0), (1.53, 0.99));
    assert_eq!(page_scale(&doc, pages[1].0), (0.5, 0.5));
}

#[test]
fn test_page_counts() {
    for n in [0_usize, 1, 5] {
        let sizes: Vec<FixturePage> = (0..n).map(|_| page(300, 300)).collect();
        let fixture = Fixture::new(&sizes);
        let op = fixture.operation(150.0, 200.0);

        let outcome = op.run().unwrap();
        assert!(outcome.is_success(), "{n} pages: {outcome:?}");
        assert_eq!(op.progress(), ProgressSnapshot { completed: n, total: n });

        let (_, pages) = output_pages(&fixture.output);
        assert_eq!(pages.len(), n);
    }
}

#[test]
fn test_heterogeneous_pages_all_get_target_size() {
    let fixture = Fixture::new(&[
        page(612, 792),
        page(842, 595),
        FixturePage {
            media: [50, 50, 250, 150],
            crop: None,
        },
    ]);
    let op = fixture.operation(420.0, 297.0);
    assert!(op.run().unwrap().is_success());

    let (_, pages) = output_pages(&fixture.output);
    assert_eq!(pages.len(), 3);
    for (_, media_box) in &pages {
        assert_eq!(media_box.size(), PageSize::new(420.0, 297.0));
    }
    // Origin of the source media box is kept
    assert_eq!((pages[2].1.x, pages[2].1.y), (50.0, 50.0));
}

#[test]
fn test_content_and_shared_resources_are_copied() {
    let fixture = Fixture::new(&[page(200, 200), page(200, 200)]);
    let op = fixture.operation(100.0, 100.0);
    assert!(op.run().unwrap().is_success());

    let doc = Document::load(&fixture.output).unwrap();

    let fonts = doc
        .objects
        .values()
        .filter(|obj| obj.type_name().ok() == Some(b"Font".as_slice()))
        .count();
    assert_eq!(fonts, 1, "font shared by both pages should be copied once");

    let forms: Vec<&Stream> = doc
        .objects
        .values()
        .filter_map(|obj| obj.as_stream().ok())
        .filter(|s| {
            s.dict.get(b"Subtype").and_then(Object::as_name).ok() == Some(b"Form".as_slice())
        })
        .collect();
    assert_eq!(forms.len(), 2);

    let resources: Vec<ObjectId> = forms
        .iter()
        .map(|form| form.dict.get(b"Resources").unwrap().as_reference().unwrap())
        .collect();
    assert_eq!(
        resources[0], resources[1],
        "resources shared by both pages should stay one object"
    );

    for form in forms {
        let bbox = form.dict.get(b"BBox").unwrap().as_array().unwrap();
        let bbox = PageBox::from_pdf_array(bbox).unwrap();
        assert_eq!(bbox, PageBox::new(0.0, 0.0, 200.0, 200.0));

        let data = form.decompressed_content().unwrap_or_else(|_| form.content.clone());
        let text = String::from_utf8_lossy(&data);
        assert!(text.contains("Tj"), "form should carry the page content: {text}");
    }
}

#[test]
fn test_uncompressed_output() {
    let fixture = Fixture::new(&[page(200, 200)]);
    let options = ResizeOptions {
        compress: false,
        pdf_version: "1.4".to_string(),
    };
    let op = ResizeOperation::new(fixture.request(100.0, 100.0), options).unwrap();
    assert!(op.run().unwrap().is_success());

    let bytes = std::fs::read(&fixture.output).unwrap();
    assert!(bytes.starts_with(b"%PDF-1.4"));
    let text = String::from_utf8_lossy(&bytes);
    assert!(text.contains("/Pg Do"));
}

// =============================================================================
// Re-entry and Cancellation
// =============================================================================

#[test]
fn test_run_twice_is_noop() {
    let fixture = Fixture::new(&[page(200, 200)]);
    let op = fixture.operation(100.0, 100.0);

    assert!(op.run().is_some());
    let before = op.progress();
    assert!(op.run().is_none());
    assert_eq!(op.progress(), before);
    assert_eq!(op.state(), OperationState::Finished);
}

#[test]
fn test_cancel_before_start() {
    let fixture = Fixture::new(&[page(200, 200), page(200, 200)]);
    let op = fixture.operation(100.0, 100.0);

    op.cancel();
    assert!(op.run().is_none());
    assert_eq!(op.progress().completed, 0);
    assert!(!fixture.output.exists());
}

#[test]
fn test_cancel_after_k_pages() {
    let fixture = Fixture::new(&[page(200, 200); 5]);
    let op = fixture.operation(100.0, 100.0);
    let token = op.cancellation_token();

    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_in_observer = Arc::clone(&seen);
    let op = op.with_observer(move |progress| {
        seen_in_observer.lock().unwrap().push(progress.completed);
        if progress.completed == 2 {
            token.cancel();
        }
    });

    let outcome = op.run().unwrap();
    assert!(matches!(outcome, ResizeOutcome::Cancelled { completed: 2 }));
    assert!(outcome.error().is_none());
    assert_eq!(op.progress(), ProgressSnapshot { completed: 2, total: 5 });
    assert_eq!(*seen.lock().unwrap(), vec![1, 2]);
    assert!(!fixture.output.exists());
    assert_eq!(op.state(), OperationState::Finished);
    assert!(op.run().is_none());
}

#[test]
fn test_observer_sees_every_page_once() {
    let fixture = Fixture::new(&[page(200, 200); 4]);
    let seen = Arc::new(std::sync::Mutex::new(Vec::new()));
    let seen_in_observer = Arc::clone(&seen);
    let op = fixture
        .operation(100.0, 100.0)
        .with_observer(move |progress| seen_in_observer.lock().unwrap().push(progress));

    assert!(op.run().unwrap().is_success());
    let seen = seen.lock().unwrap();
    let completed: Vec<usize> = seen.iter().map(|p| p.completed).collect();
    assert_eq!(completed, vec![1, 2, 3, 4]);
    assert!(seen.iter().all(|p| p.total == 4));
}

// =============================================================================
// Error Handling
// =============================================================================

#[test]
fn test_missing_source() {
    let dir = tempfile::tempdir().unwrap();
    let output = dir.path().join("out.pdf");
    let request = ResizeRequest::new(
        dir.path().join("missing.pdf"),
        &output,
        PageSize::new(100.0, 100.0),
    );
    let op = ResizeOperation::new(request, ResizeOptions::default()).unwrap();

    let outcome = op.run().unwrap();
    match outcome.error() {
        Some(err @ Error::SourceUnopenable { .. }) => {
            assert_eq!(err.path(), Some(dir.path().join("missing.pdf").as_path()));
        }
        other => panic!("expected SourceUnopenable, got {other:?}"),
    }
    assert!(!output.exists());
    assert_eq!(op.state(), OperationState::Finished);
}

#[test]
fn test_non_pdf_source() {
    let fixture = Fixture::new(&[page(200, 200)]);
    std::fs::write(&fixture.input, "just some text, not a PDF").unwrap();
    let op = fixture.operation(100.0, 100.0);

    let outcome = op.run().unwrap();
    assert!(matches!(outcome.error(), Some(Error::SourceUnopenable { .. })));
    assert!(!fixture.output.exists());
}

#[test]
fn test_unwritable_destination() {
    let fixture = Fixture::new(&[page(200, 200)]);
    let output = fixture.dir.path().join("no-such-dir").join("out.pdf");
    let request = ResizeRequest::new(&fixture.input, &output, PageSize::new(100.0, 100.0));
    let op = ResizeOperation::new(request, ResizeOptions::default()).unwrap();

    let outcome = op.run().unwrap();
    match outcome.error() {
        Some(err @ Error::DestinationUncreatable { .. }) => {
            assert_eq!(err.path(), Some(output.as_path()));
        }
        other => panic!("expected DestinationUncreatable, got {other:?}"),
    }
    assert_eq!(op.progress().completed, 0);
    assert_eq!(op.state(), OperationState::Finished);
    // The source file is untouched and can be opened again
    assert!(Document::load(&fixture.input).is_ok());
}

#[test]
fn test_invalid_target_size_rejected_before_io() {
    let fixture = Fixture::new(&[page(200, 200)]);
    for (w, h) in [(0.0, 100.0), (100.0, 0.0), (-5.0, 100.0), (100.0, -5.0)] {
        let result = ResizeOperation::new(fixture.request(w, h), ResizeOptions::default());
        assert!(matches!(result, Err(Error::InvalidTargetSize { .. })));
    }
    assert!(!fixture.output.exists());
}

// =============================================================================
// Background Task
// =============================================================================

#[tokio::test]
async fn test_start_runs_in_background() {
    let fixture = Fixture::new(&[page(200, 200), page(300, 300), page(400, 400)]);
    let op = Arc::new(fixture.operation(100.0, 100.0));

    let task = Arc::clone(&op).start();
    let outcome = task.join().await.unwrap().unwrap();
    assert!(outcome.is_success());
    assert_eq!(op.progress(), ProgressSnapshot { completed: 3, total: 3 });

    let (_, pages) = output_pages(&fixture.output);
    assert_eq!(pages.len(), 3);
}

#[tokio::test]
async fn test_start_after_cancel_is_noop() {
    let fixture = Fixture::new(&[page(200, 200)]);
    let op = Arc::new(fixture.operation(100.0, 100.0));
    op.cancel();

    let task = op.start();
    assert!(task.operation().is_cancelled());
    assert!(task.join().await.unwrap().is_none());
    assert!(!fixture.output.exists());
}
