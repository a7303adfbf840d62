use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId};

use crate::error::{Error, Result};
use super::geometry::{DEFAULT_MEDIA_BOX, PageBox};
use super::page_index::PageNumber;

/// Upper bound on `/Parent` hops when resolving inherited page attributes.
const MAX_INHERITANCE_DEPTH: usize = 32;

/// Read-only handle to an opened source PDF
pub struct SourceDocument {
    doc: Document,
    /// Page map from lopdf (1-based page number -> page object)
    pages: BTreeMap<u32, ObjectId>,
    path: PathBuf,
}

/// One page of a source document with its resolved page boxes
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourcePage {
    pub number: PageNumber,
    pub id: ObjectId,
    /// Full page extent
    pub media_box: PageBox,
    /// Visible region, clipped to the media box
    pub crop_box: PageBox,
}

impl SourceDocument {
    /// Open a PDF from a file path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let doc = Document::load(path).map_err(|e| Error::SourceUnopenable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        Ok(Self::from_document(doc, path.to_path_buf()))
    }

    /// Open a PDF from bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let doc = Document::load_mem(bytes).map_err(|e| Error::SourceUnopenable {
            path: PathBuf::from("<memory>"),
            reason: e.to_string(),
        })?;
        Ok(Self::from_document(doc, PathBuf::from("<memory>")))
    }

    fn from_document(doc: Document, path: PathBuf) -> Self {
        let pages = doc.get_pages();
        Self { doc, pages, path }
    }

    /// Get number of pages
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    /// Location the document was opened from
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Look up a page. Past the last page this is `None`, not an error.
    pub fn page(&self, number: PageNumber) -> Option<SourcePage> {
        let id = *self.pages.get(&number.get())?;
        let dict = self.doc.get_dictionary(id).ok()?;

        let media_box = self
            .inherited_box(dict, b"MediaBox")
            .unwrap_or(DEFAULT_MEDIA_BOX);
        let crop_box = self
            .inherited_box(dict, b"CropBox")
            .and_then(|crop| crop.intersection(media_box))
            .unwrap_or(media_box);

        Some(SourcePage {
            number,
            id,
            media_box,
            crop_box,
        })
    }

    /// Pages in ascending order, starting at page 1.
    ///
    /// Bounded by the page count and stops early at the first page that
    /// cannot be resolved.
    pub fn pages(&self) -> impl Iterator<Item = SourcePage> + '_ {
        let total = self.page_count();
        (0..total).map_while(move |index| {
            PageNumber::from_index(index, total).and_then(|number| self.page(number))
        })
    }

    pub(crate) const fn inner(&self) -> &Document {
        &self.doc
    }

    /// Find a page attribute, walking up the page tree for inheritable keys.
    ///
    /// The value is returned as stored, so an indirect value stays a reference.
    pub(crate) fn inherited_entry<'a>(
        &'a self,
        page: &'a Dictionary,
        key: &[u8],
    ) -> Option<&'a Object> {
        let mut dict = page;
        for _ in 0..MAX_INHERITANCE_DEPTH {
            if let Ok(value) = dict.get(key) {
                return Some(value);
            }
            let parent = dict.get(b"Parent").ok()?.as_reference().ok()?;
            dict = self.doc.get_dictionary(parent).ok()?;
        }
        None
    }

    /// Like [`Self::inherited_entry`], with one level of indirection resolved.
    pub(crate) fn inherited<'a>(&'a self, page: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        self.inherited_entry(page, key).and_then(|value| self.resolve(value))
    }

    fn inherited_box(&self, page: &Dictionary, key: &[u8]) -> Option<PageBox> {
        let array = self.inherited(page, key)?.as_array().ok()?;
        let array: Vec<Object> = array
            .iter()
            .filter_map(|obj| self.resolve(obj).cloned())
            .collect();
        PageBox::from_pdf_array(&array)
    }

    /// Follow a single indirect reference.
    pub(crate) fn resolve<'a>(&'a self, obj: &'a Object) -> Option<&'a Object> {
        match obj {
            Object::Reference(id) => self.doc.get_object(*id).ok(),
            other => Some(other),
        }
    }
}

impl std::fmt::Debug for SourceDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SourceDocument")
            .field("path", &self.path)
            .field("page_count", &self.pages.len())
            .finish_non_exhaustive()
    }
}
