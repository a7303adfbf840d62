//! Append-only output document.
//!
//! The output file is created as soon as the destination is, so an unwritable
//! location is reported before any page work starts. Pages are kept in an
//! in-memory lopdf document and written out once, by [`DestinationDocument::finalize`].

use std::collections::HashMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use lopdf::{Dictionary, Document, Object, ObjectId, Stream};
use tracing::{debug, warn};

use crate::config::ResizeOptions;
use crate::error::{Error, Result};
use super::geometry::PageBox;

/// Producer string written to the output's info dictionary.
const PRODUCER: &str = concat!("pdf-resize ", env!("CARGO_PKG_VERSION"));

/// Writable, append-only output PDF bound to a file path
pub struct DestinationDocument {
    doc: Document,
    /// Reserved id of the page tree root; written on finalize
    pages_id: ObjectId,
    kids: Vec<ObjectId>,
    /// Source object id -> copied object id, so shared resources are written once
    imported: HashMap<ObjectId, ObjectId>,
    file: BufWriter<File>,
    path: PathBuf,
    compress: bool,
}

impl DestinationDocument {
    /// Create (or truncate) the output file and start an empty document.
    pub fn create(path: impl AsRef<Path>, options: &ResizeOptions) -> Result<Self> {
        let path = path.as_ref();
        let file = File::create(path).map_err(|e| Error::DestinationUncreatable {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let mut doc = Document::with_version(options.pdf_version.as_str());
        let pages_id = doc.new_object_id();

        Ok(Self {
            doc,
            pages_id,
            kids: Vec::new(),
            imported: HashMap::new(),
            file: BufWriter::new(file),
            path: path.to_path_buf(),
            compress: options.compress,
        })
    }

    /// Number of pages appended so far
    pub fn page_count(&self) -> usize {
        self.kids.len()
    }

    /// Add an object to the output and return its id.
    pub(crate) fn add_object(&mut self, object: impl Into<Object>) -> ObjectId {
        self.doc.add_object(object)
    }

    /// Append a page after all previously appended pages.
    pub fn append_page(
        &mut self,
        media_box: PageBox,
        content: Vec<u8>,
        resources: Dictionary,
    ) -> ObjectId {
        let content_id = self.add_object(Stream::new(Dictionary::new(), content));

        let page_id = self.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Page".to_vec())),
            ("Parent", Object::Reference(self.pages_id)),
            ("MediaBox", Object::Array(media_box.to_pdf_array())),
            ("Contents", Object::Reference(content_id)),
            ("Resources", Object::Dictionary(resources)),
        ]));
        self.kids.push(page_id);
        page_id
    }

    /// Deep-copy an object from `source` into this document.
    ///
    /// References are followed and rewritten. Dangling references become
    /// `null` in the copy. `/Parent` links are not followed, so copying
    /// resources never drags in the source page tree.
    pub(crate) fn import(&mut self, source: &Document, obj: &Object) -> Object {
        match obj {
            Object::Reference(id) => Object::Reference(self.import_reference(source, *id)),
            Object::Dictionary(dict) => Object::Dictionary(self.import_dictionary(source, dict)),
            Object::Array(items) => {
                Object::Array(items.iter().map(|item| self.import(source, item)).collect())
            }
            Object::Stream(stream) => {
                let dict = self.import_dictionary(source, &stream.dict);
                let mut copy = Stream::new(dict, stream.content.clone());
                copy.allows_compression = stream.allows_compression;
                Object::Stream(copy)
            }
            _ => obj.clone(),
        }
    }

    fn import_reference(&mut self, source: &Document, id: ObjectId) -> ObjectId {
        if let Some(&copied) = self.imported.get(&id) {
            return copied;
        }

        // Reserve the id first so reference cycles terminate.
        let new_id = self.doc.new_object_id();
        self.imported.insert(id, new_id);

        let copied = match source.get_object(id) {
            Ok(obj) => self.import(source, obj),
            Err(e) => {
                warn!("Dangling reference {} {} R: {}", id.0, id.1, e);
                Object::Null
            }
        };
        self.doc.objects.insert(new_id, copied);
        new_id
    }

    pub(crate) fn import_dictionary(&mut self, source: &Document, dict: &Dictionary) -> Dictionary {
        let mut copy = Dictionary::new();
        for (key, value) in dict.iter() {
            if key.as_slice() == b"Parent" {
                continue;
            }
            copy.set(key.clone(), self.import(source, value));
        }
        copy
    }

    /// Write the page tree, catalog and trailer, then flush the file.
    ///
    /// Consumes the destination, so it can only happen once. Returns the
    /// number of pages written.
    pub fn finalize(mut self) -> Result<usize> {
        let count = self.kids.len();
        let kids: Vec<Object> = self.kids.iter().map(|&id| Object::Reference(id)).collect();

        self.doc.objects.insert(
            self.pages_id,
            Object::Dictionary(Dictionary::from_iter([
                ("Type", Object::Name(b"Pages".to_vec())),
                ("Kids", Object::Array(kids)),
                ("Count", Object::Integer(i64::try_from(count).unwrap_or(i64::MAX))),
            ])),
        );

        let catalog_id = self.add_object(Dictionary::from_iter([
            ("Type", Object::Name(b"Catalog".to_vec())),
            ("Pages", Object::Reference(self.pages_id)),
        ]));
        let info_id = self.add_object(Dictionary::from_iter([(
            "Producer",
            Object::string_literal(PRODUCER),
        )]));
        self.doc.trailer.set("Root", Object::Reference(catalog_id));
        self.doc.trailer.set("Info", Object::Reference(info_id));

        if self.compress {
            self.doc.compress();
        }

        let path = self.path.clone();
        let write_failed = |e: &dyn std::fmt::Display| Error::DestinationUncreatable {
            path: path.clone(),
            reason: e.to_string(),
        };

        self.doc.save_to(&mut self.file).map_err(|e| write_failed(&e))?;
        self.file.flush().map_err(|e| write_failed(&e))?;

        debug!("Wrote {} pages to {}", count, self.path.display());
        Ok(count)
    }
}

impl std::fmt::Debug for DestinationDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DestinationDocument")
            .field("path", &self.path)
            .field("page_count", &self.kids.len())
            .field("compress", &self.compress)
            .finish_non_exhaustive()
    }
}
