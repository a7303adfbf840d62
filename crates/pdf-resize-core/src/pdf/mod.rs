mod document;
mod geometry;
mod page_index;
mod transform;
mod writer;

pub use document::{SourceDocument, SourcePage};
pub use geometry::{DEFAULT_MEDIA_BOX, PageBox, PageSize};
pub use page_index::PageNumber;
pub use transform::{PageTransform, render_page};
pub use writer::DestinationDocument;
