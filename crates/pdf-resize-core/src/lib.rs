//! PDF Resize Core Library
//!
//! This library re-renders every page of a PDF document at a new page size:
//! - Page geometry and per-page stretch-to-fit transforms
//! - An append-only output document written in a single pass
//! - A cancellable, progress-reporting resize operation
//! - Configuration loading

pub mod config;
pub mod error;
pub mod operation;
pub mod pdf;
pub mod util;

pub use config::{DEFAULT_PDF_VERSION, ResizeConfig, ResizeOptions};
pub use error::{Error, Result};
pub use operation::{
    CancellationToken, OperationState, ProgressSnapshot, ResizeOperation, ResizeOutcome,
    ResizeRequest, ResizeTask,
};
pub use pdf::{PageBox, PageSize, PageTransform, SourceDocument};

/// Resize a document on the current thread.
///
/// Convenience wrapper for callers that need neither progress nor
/// cancellation.
pub fn resize(request: ResizeRequest, options: ResizeOptions) -> Result<ResizeOutcome> {
    let operation = ResizeOperation::new(request, options)?;
    operation
        .run()
        .ok_or_else(|| Error::Task("operation did not run".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_options() {
        let options = ResizeOptions::default();
        assert!(options.compress);
        assert_eq!(options.pdf_version, DEFAULT_PDF_VERSION);
    }

    #[test]
    fn test_resize_rejects_bad_size_without_io() {
        let dir = std::env::temp_dir().join("pdf-resize-never-created");
        let request = ResizeRequest::new(
            dir.join("in.pdf"),
            dir.join("out.pdf"),
            PageSize::new(-1.0, 5.0),
        );
        let result = resize(request, ResizeOptions::default());
        assert!(matches!(result, Err(Error::InvalidTargetSize { .. })));
        assert!(!dir.join("out.pdf").exists());
    }
}
