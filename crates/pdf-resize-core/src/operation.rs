//! Document resize pipeline.
//!
//! A [`ResizeOperation`] runs once: `Ready -> Executing -> Finished`. It
//! opens the source, creates the destination, streams every page through
//! [`render_page`] and finalizes the output. Progress and cancellation are
//! shared atomics, so another thread can watch and stop a run in flight.
//! Cancellation is checked between pages only.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicUsize, Ordering};

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::config::ResizeOptions;
use crate::error::{Error, Result};
use crate::pdf::{DestinationDocument, PageSize, SourceDocument, render_page};

/// What to resize and where to write it
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeRequest {
    pub input: PathBuf,
    pub output: PathBuf,
    pub target_size: PageSize,
}

impl ResizeRequest {
    pub fn new(
        input: impl Into<PathBuf>,
        output: impl Into<PathBuf>,
        target_size: PageSize,
    ) -> Self {
        Self {
            input: input.into(),
            output: output.into(),
            target_size,
        }
    }
}

/// Lifecycle of a [`ResizeOperation`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum OperationState {
    Ready = 0,
    Executing = 1,
    Finished = 2,
}

impl OperationState {
    const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Ready,
            1 => Self::Executing,
            _ => Self::Finished,
        }
    }
}

/// Result of one run
#[derive(Debug)]
pub enum ResizeOutcome {
    /// Every page was written and the output finalized
    Success,
    /// Stopped early on request; the partial output was removed
    Cancelled { completed: usize },
    /// The source could not be opened or the destination not created
    Failure(Error),
}

impl ResizeOutcome {
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }

    pub const fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }

    /// The recorded error. Cancellation is not an error.
    pub const fn error(&self) -> Option<&Error> {
        match self {
            Self::Failure(e) => Some(e),
            _ => None,
        }
    }
}

/// Point-in-time view of progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ProgressSnapshot {
    /// Pages fully emitted so far
    pub completed: usize,
    /// Pages in the source document (0 until it has been opened)
    pub total: usize,
}

impl ProgressSnapshot {
    /// Completed fraction in `0.0..=1.0`; an empty document counts as done.
    #[allow(clippy::cast_precision_loss)]
    pub fn fraction(&self) -> f64 {
        if self.total == 0 {
            1.0
        } else {
            self.completed as f64 / self.total as f64
        }
    }
}

/// Counters written by the worker and read from anywhere
#[derive(Default)]
struct Progress {
    completed: AtomicUsize,
    total: AtomicUsize,
}

impl Progress {
    fn snapshot(&self) -> ProgressSnapshot {
        ProgressSnapshot {
            completed: self.completed.load(Ordering::Acquire),
            total: self.total.load(Ordering::Acquire),
        }
    }
}

/// Shared cancel flag. Clones refer to the same flag.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

type PageObserver = Box<dyn Fn(ProgressSnapshot) + Send + Sync>;

/// A single, cancellable, progress-reporting resize of one document
pub struct ResizeOperation {
    request: ResizeRequest,
    options: ResizeOptions,
    state: AtomicU8,
    cancel: CancellationToken,
    progress: Progress,
    observer: Option<PageObserver>,
}

impl ResizeOperation {
    /// Create an operation in the `Ready` state.
    ///
    /// The target size is validated here, before any file is touched.
    pub fn new(request: ResizeRequest, options: ResizeOptions) -> Result<Self> {
        request.target_size.validate()?;

        Ok(Self {
            request,
            options,
            state: AtomicU8::new(OperationState::Ready as u8),
            cancel: CancellationToken::new(),
            progress: Progress::default(),
            observer: None,
        })
    }

    /// Call `observer` on the worker after each emitted page.
    #[must_use]
    pub fn with_observer(
        mut self,
        observer: impl Fn(ProgressSnapshot) + Send + Sync + 'static,
    ) -> Self {
        self.observer = Some(Box::new(observer));
        self
    }

    pub const fn request(&self) -> &ResizeRequest {
        &self.request
    }

    pub fn state(&self) -> OperationState {
        OperationState::from_u8(self.state.load(Ordering::Acquire))
    }

    pub fn progress(&self) -> ProgressSnapshot {
        self.progress.snapshot()
    }

    /// Ask the run to stop at the next page boundary.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// A token that cancels this operation, usable without a reference to it.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run the resize on the current thread.
    ///
    /// Returns `None`, doing nothing, if the operation was cancelled before
    /// it started or has already been started.
    pub fn run(&self) -> Option<ResizeOutcome> {
        if self.is_cancelled() {
            debug!("Resize of {} cancelled before start", self.request.input.display());
            return None;
        }

        self.state
            .compare_exchange(
                OperationState::Ready as u8,
                OperationState::Executing as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()?;

        let outcome = self.execute();
        self.state.store(OperationState::Finished as u8, Ordering::Release);
        Some(outcome)
    }

    /// Run the resize on Tokio's blocking pool.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start(self: Arc<Self>) -> ResizeTask {
        let worker = Arc::clone(&self);
        let handle = tokio::task::spawn_blocking(move || worker.run());
        ResizeTask {
            operation: self,
            handle,
        }
    }

    fn execute(&self) -> ResizeOutcome {
        let ResizeRequest {
            input,
            output,
            target_size,
        } = &self.request;

        info!(
            "Resizing {} to {} points -> {}",
            input.display(),
            target_size,
            output.display()
        );

        let source = match SourceDocument::open(input) {
            Ok(source) => source,
            Err(e) => {
                warn!("{e}");
                return ResizeOutcome::Failure(e);
            }
        };

        let mut destination = match DestinationDocument::create(output, &self.options) {
            Ok(destination) => destination,
            Err(e) => {
                warn!("{e}");
                return ResizeOutcome::Failure(e);
            }
        };

        let total = source.page_count();
        self.progress.total.store(total, Ordering::Release);
        debug!("{} has {} pages", source.path().display(), total);

        for page in source.pages() {
            if self.is_cancelled() {
                info!("Cancelled before page {} of {}", page.number, total);
                break;
            }

            let transform = render_page(&mut destination, &source, &page, *target_size);
            debug!(
                "Page {} -> output page {}: crop {}x{}, scale ({}, {})",
                page.number,
                destination.page_count(),
                page.crop_box.width,
                page.crop_box.height,
                transform.x_scale,
                transform.y_scale
            );

            let completed = self.progress.completed.fetch_add(1, Ordering::AcqRel) + 1;
            if let Some(observer) = &self.observer {
                observer(ProgressSnapshot { completed, total });
            }
        }

        let finalized = destination.finalize();
        drop(source);

        if self.is_cancelled() {
            // Best effort: a leftover partial file is not an error.
            if let Err(e) = std::fs::remove_file(output) {
                debug!("Could not remove partial output {}: {}", output.display(), e);
            }
            return ResizeOutcome::Cancelled {
                completed: self.progress.completed.load(Ordering::Acquire),
            };
        }

        match finalized {
            Ok(pages) => {
                info!("Wrote {} pages to {}", pages, output.display());
                ResizeOutcome::Success
            }
            Err(e) => {
                warn!("{e}");
                ResizeOutcome::Failure(e)
            }
        }
    }
}

impl std::fmt::Debug for ResizeOperation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResizeOperation")
            .field("request", &self.request)
            .field("state", &self.state())
            .field("cancelled", &self.is_cancelled())
            .field("progress", &self.progress())
            .finish_non_exhaustive()
    }
}

/// Handle to an operation running in the background
#[derive(Debug)]
pub struct ResizeTask {
    operation: Arc<ResizeOperation>,
    handle: JoinHandle<Option<ResizeOutcome>>,
}

impl ResizeTask {
    /// The running operation, for progress and cancellation.
    pub fn operation(&self) -> &Arc<ResizeOperation> {
        &self.operation
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the run to end.
    pub async fn join(self) -> Result<Option<ResizeOutcome>> {
        self.handle.await.map_err(|e| Error::Task(e.to_string()))
    }
}
