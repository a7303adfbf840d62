//! PDF Resize CLI - Command line tool for resizing every page of a PDF.

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use pdf_resize_core::{
    Error, PageSize, ResizeConfig, ResizeOperation, ResizeOutcome, ResizeRequest,
};
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

/// Process exit statuses, one per failure the user can act on
mod status {
    pub const USAGE: u8 = 1;
    pub const INPUT_UNREACHABLE: u8 = 2;
    pub const INVALID_WIDTH: u8 = 3;
    pub const INVALID_HEIGHT: u8 = 4;
    pub const SOURCE_UNOPENABLE: u8 = 5;
    pub const DESTINATION_UNCREATABLE: u8 = 6;
    pub const CANCELLED: u8 = 130;
}

/// How often the progress bar polls the running operation
const PROGRESS_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Parser, Debug)]
#[command(name = "resizepdf")]
#[command(author, version, about = "Resize every page of a PDF document", long_about = None)]
struct Args {
    /// Input PDF file
    input: PathBuf,

    /// Output PDF file
    output: PathBuf,

    /// Output page width in points
    #[arg(allow_hyphen_values = true)]
    width: String,

    /// Output page height in points
    #[arg(allow_hyphen_values = true)]
    height: String,

    /// Config file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Write uncompressed streams
    #[arg(long)]
    no_compress: bool,

    /// Hide the progress bar
    #[arg(long)]
    no_progress: bool,
}

/// A failure that ends the process with a specific status
#[derive(Debug)]
struct Exit {
    status: u8,
    message: String,
}

impl Exit {
    fn new(status: u8, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }
}

/// Parse a page dimension, accepting only positive finite numbers.
fn parse_dimension(value: &str) -> Option<f32> {
    value
        .trim()
        .parse::<f32>()
        .ok()
        .filter(|v| v.is_finite() && *v > 0.0)
}

/// Expand a leading `~` against `home`. Non-UTF-8 paths are used as given.
fn expand_home(path: &Path, home: Option<&Path>) -> PathBuf {
    path.to_str().map_or_else(
        || path.to_path_buf(),
        |s| PathBuf::from(shellexpand::tilde_with_context(s, || home.and_then(Path::to_str)).as_ref()),
    )
}

/// Shorten a path under `home` to `~/...` for display.
fn abbreviate_home(path: &Path, home: Option<&Path>) -> String {
    let home = home.filter(|h| h.parent().is_some());
    match home.and_then(|h| path.strip_prefix(h).ok()) {
        Some(rest) if rest.as_os_str().is_empty() => "~".to_string(),
        Some(rest) => format!("~/{}", rest.display()),
        None => path.display().to_string(),
    }
}

/// Resolve arguments into a request, checking each one on its own.
fn resolve_request(args: &Args, home: Option<&Path>) -> std::result::Result<ResizeRequest, Exit> {
    let input = expand_home(&args.input, home);
    if !input.exists() {
        return Err(Exit::new(
            status::INPUT_UNREACHABLE,
            format!("Could not open PDF {}", args.input.display()),
        ));
    }

    let output = expand_home(&args.output, home);

    let width = parse_dimension(&args.width).ok_or_else(|| {
        Exit::new(
            status::INVALID_WIDTH,
            format!("Width {} is not a positive number", args.width),
        )
    })?;
    let height = parse_dimension(&args.height).ok_or_else(|| {
        Exit::new(
            status::INVALID_HEIGHT,
            format!("Height {} is not a positive number", args.height),
        )
    })?;

    Ok(ResizeRequest::new(input, output, PageSize::new(width, height)))
}

/// Map a finished run onto an exit status and message.
fn report(
    outcome: Option<ResizeOutcome>,
    output: &Path,
    home: Option<&Path>,
) -> std::result::Result<String, Exit> {
    match outcome {
        Some(ResizeOutcome::Success) => Ok(format!(
            "Successfully resized PDF and saved output to {}.",
            abbreviate_home(output, home)
        )),
        Some(ResizeOutcome::Cancelled { completed }) => Err(Exit::new(
            status::CANCELLED,
            format!("Cancelled after {completed} pages; no output written."),
        )),
        Some(ResizeOutcome::Failure(Error::SourceUnopenable { path, .. })) => Err(Exit::new(
            status::SOURCE_UNOPENABLE,
            format!("Could not open input PDF {}.", abbreviate_home(&path, home)),
        )),
        Some(ResizeOutcome::Failure(Error::DestinationUncreatable { path, .. })) => {
            Err(Exit::new(
                status::DESTINATION_UNCREATABLE,
                format!("Could not create output PDF {}.", abbreviate_home(&path, home)),
            ))
        }
        Some(ResizeOutcome::Failure(other)) => Err(Exit::new(status::USAGE, other.to_string())),
        None => Err(Exit::new(status::CANCELLED, "Cancelled before start.")),
    }
}

fn progress_bar(enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(0);
    // Template is hardcoded and valid, unwrap is safe
    #[allow(clippy::unwrap_used)]
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pages ({eta})",
            )
            .unwrap()
            .progress_chars("#>-"),
    );
    pb
}

async fn run(args: Args) -> Result<std::result::Result<String, Exit>> {
    let mut config = if let Some(config_path) = &args.config {
        ResizeConfig::from_file(config_path).context("Failed to load config file")?
    } else {
        ResizeConfig::load()
    };

    if args.no_compress {
        config.compress = false;
    }
    if args.no_progress {
        config.progress_bar = false;
    }

    let home = dirs::home_dir();
    let request = match resolve_request(&args, home.as_deref()) {
        Ok(request) => request,
        Err(exit) => return Ok(Err(exit)),
    };
    let output = request.output.clone();

    let operation = Arc::new(
        ResizeOperation::new(request, config.resize_options()).context("Invalid resize request")?,
    );

    let token = operation.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, cancelling");
            token.cancel();
        }
    });

    let pb = progress_bar(config.progress_bar);
    let task = Arc::clone(&operation).start();

    let mut ticker = tokio::time::interval(PROGRESS_POLL_INTERVAL);
    while !task.is_finished() {
        ticker.tick().await;
        let progress = operation.progress();
        pb.set_length(progress.total as u64);
        pb.set_position(progress.completed as u64);
    }

    let outcome = task.join().await.context("Resize task failed")?;
    let progress = operation.progress();
    pb.set_length(progress.total as u64);
    pb.set_position(progress.completed as u64);
    pb.finish_and_clear();

    debug!("Finished with {}/{} pages", progress.completed, progress.total);
    Ok(report(outcome, &output, home.as_deref()))
}

// CLI output is intentional
#[allow(clippy::print_stdout, clippy::print_stderr)]
#[tokio::main]
async fn main() -> ExitCode {
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let _ = e.print();
            return if e.use_stderr() {
                ExitCode::from(status::USAGE)
            } else {
                ExitCode::SUCCESS
            };
        }
    };

    // Setup logging
    let log_level = match args.verbose {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    };

    FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match run(args).await {
        Ok(Ok(message)) => {
            println!("{message}");
            ExitCode::SUCCESS
        }
        Ok(Err(exit)) => {
            eprintln!("{}", exit.message);
            ExitCode::from(exit.status)
        }
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::from(status::USAGE)
        }
    }
}
