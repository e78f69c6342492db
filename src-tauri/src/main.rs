//! csv-splitter: split a CSV file into numbered chunk files.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use csv_splitter::{split_csv, ProgressEvent, ProgressFn, SplitConfig, SplitParams};

/// Streaming CSV splitter with optional XLSX output.
#[derive(Parser, Debug)]
#[command(name = "csv-splitter")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// CSV file to split.
    input: PathBuf,

    /// Directory for the chunk files (created if missing).
    #[arg(short, long, default_value = ".")]
    output_dir: PathBuf,

    /// Data rows per output file.
    #[arg(short = 'n', long, default_value_t = 10_000)]
    rows_per_file: usize,

    /// Treat the first record as data instead of a header.
    #[arg(long)]
    no_header: bool,

    /// Write .xlsx workbooks instead of CSV.
    #[arg(long)]
    xlsx: bool,

    /// Chunks buffered for a background writer (0 writes inline).
    #[arg(long, default_value_t = 0)]
    queue_depth: usize,

    /// Largest single record accepted, in bytes.
    #[arg(long)]
    max_record_bytes: Option<usize>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    let mut config = SplitConfig::default().write_queue_depth(args.queue_depth);
    if let Some(bytes) = args.max_record_bytes {
        config = config.max_record_bytes(bytes);
    }

    let params = SplitParams {
        input_path: args.input.to_string_lossy().into_owned(),
        output_dir: args.output_dir.to_string_lossy().into_owned(),
        rows_per_file: args.rows_per_file,
        has_header: !args.no_header,
        convert_to_excel: args.xlsx,
        job_id: None,
    };

    // Ctrl-C stops at the next chunk boundary
    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, stopping after the current chunk");
            on_signal.cancel();
        }
    });

    let reporter = Arc::new(ProgressFn(|event: &ProgressEvent| {
        info!("{:>3}% {}", event.percent, event.message);
    }));

    let result = split_csv(params, config, reporter, cancel).await;

    match result.error {
        None => {
            info!("Wrote {} file(s)", result.file_count);
            ExitCode::SUCCESS
        }
        Some(error) => {
            eprintln!("error: {}", error);
            if result.file_count > 0 {
                eprintln!("{} file(s) were written before the failure", result.file_count);
            }
            ExitCode::FAILURE
        }
    }
}
