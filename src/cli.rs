//! Command-line front end
//!
//! Parses flags, asks for confirmation, runs the optional benchmark and the
//! wipe pass on blocking threads, and renders their progress.

use std::fmt::Display;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::mpsc;
use tracing::warn;

use crate::bench::Benchmarker;
use crate::config::WipeConfig;
use crate::io::probe_device_size;
use crate::models::{BenchmarkReport, WipeSummary};
use crate::util::{format_bytes, format_duration, format_eta, format_throughput, parse_bytes};
use crate::wipe::{ProgressPhase, ProgressUpdate, SkipFactor, WipeEngine};
use crate::{Result, WipeError};

const PROGRESS_CHANNEL_CAPACITY: usize = 16;

/// Overwrite a block device with random data
#[derive(Parser, Debug, Clone)]
#[command(name = "skipwipe", version)]
#[command(about = "Overwrite a block device with random data, optionally sampling every Nth block")]
pub struct Cli {
    /// Device or file to overwrite
    #[arg(short, long)]
    pub device: PathBuf,

    /// Buffer size in bytes or with units (e.g. 4MiB)
    #[arg(short, long)]
    pub buffer: Option<String>,

    /// Write one buffer out of every N
    #[arg(short, long)]
    pub skip: Option<u64>,

    /// Benchmark first and pick the skip factor that meets the target time
    #[arg(long)]
    pub auto_skip: bool,

    /// Target wipe duration in hours for --auto-skip
    #[arg(long, allow_negative_numbers = true)]
    pub target_hours: Option<f64>,

    /// Skip all confirmation prompts
    #[arg(short, long)]
    pub force: bool,

    /// Read configuration from this file instead of the default location
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Print the final summary as JSON
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Load the config file and apply command-line overrides on top
    pub fn resolve_config(&self) -> Result<WipeConfig> {
        let mut config = match &self.config {
            Some(path) => WipeConfig::load_from(path)?,
            None => WipeConfig::load()?,
        };

        if let Some(buffer) = &self.buffer {
            let size = parse_bytes(buffer)
                .map_err(|e| WipeError::ConfigError(format!("Invalid buffer size: {}", e)))?;
            config = config.with_buffer_size(size);
        }

        if let Some(skip) = self.skip {
            config = config.with_skip_factor(SkipFactor::new(skip)?);
        }

        if self.auto_skip {
            config = config.with_auto_skip(true);
        }

        if let Some(hours) = self.target_hours {
            let target = Duration::try_from_secs_f64(hours * 3600.0).map_err(|_| {
                WipeError::ConfigError(format!("Invalid target hours: {}", hours))
            })?;
            config = config.with_target_duration(target);
        }

        config.validate()?;
        Ok(config)
    }
}

/// Whether the path looks like a raw device node
pub fn is_device_path(path: &Path) -> bool {
    path.starts_with("/dev/")
}

/// Print `prompt` and read one line.
///
/// With `exact` the trimmed answer must equal `expected`. Otherwise any
/// non-empty answer that `expected` starts, ignoring case, is accepted, so
/// `y` also takes `yes`.
pub fn confirm<R: BufRead, W: Write>(
    input: &mut R,
    output: &mut W,
    prompt: &str,
    expected: &str,
    exact: bool,
) -> Result<bool> {
    write!(output, "{}", prompt)?;
    output.flush()?;

    let mut answer = String::new();
    input.read_line(&mut answer)?;
    let answer = answer.trim();

    Ok(if exact {
        answer == expected
    } else {
        !answer.is_empty()
            && answer
                .to_ascii_lowercase()
                .starts_with(&expected.to_ascii_lowercase())
    })
}

/// Final confirmation text, noting any data the benchmark already replaced
pub fn confirmation_prompt(device: &Path, benchmarked: Option<u64>) -> String {
    match benchmarked {
        Some(bytes) => format!(
            "The benchmark already overwrote {} at the start of {}. \
             All remaining data will be overwritten. Type 'YES' to continue: ",
            format_bytes(bytes),
            device.display()
        ),
        None => format!(
            "All data on {} will be overwritten. Type 'YES' to continue: ",
            device.display()
        ),
    }
}

// Status text goes to stderr when stdout carries JSON.
struct Output {
    json: bool,
}

impl Output {
    fn line(&self, msg: impl Display) {
        if self.json {
            eprintln!("{}", msg);
        } else {
            println!("{}", msg);
        }
    }
}

/// Run the whole interactive flow for parsed arguments
pub async fn run(cli: Cli) -> Result<WipeSummary> {
    let config = cli.resolve_config()?;
    let out = Output { json: cli.json };

    let device_size = probe_device_size(&cli.device)?;
    out.line(format!(
        "Device: {} ({})",
        cli.device.display(),
        format_bytes(device_size)
    ));

    if !cli.force && !is_device_path(&cli.device) {
        let prompt = format!(
            "{} does not look like a block device. Continue? (y/N): ",
            cli.device.display()
        );
        if !confirm(&mut io::stdin().lock(), &mut io::stderr(), &prompt, "y", false)? {
            return Err(WipeError::Cancelled {
                bytes_processed: 0,
                bytes_written: 0,
            });
        }
    }

    let mut benchmarked = None;
    let skip_factor = if config.auto_skip {
        let (bytes_per_sec, bytes_written) =
            benchmark(&cli.device, device_size, &config, &out).await?;
        benchmarked = Some(bytes_written);
        let skip = SkipFactor::for_target(
            device_size,
            bytes_per_sec,
            config.target_duration,
            config.buffer_size_bytes()?,
        );
        out.line(format!(
            "Auto skip factor for a {} target: {}",
            humantime::format_duration(config.target_duration),
            skip
        ));
        if let Some(estimate) = skip.estimated_completion(device_size, bytes_per_sec) {
            out.line(format!("Estimated wipe time: {}", format_duration(estimate)));
        }
        skip
    } else {
        config.skip_factor
    };

    if !cli.force {
        let prompt = confirmation_prompt(&cli.device, benchmarked);
        if !confirm(&mut io::stdin().lock(), &mut io::stderr(), &prompt, "YES", true)? {
            return Err(WipeError::Cancelled {
                bytes_processed: 0,
                bytes_written: 0,
            });
        }
    }

    let engine = WipeEngine::from_config(&config)?.with_skip_factor(skip_factor);
    let summary = wipe(&cli.device, device_size, engine, &out).await?;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(summary)
}

/// Measured write speed in bytes/sec and the bytes the benchmark wrote.
///
/// A failed offset restore still yields a usable measurement; the wipe opens
/// its own handle at offset 0.
async fn benchmark(
    device: &Path,
    device_size: u64,
    config: &WipeConfig,
    out: &Output,
) -> Result<(f64, u64)> {
    let benchmarker = Benchmarker::from_config(config)?;
    // The benchmark starts at offset 0 and only stops early on error
    let planned = benchmarker.planned_volume(device_size).min(device_size);
    let path = device.to_path_buf();
    let (tx, rx) = mpsc::channel::<ProgressUpdate>(PROGRESS_CHANNEL_CAPACITY);

    out.line("Benchmarking write speed...");
    let bar = progress_bar(out.json);
    let renderer = tokio::spawn(render_progress(rx, bar));

    let result = tokio::task::spawn_blocking(move || benchmarker.measure_path(&path, &tx))
        .await
        .map_err(join_error)?;
    let _ = renderer.await;

    match result {
        Ok(report) => {
            print_benchmark(&report, out);
            Ok((report.bytes_per_sec, report.bytes_written))
        }
        Err(WipeError::PositionRestoreFailed {
            bytes_per_sec,
            offset,
            source,
        }) => {
            warn!(offset, error = %source, "benchmark could not restore the write offset");
            Ok((bytes_per_sec, planned))
        }
        Err(e) => Err(e),
    }
}

async fn wipe(
    device: &Path,
    device_size: u64,
    engine: WipeEngine,
    out: &Output,
) -> Result<WipeSummary> {
    let cancel = Arc::new(AtomicBool::new(false));
    let engine = engine.with_cancel_flag(Arc::clone(&cancel));

    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupt received, stopping after the current block");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    let path = device.to_path_buf();
    let (tx, rx) = mpsc::channel::<ProgressUpdate>(PROGRESS_CHANNEL_CAPACITY);
    out.line(format!(
        "Wiping with a {} buffer, skip factor {}",
        format_bytes(engine.buffer_size() as u64),
        engine.skip_factor()
    ));
    let renderer = tokio::spawn(render_progress(rx, progress_bar(out.json)));

    let result = tokio::task::spawn_blocking(move || engine.run_on_path(&path, device_size, &tx))
        .await
        .map_err(join_error);

    interrupt.abort();
    let _ = renderer.await;
    result?
}

fn join_error(err: tokio::task::JoinError) -> WipeError {
    WipeError::IoError(io::Error::new(io::ErrorKind::Other, err.to_string()))
}

fn progress_bar(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner} [{elapsed_precise}] {bar:30} {pos:>3}% {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    bar
}

async fn render_progress(mut rx: mpsc::Receiver<ProgressUpdate>, bar: ProgressBar) {
    while let Some(update) = rx.recv().await {
        bar.set_position(update.percent_complete() as u64);
        bar.set_message(progress_message(&update));
        if update.is_final {
            break;
        }
    }
    bar.finish();
}

/// One-line description of a progress update
pub fn progress_message(update: &ProgressUpdate) -> String {
    let mut msg = format!(
        "{} / {} @ {} (avg {}) ETA {}",
        format_bytes(update.sample.bytes_processed),
        format_bytes(update.total_bytes),
        format_throughput(update.speed.instantaneous),
        format_throughput(update.speed.smoothed),
        format_eta(update.eta)
    );
    if update.phase == ProgressPhase::Wipe
        && update.sample.bytes_written != update.sample.bytes_processed
    {
        msg.push_str(&format!(", {:.2}% overwritten", update.coverage_percentage()));
    }
    msg
}

fn print_benchmark(report: &BenchmarkReport, out: &Output) {
    out.line(format!(
        "Benchmark: {} in {} ({}, {})",
        format_bytes(report.bytes_written),
        format_duration(report.elapsed),
        format_throughput(report.bytes_per_sec),
        report.open_mode
    ));
}

fn print_summary(summary: &WipeSummary) {
    println!();
    println!("Wipe complete ({})", summary.open_mode);
    println!("  Device size:   {}", format_bytes(summary.device_size));
    println!("  Processed:     {}", format_bytes(summary.bytes_processed));
    if summary.skip_factor > 1 {
        println!(
            "  Overwritten:   {} ({:.2}% of device, skip factor {})",
            format_bytes(summary.bytes_written),
            summary.coverage_percentage(),
            summary.skip_factor
        );
    }
    println!("  Elapsed:       {}", format_duration(summary.elapsed));
    println!(
        "  Throughput:    {}",
        format_throughput(summary.average_throughput)
    );
    if let Some(warning) = &summary.sync_warning {
        println!("  Warning:       final sync failed: {}", warning);
    }
}
