//! CLI definition, tracing setup, and the ingest command.

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};
use gatherbox_core::{
    BackfillReport, IngestReport, Pipeline, ProgressReporter, run_backfill, run_ingest,
};
use gatherbox_crawler::{GathererExtractor, HttpSource};
use gatherbox_shared::{AppConfig, ExternalId, IngestConfig, load_config, load_config_from};
use gatherbox_storage::Catalog;
use indicatif::{ProgressBar, ProgressStyle};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// Gatherbox: keep a local Gatherer card catalog up to date.
#[derive(Parser)]
#[command(
    name = "gatherbox",
    version,
    about = "Incrementally ingest the Gatherer card catalog into a JSON checkpoint.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Catalog checkpoint to load and update (created if missing).
    pub checkpoint: PathBuf,

    /// Config file (defaults to ~/.gatherbox/gatherbox.toml).
    #[arg(short, long, env = "GATHERBOX_CONFIG")]
    pub config: Option<PathBuf>,

    /// Fetch/parse workers for the ingest run.
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Write a checkpoint after this many successful additions.
    #[arg(long)]
    pub checkpoint_every: Option<usize>,

    /// Skip the backfill sweep over incomplete printings.
    #[arg(long)]
    pub no_backfill: bool,

    /// Log format: text (default) or json.
    #[arg(long, default_value = "text")]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "gatherbox=info",
        1 => "gatherbox=debug",
        _ => "gatherbox=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command
// ---------------------------------------------------------------------------

/// Resolve config: file values, then CLI overrides.
fn resolve_config(cli: &Cli) -> Result<AppConfig> {
    let mut config = match &cli.config {
        Some(path) => load_config_from(path)?,
        None => load_config()?,
    };
    if let Some(workers) = cli.workers {
        config.pipeline.workers = workers;
    }
    if let Some(every) = cli.checkpoint_every {
        config.pipeline.checkpoint_every = every;
    }
    Ok(config)
}

/// Load, ingest, backfill, report.
pub(crate) async fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(&cli)?;

    let catalog = Catalog::load(&cli.checkpoint)
        .wrap_err_with(|| format!("cannot load catalog from {}", cli.checkpoint.display()))?;
    info!(
        path = %cli.checkpoint.display(),
        records = catalog.len(),
        printings = catalog.printing_count(),
        "catalog loaded"
    );

    let source = HttpSource::new(&config.source)?;
    let extractor = GathererExtractor::new()?;

    let cancel = CancellationToken::new();
    spawn_interrupt_handler(cancel.clone());

    let pipeline = Pipeline::new(
        Arc::new(source),
        Arc::new(extractor),
        IngestConfig::from(&config),
        cli.checkpoint.clone(),
    )
    .with_cancel(cancel.clone());

    let progress = Arc::new(CliProgress::new());
    let reporter: Arc<dyn ProgressReporter> = progress.clone();

    let (catalog, ingest) = run_ingest(&pipeline, catalog, Arc::clone(&reporter)).await?;
    progress.reset();

    let backfill = if cli.no_backfill || cancel.is_cancelled() {
        None
    } else {
        let sweep = pipeline.with_config(IngestConfig::for_backfill(&config));
        let (_, report) = run_backfill(&sweep, catalog, reporter).await?;
        Some(report)
    };
    progress.finish();

    print_summary(&ingest, backfill.as_ref());
    if cancel.is_cancelled() {
        warn!("run interrupted; progress so far is checkpointed");
    }
    Ok(())
}

/// Cancel the run on the first Ctrl-C.
fn spawn_interrupt_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("interrupt received, finishing in-flight work");
                cancel.cancel();
            }
            Err(e) => warn!(error = %e, "cannot listen for interrupts"),
        }
    });
}

fn print_summary(ingest: &IngestReport, backfill: Option<&BackfillReport>) {
    println!();
    println!("  Ingest {}", ingest.run_id);
    println!(
        "  Discovered: {} candidates over {} pages ({} failed)",
        ingest.discovery.candidates, ingest.discovery.pages_fetched, ingest.discovery.pages_failed
    );
    println!("  Enqueued:   {}", ingest.discovery.enqueued);
    println!(
        "  Fetched:    {} ({} failed)",
        ingest.fetch.fetched, ingest.fetch.failed
    );
    println!(
        "  Catalog:    {} inserted, {} merged, {} rejected",
        ingest.consumer.inserted, ingest.consumer.merged, ingest.consumer.rejected
    );
    println!("  Time:       {:.1}s", ingest.elapsed.as_secs_f64());

    if let Some(report) = backfill {
        println!();
        println!("  Backfill {}", report.run_id);
        println!(
            "  Incomplete: {} -> {} ({} fetched, {} failed)",
            report.pending, report.remaining, report.fetch.fetched, report.fetch.failed
        );
        println!("  Time:       {:.1}s", report.elapsed.as_secs_f64());
    }
    println!();
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
    phase: std::sync::Mutex<String>,
    enqueued: AtomicUsize,
    fetched: AtomicUsize,
    failed: AtomicUsize,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(Duration::from_millis(80));
        Self {
            spinner,
            phase: std::sync::Mutex::new(String::new()),
            enqueued: AtomicUsize::new(0),
            fetched: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
        }
    }

    /// Zero the counters between runs.
    fn reset(&self) {
        self.enqueued.store(0, Ordering::Relaxed);
        self.fetched.store(0, Ordering::Relaxed);
        self.failed.store(0, Ordering::Relaxed);
    }

    fn finish(&self) {
        self.spinner.finish_and_clear();
    }

    fn redraw(&self) {
        let phase = self
            .phase
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default();
        let done = self.fetched.load(Ordering::Relaxed) + self.failed.load(Ordering::Relaxed);
        self.spinner.set_message(format!(
            "{phase} [{done}/{}] ({} failed)",
            self.enqueued.load(Ordering::Relaxed),
            self.failed.load(Ordering::Relaxed),
        ));
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        if let Ok(mut phase) = self.phase.lock() {
            *phase = name.to_string();
        }
        self.redraw();
    }

    fn work_enqueued(&self, total: usize) {
        self.enqueued.store(total, Ordering::Relaxed);
        self.redraw();
    }

    fn item_fetched(&self, _id: ExternalId, succeeded: bool) {
        let counter = if succeeded { &self.fetched } else { &self.failed };
        counter.fetch_add(1, Ordering::Relaxed);
        self.redraw();
    }

    fn checkpoint_written(&self, records: usize) {
        self.spinner.println(format!("  checkpoint: {records} records"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flags() {
        let cli = Cli::try_parse_from([
            "gatherbox",
            "cards.json",
            "--workers",
            "8",
            "--checkpoint-every",
            "50",
            "--no-backfill",
            "--log-format",
            "json",
            "-vv",
        ])
        .expect("parse");
        assert_eq!(cli.checkpoint, PathBuf::from("cards.json"));
        assert_eq!(cli.workers, Some(8));
        assert_eq!(cli.checkpoint_every, Some(50));
        assert!(cli.no_backfill);
        assert!(matches!(cli.log_format, LogFormat::Json));
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn checkpoint_is_required() {
        assert!(Cli::try_parse_from(["gatherbox"]).is_err());
    }

    #[test]
    fn flags_override_config_file() {
        let dir = std::env::temp_dir().join(format!("gatherbox-cli-{}", std::process::id()));
        std::fs::create_dir_all(&dir).expect("mkdir");
        let path = dir.join("gatherbox.toml");
        std::fs::write(&path, "[pipeline]\nworkers = 3\ncheckpoint_every = 7\n").expect("write");

        let cli = Cli::try_parse_from([
            "gatherbox",
            "cards.json",
            "--config",
            path.to_str().expect("utf-8 path"),
            "--workers",
            "12",
        ])
        .expect("parse");
        let config = resolve_config(&cli).expect("config");
        assert_eq!(config.pipeline.workers, 12);
        assert_eq!(config.pipeline.checkpoint_every, 7);
        assert_eq!(config.pipeline.backfill_workers, 50);

        let _ = std::fs::remove_dir_all(&dir);
    }
}
