//! SEO Integrity command-line entry point.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;

use seo_integrity::{
    BackoffRetryController, BoundedConcurrencyScheduler, ContentTooShort, ExtractError,
    MultiPathFetcher, ProgressEvent, ProgressObserver,
};
use seo_integrity_cli::commands::{self, batch, fetch, text};
use seo_integrity_cli::config::load_config;
use seo_integrity_cli::transport::StdioTransport;

#[derive(Parser)]
#[command(
    name = "seo-integrity",
    about = "Resilient fetching and integrity repair for generated SEO content",
    version
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(short, long, global = true)]
    config: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", global = true)]
    log_level: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract a JSON payload from noisy model output.
    Extract {
        /// Input file (stdin when absent).
        file: Option<PathBuf>,
    },

    /// Validate, repair and resolve internal link placeholders.
    Links {
        /// JSON array of {key, displayName, url} destinations.
        #[arg(short, long)]
        directory: PathBuf,

        /// Minimum number of links (overrides config).
        #[arg(long)]
        min_links: Option<usize>,

        /// Document (stdin when absent).
        doc: Option<PathBuf>,
    },

    /// Fix duplicate embedded media identifiers.
    Media {
        /// JSON array of intended media items or identifiers.
        #[arg(short, long)]
        items: PathBuf,

        /// Document (stdin when absent).
        doc: Option<PathBuf>,
    },

    /// Fetch a URL directly or through fallback paths, with retries.
    Fetch {
        url: String,

        #[arg(short = 'X', long, default_value = "GET")]
        method: String,

        /// Request header as "Name: value" (repeatable).
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,

        #[arg(short, long)]
        body: Option<String>,
    },

    /// Fetch a list of URLs (one per line) with bounded concurrency.
    BatchFetch {
        file: PathBuf,

        /// Concurrent workers (overrides config).
        #[arg(long)]
        concurrency: Option<usize>,
    },

    /// Check that a document meets the minimum word count.
    Quality {
        /// Document (stdin when absent).
        doc: Option<PathBuf>,

        /// Minimum visible words (overrides config).
        #[arg(long)]
        min_words: Option<usize>,
    },

    /// Run as a worker answering JSON envelopes over stdio.
    Serve,

    /// Print the effective configuration as TOML.
    Config,

    /// Generate shell completion scripts.
    ///
    /// Examples:
    ///   seo-integrity completions bash > ~/.local/share/bash-completion/completions/seo-integrity
    ///   seo-integrity completions zsh > ~/.zfunc/_seo-integrity
    Completions {
        /// Shell type (bash, zsh, fish, powershell, elvish).
        shell: Shell,
    },
}

fn log_progress(event: &ProgressEvent) {
    tracing::debug!(?event, "progress");
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&cli.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Commands::Completions { shell } = cli.command {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "seo-integrity", &mut std::io::stdout());
        return Ok(());
    }

    let (config, source) = load_config(cli.config.as_deref()).context("loading configuration")?;
    let observer: Arc<dyn ProgressObserver> = Arc::new(log_progress);

    match cli.command {
        Commands::Extract { file } => {
            let input = commands::read_input(file.as_deref())?;
            match text::extract_cmd(&input) {
                Ok(payload) => println!("{payload}"),
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    if let Some(candidate) = e.downcast_ref::<ExtractError>().and_then(|x| x.candidate()) {
                        eprintln!("Attempted candidate:\n{candidate}");
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Links {
            directory,
            min_links,
            doc,
        } => {
            let document = commands::read_input(doc.as_deref())?;
            let directory_json = std::fs::read_to_string(&directory)
                .with_context(|| format!("reading {}", directory.display()))?;
            let outcome = text::links_cmd(&config, &document, &directory_json, min_links)?;
            print!("{}", outcome.document);
        }

        Commands::Media { items, doc } => {
            let document = commands::read_input(doc.as_deref())?;
            let items_json = std::fs::read_to_string(&items)
                .with_context(|| format!("reading {}", items.display()))?;
            print!("{}", text::media_cmd(&config, &document, &items_json)?);
        }

        Commands::Fetch {
            url,
            method,
            headers,
            body,
        } => {
            let request = fetch::build_request(&method, &headers, body)?;
            let fetcher = MultiPathFetcher::new(config.fetch.clone());
            let controller =
                BackoffRetryController::new(config.retry.clone()).with_observer(observer.clone());
            let response =
                fetch::fetch_with_retry(&fetcher, &controller, &url, &request, observer.as_ref())
                    .await?;
            tracing::info!(status = response.status, path = %response.path, "fetched");
            print!("{}", response.body);
        }

        Commands::BatchFetch { file, concurrency } => {
            let urls = batch::parse_url_list(&commands::read_input(Some(file.as_path()))?);
            let fetcher = MultiPathFetcher::new(config.fetch.clone());
            let controller =
                BackoffRetryController::new(config.retry.clone()).with_observer(observer.clone());
            let scheduler = BoundedConcurrencyScheduler::new(
                concurrency.unwrap_or(config.scheduler.concurrency),
            )
            .with_observer(observer.clone());

            let stop = Arc::new(AtomicBool::new(false));
            let flag = stop.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    tracing::warn!("interrupt received, finishing in-flight fetches");
                    flag.store(true, Ordering::SeqCst);
                }
            });

            let (entries, report) = batch::batch_fetch(
                &fetcher,
                &controller,
                &scheduler,
                urls,
                observer.as_ref(),
                stop,
            )
            .await;
            for entry in &entries {
                println!("{}", serde_json::to_string(entry)?);
            }
            tracing::info!(
                total = report.total,
                completed = report.completed,
                skipped = report.drained,
                "batch finished"
            );
        }

        Commands::Quality { doc, min_words } => {
            let document = commands::read_input(doc.as_deref())?;
            match text::quality_cmd(&config, &document, min_words) {
                Ok(words) => println!("ok: {words} words"),
                Err(e) => {
                    eprintln!("Error: {e:#}");
                    if let Some(short) = e.downcast_ref::<ContentTooShort>() {
                        // Salvaged content goes to stdout for the caller to keep.
                        print!("{}", short.content);
                    }
                    std::process::exit(1);
                }
            }
        }

        Commands::Serve => {
            let transport = StdioTransport::new(config);
            transport.run().await?;
        }

        Commands::Config => {
            if let Some(path) = source {
                println!("# loaded from {}", path.display());
            }
            print!("{}", config.to_toml_string()?);
        }

        Commands::Completions { .. } => {}
    }

    Ok(())
}
