//! # PerDocMan CLI (`perdocman`)
//!
//! The `perdocman` binary manages a local PDF vault: ingesting documents,
//! browsing what is stored, auditing sessions, resetting the vault, and
//! starting the local web interface.
//!
//! ## Usage
//!
//! ```bash
//! perdocman --vault ./vault <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `perdocman init` | Create the vault directory and metadata store |
//! | `perdocman ingest <paths>...` | Copy PDFs into the vault |
//! | `perdocman list` | List stored documents, newest first |
//! | `perdocman get <id>` | Show one document record |
//! | `perdocman stats` | Vault summary |
//! | `perdocman sessions` | Recent sessions (audit trail) |
//! | `perdocman reset --yes` | Delete every stored document and record |
//! | `perdocman serve [--open]` | Start the local web interface |
//!
//! Every command runs inside a session, so the audit trail records who used
//! the vault and when.

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use perdocman::config::{self, VaultPaths};
use perdocman::logging::{self, LogFormat, LogPreset};
use perdocman::session::{ActiveSession, Operator, SessionTracker};
use perdocman::{get, server, stats, Classification, Vault};

/// PerDocMan, a local PDF vault with content-addressed deduplication.
#[derive(Parser)]
#[command(
    name = "perdocman",
    about = "PerDocMan: a local, single-user PDF vault",
    version,
    long_about = "PerDocMan copies PDF documents into a managed vault under collision-free \
    names, refuses byte-identical duplicates, records metadata in SQLite, and keeps an \
    audit trail of every session."
)]
struct Cli {
    /// Path to configuration file (TOML). A missing file means defaults.
    #[arg(long, global = true, default_value = "./perdocman.toml")]
    config: PathBuf,

    /// Vault root directory. Overrides `[vault].root` from the config.
    #[arg(long, global = true, env = "PERDOCMAN_VAULT_ROOT")]
    vault: Option<PathBuf>,

    /// Debug-level logging.
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Warnings and errors only.
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Log output format: `text` or `json`.
    #[arg(long, global = true, default_value = "text")]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the vault directory and metadata store.
    ///
    /// Idempotent: an existing vault and its data are left untouched.
    Init,

    /// Copy PDF files into the vault.
    ///
    /// Directories are searched recursively for `.pdf` files. Content that
    /// is already stored is reported and skipped.
    Ingest {
        /// Files or directories to ingest.
        #[arg(required = true)]
        paths: Vec<PathBuf>,

        /// Category label, e.g. `finance`.
        #[arg(long)]
        category: Option<String>,

        /// Comma-separated tags, e.g. `bank,statement`.
        #[arg(long)]
        tags: Option<String>,

        /// Document date (YYYY-MM-DD).
        #[arg(long, value_parser = parse_doc_date)]
        date: Option<String>,
    },

    /// List stored documents, newest first.
    List {
        /// Maximum number of documents to show.
        #[arg(long, default_value_t = 50)]
        limit: i64,
    },

    /// Show one document record, including its preview.
    Get {
        /// Document id.
        id: i64,
    },

    /// Show vault statistics.
    Stats,

    /// Show recent sessions.
    Sessions {
        /// Maximum number of sessions to show.
        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Delete every stored document file, document record and session.
    ///
    /// The schema is kept, so the vault is usable immediately afterwards.
    Reset {
        /// Confirm the reset. Without it nothing is deleted.
        #[arg(long)]
        yes: bool,
    },

    /// Start the local web interface.
    ///
    /// Binds `[server].bind` (an OS-chosen port by default) and prints the URL.
    Serve {
        /// Override `[server].bind`, e.g. `127.0.0.1:8080`.
        #[arg(long)]
        bind: Option<String>,

        /// Open the URL in the default browser once the server is up.
        #[arg(long)]
        open: bool,
    },
}

fn parse_doc_date(s: &str) -> Result<String, String> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map(|_| s.to_string())
        .map_err(|_| format!("expected YYYY-MM-DD, got '{}'", s))
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(LogPreset::from_flags(cli.verbose, cli.quiet), cli.log_format);

    let mut cfg = config::load_config(&cli.config)?;
    let root = resolve_root(cli.vault.unwrap_or(cfg.vault.root.clone()))?;
    let paths = VaultPaths::from_root(&root);

    let vault = Arc::new(
        Vault::open(paths, cfg.ingest.clone())
            .await
            .with_context(|| format!("Failed to open vault at {}", root.display()))?,
    );
    let tracker = SessionTracker::new(vault.store().clone(), Operator::detect());

    let result = match cli.command {
        Commands::Init => {
            bracketed(&tracker, &root, "cli: init", async {
                println!("Vault initialized at {}", root.display());
                Ok(())
            })
            .await
        }
        Commands::Ingest {
            paths,
            category,
            tags,
            date,
        } => {
            let classification = Classification {
                category,
                tags,
                doc_date: date,
            }
            .normalized();
            bracketed(
                &tracker,
                &root,
                "cli: ingest",
                run_ingest(&vault, &paths, &classification),
            )
            .await
        }
        Commands::List { limit } => {
            bracketed(&tracker, &root, "cli: list", get::run_list(&vault, limit)).await
        }
        Commands::Get { id } => {
            bracketed(&tracker, &root, "cli: get", get::run_get(&vault, id)).await
        }
        Commands::Stats => {
            bracketed(&tracker, &root, "cli: stats", stats::run_stats(&vault)).await
        }
        Commands::Sessions { limit } => {
            bracketed(
                &tracker,
                &root,
                "cli: sessions",
                stats::run_sessions(&vault, limit),
            )
            .await
        }
        Commands::Reset { yes } => {
            if !yes {
                bail!("Refusing to reset without --yes. This deletes every stored document.");
            }
            // The wipe clears the sessions table, so this run's session is
            // opened afterwards and becomes the first entry of the new trail.
            let outcome = run_reset(&vault).await;
            bracketed(&tracker, &root, "cli: reset", async { outcome }).await
        }
        Commands::Serve { bind, open } => {
            if let Some(bind) = bind {
                cfg.server.bind = bind;
            }
            cfg.server.open_browser |= open;

            // A reset over HTTP renews the session, so end whichever is current.
            let session =
                Arc::new(ActiveSession::begin(tracker.clone(), &root, "serve").await?);
            let served = server::run_server(
                vault.clone(),
                &cfg.server,
                Some(session.clone()),
                shutdown_signal(),
            )
            .await;
            session.end().await?;
            served
        }
    };

    vault.close().await;
    result
}

/// Creates the root if needed and returns its absolute form.
fn resolve_root(root: PathBuf) -> Result<PathBuf> {
    std::fs::create_dir_all(&root)
        .with_context(|| format!("Failed to create vault directory {}", root.display()))?;
    root.canonicalize()
        .with_context(|| format!("Failed to resolve vault directory {}", root.display()))
}

/// Runs `work` inside a session. The session is closed whether `work`
/// succeeds, fails, or is interrupted.
async fn bracketed<F>(tracker: &SessionTracker, root: &Path, note: &str, work: F) -> Result<()>
where
    F: Future<Output = Result<()>>,
{
    let session_id = tracker.begin(root, Some(note)).await?;

    let result = tokio::select! {
        r = work => r,
        _ = shutdown_signal() => Err(anyhow::anyhow!("Interrupted")),
    };

    if let Err(e) = tracker.end(&session_id).await {
        tracing::warn!(session = %session_id, error = %e, "failed to close session");
        result?;
        return Err(e.into());
    }
    result
}

async fn run_ingest(vault: &Vault, paths: &[PathBuf], classification: &Classification) -> Result<()> {
    let report = vault.ingest_paths(paths, classification).await;

    for doc in &report.ingested {
        println!(
            "ingested  #{:<5} {}  ->  {}",
            doc.id, doc.original_filename, doc.stored_path
        );
    }
    for (path, existing_id) in &report.duplicates {
        println!(
            "duplicate        {}  (already stored as #{})",
            path.display(),
            existing_id
        );
    }
    for (path, err) in &report.failed {
        eprintln!("failed           {}: {}", path.display(), err);
    }

    let total = report.ingested.len() + report.duplicates.len() + report.failed.len();
    if total == 0 {
        println!("No PDF files found.");
        return Ok(());
    }

    println!();
    println!(
        "{} ingested, {} duplicate(s), {} failed.",
        report.ingested.len(),
        report.duplicates.len(),
        report.failed.len()
    );

    if !report.failed.is_empty() {
        bail!("{} file(s) could not be ingested", report.failed.len());
    }
    Ok(())
}

async fn run_reset(vault: &Vault) -> Result<()> {
    let report = vault.reset().await?;

    for failure in &report.failed {
        eprintln!(
            "could not remove {}: {}",
            failure.path.display(),
            failure.error
        );
    }
    println!(
        "Vault reset: removed {} file(s), deleted {} document record(s) and {} session(s).",
        report.removed.len(),
        report.documents_deleted,
        report.sessions_deleted
    );

    if !report.is_clean() {
        bail!("{} file(s) could not be removed", report.failed.len());
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("shutdown requested");
}
