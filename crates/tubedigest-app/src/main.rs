//! tubedigest application binary - composition root.
//!
//! 1. Parse CLI args and load configuration from TOML
//! 2. Install the tracing subscriber
//! 3. Open the record store (running schema upgrades)
//! 4. Dispatch the subcommand against a `Session` wired to the HTTP service

mod cli;
mod http_backend;
mod render;

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use tubedigest_core::config::DigestConfig;
use tubedigest_core::extract_video_id;
use tubedigest_pipeline::{Session, SubmitError};
use tubedigest_storage::{Database, RecordStore};

use crate::cli::{CliArgs, Command};
use crate::http_backend::HttpBackend;

const DB_FILE: &str = "tubedigest.db";

fn open_database(config: &DigestConfig) -> Result<Arc<Database>, Box<dyn std::error::Error>> {
    let db_path = config.general.resolved_data_dir().join(DB_FILE);
    let db = Database::new(&db_path)?;
    tracing::info!(path = %db_path.display(), "Record store opened");
    Ok(Arc::new(db))
}

fn open_session(config: &DigestConfig) -> Result<Session, Box<dyn std::error::Error>> {
    let store = Arc::new(RecordStore::new(open_database(config)?));
    let backend = Arc::new(HttpBackend::new(&config.backend)?);
    tracing::debug!(base_url = %config.backend.base_url, "HTTP backend ready");
    Ok(Session::new(store, backend, config))
}

async fn submit(config: &DigestConfig, url: &str) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let session = open_session(config)?;

    // Status lines go to stderr so stdout carries only the result.
    let mut progress = session.orchestrator().subscribe();
    let printer = tokio::spawn(async move {
        while progress.changed().await.is_ok() {
            let message = progress.borrow_and_update().message.clone();
            if !message.is_empty() {
                eprintln!("{}", message);
            }
        }
    });

    let result = session.submit(url).await;
    drop(session);
    if let Err(e) = printer.await {
        tracing::debug!(error = %e, "Progress printer stopped");
    }

    match result {
        Ok(res) => {
            print!("{}", render::resolution(&res));
            Ok(ExitCode::SUCCESS)
        }
        Err(SubmitError::EmptyReference) => {
            eprintln!("{}", SubmitError::EmptyReference);
            Ok(ExitCode::from(2))
        }
        Err(SubmitError::Pipeline(failure)) => {
            tracing::debug!(run_id = %failure.run_id, stage = %failure.stage, "Submission failed");
            Ok(ExitCode::FAILURE)
        }
    }
}

async fn history(config: &DigestConfig, pages: usize) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let session = open_session(config)?;
    let mut view = session.history().await;

    if view.total() == 0 {
        println!("No summaries yet.");
        return Ok(ExitCode::SUCCESS);
    }

    for (i, record) in view.visible().iter().enumerate() {
        println!("{}", render::history_entry(i + 1, record));
    }
    for _ in 1..pages {
        if !view.has_more() {
            break;
        }
        let page = view.load_more();
        for (i, record) in page.records.iter().enumerate() {
            println!("{}", render::history_entry(page.offset + i + 1, record));
        }
    }
    if view.has_more() {
        println!(
            "... {} more (use --pages to show more)",
            view.total() - view.visible().len()
        );
    }
    Ok(ExitCode::SUCCESS)
}

fn video_id(url: &str) -> ExitCode {
    match extract_video_id(url) {
        Some(id) => {
            println!("{}", id);
            ExitCode::SUCCESS
        }
        None => {
            eprintln!("Could not extract a video id from {:?}", url.trim());
            ExitCode::FAILURE
        }
    }
}

fn migrate(config: &DigestConfig) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let db = open_database(config)?;
    println!("Schema version: {}", db.schema_version()?);
    for name in db.index_names()? {
        println!("Index: {}", name);
    }
    Ok(ExitCode::SUCCESS)
}

#[tokio::main]
async fn main() -> Result<ExitCode, Box<dyn std::error::Error>> {
    let args = CliArgs::parse();

    // Config.
    let config_file = args.resolve_config_path();
    let (mut config, load_error) = match DigestConfig::load(&config_file) {
        Ok(config) => (config, None),
        Err(e) => (DigestConfig::default(), Some(e)),
    };
    args.apply(&mut config);

    // Tracing.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&config.general.log_level)),
        )
        .init();

    tracing::info!("Starting tubedigest v{}", env!("CARGO_PKG_VERSION"));
    match load_error {
        None => tracing::info!(path = %config_file.display(), "Configuration loaded"),
        Some(e) if config_file.exists() => tracing::warn!(
            path = %config_file.display(),
            error = %e,
            "Failed to load config, using defaults"
        ),
        Some(_) => tracing::debug!(path = %config_file.display(), "No config file, using defaults"),
    }

    match args.command {
        Command::Submit { ref url } => submit(&config, url).await,
        Command::History { pages, .. } => history(&config, pages.get()).await,
        Command::VideoId { ref url } => Ok(video_id(url)),
        Command::Migrate => migrate(&config),
    }
}
