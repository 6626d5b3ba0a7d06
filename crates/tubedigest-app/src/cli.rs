//! CLI argument definitions for the tubedigest binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use std::num::NonZeroUsize;
use std::path::PathBuf;

use clap::{Parser, Subcommand};

use tubedigest_core::config::DigestConfig;

/// tubedigest: cache-first YouTube transcript summaries.
#[derive(Parser, Debug)]
#[command(name = "tubedigest", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Directory holding the record database.
    #[arg(short = 'd', long = "data-dir", global = true)]
    pub data_dir: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level", global = true)]
    pub log_level: Option<String>,

    /// Base URL of the metadata/transcript/summary service.
    #[arg(short = 'b', long = "backend-url", global = true)]
    pub backend_url: Option<String>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
pub enum Command {
    /// Summarize a video, reusing a stored summary when one exists.
    Submit {
        /// Video URL or id-bearing reference.
        url: String,
    },
    /// List stored summaries, newest first.
    History {
        /// Records per page.
        #[arg(long = "page-size")]
        page_size: Option<NonZeroUsize>,
        /// Number of pages to print.
        #[arg(long = "pages", default_value_t = NonZeroUsize::MIN)]
        pages: NonZeroUsize,
    },
    /// Print the video id a reference normalizes to.
    VideoId {
        url: String,
    },
    /// Open the store, upgrade its schema, and report the result.
    Migrate,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TUBEDIGEST_CONFIG env var > ~/.tubedigest/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TUBEDIGEST_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Resolve the data directory.
    ///
    /// Priority: --data-dir flag > TUBEDIGEST_DATA_DIR env var > config file value.
    pub fn resolve_data_dir(&self, config: &DigestConfig) -> PathBuf {
        if let Some(ref p) = self.data_dir {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TUBEDIGEST_DATA_DIR") {
            return PathBuf::from(p);
        }
        config.general.resolved_data_dir()
    }

    /// Resolve the log level.
    ///
    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config: &DigestConfig) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config.general.log_level.clone())
    }

    /// Resolve the service base URL.
    ///
    /// Priority: --backend-url flag > TUBEDIGEST_BACKEND_URL env var > config file value.
    pub fn resolve_backend_url(&self, config: &DigestConfig) -> String {
        if let Some(ref url) = self.backend_url {
            return url.clone();
        }
        if let Ok(url) = std::env::var("TUBEDIGEST_BACKEND_URL") {
            return url;
        }
        config.backend.base_url.clone()
    }

    /// Fold every override into `config`.
    pub fn apply(&self, config: &mut DigestConfig) {
        config.general.data_dir = self.resolve_data_dir(config).to_string_lossy().to_string();
        config.general.log_level = self.resolve_log_level(config);
        config.backend.base_url = self.resolve_backend_url(config);
        if let Command::History {
            page_size: Some(size),
            ..
        } = self.command
        {
            config.history.page_size = size.get();
        }
    }
}

/// Default config file path for the current platform.
fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tubedigest").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tubedigest").join("config.toml");
    }
    PathBuf::from("config.toml")
}
