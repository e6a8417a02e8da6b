// crates/server/src/config.rs
//! Command-line and environment configuration.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use clap::Parser;

/// Web front end for a yt-dlp compatible download tool.
#[derive(Debug, Clone, Parser)]
#[command(name = "mediadl", version, about)]
pub struct Config {
    /// Address to listen on.
    #[arg(long, env = "MEDIADL_ADDR", default_value = "127.0.0.1:9191")]
    pub addr: SocketAddr,

    /// Directory holding one sub-directory per job.
    #[arg(long, env = "MEDIADL_DOWNLOADS_DIR", default_value = "downloads")]
    pub downloads_dir: PathBuf,

    /// Download tool executable.
    #[arg(long, env = "MEDIADL_TOOL", default_value = "yt-dlp")]
    pub tool: String,

    /// Progress stream poll interval.
    #[arg(long, env = "MEDIADL_POLL_INTERVAL_MS", default_value_t = 400)]
    pub poll_interval_ms: u64,

    /// Wait between artifact size samples.
    #[arg(long, env = "MEDIADL_SETTLE_INTERVAL_MS", default_value_t = 500)]
    pub settle_interval_ms: u64,

    /// Upper bound for a metadata probe.
    #[arg(long, env = "MEDIADL_PROBE_TIMEOUT_SECS", default_value_t = 60)]
    pub probe_timeout_secs: u64,
}

/// Settings for job execution and progress streaming.
#[derive(Debug, Clone)]
pub struct JobConfig {
    pub downloads_dir: PathBuf,
    pub poll_interval: Duration,
    pub settle_interval: Duration,
}

/// How to invoke the external tool. `leading_args` go before the
/// per-invocation arguments.
#[derive(Debug, Clone)]
pub struct ToolConfig {
    pub program: String,
    pub leading_args: Vec<String>,
}

impl Config {
    pub fn job_config(&self) -> JobConfig {
        JobConfig {
            downloads_dir: self.downloads_dir.clone(),
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            settle_interval: Duration::from_millis(self.settle_interval_ms),
        }
    }

    pub fn tool_config(&self) -> ToolConfig {
        ToolConfig {
            program: self.tool.clone(),
            leading_args: Vec::new(),
        }
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}
