// crates/server/src/probe.rs
//! One-shot metadata lookup used to fill quality and subtitle pickers.

use std::time::Duration;

use mediadl_core::cookies::write_cookie_file;
use mediadl_core::invocation::{check_url, probe_args};
use mediadl_core::MediaInfo;

use crate::config::ToolConfig;
use crate::jobs::{JobError, ProcessSupervisor};
use crate::metrics::record_probe;

/// Runs the tool's JSON dump mode in a scratch directory that is removed
/// afterwards, together with any cookie file written into it.
#[derive(Debug, Clone)]
pub struct MetadataProbe {
    supervisor: ProcessSupervisor,
    timeout: Duration,
}

impl MetadataProbe {
    pub fn new(tool: ToolConfig, timeout: Duration) -> Self {
        Self {
            supervisor: ProcessSupervisor::new(tool),
            timeout,
        }
    }

    pub async fn probe(&self, url: &str, cookies: Option<&str>) -> Result<MediaInfo, JobError> {
        let result = self.run(url, cookies).await;
        record_probe(result.is_ok());
        result
    }

    async fn run(&self, url: &str, cookies: Option<&str>) -> Result<MediaInfo, JobError> {
        let url = url.trim();
        check_url(url)?;

        let scratch = tempfile::Builder::new()
            .prefix("mediadl-probe-")
            .tempdir()
            .map_err(|e| JobError::io(std::env::temp_dir(), e))?;
        let cookie_file = match cookies {
            Some(raw) => write_cookie_file(raw, scratch.path())?,
            None => None,
        };

        let args = probe_args(url, cookie_file.as_deref());
        let output = tokio::time::timeout(self.timeout, self.supervisor.output(&args, scratch.path()))
            .await
            .map_err(|_| {
                tracing::warn!(url, timeout_ms = self.timeout.as_millis() as u64, "metadata probe timed out");
                JobError::ProbeTimeout(self.timeout)
            })??;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::info!(url, code = ?output.status.code(), "metadata probe rejected url");
            return Err(JobError::Probe(if stderr.is_empty() {
                format!("exit status {}", output.status)
            } else {
                stderr
            }));
        }

        Ok(MediaInfo::from_json(&output.stdout)?)
    }
}
