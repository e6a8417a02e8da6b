// crates/server/src/jobs/parser.rs
//! Async line reader that feeds the tool's output into the job store.
//!
//! Two readers run per job, one per output stream, and both write to the
//! same entry; whichever writes last wins.

use std::collections::VecDeque;
use std::sync::Arc;

use mediadl_core::observe_line;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};

use super::store::JobStore;
use super::types::JobId;

/// Lines kept for the failure diagnostic.
pub const TAIL_LINES: usize = 20;

/// What a reader saw by the time its stream ended.
#[derive(Debug, Default)]
pub struct ParseOutcome {
    pub lines: usize,
    pub tail: VecDeque<String>,
}

impl ParseOutcome {
    fn push(&mut self, line: &str) {
        self.lines += 1;
        if self.tail.len() == TAIL_LINES {
            self.tail.pop_front();
        }
        self.tail.push_back(line.to_string());
    }

    /// Last lines joined, trimmed.
    pub fn diagnostic(&self) -> String {
        let joined: Vec<&str> = self.tail.iter().map(String::as_str).collect();
        joined.join("\n").trim().to_string()
    }
}

/// Read `reader` to end-of-stream, applying every line to job `id`.
///
/// Carriage returns are treated as line breaks so in-place progress bars are
/// seen too. Invalid UTF-8 is replaced, never fatal.
pub async fn parse_stream<R>(
    store: Arc<JobStore>,
    id: JobId,
    reader: R,
    stream: &'static str,
) -> ParseOutcome
where
    R: AsyncRead + Unpin,
{
    let mut reader = BufReader::new(reader);
    let mut outcome = ParseOutcome::default();
    let mut buf = Vec::new();

    loop {
        buf.clear();
        match reader.read_until(b'\n', &mut buf).await {
            Ok(0) => break,
            Ok(_) => {
                let text = String::from_utf8_lossy(&buf);
                for line in text.split(['\r', '\n']).filter(|l| !l.trim().is_empty()) {
                    let obs = observe_line(line);
                    if !obs.is_empty() {
                        store.observe(&id, obs);
                    }
                    outcome.push(line);
                }
            }
            Err(e) => {
                tracing::debug!(job_id = %id, stream, error = %e, "output stream read failed");
                break;
            }
        }
    }

    tracing::trace!(job_id = %id, stream, lines = outcome.lines, "output stream closed");
    outcome
}
