//! Capture of emulator stdout/stderr
//!
//! Output is piped so the invoking terminal stays clean and so that it can
//! be attached to startup errors. It is never parsed for control decisions.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Child;
use tokio::task::JoinHandle;

/// Lines kept per process; older lines are dropped first
pub const MAX_DIAGNOSTIC_LINES: usize = 200;

/// Bounded buffer of the most recent output lines of a child process
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    lines: Arc<Mutex<VecDeque<String>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, line: String) {
        let mut lines = match self.lines.lock() {
            Ok(lines) => lines,
            Err(poisoned) => poisoned.into_inner(),
        };
        if lines.len() == MAX_DIAGNOSTIC_LINES {
            lines.pop_front();
        }
        lines.push_back(line);
    }

    pub fn snapshot(&self) -> Vec<String> {
        match self.lines.lock() {
            Ok(lines) => lines.iter().cloned().collect(),
            Err(poisoned) => poisoned.into_inner().iter().cloned().collect(),
        }
    }
}

/// Spawn tasks draining the child's piped stdout and stderr into `diagnostics`.
///
/// Draining also keeps the child from blocking on a full pipe.
pub fn spawn_output_consumers(child: &mut Child, diagnostics: &Diagnostics) -> Vec<JoinHandle<()>> {
    let mut readers = Vec::new();

    if let Some(stdout) = child.stdout.take() {
        readers.push(spawn_reader(stdout, "stdout", diagnostics.clone()));
    }

    if let Some(stderr) = child.stderr.take() {
        readers.push(spawn_reader(stderr, "stderr", diagnostics.clone()));
    }

    readers
}

fn spawn_reader<R>(stream: R, label: &'static str, diagnostics: Diagnostics) -> JoinHandle<()>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut lines = BufReader::new(stream).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            tracing::trace!(target: "dsemu::diagnostics", stream = label, "{}", line);
            diagnostics.push(format!("[{label}] {line}"));
        }
    })
}

/// Give readers up to `limit` to reach end of stream, then stop waiting
pub async fn drain(readers: &mut Vec<JoinHandle<()>>, limit: Duration) {
    for reader in readers.drain(..) {
        if tokio::time::timeout(limit, reader).await.is_err() {
            tracing::trace!(target: "dsemu::diagnostics", "output reader still open after {:?}", limit);
        }
    }
}
