//! Testing helpers.
//!
//! Captures formatted log output so tests can assert on what was logged.

use std::io;
use std::sync::{Arc, Mutex};
use tracing::subscriber::DefaultGuard;

/// Log lines written while the returned guard is alive
#[derive(Clone, Default)]
pub struct CapturedLogs {
    buf: Arc<Mutex<Vec<u8>>>,
}

impl CapturedLogs {
    /// Install a thread-local subscriber that records every level into `self`.
    ///
    /// Async tests must run on the current-thread runtime (the `#[tokio::test]`
    /// default) for events to land here.
    #[must_use]
    pub fn install(&self) -> DefaultGuard {
        let logs = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || logs.clone())
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    /// Captured lines at `level` (e.g. `"ERROR"`)
    pub fn lines_at(&self, level: &str) -> Vec<String> {
        let buf = self.buf.lock().map(|b| b.clone()).unwrap_or_default();
        String::from_utf8_lossy(&buf)
            .lines()
            .filter(|line| line.split_whitespace().any(|word| word == level))
            .map(ToString::to_string)
            .collect()
    }
}

impl io::Write for CapturedLogs {
    fn write(&mut self, data: &[u8]) -> io::Result<usize> {
        if let Ok(mut buf) = self.buf.lock() {
            buf.extend_from_slice(data);
        }
        Ok(data.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
