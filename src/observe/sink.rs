use std::io::{self, Result as IoResult, Stdout, Write};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

use super::ChangeNotice;

/// Abstraction over an output target that consumes change notices.
pub trait NoticeSink: Sync + Send {
    /// Handle one notice. The sink decides how to render or forward it.
    fn handle(&mut self, notice: &ChangeNotice) -> IoResult<()>;
}

/// Stdout sink: one line per notice.
pub struct StdOutSink {
    handle: Stdout,
}

impl Default for StdOutSink {
    fn default() -> Self {
        Self {
            handle: io::stdout(),
        }
    }
}

impl NoticeSink for StdOutSink {
    fn handle(&mut self, notice: &ChangeNotice) -> IoResult<()> {
        writeln!(self.handle, "{notice}")?;
        self.handle.flush()
    }
}

/// In-memory sink for testing and snapshots.
#[derive(Clone, Default)]
pub struct MemorySink {
    entries: Arc<Mutex<Vec<ChangeNotice>>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of all captured notices so far.
    pub fn snapshot(&self) -> Vec<ChangeNotice> {
        self.entries.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.entries.lock().unwrap().clear();
    }
}

impl NoticeSink for MemorySink {
    fn handle(&mut self, notice: &ChangeNotice) -> IoResult<()> {
        self.entries.lock().unwrap().push(notice.clone());
        Ok(())
    }
}

/// Channel sink for streaming notices to async consumers (live dashboards,
/// SSE endpoints). Forwards without blocking.
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<ChangeNotice>,
}

impl ChannelSink {
    pub fn new(tx: mpsc::UnboundedSender<ChangeNotice>) -> Self {
        Self { tx }
    }
}

impl NoticeSink for ChannelSink {
    fn handle(&mut self, notice: &ChangeNotice) -> IoResult<()> {
        self.tx
            .send(notice.clone())
            .map_err(|_| io::Error::new(io::ErrorKind::BrokenPipe, "channel receiver dropped"))
    }
}
