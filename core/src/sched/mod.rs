//! Debounced, version-guarded re-analysis of open documents.
//!
//! Each document moves `Idle -> Pending -> Analyzing -> Idle`. An edit bumps
//! the document's version and restarts its timer. The version counter is the
//! only cancellation signal: a run whose [`VersionToken`] went stale drops its
//! output, and publishing refuses anything not newer than what was already
//! published for that document.

mod scheduler;


use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::diag::Diagnostic;
use crate::file::FileId;

pub use scheduler::Scheduler;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Debounce for an empty document.
    #[serde(with = "millis")]
    pub base_delay: Duration,
    /// Extra debounce per KiB of text.
    #[serde(with = "millis")]
    pub per_kib: Duration,
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Analyses allowed to run at once.
    pub workers: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(75),
            per_kib: Duration::from_millis(5),
            max_delay: Duration::from_millis(750),
            workers: 2,
        }
    }
}

impl SchedulerConfig {
    pub fn delay_for(&self, len: usize) -> Duration {
        let kib = u32::try_from(len / 1024).unwrap_or(u32::MAX);
        self.base_delay
            .saturating_add(self.per_kib.saturating_mul(kib))
            .min(self.max_delay)
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Wave {
    /// Tree errors only, sent as soon as parsing finishes.
    Syntax,
    /// Everything.
    Full,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Phase {
    Idle,
    Pending,
    Analyzing,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Publication {
    pub file: FileId,
    pub version: u64,
    pub wave: Wave,
    pub diagnostics: Vec<Diagnostic>,
}

/// Where results go. Called with the document's state locked, so
/// implementations must not block.
pub trait PublishSink: Send + Sync + 'static {
    fn publish(&self, publication: Publication);
}

/// Forwards publications over an unbounded tokio channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<Publication>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<Publication>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl PublishSink for ChannelSink {
    fn publish(&self, publication: Publication) {
        // Receiver gone means the front is shutting down.
        let _ = self.tx.send(publication);
    }
}

/// A document version captured when work was scheduled.
#[derive(Debug, Clone)]
pub struct VersionToken {
    pub file: FileId,
    pub version: u64,
    current: Arc<AtomicU64>,
}

impl VersionToken {
    pub(crate) fn new(file: FileId, version: u64, current: Arc<AtomicU64>) -> Self {
        Self { file, version, current }
    }

    /// False once the document was edited or closed after this token was taken.
    pub fn is_current(&self) -> bool {
        self.current.load(Ordering::Acquire) == self.version
    }
}
