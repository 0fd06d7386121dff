use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use dashmap::DashMap;
use parking_lot::Mutex;
use tokio::sync::Semaphore;
use tokio::task::{self, JoinHandle};
use tokio::time::sleep;
use tracing::{debug, trace, warn};

use crate::analysis::{Analysis, AnalysisObserver, Analyzer};
use crate::diag::Diagnostic;
use crate::file::{FileId, FileKind};
use crate::sched::{Phase, Publication, PublishSink, SchedulerConfig, VersionToken, Wave};
use crate::util::content_hash;

struct DocState {
    kind: FileKind,
    text: Arc<str>,
    counter: Arc<AtomicU64>,
    phase: Phase,
    timer: Option<JoinHandle<()>>,
    latest: Option<Arc<Analysis>>,
    last_good: Option<Arc<Analysis>>,
    published: Option<(u64, Wave)>,
}

impl DocState {
    fn version(&self) -> u64 {
        self.counter.load(Ordering::Acquire)
    }

    fn bump(&self) -> u64 {
        self.counter.fetch_add(1, Ordering::AcqRel) + 1
    }
}

struct Inner {
    analyzer: Analyzer,
    docs: DashMap<FileId, DocState>,
    sink: Arc<dyn PublishSink>,
    config: Mutex<SchedulerConfig>,
    limiter: Mutex<Arc<Semaphore>>,
}

/// Owns the state of every open document. Must be used inside a tokio runtime.
#[derive(Clone)]
pub struct Scheduler {
    inner: Arc<Inner>,
}

impl Scheduler {
    pub fn new(analyzer: Analyzer, config: SchedulerConfig, sink: Arc<dyn PublishSink>) -> Self {
        let permits = config.workers.max(1);
        Self {
            inner: Arc::new(Inner {
                analyzer,
                docs: DashMap::new(),
                sink,
                config: Mutex::new(config),
                limiter: Mutex::new(Arc::new(Semaphore::new(permits))),
            }),
        }
    }

    pub fn analyzer(&self) -> &Analyzer {
        &self.inner.analyzer
    }

    pub fn config(&self) -> SchedulerConfig {
        self.inner.config.lock().clone()
    }

    /// New settings apply to runs scheduled from now on.
    pub fn reconfigure(&self, config: SchedulerConfig) {
        let permits = config.workers.max(1);
        *self.inner.limiter.lock() = Arc::new(Semaphore::new(permits));
        *self.inner.config.lock() = config;
    }

    /// Start tracking a document and analyze it right away.
    pub fn open(&self, file: FileId, kind: FileKind, text: String) -> VersionToken {
        // Reopening keeps the counter so runs for the old text go stale.
        let counter = match self.inner.docs.get(&file) {
            Some(old) => {
                if let Some(timer) = &old.timer {
                    timer.abort();
                }
                old.counter.clone()
            }
            None => Arc::new(AtomicU64::new(0)),
        };
        let doc = DocState {
            kind,
            text: Arc::from(text),
            counter,
            phase: Phase::Pending,
            timer: None,
            latest: None,
            last_good: None,
            published: None,
        };
        let token = VersionToken::new(file, doc.bump(), doc.counter.clone());
        self.inner.docs.insert(file, doc);

        let timer = self.spawn(token.clone(), Duration::ZERO);
        if let Some(mut doc) = self.inner.docs.get_mut(&file) {
            doc.timer = Some(timer);
        }
        debug!(%file, version = token.version, "document opened");
        token
    }

    /// Replace a document's text. `None` when the document is not open.
    pub fn change(&self, file: FileId, text: String) -> Option<VersionToken> {
        let mut doc = self.inner.docs.get_mut(&file)?;
        if let Some(timer) = doc.timer.take() {
            timer.abort();
        }
        let delay = self.inner.config.lock().delay_for(text.len());
        doc.text = Arc::from(text);
        let token = VersionToken::new(file, doc.bump(), doc.counter.clone());
        doc.phase = Phase::Pending;
        doc.timer = Some(self.spawn(token.clone(), delay));
        trace!(%file, version = token.version, ?delay, "change scheduled");
        Some(token)
    }

    /// Stop tracking a document and clear its diagnostics.
    pub fn close(&self, file: FileId) {
        let Some((_, doc)) = self.inner.docs.remove(&file) else {
            return;
        };
        if let Some(timer) = &doc.timer {
            timer.abort();
        }
        let version = doc.bump();
        self.inner.sink.publish(Publication {
            file,
            version,
            wave: Wave::Full,
            diagnostics: Vec::new(),
        });
        debug!(%file, version, "document closed");
    }

    pub fn is_open(&self, file: FileId) -> bool {
        self.inner.docs.contains_key(&file)
    }

    pub fn version(&self, file: FileId) -> Option<u64> {
        self.inner.docs.get(&file).map(|d| d.version())
    }

    pub fn phase(&self, file: FileId) -> Option<Phase> {
        self.inner.docs.get(&file).map(|d| d.phase)
    }

    pub fn text(&self, file: FileId) -> Option<Arc<str>> {
        self.inner.docs.get(&file).map(|d| d.text.clone())
    }

    /// Most recent finished analysis, possibly of an older version.
    pub fn latest(&self, file: FileId) -> Option<Arc<Analysis>> {
        self.inner.docs.get(&file).and_then(|d| d.latest.clone())
    }

    /// Most recent analysis whose tree parsed without errors.
    pub fn last_good(&self, file: FileId) -> Option<Arc<Analysis>> {
        self.inner.docs.get(&file).and_then(|d| d.last_good.clone())
    }

    pub fn open_files(&self) -> Vec<FileId> {
        self.inner.docs.iter().map(|e| *e.key()).collect()
    }

    fn spawn(&self, token: VersionToken, delay: Duration) -> JoinHandle<()> {
        let inner = self.inner.clone();
        tokio::spawn(async move { inner.run(token, delay).await })
    }
}

impl Inner {
    async fn run(self: Arc<Self>, token: VersionToken, delay: Duration) {
        if !delay.is_zero() {
            sleep(delay).await;
        }
        if !token.is_current() {
            trace!(file = %token.file, version = token.version, "stale before analysis");
            return;
        }
        let file = token.file;
        let (text, kind, cached) = {
            let Some(mut doc) = self.docs.get_mut(&file) else { return };
            doc.phase = Phase::Analyzing;
            (doc.text.clone(), doc.kind, doc.latest.clone())
        };

        let hash = content_hash(&text);
        let generation = self.analyzer.index().generation();
        if let Some(cached) = cached.filter(|c| c.content_hash == hash && c.index_generation == generation) {
            trace!(%file, version = token.version, "reusing cached analysis");
            self.finish(&token, cached);
            return;
        }

        let limiter = self.limiter.lock().clone();
        let Ok(permit) = limiter.acquire_owned().await else { return };
        if !token.is_current() {
            return;
        }
        let worker = self.clone();
        let worker_token = token.clone();
        let result = task::spawn_blocking(move || {
            let _permit = permit;
            let mut observer = Staged {
                inner: &worker,
                token: &worker_token,
            };
            worker
                .analyzer
                .analyze_observed(file, kind, worker_token.version, &text, &mut observer)
        })
        .await;

        match result {
            Ok(analysis) => self.finish(&token, Arc::new(analysis)),
            Err(err) => warn!(%file, version = token.version, "analysis task failed: {err}"),
        }
    }

    fn finish(&self, token: &VersionToken, analysis: Arc<Analysis>) {
        let Some(mut doc) = self.docs.get_mut(&token.file) else { return };
        let newer = doc.latest.as_ref().is_none_or(|l| l.version <= analysis.version);
        if newer {
            if analysis.is_clean() {
                doc.last_good = Some(analysis.clone());
            }
            doc.latest = Some(analysis.clone());
        }
        if !token.is_current() {
            return;
        }
        doc.phase = Phase::Idle;
        doc.timer = None;
        self.publish_locked(&mut doc, token, Wave::Full, analysis.diagnostics.clone());
    }

    fn publish(&self, token: &VersionToken, wave: Wave, diagnostics: Vec<Diagnostic>) {
        if let Some(mut doc) = self.docs.get_mut(&token.file) {
            self.publish_locked(&mut doc, token, wave, diagnostics);
        }
    }

    /// Publish unless stale or not newer than the last publication.
    fn publish_locked(&self, doc: &mut DocState, token: &VersionToken, wave: Wave, diagnostics: Vec<Diagnostic>) {
        if !token.is_current() {
            return;
        }
        let stamp = (token.version, wave);
        if doc.published.is_some_and(|last| last >= stamp) {
            trace!(file = %token.file, version = token.version, ?wave, "publication superseded");
            return;
        }
        doc.published = Some(stamp);
        self.sink.publish(Publication {
            file: token.file,
            version: token.version,
            wave,
            diagnostics,
        });
    }
}

/// Publishes wave 1 mid-run and stops a stale run from touching the index.
struct Staged<'a> {
    inner: &'a Inner,
    token: &'a VersionToken,
}

impl AnalysisObserver for Staged<'_> {
    fn syntax_ready(&mut self, diagnostics: &[Diagnostic]) {
        self.inner.publish(self.token, Wave::Syntax, diagnostics.to_vec());
    }

    fn is_current(&self) -> bool {
        self.token.is_current()
    }
}
