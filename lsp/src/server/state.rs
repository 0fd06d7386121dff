use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::OnceCell;
use ropey::Rope;
use tokio::sync::mpsc::UnboundedReceiver;
use tower_lsp::lsp_types::{Location, Url};
use tower_lsp::Client;
use tracing::{debug, trace};

use pdx_core::index;
use pdx_core::sched::{ChannelSink, Publication, Scheduler, SchedulerConfig};
use pdx_core::{Analysis, Analyzer, FileId, FileKind, FileRegistry};

use super::convert::{to_lsp_diagnostic, to_lsp_range};

/// An open document as the editor sees it.
#[derive(Debug)]
pub(crate) struct Document {
    pub(crate) rope: Rope,
    pub(crate) file: FileId,
}

pub(crate) struct PdxLanguageServer {
    pub(crate) client: Client,
    pub(crate) registry: Arc<FileRegistry>,
    pub(crate) scheduler: Scheduler,
    pub(crate) documents: Arc<DashMap<Url, Document>>,
    // Kept after close so the final empty publication still finds its uri.
    pub(crate) uris: Arc<DashMap<FileId, Url>>,
    pub(crate) root: OnceCell<PathBuf>,
}

impl PdxLanguageServer {
    pub(crate) fn new(client: Client) -> Self {
        let (sink, rx) = ChannelSink::new();
        let scheduler = Scheduler::new(Analyzer::with_defaults(), SchedulerConfig::default(), Arc::new(sink));
        let documents = Arc::new(DashMap::new());
        let uris = Arc::new(DashMap::new());
        tokio::spawn(forward_publications(client.clone(), rx, documents.clone(), uris.clone()));
        Self {
            client,
            registry: Arc::new(FileRegistry::new()),
            scheduler,
            documents,
            uris,
            root: OnceCell::new(),
        }
    }

    /// Intern `uri` and work out what kind of file it is.
    pub(crate) fn resolve(&self, uri: &Url) -> (FileId, FileKind) {
        let path = uri_to_path(uri);
        let file = self.registry.intern(&path);
        self.uris.entry(file).or_insert_with(|| uri.clone());
        (file, FileKind::from_path(&path))
    }

    pub(crate) fn latest(&self, uri: &Url) -> Option<(Arc<Analysis>, Rope)> {
        let doc = self.documents.get(uri)?;
        let analysis = self.scheduler.latest(doc.file)?;
        Some((analysis, doc.rope.clone()))
    }

    pub(crate) fn to_location(&self, location: index::Location) -> Option<Location> {
        let uri = match self.uris.get(&location.file) {
            Some(uri) => uri.clone(),
            None => Url::from_file_path(self.registry.path(location.file)?).ok()?,
        };
        let rope = self.documents.get(&uri).map(|d| d.rope.clone());
        Some(Location::new(uri, to_lsp_range(rope.as_ref(), location.span)))
    }

    /// Re-run analysis for every open document, e.g. after the index changed wholesale.
    pub(crate) fn reanalyze_open(&self) {
        for file in self.scheduler.open_files() {
            if let Some(text) = self.scheduler.text(file) {
                self.scheduler.change(file, text.to_string());
            }
        }
    }
}

pub(crate) fn uri_to_path(uri: &Url) -> PathBuf {
    uri.to_file_path().unwrap_or_else(|_| PathBuf::from(uri.path()))
}

async fn forward_publications(
    client: Client,
    mut rx: UnboundedReceiver<Publication>,
    documents: Arc<DashMap<Url, Document>>,
    uris: Arc<DashMap<FileId, Url>>,
) {
    while let Some(publication) = rx.recv().await {
        let Some(uri) = uris.get(&publication.file).map(|u| u.clone()) else {
            trace!(file = %publication.file, "publication for unknown file");
            continue;
        };
        let rope = documents.get(&uri).map(|d| d.rope.clone());
        let diagnostics = publication
            .diagnostics
            .iter()
            .map(|d| to_lsp_diagnostic(rope.as_ref(), d))
            .collect();
        debug!(%uri, version = publication.version, wave = ?publication.wave, "publishing diagnostics");
        client.publish_diagnostics(uri, diagnostics, None).await;
    }
}
