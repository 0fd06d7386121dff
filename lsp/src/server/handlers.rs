use ropey::Rope;
use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::LanguageServer;
use tracing::{info, trace, warn};

use pdx_core::workspace;

use super::convert::{apply_change, position_to_offset};
use super::navigation::{definition_locations, reference_locations, symbol_at};
use super::state::{uri_to_path, Document, PdxLanguageServer};

#[tower_lsp::async_trait]
impl LanguageServer for PdxLanguageServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let root = params
            .workspace_folders
            .as_ref()
            .and_then(|folders| folders.first())
            .map(|f| f.uri.clone())
            .or(params.root_uri);
        info!("pdx language server initializing, root: {:?}", root);
        if let Some(root) = root {
            let _ = self.root.set(uri_to_path(&root));
        }

        Ok(InitializeResult {
            capabilities: ServerCapabilities {
                text_document_sync: Some(TextDocumentSyncCapability::Kind(TextDocumentSyncKind::INCREMENTAL)),
                definition_provider: Some(OneOf::Left(true)),
                references_provider: Some(OneOf::Left(true)),
                ..Default::default()
            },
            server_info: Some(ServerInfo {
                name: "pdx language server".to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        let settings = self.load_config().await;
        let Some(root) = self.root.get().cloned() else {
            info!("no workspace root; only open documents are indexed");
            return;
        };
        if !settings.index_workspace() {
            return;
        }

        let registry = self.registry.clone();
        let analyzer = self.scheduler.analyzer().clone();
        let indexed = tokio::task::spawn_blocking(move || {
            workspace::index_workspace(&root, &registry, analyzer.index(), analyzer.table())
        })
        .await;
        match indexed {
            Ok(Ok((_, summary))) => {
                let message = format!(
                    "indexed {} script and {} localization files",
                    summary.scripts, summary.localization
                );
                self.client.log_message(MessageType::INFO, message).await;
                self.reanalyze_open();
            }
            Ok(Err(err)) => warn!("workspace indexing failed: {err:#}"),
            Err(err) => warn!("workspace indexing task failed: {err}"),
        }
    }

    async fn shutdown(&self) -> Result<()> {
        info!("pdx language server shutting down");
        Ok(())
    }

    async fn did_change_configuration(&self, _: DidChangeConfigurationParams) {
        self.load_config().await;
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        let (file, kind) = self.resolve(&doc.uri);
        self.documents.insert(
            doc.uri.clone(),
            Document {
                rope: Rope::from_str(&doc.text),
                file,
            },
        );
        self.scheduler.open(file, kind, doc.text);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        trace!(%uri, version = params.text_document.version, changes = params.content_changes.len(), "document changed");
        let (file, text) = {
            let Some(mut doc) = self.documents.get_mut(&uri) else {
                warn!(%uri, "change for a document that is not open");
                return;
            };
            for change in &params.content_changes {
                apply_change(&mut doc.rope, change);
            }
            (doc.file, doc.rope.to_string())
        };
        self.scheduler.change(file, text);
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        if let Some((_, doc)) = self.documents.remove(&params.text_document.uri) {
            self.scheduler.close(doc.file);
        }
    }

    async fn goto_definition(&self, params: GotoDefinitionParams) -> Result<Option<GotoDefinitionResponse>> {
        let pos = params.text_document_position_params;
        let Some((analysis, rope)) = self.latest(&pos.text_document.uri) else {
            return Ok(None);
        };
        let Some(name) = symbol_at(&analysis.tree, position_to_offset(&rope, pos.position)) else {
            return Ok(None);
        };
        let snapshot = self.scheduler.analyzer().index().snapshot();
        let locations: Vec<Location> = definition_locations(&snapshot, &name)
            .into_iter()
            .filter_map(|l| self.to_location(l))
            .collect();
        Ok(match locations.len() {
            0 => None,
            1 => locations.into_iter().next().map(GotoDefinitionResponse::Scalar),
            _ => Some(GotoDefinitionResponse::Array(locations)),
        })
    }

    async fn references(&self, params: ReferenceParams) -> Result<Option<Vec<Location>>> {
        let pos = params.text_document_position;
        let Some((analysis, rope)) = self.latest(&pos.text_document.uri) else {
            return Ok(None);
        };
        let Some(name) = symbol_at(&analysis.tree, position_to_offset(&rope, pos.position)) else {
            return Ok(None);
        };
        let snapshot = self.scheduler.analyzer().index().snapshot();
        let locations: Vec<Location> = reference_locations(&snapshot, &name, params.context.include_declaration)
            .into_iter()
            .filter_map(|l| self.to_location(l))
            .collect();
        Ok((!locations.is_empty()).then_some(locations))
    }
}
