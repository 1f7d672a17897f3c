use crate::config::SrclinkConfig;
use crate::handlers::document_link;
use crate::state::{LinkContext, ServerState};
use srclink_core::{DirCatalog, PackageCatalog, PackageIndex, installed_versions};
use std::sync::Arc;
use tokio::sync::RwLock;
use tower_lsp_server::ls_types::{
    DidChangeTextDocumentParams, DidCloseTextDocumentParams, DidOpenTextDocumentParams,
    DocumentLink, DocumentLinkOptions, DocumentLinkParams, InitializeParams, InitializeResult,
    InitializedParams, MessageType, PositionEncodingKind, ServerCapabilities, ServerInfo,
    TextDocumentSyncCapability, TextDocumentSyncKind,
};
use tower_lsp_server::{Client, LanguageServer, jsonrpc::Result};

pub struct Backend {
    pub(crate) client: Client,
    state: Arc<ServerState>,
    config: Arc<RwLock<SrclinkConfig>>,
}

impl Backend {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(ServerState::new()),
            config: Arc::new(RwLock::new(SrclinkConfig::default())),
        }
    }

    /// Get a reference to the server state (primarily for testing).
    #[doc(hidden)]
    pub fn state(&self) -> &Arc<ServerState> {
        &self.state
    }

    /// Picks the position encoding from the client's offered set.
    ///
    /// UTF-8 is cheapest for us (offsets are byte offsets); UTF-16 is the
    /// protocol's mandatory baseline and the fallback.
    fn negotiate_position_encoding(params: &InitializeParams) -> PositionEncodingKind {
        let offered = params
            .capabilities
            .general
            .as_ref()
            .and_then(|general| general.position_encodings.as_deref());

        match offered {
            Some(encodings) if encodings.contains(&PositionEncodingKind::UTF8) => {
                PositionEncodingKind::UTF8
            }
            _ => PositionEncodingKind::UTF16,
        }
    }

    fn server_capabilities(encoding: PositionEncodingKind) -> ServerCapabilities {
        ServerCapabilities {
            position_encoding: Some(encoding),
            text_document_sync: Some(TextDocumentSyncCapability::Kind(
                TextDocumentSyncKind::INCREMENTAL,
            )),
            document_link_provider: Some(DocumentLinkOptions {
                resolve_provider: Some(false),
                work_done_progress_options: Default::default(),
            }),
            ..Default::default()
        }
    }
}

impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        tracing::info!("initializing srclink-lsp server");

        if let Some(init_options) = params.initialization_options.clone()
            && let Ok(config) = serde_json::from_value::<SrclinkConfig>(init_options)
        {
            tracing::debug!("loaded configuration: {:?}", config);
            *self.config.write().await = config;
        }

        let encoding = Self::negotiate_position_encoding(&params);
        self.state.store.set_encoding(encoding.clone());

        let config = self.config.read().await;
        let catalog: Arc<dyn PackageCatalog> = Arc::new(DirCatalog::new(
            config.package_roots.clone(),
            config.bundled(),
        ));
        let installed = installed_versions(catalog.as_ref());
        tracing::info!("found {} installed packages", installed.len());

        let _ = self.state.links.set(Arc::new(LinkContext {
            index: PackageIndex::new(catalog),
            installed_versions: installed,
        }));

        Ok(InitializeResult {
            capabilities: Self::server_capabilities(encoding),
            server_info: Some(ServerInfo {
                name: "srclink-lsp".into(),
                version: Some(env!("CARGO_PKG_VERSION").into()),
            }),
            offset_encoding: None,
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        tracing::info!("srclink-lsp server initialized");
        self.client
            .log_message(MessageType::INFO, "srclink-lsp ready")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        tracing::info!("shutting down srclink-lsp server");
        self.state.store.clear();
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let document = params.text_document;
        tracing::info!("document opened: {:?}", document.uri);

        self.state
            .store
            .set(&document.uri, document.text, document.version);
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        let uri = params.text_document.uri;
        let version = params.text_document.version;

        if let Err(e) = self
            .state
            .store
            .push_edits(&uri, &params.content_changes, version)
        {
            // Either the client edited a document it never opened or it sent
            // versions out of order; both mean the session is desynchronized.
            tracing::error!("failed to apply edits to {:?}: {}", uri, e);
            self.client
                .log_message(MessageType::ERROR, format!("srclink-lsp: {e}"))
                .await;
        }
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        let uri = params.text_document.uri;
        tracing::info!("document closed: {:?}", uri);

        self.state.store.delete(&uri);
    }

    async fn document_link(
        &self,
        params: DocumentLinkParams,
    ) -> Result<Option<Vec<DocumentLink>>> {
        tracing::info!("document link request for: {:?}", params.text_document.uri);

        let links = document_link::handle_document_link(Arc::clone(&self.state), params).await;

        tracing::info!("returning {} document links", links.len());
        Ok(Some(links))
    }
}
