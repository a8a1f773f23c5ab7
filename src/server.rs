//! Implements the Language Server Protocol (LSP) surface of the Clue bridge.
//!
//! Editor notifications are mirrored into the document store and forwarded to the
//! session coordinator; the only request answered directly is hover.

use std::sync::Arc;

use serde_json::Value as JsonValue;
use tokio::sync::mpsc::UnboundedSender;
use tower_lsp::Client;
use tower_lsp::LanguageServer;
use tower_lsp::async_trait;
use tower_lsp::jsonrpc::Result;
#[allow(clippy::wildcard_imports)]
use tower_lsp::lsp_types::*;

use crate::compiler::Compiler;
use crate::config::{CONFIG_SECTION, Settings};
use crate::documents::DocumentStore;
use crate::hover::env_hover;
use crate::session::{Session, SessionEvent};
use crate::utils::spawn_log;

/// The Clue language server state.
pub struct ClueServer {
    pub client: Client,
    pub documents: DocumentStore,
    pub session: Arc<Session>,
    events: UnboundedSender<SessionEvent>,
}

impl ClueServer {
    /// Builds the server and starts its session coordinator.
    pub fn new(client: Client, compiler: Arc<dyn Compiler>) -> Self {
        let documents = DocumentStore::new();
        let session = Arc::new(Session::new(compiler, documents.clone(), Arc::new(client.clone())));
        let events = session.clone().spawn();
        Self {
            client,
            documents,
            session,
            events,
        }
    }

    fn send(&self, event: SessionEvent) {
        if self.events.send(event).is_err() {
            tracing::error!("Session coordinator is gone, dropping event");
        }
    }

    /// Pulls the `clue` section from the client, falling back to `pushed` when the
    /// client does not answer configuration requests.
    async fn fetch_settings(&self, pushed: Option<JsonValue>) -> Settings {
        let item = ConfigurationItem {
            scope_uri: None,
            section: Some(CONFIG_SECTION.to_string()),
        };
        match self.client.configuration(vec![item]).await {
            Ok(mut values) if !values.is_empty() => Settings::from_json(values.swap_remove(0)),
            Ok(_) => Settings::from_json(pushed.unwrap_or(JsonValue::Null)),
            Err(err) => {
                tracing::warn!("workspace/configuration failed: {err}");
                Settings::from_json(pushed.unwrap_or(JsonValue::Null))
            }
        }
    }
}

fn build_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(TextDocumentSyncOptions {
            open_close: Some(true),
            change: Some(TextDocumentSyncKind::FULL),
            save: Some(TextDocumentSyncSaveOptions::Supported(true)),
            ..Default::default()
        })),
        hover_provider: Some(HoverProviderCapability::Simple(true)),
        workspace: Some(WorkspaceServerCapabilities {
            workspace_folders: Some(WorkspaceFoldersServerCapabilities {
                supported: Some(true),
                change_notifications: Some(OneOf::Left(true)),
            }),
            ..Default::default()
        }),
        ..Default::default()
    }
}

#[async_trait]
impl LanguageServer for ClueServer {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        #[allow(deprecated)]
        let roots: Vec<Url> = match params.workspace_folders {
            Some(folders) => folders.into_iter().map(|f| f.uri).collect(),
            None => params.root_uri.into_iter().collect(),
        };
        tracing::info!("Workspace roots: {roots:?}");
        self.session.set_roots(roots);

        Ok(InitializeResult {
            capabilities: build_capabilities(),
            server_info: Some(ServerInfo {
                name: env!("CARGO_PKG_NAME").to_string(),
                version: Some(env!("CARGO_PKG_VERSION").to_string()),
            }),
            ..Default::default()
        })
    }

    async fn initialized(&self, _: InitializedParams) {
        self.client
            .register_capability(vec![Registration {
                id: "clue-configuration".to_string(),
                method: "workspace/didChangeConfiguration".to_string(),
                register_options: None,
            }])
            .await
            .ok();

        let settings = self.fetch_settings(None).await;
        self.send(SessionEvent::ConfigurationChanged(settings));
        self.client
            .log_message(MessageType::INFO, "[INFO] Clue language server initialized")
            .await;
    }

    async fn shutdown(&self) -> Result<()> {
        spawn_log(self.client.clone(), MessageType::INFO, "[INFO] Clue language server shutting down".to_string());
        Ok(())
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        let doc = params.text_document;
        self.documents.open(doc.uri.clone(), doc.text, doc.version);
        self.send(SessionEvent::Opened(doc.uri));
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        // Full sync: the last change carries the whole text.
        if let Some(change) = params.content_changes.into_iter().last() {
            let doc = params.text_document;
            self.documents.update(&doc.uri, change.text, doc.version);
        }
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        self.send(SessionEvent::Saved(params.text_document.uri));
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        self.documents.close(&params.text_document.uri);
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        let pushed = params.settings.get(CONFIG_SECTION).cloned();
        let settings = self.fetch_settings(pushed).await;
        self.send(SessionEvent::ConfigurationChanged(settings));
    }

    async fn did_change_workspace_folders(&self, params: DidChangeWorkspaceFoldersParams) {
        let added = params.event.added.into_iter().map(|f| f.uri).collect();
        let removed = params.event.removed.into_iter().map(|f| f.uri).collect();
        self.send(SessionEvent::FoldersChanged { added, removed });
    }

    async fn hover(&self, params: HoverParams) -> Result<Option<Hover>> {
        let uri = params.text_document_position_params.text_document.uri;
        let position = params.text_document_position_params.position;
        let Some(doc) = self.documents.get(&uri) else {
            return Ok(None);
        };
        let settings = self.session.settings();
        Ok(env_hover(&doc.text, position, &settings.env))
    }
}
