//! Session state and the reconciliation coordinator.
//!
//! Editor notifications are turned into [`SessionEvent`]s and fed through one
//! channel. The coordinator assigns a [`RunId`] to each cycle in arrival order and
//! spawns it, so cycles over unrelated scopes run side by side while the
//! [`PublishGate`] keeps the newest result per file.

use std::sync::{Arc, RwLock};

use tokio::sync::mpsc;
use tower_lsp::lsp_types::MessageType;
use url::Url;

use crate::compiler::{self, Compiler, CompilerAvailability};
use crate::config::Settings;
use crate::diagnostics::{EditorSink, PublishGate, PublishReport, RunCounter, RunId, StatusParams};
use crate::documents::DocumentStore;
use crate::error::ReconcileError;
use crate::reconcile::Reconciler;
use crate::scope::{self, Scope};

/// Inbound events, in the order the editor sent them.
#[derive(Debug, Clone)]
pub enum SessionEvent {
    Opened(Url),
    Saved(Url),
    ConfigurationChanged(Settings),
    FoldersChanged { added: Vec<Url>, removed: Vec<Url> },
}

/// Mutable state with explicit transition points: startup, configuration change,
/// version check and folder changes.
#[derive(Debug, Default)]
pub struct SessionState {
    pub settings: Arc<Settings>,
    pub availability: CompilerAvailability,
    pub roots: Vec<Url>,
}

pub struct Session {
    state: RwLock<SessionState>,
    reconciler: Reconciler,
    documents: DocumentStore,
    editor: Arc<dyn EditorSink>,
    gate: PublishGate,
    runs: RunCounter,
}

impl Session {
    pub fn new(compiler: Arc<dyn Compiler>, documents: DocumentStore, editor: Arc<dyn EditorSink>) -> Self {
        Self {
            state: RwLock::new(SessionState::default()),
            reconciler: Reconciler::new(compiler, documents.clone()),
            documents,
            editor,
            gate: PublishGate::new(),
            runs: RunCounter::default(),
        }
    }

    pub fn settings(&self) -> Arc<Settings> {
        self.state.read().expect("Session: lock poisoned").settings.clone()
    }

    pub fn roots(&self) -> Vec<Url> {
        self.state.read().expect("Session: lock poisoned").roots.clone()
    }

    pub fn set_roots(&self, roots: Vec<Url>) {
        self.state.write().expect("Session: lock poisoned").roots = roots;
    }

    fn update_roots(&self, added: &[Url], removed: &[Url]) {
        let mut state = self.state.write().expect("Session: lock poisoned");
        state.roots.retain(|root| !removed.contains(root));
        for root in added {
            if !state.roots.contains(root) {
                state.roots.push(root.clone());
            }
        }
    }

    /// Stores new settings and re-checks the compiler. The editor is told the
    /// outcome once, here, rather than on every skipped cycle.
    pub async fn apply_settings(&self, settings: Settings) -> CompilerAvailability {
        let settings = Arc::new(settings);
        self.state.write().expect("Session: lock poisoned").settings = settings.clone();

        let availability = compiler::check_version(self.reconciler.compiler(), &settings).await;
        self.state.write().expect("Session: lock poisoned").availability = availability.clone();

        match &availability {
            CompilerAvailability::Available(version) => {
                tracing::info!("Using Clue {version} at {}", settings.binary);
                self.editor
                    .status(StatusParams {
                        text: format!("Clue {version}"),
                        is_error: false,
                    })
                    .await;
            }
            CompilerAvailability::Unavailable(err) => {
                tracing::error!("Clue is unavailable: {err}");
                let text = err.to_string();
                self.editor
                    .status(StatusParams {
                        text: text.clone(),
                        is_error: true,
                    })
                    .await;
                self.editor.show_error(text).await;
            }
            CompilerAvailability::Unknown => {}
        }
        availability
    }

    /// Runs one cycle over `scope` with a freshly allocated run id.
    pub async fn reconcile(&self, scope: Scope) -> Option<PublishReport> {
        let run = self.runs.next();
        self.reconcile_run(scope, run).await
    }

    /// Runs one cycle whose id was allocated when it was triggered.
    async fn reconcile_run(&self, scope: Scope, run: RunId) -> Option<PublishReport> {
        let (settings, availability) = {
            let state = self.state.read().expect("Session: lock poisoned");
            (state.settings.clone(), state.availability.clone())
        };

        match self.reconciler.reconcile(&scope, &settings, &availability, run).await {
            Ok(outcome) => {
                self.forward_output(&outcome.invocation.stdout, &outcome.invocation.stderr).await;
                let report = self.gate.publish(self.editor.as_ref(), run, outcome.events).await;
                tracing::info!(
                    "Run {} over {}: {} published, {} stale, {} dropped",
                    run.get(),
                    scope.path.display(),
                    report.published,
                    report.stale,
                    outcome.dropped
                );
                Some(report)
            }
            Err(ReconcileError::Unavailable) => None,
            Err(err) => {
                if let ReconcileError::UnrecognizedFailure { status, stdout, stderr } = &err {
                    tracing::error!(
                        "Run {} over {} failed with {status}\n--- stdout ---\n{stdout}\n--- stderr ---\n{stderr}",
                        run.get(),
                        scope.path.display()
                    );
                    self.forward_output(stdout, stderr).await;
                } else {
                    tracing::error!("Run {} over {} failed: {err}", run.get(), scope.path.display());
                }
                self.editor.show_error(err.to_string()).await;
                None
            }
        }
    }

    async fn forward_output(&self, stdout: &str, stderr: &str) {
        if !stdout.trim().is_empty() {
            self.editor.log(MessageType::LOG, stdout.trim_end().to_string()).await;
        }
        if !stderr.trim().is_empty() {
            self.editor.log(MessageType::ERROR, stderr.trim_end().to_string()).await;
        }
    }

    /// Starts the coordinator and returns the channel that feeds it.
    pub fn spawn(self: Arc<Self>) -> mpsc::UnboundedSender<SessionEvent> {
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionEvent>();
        tokio::spawn(async move {
            while let Some(event) = rx.recv().await {
                self.clone().dispatch(event).await;
            }
            tracing::debug!("Session event channel closed");
        });
        tx
    }

    async fn dispatch(self: Arc<Self>, event: SessionEvent) {
        tracing::debug!("Session event: {event:?}");
        let scopes: Vec<Scope> = match event {
            SessionEvent::Opened(uri) | SessionEvent::Saved(uri) => {
                scope::scope_for(&uri, &self.roots()).into_iter().collect()
            }
            SessionEvent::ConfigurationChanged(settings) => {
                self.apply_settings(settings).await;
                scope::all_scopes(&self.roots(), &self.documents.uris())
            }
            SessionEvent::FoldersChanged { added, removed } => {
                self.update_roots(&added, &removed);
                added.into_iter().filter_map(Scope::directory).collect()
            }
        };
        self.spawn_runs(scopes);
    }

    /// Allocates a run id for each scope, in order, and starts the cycles side by side.
    fn spawn_runs(self: Arc<Self>, scopes: Vec<Scope>) {
        tracing::debug!("Starting {} cycle(s)", scopes.len());
        for scope in scopes {
            let run = self.runs.next();
            let session = self.clone();
            tokio::spawn(async move {
                session.reconcile_run(scope, run).await;
            });
        }
    }
}
