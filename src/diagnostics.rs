//! Publishing side of the pipeline.
//!
//! Every publish carries the [`RunId`] of the cycle that produced it. The
//! [`PublishGate`] remembers the newest run applied to each URI and drops anything
//! older, so a slow cycle can never overwrite the result of one started after it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tower_lsp::Client;
use tower_lsp::async_trait;
use tower_lsp::lsp_types::notification::Notification;
use tower_lsp::lsp_types::{Diagnostic, MessageType};
use url::Url;

/// Monotonic identifier of a reconciliation cycle, assigned when the cycle starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RunId(u64);

impl RunId {
    pub fn get(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Default)]
pub struct RunCounter(AtomicU64);

impl RunCounter {
    pub fn next(&self) -> RunId {
        RunId(self.0.fetch_add(1, Ordering::Relaxed) + 1)
    }
}

/// One publish produced by a cycle. Both kinds fully replace the file's diagnostics.
#[derive(Debug, Clone, PartialEq)]
pub enum PublishEvent {
    Set { uri: Url, diagnostics: Vec<Diagnostic> },
    Clear { uri: Url },
}

impl PublishEvent {
    pub fn uri(&self) -> &Url {
        match self {
            Self::Set { uri, .. } | Self::Clear { uri } => uri,
        }
    }

    pub fn into_parts(self) -> (Url, Vec<Diagnostic>) {
        match self {
            Self::Set { uri, diagnostics } => (uri, diagnostics),
            Self::Clear { uri } => (uri, Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusParams {
    pub text: String,
    pub is_error: bool,
}

/// `clue/status`: reports compiler availability to the client.
pub struct StatusNotification;
impl Notification for StatusNotification {
    type Params = StatusParams;
    const METHOD: &'static str = "clue/status";
}

/// Everything the pipeline tells the editor.
#[async_trait]
pub trait EditorSink: Send + Sync {
    async fn publish_diagnostics(&self, uri: Url, diagnostics: Vec<Diagnostic>);
    async fn status(&self, status: StatusParams);
    async fn show_error(&self, message: String);
    async fn log(&self, ty: MessageType, message: String);
}

#[async_trait]
impl EditorSink for Client {
    async fn publish_diagnostics(&self, uri: Url, diagnostics: Vec<Diagnostic>) {
        Client::publish_diagnostics(self, uri, diagnostics, None).await;
    }

    async fn status(&self, status: StatusParams) {
        self.send_notification::<StatusNotification>(status).await;
    }

    async fn show_error(&self, message: String) {
        self.show_message(MessageType::ERROR, message).await;
    }

    async fn log(&self, ty: MessageType, message: String) {
        self.log_message(ty, message).await;
    }
}

/// What happened to one cycle's events at the gate.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub published: usize,
    pub stale: usize,
}

/// Drops publishes older than the newest one already applied to the same URI.
#[derive(Debug, Default)]
pub struct PublishGate {
    /// One entry per URI ever published, kept for the whole session. Entries are
    /// not evicted on close: files under a root keep being published after close,
    /// and a forgotten entry would let an older in-flight run overwrite them.
    applied: Mutex<HashMap<Url, RunId>>,
}

impl PublishGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forwards `events` from cycle `run` to `sink`, in order, skipping stale ones.
    ///
    /// The lock is held across the sends so the order in which the sink observes
    /// publishes for a URI matches the order in which they were admitted.
    pub async fn publish(
        &self,
        sink: &dyn EditorSink,
        run: RunId,
        events: Vec<PublishEvent>,
    ) -> PublishReport {
        let mut applied = self.applied.lock().await;
        let mut report = PublishReport::default();

        for event in events {
            if applied.get(event.uri()).is_some_and(|last| *last > run) {
                tracing::debug!("Dropping stale publish from run {} for {}", run.get(), event.uri());
                report.stale += 1;
                continue;
            }
            applied.insert(event.uri().clone(), run);
            let (uri, diagnostics) = event.into_parts();
            sink.publish_diagnostics(uri, diagnostics).await;
            report.published += 1;
        }

        report
    }
}
