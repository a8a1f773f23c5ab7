//! One reconciliation cycle: compile a scope, parse the output, resolve ranges,
//! and derive the publish events for every file the compiler talked about.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tower_lsp::lsp_types::{Diagnostic, DiagnosticSeverity};
use url::Url;

use crate::compiler::{Compiler, CompilerAvailability, Invocation};
use crate::config::Settings;
use crate::diagnostics::{PublishEvent, RunId};
use crate::documents::{DocumentStore, DocumentTextCache};
use crate::error::ReconcileError;
use crate::output::{self, ErrorRecord};
use crate::range::resolve_range;
use crate::scope::Scope;

/// Tag attached to every published diagnostic.
pub const DIAGNOSTIC_SOURCE: &str = "clue";

/// The result of a cycle that reached the publish stage.
#[derive(Debug, Clone)]
pub struct CycleOutcome {
    pub run: RunId,
    pub invocation: Invocation,
    /// "Set" events first, then "clear" events.
    pub events: Vec<PublishEvent>,
    /// Error records that could not be turned into a diagnostic.
    pub dropped: usize,
}

pub struct Reconciler {
    compiler: Arc<dyn Compiler>,
    documents: DocumentStore,
}

impl Reconciler {
    pub fn new(compiler: Arc<dyn Compiler>, documents: DocumentStore) -> Self {
        Self { compiler, documents }
    }

    pub fn compiler(&self) -> &dyn Compiler {
        self.compiler.as_ref()
    }

    /// Runs one cycle over `scope` with an already-snapshotted configuration.
    #[tracing::instrument(skip_all, fields(target = %scope.path.display(), run = run.get()))]
    pub async fn reconcile(
        &self,
        scope: &Scope,
        settings: &Settings,
        availability: &CompilerAvailability,
        run: RunId,
    ) -> Result<CycleOutcome, ReconcileError> {
        if !availability.is_available() {
            tracing::debug!("Skipping reconciliation, compiler is {availability:?}");
            return Err(ReconcileError::Unavailable);
        }

        let start = std::time::Instant::now();
        let invocation = self.compiler.compile(settings, scope).await?;
        tracing::debug!(
            "Compiler finished with {} in {:?}",
            invocation.status_text(),
            start.elapsed()
        );

        let parsed = output::parse(&invocation.stdout, &invocation.stderr);
        if !invocation.success() && parsed.errors.is_empty() {
            return Err(ReconcileError::unrecognized(
                invocation.status_text(),
                &invocation.stdout,
                &invocation.stderr,
            ));
        }

        let mut cache = DocumentTextCache::new(&self.documents);
        let mut groups: Vec<(Url, Vec<Diagnostic>)> = Vec::new();
        let mut group_index: HashMap<Url, usize> = HashMap::new();
        let mut dropped = 0;

        for record in parsed.errors {
            let Some(uri) = scope.attribute(&record.path) else {
                tracing::warn!("Cannot attribute error {:?} to a file", record.path);
                dropped += 1;
                continue;
            };
            let diagnostic = match to_diagnostic(&mut cache, &uri, record).await {
                Ok(diagnostic) => diagnostic,
                Err(err) => {
                    tracing::warn!("Dropping diagnostic for {uri}: {err}");
                    dropped += 1;
                    continue;
                }
            };
            let idx = *group_index.entry(uri.clone()).or_insert_with(|| {
                groups.push((uri, Vec::new()));
                groups.len() - 1
            });
            groups[idx].1.push(diagnostic);
        }
        tracing::debug!("Read {} file(s) from disk", cache.disk_reads());

        let mut events: Vec<PublishEvent> = groups
            .into_iter()
            .map(|(uri, diagnostics)| PublishEvent::Set { uri, diagnostics })
            .collect();

        let mut touched: HashSet<Url> = events.iter().map(|e| e.uri().clone()).collect();
        for path in &parsed.compiled_files {
            match scope.attribute(path) {
                Some(uri) if touched.insert(uri.clone()) => events.push(PublishEvent::Clear { uri }),
                Some(_) => {}
                None => tracing::warn!("Cannot attribute compiled file {path:?}"),
            }
        }

        Ok(CycleOutcome {
            run,
            invocation,
            events,
            dropped,
        })
    }
}

async fn to_diagnostic(
    cache: &mut DocumentTextCache<'_>,
    uri: &Url,
    record: ErrorRecord,
) -> Result<Diagnostic, crate::error::TextSourceError> {
    let range = resolve_range(cache, uri, record.line, record.character).await?;
    Ok(Diagnostic {
        range,
        severity: Some(DiagnosticSeverity::ERROR),
        source: Some(DIAGNOSTIC_SOURCE.to_string()),
        message: record.message,
        ..Default::default()
    })
}
