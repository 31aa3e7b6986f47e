//! Feeding newly found codes into a collection.
//!
//! Parsers are looked up per scope in an explicit [`ParserRegistry`] owned by
//! whoever wires the application together. A discovery always ends with
//! exactly one commit, whether the parser succeeded or not, so codes found
//! before a failure are kept.

use crate::collection::Collection;
use crate::types::Scope;
use crate::types::ShiftCode;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::thread::JoinHandle;

pub mod text;

/// Finds codes for a scope. May block on I/O.
pub trait CodeParser: Send + Sync {
    /// Push every code found into `sink`. Records pushed before an error
    /// are still merged.
    fn discover(&self, scope: &Scope, sink: &mut Vec<ShiftCode>) -> anyhow::Result<()>;
}

#[derive(Clone, Default)]
pub struct ParserRegistry {
    parsers: HashMap<Scope, Arc<dyn CodeParser>>,
}

impl ParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `parser` for `scope`, returning the one it replaces.
    pub fn register(
        &mut self,
        scope: Scope,
        parser: Arc<dyn CodeParser>,
    ) -> Option<Arc<dyn CodeParser>> {
        tracing::debug!(%scope, "register parser");
        self.parsers.insert(scope, parser)
    }

    pub fn get(&self, scope: &Scope) -> Option<Arc<dyn CodeParser>> {
        self.parsers.get(scope).cloned()
    }

    pub fn scopes(&self) -> Vec<Scope> {
        self.parsers.keys().copied().collect()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveryReport {
    pub scope: Scope,
    pub success: bool,
    /// Records that were new to the collection.
    pub added: usize,
    pub error: Option<String>,
}

impl DiscoveryReport {
    pub fn message(&self) -> &'static str {
        if self.success {
            "Parsing complete"
        } else {
            "Parsing failed"
        }
    }
}

#[derive(Debug)]
pub enum Triggered {
    /// A worker is running; the callback fires when it is done.
    Started(JoinHandle<()>),
    /// A discovery for this scope is already in flight.
    Coalesced,
    /// Nothing registered for the scope.
    NoParser,
    /// The collection has no scope selected.
    Unscoped,
}

/// Runs parsers and merges their output, one discovery per scope at a time.
#[derive(Clone)]
pub struct Discovery {
    registry: Arc<ParserRegistry>,
    in_flight: Arc<Mutex<HashSet<Scope>>>,
}

/// Marks a scope busy until dropped.
struct InFlight {
    set: Arc<Mutex<HashSet<Scope>>>,
    scope: Scope,
}

impl Drop for InFlight {
    fn drop(&mut self) {
        let mut set = self.set.lock().unwrap_or_else(|e| e.into_inner());
        set.remove(&self.scope);
    }
}

impl Discovery {
    pub fn new(registry: ParserRegistry) -> Self {
        Self {
            registry: Arc::new(registry),
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn registry(&self) -> &ParserRegistry {
        &self.registry
    }

    pub fn is_in_flight(&self, scope: &Scope) -> bool {
        self.in_flight
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .contains(scope)
    }

    fn claim(&self, scope: Scope) -> Option<InFlight> {
        let mut set = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if !set.insert(scope) {
            return None;
        }
        Some(InFlight {
            set: self.in_flight.clone(),
            scope,
        })
    }

    /// Run the scope's parser on the calling thread.
    ///
    /// Returns `None` when there was nothing to do: no scope selected, no
    /// parser registered or a discovery already in flight for the scope.
    pub fn discover_now(&self, collection: &mut Collection) -> Option<DiscoveryReport> {
        let scope = collection.scope()?;
        let Some(parser) = self.registry.get(&scope) else {
            tracing::debug!(%scope, "no parser registered");
            return None;
        };
        let Some(_guard) = self.claim(scope) else {
            tracing::debug!(%scope, "discovery already in flight");
            return None;
        };
        let (found, parsed) = run_parser(parser.as_ref(), &scope);
        Some(finish(collection, scope, found, parsed))
    }

    /// Run the scope's parser on a worker thread and call `on_done` once the
    /// results are merged and committed.
    pub fn trigger<F>(
        &self,
        collection: Arc<Mutex<Collection>>,
        on_done: F,
    ) -> anyhow::Result<Triggered>
    where
        F: FnOnce(DiscoveryReport) + Send + 'static,
    {
        let scope = {
            let guard = collection
                .lock()
                .map_err(|_| anyhow::anyhow!("collection lock poisoned"))?;
            guard.scope()
        };
        let Some(scope) = scope else {
            return Ok(Triggered::Unscoped);
        };
        let Some(parser) = self.registry.get(&scope) else {
            tracing::debug!(%scope, "no parser registered");
            return Ok(Triggered::NoParser);
        };
        let Some(in_flight) = self.claim(scope) else {
            tracing::debug!(%scope, "discovery already in flight");
            return Ok(Triggered::Coalesced);
        };

        let handle = std::thread::Builder::new()
            .name(format!("discover-{}-{}", scope.game, scope.platform))
            .spawn(move || {
                let (found, parsed) = run_parser(parser.as_ref(), &scope);
                let report = match collection.lock() {
                    Ok(mut c) => finish(&mut c, scope, found, parsed),
                    Err(_) => DiscoveryReport {
                        scope,
                        success: false,
                        added: 0,
                        error: Some("collection lock poisoned".to_string()),
                    },
                };
                drop(in_flight);
                on_done(report);
            })?;
        Ok(Triggered::Started(handle))
    }
}

fn run_parser(parser: &dyn CodeParser, scope: &Scope) -> (Vec<ShiftCode>, anyhow::Result<()>) {
    let mut found = Vec::new();
    let parsed = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        parser.discover(scope, &mut found)
    }))
    .unwrap_or_else(|_| Err(anyhow::anyhow!("parser panicked")));
    (found, parsed)
}

/// Merge and commit exactly once, whatever the parser reported.
fn finish(
    collection: &mut Collection,
    scope: Scope,
    found: Vec<ShiftCode>,
    parsed: anyhow::Result<()>,
) -> DiscoveryReport {
    let mut error = parsed.err().map(|e| format!("{e:#}"));

    // The user may have switched scopes while the parser ran; the results
    // still belong to the scope they were found for.
    let mut detached;
    let target = if collection.scope() == Some(scope) {
        collection
    } else {
        detached = Collection::for_scope(collection.store().clone(), scope);
        if let Err(e) = detached.query(Some(scope.game), Some(scope.platform), true) {
            // Committing on top of a failed load would drop the stored codes.
            let report = DiscoveryReport {
                scope,
                success: false,
                added: 0,
                error: Some(format!("{e:#}")),
            };
            tracing::warn!(%scope, "{}: {e:#}", report.message());
            return report;
        }
        &mut detached
    };

    let added = target.merge(found);
    if let Err(e) = target.commit() {
        error.get_or_insert_with(|| format!("{e:#}"));
    }

    let report = DiscoveryReport {
        scope,
        success: error.is_none(),
        added,
        error,
    };
    match &report.error {
        None => tracing::info!(%scope, added, "{}", report.message()),
        Some(e) => tracing::warn!(%scope, added, "{}: {e}", report.message()),
    }
    report
}
