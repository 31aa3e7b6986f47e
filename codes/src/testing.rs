//! Fakes shared by the unit tests.

use crate::collection::Collection;
use crate::redeem::RedemptionClient;
use crate::status::Status;
use crate::store::CodeLine;
use crate::store::CodeStore;
use crate::store::stats_of;
use crate::types::Game;
use crate::types::Platform;
use crate::types::Scope;
use crate::types::ShiftCode;
use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;

/// In-memory store that counts saves and can be told to fail them.
#[derive(Default)]
pub(crate) struct CountingStore {
    data: Mutex<HashMap<Scope, Vec<ShiftCode>>>,
    saves: AtomicUsize,
    fail: AtomicBool,
}

impl CountingStore {
    pub(crate) fn saves(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }

    pub(crate) fn fail_saves(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }
}

impl CodeStore for CountingStore {
    fn load(&self, scope: &Scope) -> anyhow::Result<Vec<ShiftCode>> {
        Ok(self
            .data
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .get(scope)
            .cloned()
            .unwrap_or_default())
    }

    fn save(&self, scope: &Scope, codes: &[ShiftCode]) -> anyhow::Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("disk full");
        }
        self.saves.fetch_add(1, Ordering::SeqCst);
        self.data
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .insert(*scope, codes.to_vec());
        Ok(())
    }

    fn scopes(&self) -> anyhow::Result<Vec<Scope>> {
        Ok(self
            .data
            .lock()
            .map_err(|_| anyhow::anyhow!("poisoned"))?
            .keys()
            .copied()
            .collect())
    }

    fn export(&self, _out: &mut dyn std::io::Write) -> anyhow::Result<()> {
        Ok(())
    }

    fn import(&self, _input: &mut dyn std::io::Read) -> anyhow::Result<usize> {
        Ok(0)
    }

    fn stats(&self) -> anyhow::Result<serde_json::Value> {
        let data = self.data.lock().map_err(|_| anyhow::anyhow!("poisoned"))?;
        let lines: Vec<CodeLine> = data
            .iter()
            .flat_map(|(scope, codes)| codes.iter().map(|c| CodeLine::new(scope, c.clone())))
            .collect();
        Ok(stats_of(&lines))
    }
}

pub(crate) fn test_scope() -> Scope {
    Scope::new(Game::Bl3, Platform::Epic)
}

/// Collection over a fresh [`CountingStore`] holding `codes` (oldest first),
/// merged but not committed.
pub(crate) fn collection_with(codes: &[(&str, &str)]) -> (Arc<CountingStore>, Collection) {
    let store = Arc::new(CountingStore::default());
    let mut collection = Collection::for_scope(store.clone(), test_scope());
    collection.merge(codes.iter().map(|(c, d)| ShiftCode::new(*c, *d, "")));
    (store, collection)
}

/// Answers with a fixed script and records every code it was asked about.
pub(crate) struct ScriptedClient {
    script: VecDeque<Status>,
    calls: Vec<String>,
}

impl ScriptedClient {
    pub(crate) fn new(script: &[Status]) -> Self {
        Self {
            script: script.iter().copied().collect(),
            calls: Vec::new(),
        }
    }

    pub(crate) fn calls(&self) -> Vec<&str> {
        self.calls.iter().map(String::as_str).collect()
    }
}

impl RedemptionClient for ScriptedClient {
    fn attempt_redeem(&mut self, code: &str) -> Status {
        self.calls.push(code.to_string());
        self.script.pop_front().unwrap_or(Status::None)
    }
}
