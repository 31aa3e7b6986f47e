//! The in-memory view of one scope's codes and its link to persistence.
//!
//! Records are kept in insertion order. Everything that walks the collection
//! for a user (redemption, listings) goes through [`Collection::newest_first`],
//! so the most recently added code is always seen and redeemed first.

use crate::error::CodesError;
use crate::store::CodeStore;
use crate::types::CodeKind;
use crate::types::Game;
use crate::types::Platform;
use crate::types::Scope;
use crate::types::ShiftCode;
use std::collections::HashMap;
use std::collections::HashSet;
use std::sync::Arc;

pub struct Collection {
    store: Arc<dyn CodeStore>,
    scope: Option<Scope>,
    codes: Vec<ShiftCode>,
}

impl std::fmt::Debug for Collection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collection")
            .field("scope", &self.scope)
            .field("codes", &self.codes)
            .finish()
    }
}

impl Collection {
    pub fn new(store: Arc<dyn CodeStore>) -> Self {
        Self {
            store,
            scope: None,
            codes: Vec::new(),
        }
    }

    /// Empty collection already bound to `scope`; nothing is loaded.
    pub fn for_scope(store: Arc<dyn CodeStore>, scope: Scope) -> Self {
        Self {
            store,
            scope: Some(scope),
            codes: Vec::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn CodeStore> {
        &self.store
    }

    pub fn scope(&self) -> Option<Scope> {
        self.scope
    }

    /// Select a scope and load its records.
    ///
    /// A missing game or platform leaves the collection empty and unbound.
    /// Re-selecting the loaded scope keeps the in-memory view unless
    /// `refresh` asks for a reload from the store.
    pub fn query(
        &mut self,
        game: Option<Game>,
        platform: Option<Platform>,
        refresh: bool,
    ) -> anyhow::Result<()> {
        let (Some(game), Some(platform)) = (game, platform) else {
            self.scope = None;
            self.codes.clear();
            return Ok(());
        };
        let scope = Scope::new(game, platform);
        if self.scope == Some(scope) && !refresh {
            return Ok(());
        }
        // Keep the old state if loading fails.
        let codes = unique(self.store.load(&scope)?);
        tracing::debug!(%scope, records = codes.len(), "loaded collection");
        self.scope = Some(scope);
        self.codes = codes;
        Ok(())
    }

    /// Append every discovered record whose code is not present yet.
    pub fn merge<I>(&mut self, discovered: I) -> usize
    where
        I: IntoIterator<Item = ShiftCode>,
    {
        let mut known: HashSet<String> = self.codes.iter().map(|c| c.code.clone()).collect();
        let mut added = 0;
        for code in discovered {
            if known.insert(code.code.clone()) {
                self.codes.push(code);
                added += 1;
            }
        }
        if added > 0 {
            tracing::debug!(scope = ?self.scope, added, "merged new codes");
        }
        added
    }

    /// Persist the full current state. Without a selected scope there is
    /// nothing to write.
    pub fn commit(&self) -> anyhow::Result<()> {
        match &self.scope {
            Some(scope) => self.store.save(scope, &self.codes),
            None => Ok(()),
        }
    }

    pub fn size(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    /// From the most recently added record to the oldest.
    pub fn newest_first(&self) -> impl Iterator<Item = &ShiftCode> {
        self.codes.iter().rev()
    }

    /// Record at `row` of the newest-first view.
    pub fn row(&self, row: usize) -> Result<&ShiftCode, CodesError> {
        self.newest_first()
            .nth(row)
            .ok_or(CodesError::RowOutOfRange {
                row,
                size: self.codes.len(),
            })
    }

    pub fn get(&self, code: &str) -> Option<&ShiftCode> {
        self.codes.iter().find(|c| c.code == code)
    }

    pub(crate) fn get_mut(&mut self, code: &str) -> Option<&mut ShiftCode> {
        self.codes.iter_mut().find(|c| c.code == code)
    }

    pub fn unredeemed_count(&self) -> usize {
        self.codes.iter().filter(|c| !c.redeemed()).count()
    }

    /// Golden keys still waiting in unredeemed codes of `kind`.
    pub fn golden_keys(&self, kind: CodeKind) -> u64 {
        self.codes
            .iter()
            .filter(|c| !c.redeemed() && kind.matches(c))
            .filter_map(ShiftCode::golden_keys)
            .fold(0u64, |sum, n| sum.saturating_add(u64::from(n)))
    }
}

/// Drop repeated codes from a loaded batch. The first record wins and picks
/// up the redeemed flag of any later copy.
fn unique(loaded: Vec<ShiftCode>) -> Vec<ShiftCode> {
    let total = loaded.len();
    let mut out: Vec<ShiftCode> = Vec::with_capacity(total);
    let mut index: HashMap<String, usize> = HashMap::new();
    for code in loaded {
        match index.get(&code.code) {
            Some(&i) => {
                if code.redeemed() {
                    out[i].mark_redeemed();
                }
            }
            None => {
                index.insert(code.code.clone(), out.len());
                out.push(code);
            }
        }
    }
    if out.len() < total {
        tracing::warn!(
            dropped = total - out.len(),
            "store returned repeated codes; keeping the first of each"
        );
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::jsonl::JsonlCodeStore;
    use pretty_assertions::assert_eq;

    fn collection() -> (tempfile::TempDir, Collection) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonlCodeStore::new(dir.path().join("codes.jsonl")));
        let mut c = Collection::new(store);
        c.query(Some(Game::Bl3), Some(Platform::Epic), true).unwrap();
        (dir, c)
    }

    fn codes(list: &[&str]) -> Vec<ShiftCode> {
        list.iter().map(|c| ShiftCode::new(*c, "", "")).collect()
    }

    #[test]
    fn merge_skips_duplicates_within_one_batch() {
        let (_dir, mut c) = collection();
        assert_eq!(c.merge(codes(&["X", "X"])), 1);
        assert_eq!(c.size(), 1);
    }

    #[test]
    fn repeated_merges_keep_the_union() {
        let (_dir, mut c) = collection();
        c.merge(codes(&["A", "B"]));
        c.merge(codes(&["B", "C"]));
        c.merge(codes(&["A", "C", "D"]));
        let mut seen: Vec<&str> = c.newest_first().map(|c| c.code.as_str()).collect();
        seen.sort();
        assert_eq!(seen, vec!["A", "B", "C", "D"]);
        assert_eq!(c.size(), 4);
    }

    #[test]
    fn merge_does_not_touch_known_records() {
        let (_dir, mut c) = collection();
        let mut settled = ShiftCode::new("A", "first", "");
        settled.mark_redeemed();
        c.merge([settled]);
        c.merge([ShiftCode::new("A", "second", "")]);
        let a = c.get("A").unwrap();
        assert!(a.redeemed());
        assert_eq!(a.description, "first");
    }

    #[test]
    fn newest_first_is_reverse_insertion() {
        let (_dir, mut c) = collection();
        c.merge(codes(&["A", "B", "C"]));
        let order: Vec<&str> = c.newest_first().map(|c| c.code.as_str()).collect();
        assert_eq!(order, vec!["C", "B", "A"]);
        assert_eq!(c.row(0).unwrap().code, "C");
        assert!(c.row(3).is_err());
    }

    #[test]
    fn missing_game_or_platform_clears() {
        let (_dir, mut c) = collection();
        c.merge(codes(&["A"]));
        c.query(None, Some(Platform::Epic), true).unwrap();
        assert!(c.is_empty());
        assert_eq!(c.scope(), None);
        c.commit().unwrap();
    }

    #[test]
    fn query_without_refresh_keeps_cached_view() {
        let (_dir, mut c) = collection();
        c.merge(codes(&["A"]));
        c.query(Some(Game::Bl3), Some(Platform::Epic), false).unwrap();
        assert_eq!(c.size(), 1);
        c.query(Some(Game::Bl3), Some(Platform::Epic), true).unwrap();
        assert_eq!(c.size(), 0);
    }

    #[test]
    fn commit_round_trips_multiline_descriptions() {
        let (_dir, mut c) = collection();
        c.merge([ShiftCode::new("A", "3 Golden Keys\nvia twitter", "2024-01-01")]);
        c.commit().unwrap();
        c.query(Some(Game::Bl3), Some(Platform::Epic), true).unwrap();
        assert_eq!(c.get("A").unwrap().description, "3 Golden Keys\nvia twitter");
        assert_eq!(c.golden_keys(CodeKind::All), 3);
        assert_eq!(c.golden_keys(CodeKind::NonGolden), 0);
    }

    #[test]
    fn repeated_lines_in_the_file_load_as_one_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("codes.jsonl");
        let line = |redeemed: bool| {
            format!(
                r#"{{"game":"bl3","platform":"epic","code":"X","description":"first","expires":"","redeemed":{redeemed}}}"#
            )
        };
        let data = [line(false), line(true), line(false)].join("\n");
        std::fs::write(&path, data + "\n").unwrap();

        let mut c = Collection::new(Arc::new(JsonlCodeStore::new(&path)));
        c.query(Some(Game::Bl3), Some(Platform::Epic), true).unwrap();
        assert_eq!(c.size(), 1);
        assert!(c.get("X").unwrap().redeemed());
        assert_eq!(c.unredeemed_count(), 0);
    }

    #[test]
    fn golden_key_totals_do_not_overflow() {
        let (_dir, mut c) = collection();
        c.merge([
            ShiftCode::new("A", "4000000000 golden keys", ""),
            ShiftCode::new("B", "4000000000 golden keys", ""),
        ]);
        assert_eq!(c.golden_keys(CodeKind::All), 8_000_000_000);
    }
}
