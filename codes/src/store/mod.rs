use crate::types::Game;
use crate::types::Platform;
use crate::types::Scope;
use crate::types::ShiftCode;

/// Persistence for shift codes, partitioned by scope.
pub trait CodeStore: Send + Sync {
    /// All records of `scope` in insertion order.
    fn load(&self, scope: &Scope) -> anyhow::Result<Vec<ShiftCode>>;
    /// Persist the full state of `scope`. A stored redeemed flag is never cleared.
    fn save(&self, scope: &Scope, codes: &[ShiftCode]) -> anyhow::Result<()>;
    fn scopes(&self) -> anyhow::Result<Vec<Scope>>;
    fn export(&self, out: &mut dyn std::io::Write) -> anyhow::Result<()>;
    fn import(&self, input: &mut dyn std::io::Read) -> anyhow::Result<usize>;
    fn stats(&self) -> anyhow::Result<serde_json::Value>;
}

/// One line of the JSONL interchange format.
#[derive(Clone, Debug, serde::Serialize, serde::Deserialize, PartialEq, Eq)]
pub struct CodeLine {
    pub game: Game,
    pub platform: Platform,
    #[serde(flatten)]
    pub code: ShiftCode,
}

impl CodeLine {
    pub fn new(scope: &Scope, code: ShiftCode) -> Self {
        Self {
            game: scope.game,
            platform: scope.platform,
            code,
        }
    }

    pub fn scope(&self) -> Scope {
        Scope::new(self.game, self.platform)
    }
}

/// Compute the stats document shared by all backends.
pub(crate) fn stats_of(lines: &[CodeLine]) -> serde_json::Value {
    let redeemed = lines.iter().filter(|l| l.code.redeemed()).count();
    let mut by_scope = serde_json::Map::new();
    for line in lines {
        let key = line.scope().to_string();
        let entry = by_scope
            .entry(key)
            .or_insert_with(|| serde_json::json!({ "total": 0, "redeemed": 0 }));
        if let Some(obj) = entry.as_object_mut() {
            let bump = |v: Option<&serde_json::Value>| v.and_then(|v| v.as_u64()).unwrap_or(0) + 1;
            let total = bump(obj.get("total"));
            obj.insert("total".to_string(), serde_json::json!(total));
            if line.code.redeemed() {
                let n = bump(obj.get("redeemed"));
                obj.insert("redeemed".to_string(), serde_json::json!(n));
            }
        }
    }
    let golden = lines
        .iter()
        .filter(|l| !l.code.redeemed())
        .filter_map(|l| l.code.golden_keys())
        .fold(0u64, |sum, n| sum.saturating_add(u64::from(n)));
    serde_json::json!({
        "total": lines.len(),
        "redeemed": redeemed,
        "unredeemed": lines.len() - redeemed,
        "unredeemed_golden_keys": golden,
        "by_scope": serde_json::Value::Object(by_scope),
    })
}

pub mod jsonl;
#[cfg(feature = "sqlite")]
pub mod sqlite;
