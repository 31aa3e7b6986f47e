use crate::store::CodeStore;
use crate::store::jsonl::JsonlCodeStore;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;

#[cfg(feature = "sqlite")]
use crate::store::sqlite::SqliteCodeStore;

/// Backend selection for code persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Jsonl,
    #[cfg(feature = "sqlite")]
    Sqlite,
}

/// Choose backend using env `AUTOSHIFT_BACKEND` if present: `sqlite` or `jsonl`.
/// Defaults to JSONL; if `sqlite` is requested but not compiled in, falls back to JSONL.
pub fn choose_backend_from_env() -> Backend {
    let v = std::env::var("AUTOSHIFT_BACKEND").unwrap_or_default();
    match v.as_str() {
        #[cfg(feature = "sqlite")]
        "sqlite" | "SQLITE" => Backend::Sqlite,
        "" | "jsonl" | "JSONL" => Backend::Jsonl,
        other => {
            tracing::warn!("unsupported AUTOSHIFT_BACKEND `{other}`, using jsonl");
            Backend::Jsonl
        }
    }
}

/// `$AUTOSHIFT_HOME`, else `<data dir>/autoshift`, else `./.autoshift`.
pub fn default_data_dir() -> PathBuf {
    if let Ok(home) = std::env::var("AUTOSHIFT_HOME")
        && !home.is_empty()
    {
        return PathBuf::from(home);
    }
    dirs::data_dir()
        .map(|d| d.join("autoshift"))
        .unwrap_or_else(|| PathBuf::from(".autoshift"))
}

/// Build a store inside `data_dir`.
/// Paths can be overridden via env:
/// - `AUTOSHIFT_DB` for SQLite file path
/// - `AUTOSHIFT_JSONL` for JSONL file path
pub fn open_store(data_dir: &Path, backend: Option<Backend>) -> anyhow::Result<Arc<dyn CodeStore>> {
    let be = backend.unwrap_or_else(choose_backend_from_env);
    Ok(match be {
        Backend::Jsonl => {
            let path = std::env::var("AUTOSHIFT_JSONL")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("codes.jsonl"));
            tracing::debug!(path = %path.display(), "opening jsonl code store");
            Arc::new(JsonlCodeStore::new(path))
        }
        #[cfg(feature = "sqlite")]
        Backend::Sqlite => {
            let path = std::env::var("AUTOSHIFT_DB")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_dir.join("codes.db"));
            if let Some(dir) = path.parent() {
                std::fs::create_dir_all(dir)?;
            }
            tracing::debug!(path = %path.display(), "opening sqlite code store");
            Arc::new(SqliteCodeStore::new(path))
        }
    })
}
