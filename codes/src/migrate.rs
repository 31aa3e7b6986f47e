use crate::store::CodeLine;
use crate::store::jsonl::merge_lines;
use crate::store::jsonl::parse_lines;

/// Migrate a JSONL file into a SQLite database file.
///
/// - `jsonl_path`: source JSONL (line‑delimited `CodeLine`)
/// - `sqlite_path`: destination SQLite DB (created if missing)
///
/// Returns the count of newly imported rows.
#[cfg(feature = "sqlite")]
pub fn migrate_jsonl_to_sqlite(
    jsonl_path: &std::path::Path,
    sqlite_path: &std::path::Path,
) -> anyhow::Result<usize> {
    use crate::store::CodeStore;
    use crate::store::sqlite::SqliteCodeStore;
    use std::io::Read as _;

    let mut data = String::new();
    std::fs::File::open(jsonl_path)?.read_to_string(&mut data)?;

    if let Some(dir) = sqlite_path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let store = SqliteCodeStore::new(sqlite_path);
    let mut cursor = std::io::Cursor::new(data);
    store.import(&mut cursor)
}

#[cfg(not(feature = "sqlite"))]
pub fn migrate_jsonl_to_sqlite(
    _jsonl_path: &std::path::Path,
    _sqlite_path: &std::path::Path,
) -> anyhow::Result<usize> {
    anyhow::bail!("sqlite backend not compiled; enable with `--features autoshift-codes/sqlite`");
}

/// Rewrite `input` into `output` without blank, malformed or duplicate lines.
/// The first occurrence of a code wins, but a later redeemed flag is kept.
///
/// Returns `(entries read, entries written)`.
pub fn compact_jsonl(
    input: &std::path::Path,
    output: &std::path::Path,
) -> anyhow::Result<(usize, usize)> {
    let data = std::fs::read_to_string(input)?;
    let read = data.lines().filter(|l| !l.trim().is_empty()).count();
    let mut lines: Vec<CodeLine> = Vec::new();
    merge_lines(&mut lines, parse_lines(&data));

    let mut out = String::new();
    for line in &lines {
        out.push_str(&serde_json::to_string(line)?);
        out.push('\n');
    }
    if let Some(dir) = output.parent() {
        std::fs::create_dir_all(dir)?;
    }
    std::fs::write(output, out)?;
    Ok((read, lines.len()))
}
