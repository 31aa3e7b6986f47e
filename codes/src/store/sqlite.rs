use super::*;
use crate::store::jsonl::parse_lines;
use rusqlite::Connection;
use rusqlite::params;

fn init_db(conn: &Connection) -> anyhow::Result<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        CREATE TABLE IF NOT EXISTS shift_codes (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            game TEXT NOT NULL,
            platform TEXT NOT NULL,
            code TEXT NOT NULL,
            description TEXT NOT NULL,
            expires TEXT NOT NULL,
            redeemed INTEGER NOT NULL DEFAULT 0,
            UNIQUE(game, platform, code)
        );
        CREATE INDEX IF NOT EXISTS idx_codes_scope ON shift_codes(game, platform);
        "#,
    )?;
    Ok(())
}

fn open_conn(path: &std::path::Path) -> anyhow::Result<Connection> {
    let conn = Connection::open(path)?;
    init_db(&conn)?;
    Ok(conn)
}

const UPSERT: &str = "INSERT INTO shift_codes (game, platform, code, description, expires, redeemed)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT(game, platform, code) DO UPDATE SET
        description=excluded.description,
        expires=excluded.expires,
        redeemed=MAX(redeemed, excluded.redeemed)";

/// Import keeps what is already stored and only lets a redeemed flag through.
const IMPORT: &str = "INSERT INTO shift_codes (game, platform, code, description, expires, redeemed)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT(game, platform, code) DO UPDATE SET
        redeemed=MAX(redeemed, excluded.redeemed)";

fn row_to_line(row: &rusqlite::Row<'_>) -> rusqlite::Result<CodeLine> {
    use rusqlite::types::Type;
    let conv_err = |idx: usize, msg: String| -> rusqlite::Error {
        rusqlite::Error::FromSqlConversionFailure(
            idx,
            Type::Text,
            Box::new(std::io::Error::new(std::io::ErrorKind::InvalidData, msg)),
        )
    };
    let game_s: String = row.get(0)?;
    let platform_s: String = row.get(1)?;
    Ok(CodeLine {
        game: game_s
            .parse()
            .map_err(|_| conv_err(0, format!("invalid game: {game_s}")))?,
        platform: platform_s
            .parse()
            .map_err(|_| conv_err(1, format!("invalid platform: {platform_s}")))?,
        code: ShiftCode::restored(
            row.get::<_, String>(2)?,
            row.get::<_, String>(3)?,
            row.get::<_, String>(4)?,
            row.get::<_, i64>(5)? != 0,
        ),
    })
}

fn all_lines(conn: &Connection) -> anyhow::Result<Vec<CodeLine>> {
    let mut stmt = conn.prepare(
        "SELECT game, platform, code, description, expires, redeemed
         FROM shift_codes ORDER BY id",
    )?;
    let mut rows = stmt.query([])?;
    let mut out = Vec::new();
    while let Some(row) = rows.next()? {
        out.push(row_to_line(row)?);
    }
    Ok(out)
}

#[derive(Debug, Clone)]
pub struct SqliteCodeStore {
    path: std::path::PathBuf,
}

impl SqliteCodeStore {
    pub fn new<P: AsRef<std::path::Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl CodeStore for SqliteCodeStore {
    fn load(&self, scope: &Scope) -> anyhow::Result<Vec<ShiftCode>> {
        let conn = open_conn(&self.path)?;
        let mut stmt = conn.prepare(
            "SELECT game, platform, code, description, expires, redeemed
             FROM shift_codes WHERE game = ?1 AND platform = ?2 ORDER BY id",
        )?;
        let mut rows = stmt.query(params![scope.game.as_str(), scope.platform.as_str()])?;
        let mut out = Vec::new();
        while let Some(row) = rows.next()? {
            out.push(row_to_line(row)?.code);
        }
        Ok(out)
    }

    fn save(&self, scope: &Scope, codes: &[ShiftCode]) -> anyhow::Result<()> {
        let mut conn = open_conn(&self.path)?;
        let tx = conn.transaction()?;
        for code in codes {
            tx.execute(
                UPSERT,
                params![
                    scope.game.as_str(),
                    scope.platform.as_str(),
                    code.code,
                    code.description,
                    code.expires,
                    i64::from(code.redeemed()),
                ],
            )?;
        }
        tx.commit()?;
        tracing::debug!(%scope, records = codes.len(), "saved codes to sqlite");
        Ok(())
    }

    fn scopes(&self) -> anyhow::Result<Vec<Scope>> {
        let mut out: Vec<Scope> = Vec::new();
        for line in all_lines(&open_conn(&self.path)?)? {
            let scope = line.scope();
            if !out.contains(&scope) {
                out.push(scope);
            }
        }
        Ok(out)
    }

    fn export(&self, out: &mut dyn std::io::Write) -> anyhow::Result<()> {
        for line in all_lines(&open_conn(&self.path)?)? {
            out.write_all(serde_json::to_string(&line)?.as_bytes())?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn import(&self, input: &mut dyn std::io::Read) -> anyhow::Result<usize> {
        let mut data = String::new();
        input.read_to_string(&mut data)?;
        let mut conn = open_conn(&self.path)?;
        let before: i64 = conn.query_row("SELECT COUNT(*) FROM shift_codes", [], |r| r.get(0))?;
        let tx = conn.transaction()?;
        for line in parse_lines(&data) {
            tx.execute(
                IMPORT,
                params![
                    line.game.as_str(),
                    line.platform.as_str(),
                    line.code.code,
                    line.code.description,
                    line.code.expires,
                    i64::from(line.code.redeemed()),
                ],
            )?;
        }
        tx.commit()?;
        let after: i64 = conn.query_row("SELECT COUNT(*) FROM shift_codes", [], |r| r.get(0))?;
        Ok(usize::try_from(after - before).unwrap_or(0))
    }

    fn stats(&self) -> anyhow::Result<serde_json::Value> {
        Ok(stats_of(&all_lines(&open_conn(&self.path)?)?))
    }
}
