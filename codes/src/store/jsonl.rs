use super::*;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;

/// Single-file JSONL store. Each line encodes one [`CodeLine`].
#[derive(Debug, Clone)]
pub struct JsonlCodeStore {
    path: PathBuf,
}

impl JsonlCodeStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read_file(&self) -> anyhow::Result<(Vec<CodeLine>, Vec<String>)> {
        let data = match std::fs::read_to_string(&self.path) {
            Ok(s) => s,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let (lines, unreadable) = split_lines(&data);
        if !unreadable.is_empty() {
            tracing::warn!(
                path = %self.path.display(),
                count = unreadable.len(),
                "code store has unreadable lines; keeping them as they are"
            );
        }
        Ok((lines, unreadable))
    }

    fn read_all(&self) -> anyhow::Result<Vec<CodeLine>> {
        Ok(self.read_file()?.0)
    }

    /// Rewrite the file. `unreadable` lines go back verbatim after the records.
    fn write_all(&self, lines: &[CodeLine], unreadable: &[String]) -> anyhow::Result<()> {
        let mut out = String::new();
        for line in lines {
            out.push_str(&serde_json::to_string(line)?);
            out.push('\n');
        }
        for raw in unreadable {
            out.push_str(raw);
            out.push('\n');
        }
        if let Some(dir) = self.path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        std::fs::write(&self.path, out)?;
        tracing::debug!(path = %self.path.display(), records = lines.len(), "wrote code store");
        Ok(())
    }
}

/// Parse JSONL text, skipping blank and unreadable lines.
pub(crate) fn parse_lines(data: &str) -> Vec<CodeLine> {
    split_lines(data).0
}

/// Records plus the non-blank lines that did not parse.
fn split_lines(data: &str) -> (Vec<CodeLine>, Vec<String>) {
    let mut lines = Vec::new();
    let mut unreadable = Vec::new();
    for (n, line) in data.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        match serde_json::from_str::<CodeLine>(line) {
            Ok(l) => lines.push(l),
            Err(e) => {
                tracing::debug!("unreadable line {}: {e}", n + 1);
                unreadable.push(line.to_string());
            }
        }
    }
    (lines, unreadable)
}

/// Fold `incoming` into `lines`: new codes are appended, known ones only
/// pick up a redeemed flag. Returns how many were appended.
pub(crate) fn merge_lines(lines: &mut Vec<CodeLine>, incoming: Vec<CodeLine>) -> usize {
    let mut added = 0;
    for line in incoming {
        let scope = line.scope();
        match lines
            .iter_mut()
            .find(|l| l.scope() == scope && l.code.code == line.code.code)
        {
            Some(existing) => {
                if line.code.redeemed() {
                    existing.code.mark_redeemed();
                }
            }
            None => {
                lines.push(line);
                added += 1;
            }
        }
    }
    added
}

impl CodeStore for JsonlCodeStore {
    fn load(&self, scope: &Scope) -> anyhow::Result<Vec<ShiftCode>> {
        Ok(self
            .read_all()?
            .into_iter()
            .filter(|l| l.scope() == *scope)
            .map(|l| l.code)
            .collect())
    }

    fn save(&self, scope: &Scope, codes: &[ShiftCode]) -> anyhow::Result<()> {
        let (existing, unreadable) = self.read_file()?;
        let settled: HashSet<String> = existing
            .iter()
            .filter(|l| l.scope() == *scope && l.code.redeemed())
            .map(|l| l.code.code.clone())
            .collect();
        let mut lines: Vec<CodeLine> = existing
            .into_iter()
            .filter(|l| l.scope() != *scope)
            .collect();
        for code in codes {
            let mut code = code.clone();
            if settled.contains(&code.code) {
                code.mark_redeemed();
            }
            lines.push(CodeLine::new(scope, code));
        }
        self.write_all(&lines, &unreadable)
    }

    fn scopes(&self) -> anyhow::Result<Vec<Scope>> {
        let mut out: Vec<Scope> = Vec::new();
        for line in self.read_all()? {
            let scope = line.scope();
            if !out.contains(&scope) {
                out.push(scope);
            }
        }
        Ok(out)
    }

    fn export(&self, out: &mut dyn std::io::Write) -> anyhow::Result<()> {
        for line in self.read_all()? {
            out.write_all(serde_json::to_string(&line)?.as_bytes())?;
            out.write_all(b"\n")?;
        }
        Ok(())
    }

    fn import(&self, input: &mut dyn std::io::Read) -> anyhow::Result<usize> {
        let mut data = String::new();
        input.read_to_string(&mut data)?;
        let (mut lines, unreadable) = self.read_file()?;
        let added = merge_lines(&mut lines, parse_lines(&data));
        self.write_all(&lines, &unreadable)?;
        Ok(added)
    }

    fn stats(&self) -> anyhow::Result<serde_json::Value> {
        Ok(stats_of(&self.read_all()?))
    }
}
