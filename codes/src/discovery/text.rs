//! Codes from plain text, e.g. a saved feed or a copy of a code table.
//!
//! Every `XXXXX-XXXXX-XXXXX-XXXXX-XXXXX` token on a line becomes a code; the
//! rest of the line is its description. An `expires: ...` marker is kept
//! verbatim, a relative hint like `~3 days` or `48 hours` is turned into a
//! timestamp.

use super::CodeParser;
use crate::types::Scope;
use crate::types::ShiftCode;
use chrono::DateTime;
use chrono::TimeDelta;
use chrono::Utc;
use regex::Regex;
use std::path::Path;
use std::path::PathBuf;

pub struct CodeExtractor {
    code_re: Regex,
    expires_re: Regex,
    relative_re: Regex,
}

impl CodeExtractor {
    pub fn new() -> anyhow::Result<Self> {
        Ok(Self {
            code_re: Regex::new(r"\b[A-Z0-9]{5}(?:-[A-Z0-9]{5}){4}\b")?,
            expires_re: Regex::new(r"(?i)\bexpires?\b\s*:?\s*(.+)$")?,
            relative_re: Regex::new(r"(?i)~?(\d+(?:\.\d+)?)\s*(days?|hours?)\b")?,
        })
    }

    /// All codes in `text`, in the order they appear.
    pub fn extract(&self, text: &str, now: DateTime<Utc>) -> Vec<ShiftCode> {
        let mut out = Vec::new();
        for line in text.lines() {
            let codes: Vec<&str> = self.code_re.find_iter(line).map(|m| m.as_str()).collect();
            if codes.is_empty() {
                continue;
            }
            let rest = self.code_re.replace_all(line, "");
            let (description, expires) = self.split_expiry(&rest, now);
            for code in codes {
                out.push(ShiftCode::new(code, description.clone(), expires.clone()));
            }
        }
        out
    }

    fn split_expiry(&self, rest: &str, now: DateTime<Utc>) -> (String, String) {
        if let Some(caps) = self.expires_re.captures(rest)
            && let (Some(all), Some(value)) = (caps.get(0), caps.get(1))
        {
            let description = tidy(&rest[..all.start()]);
            let value = value.as_str().trim();
            let expires = self
                .relative(value, now)
                .unwrap_or_else(|| value.to_string());
            return (description, expires);
        }
        if let Some(expires) = self.relative(rest, now) {
            return (tidy(rest), expires);
        }
        (tidy(rest), String::new())
    }

    fn relative(&self, text: &str, now: DateTime<Utc>) -> Option<String> {
        let caps = self.relative_re.captures(text)?;
        let amount: f64 = caps.get(1)?.as_str().parse().ok()?;
        let unit_secs = if caps.get(2)?.as_str().to_ascii_lowercase().starts_with("day") {
            86_400.0
        } else {
            3_600.0
        };
        let delta = TimeDelta::try_seconds((amount * unit_secs) as i64)?;
        let at = now.checked_add_signed(delta)?;
        Some(at.format("%Y-%m-%d %H:%M UTC").to_string())
    }
}

fn tidy(s: &str) -> String {
    s.trim_matches(|c: char| c.is_whitespace() || matches!(c, '-' | ':' | '|' | ','))
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Parser over a local text file, re-read on every discovery.
pub struct TextFeedParser {
    path: PathBuf,
    extractor: CodeExtractor,
}

impl TextFeedParser {
    pub fn new<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        Ok(Self {
            path: path.as_ref().to_path_buf(),
            extractor: CodeExtractor::new()?,
        })
    }
}

impl CodeParser for TextFeedParser {
    fn discover(&self, scope: &Scope, sink: &mut Vec<ShiftCode>) -> anyhow::Result<()> {
        let text = std::fs::read_to_string(&self.path)
            .map_err(|e| anyhow::anyhow!("read feed {}: {e}", self.path.display()))?;
        let found = self.extractor.extract(&text, Utc::now());
        tracing::debug!(%scope, found = found.len(), feed = %self.path.display(), "parsed feed");
        sink.extend(found);
        Ok(())
    }
}
