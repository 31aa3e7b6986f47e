use crate::error::CodesError;
use crate::types::ShiftCode;
use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;

/// Outcome of one redemption attempt. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Status {
    Success,
    Expired,
    Redeemed,
    Invalid,
    TryLater,
    Unknown,
    None,
}

impl Status {
    pub const ALL: [Status; 7] = [
        Status::Success,
        Status::Expired,
        Status::Redeemed,
        Status::Invalid,
        Status::TryLater,
        Status::Unknown,
        Status::None,
    ];

    /// Statuses after which the code never needs another attempt.
    pub fn is_settling(&self) -> bool {
        matches!(
            self,
            Status::Success | Status::Redeemed | Status::Expired | Status::Invalid
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Status::Success => "success",
            Status::Expired => "expired",
            Status::Redeemed => "redeemed",
            Status::Invalid => "invalid",
            Status::TryLater => "trylater",
            Status::Unknown => "unknown",
            Status::None => "none",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Status {
    type Err = CodesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "success" => Ok(Status::Success),
            "expired" => Ok(Status::Expired),
            "redeemed" => Ok(Status::Redeemed),
            "invalid" => Ok(Status::Invalid),
            "trylater" | "try_later" => Ok(Status::TryLater),
            "unknown" => Ok(Status::Unknown),
            "none" => Ok(Status::None),
            other => Err(CodesError::UnknownStatus(other.to_string())),
        }
    }
}

/// User-facing texts, one per status plus the two engine-level outcomes.
///
/// Every status is a named field, so a table can't be built with a gap.
/// Templates may contain `{description}` and `{code}`.
#[derive(Clone, Debug)]
pub struct MessageTable {
    pub success: Cow<'static, str>,
    pub expired: Cow<'static, str>,
    pub redeemed: Cow<'static, str>,
    pub invalid: Cow<'static, str>,
    pub try_later: Cow<'static, str>,
    pub unknown: Cow<'static, str>,
    pub none: Cow<'static, str>,
    pub no_more_codes: Cow<'static, str>,
    pub already_settled: Cow<'static, str>,
}

impl Default for MessageTable {
    fn default() -> Self {
        Self {
            success: "Redeemed {description}".into(),
            expired: "This code expired by now.. ({description})".into(),
            redeemed: "Already redeemed {description}".into(),
            invalid: "The code `{code}` is invalid".into(),
            try_later: "Please launch a SHiFT-enabled title or wait 1 hour.".into(),
            unknown: "A unknown Error occured".into(),
            none: "Something unexpected happened..".into(),
            no_more_codes: "There is no more unredeemed SHiFT code left.".into(),
            already_settled: "This code was already redeemed.".into(),
        }
    }
}

impl MessageTable {
    pub fn template(&self, status: Status) -> &str {
        match status {
            Status::Success => &self.success,
            Status::Expired => &self.expired,
            Status::Redeemed => &self.redeemed,
            Status::Invalid => &self.invalid,
            Status::TryLater => &self.try_later,
            Status::Unknown => &self.unknown,
            Status::None => &self.none,
        }
    }

    /// Fill the template for `status` with the code's details.
    pub fn render(&self, status: Status, code: &ShiftCode) -> String {
        fill(self.template(status), code)
    }
}

/// Replace `{description}` and `{code}` in one pass, so text coming from a
/// record is never scanned for placeholders itself.
fn fill(template: &str, code: &ShiftCode) -> String {
    let mut msg = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        msg.push_str(&rest[..start]);
        let tail = &rest[start..];
        if let Some(after) = tail.strip_prefix("{description}") {
            msg.push_str(&code.one_line_description());
            rest = after;
        } else if let Some(after) = tail.strip_prefix("{code}") {
            msg.push_str(&code.code);
            rest = after;
        } else {
            msg.push('{');
            rest = &tail[1..];
        }
    }
    msg.push_str(rest);
    msg
}
