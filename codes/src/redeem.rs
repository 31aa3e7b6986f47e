//! Sequential redemption.
//!
//! One code is attempted per call. The returned [`RunSignal`] tells the
//! caller whether to go on with the next code or stop the whole run; the
//! engine itself never loops, sleeps or retries.

use crate::collection::Collection;
use crate::error::CodesError;
use crate::status::MessageTable;
use crate::status::Status;
use crate::types::CodeKind;
use crate::types::ShiftCode;
use std::collections::HashMap;
use std::collections::HashSet;
use std::str::FromStr;

/// Performs a single redemption call against the remote service.
///
/// Session handling lives behind this trait. `&mut self` keeps calls strictly
/// sequential: the remote rate limit is per account, not per code.
pub trait RedemptionClient {
    fn attempt_redeem(&mut self, code: &str) -> Status;
}

impl<F> RedemptionClient for F
where
    F: FnMut(&str) -> Status,
{
    fn attempt_redeem(&mut self, code: &str) -> Status {
        self(code)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RunSignal {
    /// Go on with the next code.
    Continue,
    /// Stop the run; the remote side asked us to wait.
    Halt,
    /// Every code in scope is settled. Not an error.
    NoMoreCodes,
    /// The requested code was already redeemed; nothing was sent.
    AlreadySettled,
}

/// What to do when a call comes back `Unknown` or `None`.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum UnresolvedPolicy {
    /// Leave the code for a later run and move on.
    #[default]
    Skip,
    /// Offer the same code again, at most `attempts` more times.
    Retry { attempts: u32 },
    /// Stop the run.
    Halt,
}

impl FromStr for UnresolvedPolicy {
    type Err = CodesError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim().to_ascii_lowercase();
        match s.as_str() {
            "skip" | "continue" => return Ok(UnresolvedPolicy::Skip),
            "halt" | "stop" => return Ok(UnresolvedPolicy::Halt),
            _ => {}
        }
        if let Some(n) = s.strip_prefix("retry:")
            && let Ok(attempts) = n.parse()
        {
            return Ok(UnresolvedPolicy::Retry { attempts });
        }
        if s == "retry" {
            return Ok(UnresolvedPolicy::Retry { attempts: 1 });
        }
        Err(CodesError::UnknownPolicy(s))
    }
}

/// Result of one engine call. Every outcome carries exactly one message.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Redemption {
    pub signal: RunSignal,
    /// Remote answer, if a call was made.
    pub status: Option<Status>,
    pub code: Option<String>,
    pub message: String,
}

/// Drives redemption for one run.
///
/// Codes left unresolved under [`UnresolvedPolicy::Skip`] (or after their
/// retries) are deferred until [`Redeemer::reset`] or a new `Redeemer`.
#[derive(Debug, Default)]
pub struct Redeemer {
    messages: MessageTable,
    policy: UnresolvedPolicy,
    unresolved: HashMap<String, u32>,
    deferred: HashSet<String>,
}

impl Redeemer {
    pub fn new(policy: UnresolvedPolicy) -> Self {
        Self {
            policy,
            ..Self::default()
        }
    }

    pub fn with_messages(mut self, messages: MessageTable) -> Self {
        self.messages = messages;
        self
    }

    pub fn policy(&self) -> UnresolvedPolicy {
        self.policy
    }

    pub fn messages(&self) -> &MessageTable {
        &self.messages
    }

    /// Start a fresh run: deferred codes become eligible again.
    pub fn reset(&mut self) {
        self.unresolved.clear();
        self.deferred.clear();
    }

    pub fn deferred(&self) -> impl Iterator<Item = &str> {
        self.deferred.iter().map(String::as_str)
    }

    /// The code `redeem_next_of` would attempt, without attempting it.
    pub fn next_candidate<'a>(
        &self,
        collection: &'a Collection,
        kind: CodeKind,
    ) -> Option<&'a ShiftCode> {
        collection
            .newest_first()
            .filter(|c| !c.redeemed() && kind.matches(c))
            .find(|c| !self.deferred.contains(&c.code))
    }

    /// Redeem the newest code that is still open.
    pub fn redeem_next(
        &mut self,
        collection: &mut Collection,
        client: &mut dyn RedemptionClient,
    ) -> anyhow::Result<Redemption> {
        self.redeem_next_of(collection, client, CodeKind::All)
    }

    /// Like [`Redeemer::redeem_next`], restricted to codes of `kind`.
    pub fn redeem_next_of(
        &mut self,
        collection: &mut Collection,
        client: &mut dyn RedemptionClient,
        kind: CodeKind,
    ) -> anyhow::Result<Redemption> {
        let Some(code) = self
            .next_candidate(collection, kind)
            .map(|c| c.code.clone())
        else {
            let message = self.messages.no_more_codes.to_string();
            tracing::info!("{message}");
            return Ok(Redemption {
                signal: RunSignal::NoMoreCodes,
                status: None,
                code: None,
                message,
            });
        };
        self.redeem(collection, &code, client)
    }

    /// Redeem the record shown at `row` of the newest-first view.
    pub fn redeem_row(
        &mut self,
        collection: &mut Collection,
        row: usize,
        client: &mut dyn RedemptionClient,
    ) -> anyhow::Result<Redemption> {
        let code = collection.row(row)?.code.clone();
        self.redeem(collection, &code, client)
    }

    /// Attempt one specific code of `collection`.
    pub fn redeem(
        &mut self,
        collection: &mut Collection,
        code: &str,
        client: &mut dyn RedemptionClient,
    ) -> anyhow::Result<Redemption> {
        let record = match collection.get(code) {
            Some(r) => r.clone(),
            None => {
                return Err(CodesError::CodeNotFound {
                    scope: collection
                        .scope()
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "none".to_string()),
                    code: code.to_string(),
                }
                .into());
            }
        };

        if record.redeemed() {
            let message = self.messages.already_settled.to_string();
            tracing::info!(code, "{message}");
            return Ok(Redemption {
                signal: RunSignal::AlreadySettled,
                status: None,
                code: Some(record.code),
                message,
            });
        }

        let status = client.attempt_redeem(&record.code);
        let message = self.messages.render(status, &record);

        let signal = match status {
            Status::Success | Status::Redeemed | Status::Expired | Status::Invalid => {
                tracing::info!(code, %status, "{message}");
                if let Some(r) = collection.get_mut(code) {
                    r.mark_redeemed();
                }
                self.unresolved.remove(code);
                self.deferred.remove(code);
                collection.commit()?;
                RunSignal::Continue
            }
            Status::TryLater => {
                tracing::warn!(code, %status, "{message}");
                RunSignal::Halt
            }
            Status::Unknown | Status::None => {
                tracing::warn!(code, %status, policy = ?self.policy, "{message}");
                self.unresolved_signal(code)
            }
        };

        Ok(Redemption {
            signal,
            status: Some(status),
            code: Some(record.code),
            message,
        })
    }

    fn unresolved_signal(&mut self, code: &str) -> RunSignal {
        match self.policy {
            UnresolvedPolicy::Skip => {
                self.deferred.insert(code.to_string());
                RunSignal::Continue
            }
            UnresolvedPolicy::Retry { attempts } => {
                let failures = self.unresolved.entry(code.to_string()).or_insert(0);
                *failures += 1;
                if *failures > attempts {
                    self.deferred.insert(code.to_string());
                }
                RunSignal::Continue
            }
            UnresolvedPolicy::Halt => RunSignal::Halt,
        }
    }
}
