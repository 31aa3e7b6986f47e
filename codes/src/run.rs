//! Caller-side run loop over [`Redeemer::redeem_next_of`].

use crate::collection::Collection;
use crate::redeem::Redeemer;
use crate::redeem::Redemption;
use crate::redeem::RedemptionClient;
use crate::redeem::RunSignal;
use crate::status::Status;
use crate::types::CodeKind;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;

#[derive(Clone, Debug, Default)]
pub struct RunOptions {
    /// Stop after this many codes were settled.
    pub limit: Option<usize>,
    pub kind: CodeKind,
    /// Checked between codes; raising it ends the run cleanly.
    pub stop: Option<Arc<AtomicBool>>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StopReason {
    /// Nothing left to redeem.
    Exhausted,
    /// The remote side answered `TryLater`.
    RateLimited,
    /// The unresolved policy asked to stop, or an open code turned out to
    /// be settled already.
    Halted,
    LimitReached,
    Cancelled,
}

#[derive(Clone, Debug)]
pub struct RunReport {
    pub attempts: usize,
    pub settled: usize,
    pub statuses: BTreeMap<&'static str, usize>,
    pub stop: StopReason,
    /// Message of the outcome that ended the run.
    pub last_message: Option<String>,
}

/// Redeem codes one after another until the collection is exhausted, the
/// remote side rate-limits us, the limit is hit or `stop` is raised.
///
/// `on_outcome` sees every single outcome as it happens.
pub fn run<F>(
    redeemer: &mut Redeemer,
    collection: &mut Collection,
    client: &mut dyn RedemptionClient,
    options: &RunOptions,
    mut on_outcome: F,
) -> anyhow::Result<RunReport>
where
    F: FnMut(&Redemption),
{
    let mut report = RunReport {
        attempts: 0,
        settled: 0,
        statuses: BTreeMap::new(),
        stop: StopReason::Exhausted,
        last_message: None,
    };

    loop {
        if options
            .stop
            .as_ref()
            .is_some_and(|s| s.load(Ordering::SeqCst))
        {
            report.stop = StopReason::Cancelled;
            break;
        }
        if options.limit.is_some_and(|limit| report.settled >= limit) {
            report.stop = StopReason::LimitReached;
            break;
        }

        let outcome = redeemer.redeem_next_of(collection, client, options.kind)?;
        on_outcome(&outcome);
        if let Some(status) = outcome.status {
            report.attempts += 1;
            *report.statuses.entry(status.as_str()).or_default() += 1;
            if status.is_settling() {
                report.settled += 1;
            }
        }

        match outcome.signal {
            RunSignal::Continue => {}
            // The walk only offers open codes, so this means the collection
            // and the walk disagree; going on would offer the same code again.
            RunSignal::AlreadySettled => {
                tracing::warn!(code = ?outcome.code, "open code reported as already redeemed");
                report.stop = StopReason::Halted;
                report.last_message = Some(outcome.message);
                break;
            }
            RunSignal::NoMoreCodes => {
                report.stop = StopReason::Exhausted;
                report.last_message = Some(outcome.message);
                break;
            }
            RunSignal::Halt => {
                report.stop = if outcome.status == Some(Status::TryLater) {
                    StopReason::RateLimited
                } else {
                    StopReason::Halted
                };
                report.last_message = Some(outcome.message);
                break;
            }
        }
    }

    tracing::info!(
        attempts = report.attempts,
        settled = report.settled,
        stop = ?report.stop,
        "redemption run finished"
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redeem::UnresolvedPolicy;
    use crate::testing::ScriptedClient;
    use crate::testing::collection_with;
    use pretty_assertions::assert_eq;

    #[test]
    fn runs_until_exhausted() {
        let (store, mut collection) = collection_with(&[("A", ""), ("B", ""), ("C", "")]);
        let mut client =
            ScriptedClient::new(&[Status::Success, Status::Redeemed, Status::Invalid]);
        let report = run(
            &mut Redeemer::default(),
            &mut collection,
            &mut client,
            &RunOptions::default(),
            |_| {},
        )
        .unwrap();
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(report.settled, 3);
        assert_eq!(store.saves(), 3);
        assert_eq!(collection.unredeemed_count(), 0);
    }

    #[test]
    fn rate_limit_ends_the_run() {
        let (_store, mut collection) = collection_with(&[("A", ""), ("B", ""), ("C", "")]);
        let mut client = ScriptedClient::new(&[Status::Success, Status::TryLater]);
        let mut seen = Vec::new();
        let report = run(
            &mut Redeemer::default(),
            &mut collection,
            &mut client,
            &RunOptions::default(),
            |o| seen.push(o.message.clone()),
        )
        .unwrap();
        assert_eq!(report.stop, StopReason::RateLimited);
        assert_eq!(client.calls(), vec!["C", "B"]);
        assert_eq!(seen.len(), 2);
        assert!(!collection.get("B").unwrap().redeemed());
    }

    #[test]
    fn unknown_codes_do_not_spin() {
        let (_store, mut collection) = collection_with(&[("A", ""), ("B", "")]);
        let mut client = ScriptedClient::new(&[Status::Unknown, Status::Unknown]);
        let report = run(
            &mut Redeemer::new(UnresolvedPolicy::Skip),
            &mut collection,
            &mut client,
            &RunOptions::default(),
            |_| {},
        )
        .unwrap();
        assert_eq!(report.stop, StopReason::Exhausted);
        assert_eq!(report.attempts, 2);
        assert_eq!(report.settled, 0);
        assert_eq!(report.statuses.get("unknown"), Some(&2));
    }

    #[test]
    fn halt_policy_reports_halted() {
        let (_store, mut collection) = collection_with(&[("A", "")]);
        let mut client = ScriptedClient::new(&[Status::None]);
        let report = run(
            &mut Redeemer::new(UnresolvedPolicy::Halt),
            &mut collection,
            &mut client,
            &RunOptions::default(),
            |_| {},
        )
        .unwrap();
        assert_eq!(report.stop, StopReason::Halted);
    }

    #[test]
    fn limit_and_kind_are_respected() {
        let (_store, mut collection) = collection_with(&[
            ("A", "1 Golden Key"),
            ("B", "Cosmetic"),
            ("C", "3 Golden Keys"),
            ("D", "5 Golden Keys"),
        ]);
        let mut client = ScriptedClient::new(&[Status::Success, Status::Success]);
        let options = RunOptions {
            limit: Some(2),
            kind: CodeKind::Golden,
            stop: None,
        };
        let report = run(
            &mut Redeemer::default(),
            &mut collection,
            &mut client,
            &options,
            |_| {},
        )
        .unwrap();
        assert_eq!(report.stop, StopReason::LimitReached);
        assert_eq!(client.calls(), vec!["D", "C"]);
    }

    #[test]
    fn stop_flag_cancels_between_codes() {
        let (_store, mut collection) = collection_with(&[("A", ""), ("B", "")]);
        let stop = Arc::new(AtomicBool::new(false));
        let options = RunOptions {
            stop: Some(stop.clone()),
            ..RunOptions::default()
        };
        let mut client = ScriptedClient::new(&[Status::Success, Status::Success]);
        let report = run(
            &mut Redeemer::default(),
            &mut collection,
            &mut client,
            &options,
            |_| stop.store(true, Ordering::SeqCst),
        )
        .unwrap();
        assert_eq!(report.stop, StopReason::Cancelled);
        assert_eq!(report.settled, 1);
        assert!(collection.get("B").unwrap().redeemed());
        assert!(!collection.get("A").unwrap().redeemed());
    }
}
