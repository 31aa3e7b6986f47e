use autoshift_codes::Collection;
use autoshift_codes::Game;
use autoshift_codes::Platform;
use autoshift_codes::Redeemer;
use autoshift_codes::RunSignal;
use autoshift_codes::ShiftCode;
use autoshift_codes::Status;
use autoshift_codes::discovery::Discovery;
use autoshift_codes::discovery::ParserRegistry;
use autoshift_codes::discovery::text::TextFeedParser;
use autoshift_codes::factory::Backend;
use autoshift_codes::factory::open_store;
use autoshift_codes::run::RunOptions;
use autoshift_codes::run::StopReason;
use autoshift_codes::run::run;
use autoshift_codes::types::CodeKind;
use autoshift_codes::types::Scope;
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn backends() -> Vec<Backend> {
    #[cfg(feature = "sqlite")]
    {
        vec![Backend::Jsonl, Backend::Sqlite]
    }
    #[cfg(not(feature = "sqlite"))]
    {
        vec![Backend::Jsonl]
    }
}

const FEED: &str = "\
5 Golden Keys AAAAA-AAAAA-AAAAA-AAAAA-AAAAA expires: 2030-01-01
Cosmetic head BBBBB-BBBBB-BBBBB-BBBBB-BBBBB
1 Golden Key CCCCC-CCCCC-CCCCC-CCCCC-CCCCC ~3 days
";

#[test]
fn redeemed_state_survives_reopening_the_store() {
    for be in backends() {
        let dir = tempfile::tempdir().unwrap();
        let store = open_store(dir.path(), Some(be)).unwrap();
        let mut collection = Collection::new(store);
        collection
            .query(Some(Game::Bl3), Some(Platform::Steam), true)
            .unwrap();
        collection.merge([
            ShiftCode::new("A", "", ""),
            ShiftCode::new("B", "", ""),
        ]);
        collection.commit().unwrap();

        let mut redeemer = Redeemer::default();
        let mut client = |_: &str| Status::Success;
        let outcome = redeemer.redeem_next(&mut collection, &mut client).unwrap();
        assert_eq!(outcome.signal, RunSignal::Continue);
        assert_eq!(outcome.code.as_deref(), Some("B"));

        let reopened = open_store(dir.path(), Some(be)).unwrap();
        let mut again = Collection::new(reopened);
        again
            .query(Some(Game::Bl3), Some(Platform::Steam), true)
            .unwrap();
        assert!(again.get("B").unwrap().redeemed(), "backend {be:?}");
        assert!(!again.get("A").unwrap().redeemed());
    }
}

#[test]
fn discover_then_redeem_from_a_feed() {
    for be in backends() {
        let dir = tempfile::tempdir().unwrap();
        let feed = dir.path().join("feed.txt");
        std::fs::write(&feed, FEED).unwrap();

        let scope = Scope::new(Game::Bl3, Platform::Epic);
        let mut registry = ParserRegistry::new();
        registry.register(scope, Arc::new(TextFeedParser::new(&feed).unwrap()));
        let discovery = Discovery::new(registry);

        let store = open_store(&dir.path().join("data"), Some(be)).unwrap();
        let mut collection = Collection::new(store.clone());
        collection
            .query(Some(Game::Bl3), Some(Platform::Epic), true)
            .unwrap();
        let report = discovery.discover_now(&mut collection).unwrap();
        assert!(report.success);
        assert_eq!(report.added, 3);
        assert_eq!(store.load(&scope).unwrap().len(), 3);

        // A second pass over the same feed finds nothing new.
        let report = discovery.discover_now(&mut collection).unwrap();
        assert_eq!(report.added, 0);

        let mut attempted = Vec::new();
        let mut client = |code: &str| {
            attempted.push(code.to_string());
            if code.starts_with("AAAAA") {
                Status::TryLater
            } else {
                Status::Success
            }
        };
        let report = run(
            &mut Redeemer::default(),
            &mut collection,
            &mut client,
            &RunOptions::default(),
            |_| {},
        )
        .unwrap();
        assert_eq!(report.stop, StopReason::RateLimited);
        assert_eq!(report.settled, 2);
        assert_eq!(
            attempted,
            vec![
                "CCCCC-CCCCC-CCCCC-CCCCC-CCCCC",
                "BBBBB-BBBBB-BBBBB-BBBBB-BBBBB",
                "AAAAA-AAAAA-AAAAA-AAAAA-AAAAA",
            ]
        );
        assert_eq!(collection.unredeemed_count(), 1);
        assert_eq!(collection.golden_keys(CodeKind::All), 5);
    }
}

#[test]
fn repeated_jsonl_lines_are_redeemed_once() {
    let dir = tempfile::tempdir().unwrap();
    let line = r#"{"game":"bl3","platform":"epic","code":"X","description":"","expires":""}"#;
    std::fs::write(dir.path().join("codes.jsonl"), format!("{line}\n{line}\n")).unwrap();

    let store = open_store(dir.path(), Some(Backend::Jsonl)).unwrap();
    let mut collection = Collection::new(store.clone());
    collection
        .query(Some(Game::Bl3), Some(Platform::Epic), true)
        .unwrap();
    assert_eq!(collection.size(), 1);

    let mut calls = 0;
    let mut client = |_: &str| {
        calls += 1;
        Status::Success
    };
    let report = run(
        &mut Redeemer::default(),
        &mut collection,
        &mut client,
        &RunOptions::default(),
        |_| {},
    )
    .unwrap();
    assert_eq!(report.stop, StopReason::Exhausted);
    assert_eq!(report.settled, 1);
    assert_eq!(calls, 1);

    let stored = store
        .load(&Scope::new(Game::Bl3, Platform::Epic))
        .unwrap();
    assert_eq!(stored.len(), 1);
    assert!(stored[0].redeemed());
}
