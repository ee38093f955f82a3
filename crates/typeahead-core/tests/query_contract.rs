use std::{fs, path::PathBuf};

use typeahead_core::jsonl::parse_jsonl_tolerant;
use typeahead_core::{
    IndexSettings, IndexStore, Item, Loader, MatchOptions, Matcher, MemoryStore, SqliteStore,
};

fn fixture_items() -> Vec<Item> {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("venues.jsonl");
    let raw = fs::read_to_string(path).expect("read venues fixture");
    let outcome = parse_jsonl_tolerant::<Item>(&raw);
    assert_eq!(outcome.skipped_lines, 0, "fixture must be fully valid");
    assert_eq!(outcome.items.len(), 7);
    outcome.items
}

fn seeded<S: IndexStore + Clone>(store: S) -> Matcher<S> {
    let loader = Loader::new("venues", IndexSettings::default(), store.clone());
    loader.load(fixture_items()).expect("load venues");
    Matcher::new("venues", IndexSettings::default(), store)
}

fn terms(items: &[Item]) -> Vec<&str> {
    items.iter().map(|item| item.term.as_str()).collect()
}

fn venues_contract<S: IndexStore + Clone>(store: S) {
    let matcher = seeded(store);
    let defaults = MatchOptions::default();

    // Five venues share the "stadium" prefix; the default limit shows all
    // of them, best score first.
    let stad = matcher.matches("stad", &defaults).expect("query stad");
    assert_eq!(
        terms(&stad),
        vec![
            "Citi Field",
            "Yankee Stadium",
            "Dodger Stadium",
            "Angel Stadium",
            "Sun Life Stadium",
        ]
    );

    // Multi-word intersection narrows through an alias.
    let shark = matcher
        .matches("land shark stadium", &defaults)
        .expect("query land shark stadium");
    assert_eq!(terms(&shark), vec!["Sun Life Stadium"]);

    // CJK prefixes grow one ideograph at a time.
    let cjk = matcher.matches("中国", &defaults).expect("query cjk");
    assert_eq!(terms(&cjk), vec!["中国国家体育场"]);
    let cjk_longer = matcher.matches("中国国家", &defaults).expect("query cjk longer");
    assert_eq!(terms(&cjk_longer), vec!["中国国家体育场"]);

    // "at" is a stop word; "att" comes from normalizing "AT&T".
    assert!(matcher.matches("at", &defaults).expect("query at").is_empty());
    let att = matcher.matches("att", &defaults).expect("query att");
    assert_eq!(terms(&att), vec!["AT&T Park"]);
    assert_eq!(att[0].id.as_member(), "6");
    assert_eq!(att[0].extra["city"], serde_json::json!("San Francisco"));

    // Limit truncates the ranked list.
    let top2 = matcher
        .matches(
            "stad",
            &MatchOptions {
                limit: 2,
                ..MatchOptions::default()
            },
        )
        .expect("query limited");
    assert_eq!(terms(&top2), vec!["Citi Field", "Yankee Stadium"]);
}

#[test]
fn venues_contract_holds_on_memory_store() {
    venues_contract(MemoryStore::new());
}

#[test]
fn venues_contract_holds_on_sqlite_store() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = SqliteStore::open(dir.path().join("venues.db")).expect("open");
    venues_contract(store);
}

#[test]
fn reload_is_idempotent_for_queries() {
    let store = MemoryStore::new();
    let loader = Loader::new("venues", IndexSettings::default(), store.clone());
    let matcher = Matcher::new("venues", IndexSettings::default(), store);
    let defaults = MatchOptions::default();

    loader.load(fixture_items()).expect("first load");
    let first = matcher.matches("stad", &defaults).expect("query");
    loader.load(fixture_items()).expect("second load");
    let second = matcher.matches("stad", &defaults).expect("query");
    assert_eq!(terms(&first), terms(&second));
}

#[test]
fn loaded_index_survives_sqlite_reopen() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("venues.db");
    {
        let store = SqliteStore::open(&path).expect("open");
        let loader = Loader::new("venues", IndexSettings::default(), store);
        loader.load(fixture_items()).expect("load");
    }
    let store = SqliteStore::open(&path).expect("reopen");
    let matcher = Matcher::new("venues", IndexSettings::default(), store);
    let hits = matcher
        .matches("yankee", &MatchOptions::default())
        .expect("query after reopen");
    assert_eq!(terms(&hits), vec!["Yankee Stadium"]);
}

#[test]
fn raised_min_complete_drops_short_query_words() {
    let store = MemoryStore::new();
    let settings = IndexSettings::default().with_min_complete(3);
    let loader = Loader::new("venues", settings.clone(), store.clone());
    let matcher = Matcher::new("venues", settings, store);
    loader.load(fixture_items()).expect("load");

    let defaults = MatchOptions::default();
    assert!(matcher.matches("中国", &defaults).expect("query").is_empty());
    let hits = matcher.matches("中国国", &defaults).expect("query");
    assert_eq!(terms(&hits), vec!["中国国家体育场"]);
}
