use std::io::Read;
use std::path::Path;
use std::{fs, io};

use anyhow::{Context, Result};
use typeahead_core::jsonl::{jsonl_all_lines_invalid, parse_jsonl_tolerant};
use typeahead_core::{
    IndexSettings, IndexStore, Item, ItemRef, Loader, MatchOptions, Matcher, SqliteStore,
};

use crate::cli::{Cli, Commands, QueryArgs};

pub(crate) fn run(cli: Cli) -> Result<()> {
    let settings = build_settings(&cli)?;
    let store = SqliteStore::open(&cli.store)
        .with_context(|| format!("failed to open store at {}", cli.store.display()))?;

    match cli.command {
        Commands::Load { collection } => {
            let items = read_items::<Item>("items", &mut io::stdin())?;
            let count = load_items(&Loader::new(collection, settings, store), items)?;
            println!("Loaded a total of {count} items");
        }
        Commands::Add { collection } => {
            let items = read_items::<Item>("items", &mut io::stdin())?;
            let count = add_items(&Loader::new(collection, settings, store), &items)?;
            println!("Loaded a total of {count} items");
        }
        Commands::Remove { collection } => {
            let refs = read_items::<ItemRef>("item refs", &mut io::stdin())?;
            let count = remove_items(&Loader::new(collection, settings, store), &refs)?;
            println!("Removed a total of {count} items");
        }
        Commands::Query {
            collection,
            query,
            options,
        } => {
            eprintln!("> Querying '{collection}' for '{query}'");
            let matcher = Matcher::new(collection, settings, store);
            let results = matcher.matches(&query, &match_options(&options))?;
            for item in &results {
                println!("{}", serde_json::to_string(item)?);
            }
            eprintln!("> Found {} matches for '{}'", results.len(), query);
        }
    }
    Ok(())
}

fn build_settings(cli: &Cli) -> Result<IndexSettings> {
    let mut settings = IndexSettings::default().with_min_complete(cli.min_complete);
    if let Some(path) = &cli.stop_words {
        settings = settings.with_stop_words(read_stop_words(path)?);
    }
    Ok(settings)
}

/// Stop-words file: one word per line, normalized on load, blank lines
/// dropped.
fn read_stop_words(path: &Path) -> Result<Vec<String>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read stop words from {}", path.display()))?;
    Ok(raw.lines().map(str::to_string).collect())
}

fn match_options(args: &QueryArgs) -> MatchOptions {
    MatchOptions {
        limit: args.limit,
        cache: !args.no_cache,
        expiry_secs: args.expiry,
    }
}

fn read_items<T: serde::de::DeserializeOwned>(label: &str, input: &mut dyn Read) -> Result<Vec<T>> {
    let mut raw = String::new();
    input.read_to_string(&mut raw).context("failed to read stdin")?;
    parse_items(label, &raw)
}

fn parse_items<T: serde::de::DeserializeOwned>(label: &str, raw: &str) -> Result<Vec<T>> {
    let outcome = parse_jsonl_tolerant::<T>(raw);
    if outcome.items.is_empty() && outcome.skipped_lines > 0 {
        return Err(jsonl_all_lines_invalid(
            label,
            outcome.skipped_lines,
            outcome.first_error.as_ref(),
        )
        .into());
    }
    if outcome.skipped_lines > 0 {
        eprintln!("! Skipped {} invalid input lines", outcome.skipped_lines);
    }
    Ok(outcome.items)
}

fn load_items<S: IndexStore>(loader: &Loader<S>, items: Vec<Item>) -> Result<usize> {
    if items.is_empty() {
        return Ok(0);
    }
    let loaded = loader.load(items)?;
    Ok(loaded.len())
}

fn add_items<S: IndexStore>(loader: &Loader<S>, items: &[Item]) -> Result<usize> {
    for item in items {
        loader.add(item, false)?;
    }
    Ok(items.len())
}

fn remove_items<S: IndexStore>(loader: &Loader<S>, refs: &[ItemRef]) -> Result<usize> {
    for item_ref in refs {
        loader.remove(item_ref)?;
    }
    Ok(refs.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use typeahead_core::MemoryStore;

    const VENUES: &str = concat!(
        "{\"id\":1,\"term\":\"Dodger Stadium\",\"score\":85}\n",
        "{\"id\":3,\"term\":\"Citi Field\",\"score\":95,\"aliases\":[\"Shea Stadium\"]}\n",
    );

    fn loader(store: &MemoryStore) -> Loader<MemoryStore> {
        Loader::new("venues", IndexSettings::default(), store.clone())
    }

    #[test]
    fn load_then_query_round_trips_through_the_handlers() {
        let store = MemoryStore::new();
        let items = parse_items::<Item>("items", VENUES).expect("parse");
        let count = load_items(&loader(&store), items).expect("load");
        assert_eq!(count, 2);

        let matcher = Matcher::new("venues", IndexSettings::default(), store);
        let hits = matcher
            .matches("stad", &MatchOptions::default())
            .expect("query");
        assert_eq!(hits[0].term, "Citi Field");
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn remove_reads_only_the_id_field() {
        let store = MemoryStore::new();
        let items = parse_items::<Item>("items", VENUES).expect("parse");
        load_items(&loader(&store), items).expect("load");

        let refs = parse_items::<ItemRef>(
            "item refs",
            "{\"id\":3,\"term\":\"completely ignored\"}\n",
        )
        .expect("parse");
        let removed = remove_items(&loader(&store), &refs).expect("remove");
        assert_eq!(removed, 1);

        let matcher = Matcher::new("venues", IndexSettings::default(), store);
        let hits = matcher
            .matches("stad", &MatchOptions::default())
            .expect("query");
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].term, "Dodger Stadium");
    }

    #[test]
    fn partially_invalid_input_is_tolerated() {
        let raw = format!("not json\n{VENUES}");
        let items = parse_items::<Item>("items", &raw).expect("parse");
        assert_eq!(items.len(), 2);
    }

    #[test]
    fn fully_invalid_input_is_an_error() {
        let err = parse_items::<Item>("items", "garbage\n").expect_err("must fail");
        assert!(err.to_string().contains("items parse failed"));
    }

    #[test]
    fn empty_input_loads_zero_items() {
        let store = MemoryStore::new();
        let count = load_items(&loader(&store), Vec::new()).expect("load");
        assert_eq!(count, 0);
    }

    #[test]
    fn sqlite_store_backs_the_cli_end_to_end() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = SqliteStore::open(dir.path().join("cli.db")).expect("open");
        let items = parse_items::<Item>("items", VENUES).expect("parse");
        load_items(
            &Loader::new("venues", IndexSettings::default(), store.clone()),
            items,
        )
        .expect("load");
        let matcher = Matcher::new("venues", IndexSettings::default(), store);
        let hits = matcher
            .matches("shea", &MatchOptions::default())
            .expect("query");
        assert_eq!(hits[0].term, "Citi Field");
    }
}
