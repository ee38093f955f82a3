use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "typeahead")]
#[command(about = "Score-ranked autocomplete index over a local store", version)]
pub struct Cli {
    /// Path to the SQLite store file.
    #[arg(long, default_value = "typeahead.db")]
    pub store: PathBuf,

    /// Newline-delimited stop-words file; replaces the built-in list.
    #[arg(long, value_name = "FILE")]
    pub stop_words: Option<PathBuf>,

    /// Minimum prefix length considered for completion.
    #[arg(long, default_value_t = 2)]
    pub min_complete: usize,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Replace collection TYPE with items read from stdin as JSON lines.
    Load {
        #[arg(value_name = "TYPE")]
        collection: String,
    },
    /// Add items read from stdin as JSON lines; an existing id is replaced.
    Add {
        #[arg(value_name = "TYPE")]
        collection: String,
    },
    /// Remove items read from stdin as JSON lines; only "id" is read.
    Remove {
        #[arg(value_name = "TYPE")]
        collection: String,
    },
    /// Query a collection; matches are printed as JSON lines on stdout.
    Query {
        #[arg(value_name = "TYPE")]
        collection: String,
        #[arg(allow_hyphen_values = true)]
        query: String,
        #[command(flatten)]
        options: QueryArgs,
    },
}

#[derive(Debug, Args)]
pub struct QueryArgs {
    /// Maximum number of matches; 0 means all.
    #[arg(long, default_value_t = 5)]
    pub limit: usize,
    /// Recompute the intersection instead of reusing a cached result.
    #[arg(long, default_value_t = false)]
    pub no_cache: bool,
    /// Seconds a cached intersection stays valid.
    #[arg(long, default_value_t = 600)]
    pub expiry: u64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn load_parses_collection_and_store_defaults() {
        let cli = Cli::try_parse_from(["typeahead", "load", "venues"]).expect("parse");
        assert_eq!(cli.store, PathBuf::from("typeahead.db"));
        assert_eq!(cli.min_complete, 2);
        match cli.command {
            Commands::Load { collection } => assert_eq!(collection, "venues"),
            _ => panic!("expected load command"),
        }
    }

    #[test]
    fn query_parses_options_and_defaults() {
        let cli = Cli::try_parse_from([
            "typeahead", "query", "venues", "land shark", "--limit", "0", "--no-cache",
        ])
        .expect("parse");
        match cli.command {
            Commands::Query {
                collection,
                query,
                options,
            } => {
                assert_eq!(collection, "venues");
                assert_eq!(query, "land shark");
                assert_eq!(options.limit, 0);
                assert!(options.no_cache);
                assert_eq!(options.expiry, 600);
            }
            _ => panic!("expected query command"),
        }
    }

    #[test]
    fn global_options_parse_before_the_command() {
        let cli = Cli::try_parse_from([
            "typeahead",
            "--store",
            "/tmp/t.db",
            "--stop-words",
            "stops.txt",
            "--min-complete",
            "3",
            "remove",
            "venues",
        ])
        .expect("parse");
        assert_eq!(cli.store, PathBuf::from("/tmp/t.db"));
        assert_eq!(cli.stop_words, Some(PathBuf::from("stops.txt")));
        assert_eq!(cli.min_complete, 3);
        assert!(matches!(cli.command, Commands::Remove { .. }));
    }

    #[test]
    fn missing_command_is_rejected() {
        assert!(Cli::try_parse_from(["typeahead"]).is_err());
        assert!(Cli::try_parse_from(["typeahead", "frobnicate"]).is_err());
    }
}
