//! satchel-cache: offline ops tool for the persistent entry store.
//!
//! Operates directly on the SQLite file, so it must not run while a
//! daemon holds the store in a non-WAL-compatible way; WAL mode makes
//! concurrent reads safe.

use std::path::PathBuf;

use anyhow::{Result, bail};
use chrono::{Duration, SecondsFormat, Utc};
use clap::{Parser, Subcommand};
use satchel_core::{CacheStore, Error};

/// Inspect and maintain the satchel response cache.
#[derive(Debug, Parser)]
#[command(name = "satchel-cache", version, about = "satchel cache maintenance")]
struct Args {
    /// Path to the SQLite entry store.
    #[arg(long, env = "SATCHEL_DB_PATH", default_value = "./satchel-cache.sqlite")]
    db_path: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// List entries, newest first.
    List {
        /// Restrict to one namespace.
        #[arg(long)]
        namespace: Option<String>,

        /// Maximum number of entries to print.
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },

    /// Show one entry by namespace and URL, body elided.
    Show {
        namespace: String,
        url: String,

        /// Print the body as UTF-8 text as well.
        #[arg(long)]
        body: bool,
    },

    /// Purge entries by age, count, or whole namespace.
    ///
    /// Refuses to run with no constraint; clearing everything must be
    /// asked for explicitly via --namespace plus --all.
    Purge {
        /// Namespace to purge within (required for --all and --max-entries).
        #[arg(long)]
        namespace: Option<String>,

        /// Purge entries older than this many days.
        #[arg(long)]
        older_than_days: Option<i64>,

        /// Keep only the newest N entries.
        #[arg(long)]
        max_entries: Option<usize>,

        /// Delete every entry in the namespace.
        #[arg(long)]
        all: bool,
    },

    /// Per-namespace entry counts and byte totals.
    Stats,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let store = CacheStore::open(&args.db_path).await?;

    match args.command {
        Command::List { namespace, limit } => {
            let entries = store.list_entries(namespace.as_deref(), limit).await?;
            println!("{}", serde_json::to_string_pretty(&entries)?);
        }

        Command::Show { namespace, url, body } => {
            let value = show_entry(&store, &namespace, &url, body).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }

        Command::Purge { namespace, older_than_days, max_entries, all } => {
            if older_than_days.is_none() && max_entries.is_none() && !all {
                bail!("at least one of --older-than-days, --max-entries, or --all must be specified");
            }
            if (all || max_entries.is_some()) && namespace.is_none() {
                bail!("--all and --max-entries require --namespace");
            }

            let mut deleted = 0u64;

            if let Some(days) = older_than_days {
                let cutoff = (Utc::now() - Duration::days(days)).to_rfc3339_opts(SecondsFormat::Micros, true);
                match &namespace {
                    Some(ns) => deleted += store.purge_inserted_before(ns, &cutoff).await?,
                    None => {
                        for stats in store.namespace_stats().await? {
                            deleted += store.purge_inserted_before(&stats.namespace, &cutoff).await?;
                        }
                    }
                }
            }

            if let (Some(max), Some(ns)) = (max_entries, &namespace) {
                deleted += store.purge_over_cap(ns, max).await?;
            }

            if all && let Some(ns) = &namespace {
                deleted += store.purge_namespace(ns).await?;
            }

            println!("{}", serde_json::json!({ "deleted": deleted }));
        }

        Command::Stats => {
            let stats = store.namespace_stats().await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }
    }

    Ok(())
}

/// Look up one entry by namespace and URL, rendered as JSON.
///
/// A missing entry is a `CACHE_MISS`, not an empty result: the command
/// exists to answer "is this response cached", so absence is the error.
async fn show_entry(store: &CacheStore, namespace: &str, url: &str, include_body: bool) -> Result<serde_json::Value> {
    let entry = store
        .find_by_url(namespace, url)
        .await?
        .ok_or_else(|| Error::CacheMiss(format!("{url} in {namespace}")))?;

    if include_body {
        return Ok(serde_json::to_value(&entry)?);
    }

    let mut value = serde_json::to_value(&entry)?;
    value["body"] = serde_json::json!(format!("<{} bytes>", entry.body.len()));
    Ok(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use satchel_core::Entry;

    fn entry(namespace: &str, url: &str) -> Entry {
        Entry {
            key: satchel_core::key::entry_key("GET", url, ""),
            namespace: namespace.to_string(),
            method: "GET".to_string(),
            url: url.to_string(),
            status: 200,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: b"hello".to_vec(),
            inserted_at: "2026-01-01T00:00:00.000000Z".to_string(),
            revision: None,
        }
    }

    #[tokio::test]
    async fn test_show_entry_elides_body_by_default() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store.upsert_entry(&entry("images", "https://app.example.edu/logo.png")).await.unwrap();

        let value = show_entry(&store, "images", "https://app.example.edu/logo.png", false).await.unwrap();
        assert_eq!(value["body"], serde_json::json!("<5 bytes>"));

        let value = show_entry(&store, "images", "https://app.example.edu/logo.png", true).await.unwrap();
        assert_eq!(value["body"], serde_json::to_value(b"hello".to_vec()).unwrap());
    }

    #[tokio::test]
    async fn test_show_entry_missing_is_cache_miss() {
        let store = CacheStore::open_in_memory().await.unwrap();

        let err = show_entry(&store, "images", "https://app.example.edu/absent.png", false)
            .await
            .unwrap_err();
        assert!(matches!(err.downcast_ref::<Error>(), Some(Error::CacheMiss(_))));
    }
}
