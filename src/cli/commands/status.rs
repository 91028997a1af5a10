//! Status command implementation.

use std::collections::BTreeMap;
use std::path::Path;

use colored::Colorize;
use serde::Serialize;

use crate::cli::commands::{open_existing, resolve_target};
use crate::error::Result;
use crate::model::{Entry, timestamp};
use crate::storage::StoreStats;

/// Output for status command.
#[derive(Serialize)]
struct StatusOutput {
    account: String,
    path: String,
    owner: String,
    #[serde(flatten)]
    stats: StoreStats,
    /// Most recent listing time among stored entries.
    last_sync: Option<String>,
    indexes: BTreeMap<String, usize>,
}

/// Execute the status command.
///
/// # Errors
///
/// Returns an error if no backup exists for the account or it fails to load.
pub fn execute(root: Option<&Path>, account: Option<&str>, json: bool) -> Result<()> {
    let target = resolve_target(root, account)?;
    let store = open_existing(&target)?;

    let output = StatusOutput {
        account: target.account.clone(),
        path: store.root().display().to_string(),
        owner: store.userinfo().username.clone(),
        stats: store.stats(),
        last_sync: store
            .all::<Entry>()
            .filter_map(|e| e.sync_time)
            .max()
            .map(|t| timestamp::format(&t)),
        indexes: store
            .indexes()
            .iter()
            .map(|(descriptor, doc)| (descriptor.clone(), doc.rows.len()))
            .collect(),
    };

    if json {
        println!("{}", serde_json::to_string(&output)?);
        return Ok(());
    }

    println!("{} {}", "Backup:".cyan().bold(), output.account.bold());
    println!("  Location:  {}", output.path.dimmed());
    if !output.owner.is_empty() {
        println!("  Owner:     {}", output.owner);
    }
    println!();
    println!("  Entries:   {}", output.stats.entries);
    println!(
        "  Comments:  {} ({} own, {} others)",
        output.stats.comments, output.stats.own_comments, output.stats.other_comments
    );
    println!("  Usernames: {}", output.stats.usernames);
    println!("  Highest comment id: {}", output.stats.max_comment_id);
    match &output.last_sync {
        Some(last) => println!("  Last change synced: {last}"),
        None => println!("  Last change synced: {}", "never".dimmed()),
    }
    if output.indexes.is_empty() {
        println!("  Indexes:   {}", "none (run `jb reindex`)".dimmed());
    } else {
        for (descriptor, rows) in &output.indexes {
            println!("  Index {descriptor}: {rows} rows");
        }
    }
    Ok(())
}
