//! Backup command implementation.

use std::path::Path;

use colored::Colorize;

use crate::cli::BackupArgs;
use crate::cli::commands::resolve_target;
use crate::config::{resolve_endpoint, resolve_timeout, resolve_token};
use crate::error::Result;
use crate::remote::HttpJournalApi;
use crate::storage::JournalStore;
use crate::sync::{Backup, BackupStats};

/// Execute the backup command.
///
/// # Errors
///
/// Returns an error if configuration is incomplete, the remote fails or
/// breaks the paging contract, or the store cannot be written.
pub fn execute(
    args: &BackupArgs,
    root: Option<&Path>,
    account: Option<&str>,
    json: bool,
) -> Result<()> {
    let target = resolve_target(root, account)?;
    let endpoint = resolve_endpoint(args.endpoint.as_deref(), &target.config)?;
    let token = resolve_token(args.token.as_deref(), &target.config);
    let timeout = resolve_timeout(&target.config);

    let api = HttpJournalApi::new(&endpoint, &target.account, token, timeout)?;
    let mut store = JournalStore::open(&target.path)?;
    let stats = Backup::new(&api, &mut store)
        .with_reindex(!args.no_reindex)
        .run()?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "path": store.root().display().to_string(),
            "stats": stats,
        });
        println!("{output}");
    } else {
        print_summary(&stats, store.root());
    }
    Ok(())
}

fn print_summary(stats: &BackupStats, path: &Path) {
    println!("{} {}", "Backup complete:".green().bold(), stats.account.bold());
    println!();
    println!(
        "  Entries:   {} listed, {} downloaded, {} unchanged",
        stats.entries.listed, stats.entries.downloaded, stats.entries.skipped
    );
    if stats.entries.failed > 0 {
        println!(
            "             {}",
            format!("{} could not be fetched", stats.entries.failed).yellow()
        );
    }
    println!(
        "  Comments:  {} listed since #{}, {} stored",
        stats.comments.listed, stats.comments.since, stats.comments.stored
    );
    if stats.comments.skipped > 0 {
        println!(
            "             {}",
            format!("{} without metadata skipped", stats.comments.skipped).yellow()
        );
    }
    println!("  Usernames: {}", stats.comments.usernames);
    for (descriptor, rows) in &stats.indexes {
        println!("  Index {descriptor}: {rows} rows");
    }
    println!();
    println!("  Location: {}", path.display().to_string().dimmed());
}
