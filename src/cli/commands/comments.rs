//! Comments command implementation: print the reconstructed thread of one
//! entry.

use std::path::Path;

use colored::Colorize;

use crate::cli::commands::{open_existing, resolve_target};
use crate::error::{Error, Result};
use crate::model::{CommentState, Entry};
use crate::tree::{CommentTree, RenderedComment};

/// Execute the comments command.
///
/// # Errors
///
/// Returns an error if the entry is not in the backup, or its comments do
/// not form a valid tree.
pub fn execute(
    entry_id: u64,
    root: Option<&Path>,
    account: Option<&str>,
    json: bool,
) -> Result<()> {
    let target = resolve_target(root, account)?;
    let store = open_existing(&target)?;
    let entry = store
        .get::<Entry>(entry_id)
        .ok_or(Error::EntryNotFound { id: entry_id })?;

    let tree = CommentTree::build(store.comments_for_entry(entry_id))?;
    let rendered = tree.render(&store.userinfo().username)?;
    let shown: usize = rendered.iter().map(RenderedComment::count).sum();

    if json {
        let output = serde_json::json!({
            "entry_id": entry_id,
            "subject": entry.subject,
            "stored": tree.len(),
            "shown": shown,
            "comments": rendered,
        });
        println!("{output}");
        return Ok(());
    }

    let subject = entry.subject.as_deref().unwrap_or("(no subject)");
    println!("{} {}", format!("#{entry_id}").cyan(), subject.bold());
    println!(
        "{}",
        format!("{shown} comments shown, {} hidden", tree.len() - shown).dimmed()
    );
    println!();

    for comment in &rendered {
        print_comment(comment, 0);
    }
    Ok(())
}

fn print_comment(comment: &RenderedComment, depth: usize) {
    let indent = "  ".repeat(depth);
    let author = if comment.username.is_empty() {
        "(anonymous)".dimmed()
    } else if comment.own {
        comment.username.green().bold()
    } else {
        comment.username.bold()
    };
    let state = match comment.state {
        CommentState::Visible => String::new().normal(),
        CommentState::Screened => " [screened]".yellow(),
        CommentState::Deleted | CommentState::Banned => format!(" [{}]", comment.state).red(),
    };
    let date = comment.date.as_deref().unwrap_or_default();

    println!(
        "{indent}{} {author}{state} {}",
        format!("#{}", comment.comment_id).cyan(),
        date.dimmed()
    );
    if let Some(subject) = comment.subject.as_deref().filter(|s| !s.is_empty()) {
        println!("{indent}  {}", subject.bold());
    }
    for line in comment.body.lines() {
        println!("{indent}  {line}");
    }

    for child in &comment.children {
        print_comment(child, depth + 1);
    }
}
