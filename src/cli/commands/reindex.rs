//! Reindex command implementation.

use std::path::Path;

use crate::cli::commands::{open_existing, resolve_target};
use crate::error::Result;
use crate::index;

/// Execute the reindex command.
///
/// # Errors
///
/// Returns an error if no backup exists or an index cannot be written.
pub fn execute(root: Option<&Path>, account: Option<&str>, json: bool) -> Result<()> {
    let target = resolve_target(root, account)?;
    let mut store = open_existing(&target)?;
    let summary = index::reindex(&mut store)?;

    if json {
        let output = serde_json::json!({
            "success": true,
            "indexes": summary,
        });
        println!("{output}");
        return Ok(());
    }

    for (descriptor, rows) in &summary {
        println!("Rebuilt {descriptor} index: {rows} rows");
    }
    Ok(())
}
