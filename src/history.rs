use crate::checkout::{Checkout, LegacyEncoding};
use crate::meta::parse_metadata;
use crate::models::{LegacyRevision, RevisionHistory};
use crate::rcs;
use anyhow::{Context, Result};
use std::fs;
use std::path::Path;
use tracing::debug;

/// Reads a page's `,v` file and rebuilds every revision through `checkout`.
///
/// The deltatext diffs are never applied; each revision's full text is asked
/// from the checkout capability and its metadata is parsed again, since
/// parents and moves change from revision to revision. A checkout failure
/// aborts the page.
pub fn extract_history(
    page: &str,
    history_path: &Path,
    checkout: &dyn Checkout,
    encoding: LegacyEncoding,
) -> Result<RevisionHistory> {
    let bytes = fs::read(history_path)
        .with_context(|| format!("Failed to read history file: {:?}", history_path))?;
    let source = encoding.decode(&bytes);
    let file = rcs::parse(&source)
        .with_context(|| format!("Failed to parse history file: {:?}", history_path))?;

    debug!(
        page = page,
        head = ?file.head,
        deltas = file.deltas.len(),
        "Parsed revision history"
    );

    let mut deltas = Vec::with_capacity(file.deltas.len());
    for delta in file.deltas {
        let text = checkout
            .checkout(history_path, &delta.revision)
            .with_context(|| format!("Failed to check out {} of {}", delta.revision, page))?;
        let meta = parse_metadata(&text, &format!("{} r{}", page, delta.revision));

        deltas.push(LegacyRevision {
            revision: delta.revision,
            date: delta.date,
            author: delta.author,
            state: delta.state,
            log: delta.log,
            next: delta.next,
            branches: delta.branches,
            text,
            meta,
        });
    }

    Ok(RevisionHistory {
        head: file.head,
        branch: file.branch,
        deltas,
    })
}
