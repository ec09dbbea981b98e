//! Structural checks over extracted pages. Every finding is an [`Anomaly`]:
//! logged and counted, never an error.

use crate::models::{MetaKind, Metadata, Page, RevisionHistory, RevisionNumber};
use crate::stats::MigrationStats;
use rustc_hash::FxHashSet;
use std::fmt;
use tracing::warn;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Anomaly {
    MissingHistory {
        page: String,
    },
    MissingPageInfo {
        page: String,
        revision: Option<RevisionNumber>,
    },
    DuplicatePageInfo {
        page: String,
        revision: Option<RevisionNumber>,
        count: usize,
    },
    BranchData {
        page: String,
        revision: Option<RevisionNumber>,
    },
    DuplicateRevision {
        page: String,
        revision: RevisionNumber,
    },
    MissingHead {
        page: String,
        head: Option<RevisionNumber>,
    },
    HeadTextMismatch {
        page: String,
        head: RevisionNumber,
    },
    MissingRename {
        title: String,
        parent: bool,
    },
    IgnoredParent {
        page: String,
        parent: String,
        reason: &'static str,
    },
    ParentCycle {
        page: String,
    },
    MissingParentRevision {
        page: String,
        revision: RevisionNumber,
        next: RevisionNumber,
    },
    MoveCollision {
        page: String,
        from: String,
        to: String,
    },
    MalformedMove {
        page: String,
        revision: RevisionNumber,
        reason: String,
    },
    DuplicateTitle {
        title: String,
        page: String,
    },
}

impl Anomaly {
    pub fn report(&self) {
        warn!("{}", self);
    }
}

/// Logs every anomaly and adds them to the run's counters.
pub fn report_all(anomalies: &[Anomaly], stats: &MigrationStats) {
    for anomaly in anomalies {
        anomaly.report();
    }
    stats.add_anomalies(anomalies.len() as u64);
}

fn at(revision: &Option<RevisionNumber>) -> String {
    match revision {
        Some(r) => format!(" revision {}", r),
        None => String::new(),
    }
}

impl fmt::Display for Anomaly {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Anomaly::MissingHistory { page } => {
                write!(f, "{}: no revision history, using live text only", page)
            }
            Anomaly::MissingPageInfo { page, revision } => {
                write!(f, "{}{}: no TOPICINFO metadata", page, at(revision))
            }
            Anomaly::DuplicatePageInfo {
                page,
                revision,
                count,
            } => write!(
                f,
                "{}{}: {} TOPICINFO entries, using first",
                page,
                at(revision),
                count
            ),
            Anomaly::BranchData { page, revision } => {
                write!(f, "{}{}: branch data is not supported", page, at(revision))
            }
            Anomaly::DuplicateRevision { page, revision } => {
                write!(f, "{}: revision {} appears more than once", page, revision)
            }
            Anomaly::MissingHead { page, head } => {
                write!(f, "{}: head{} is not among the deltas", page, at(head))
            }
            Anomaly::HeadTextMismatch { page, head } => write!(
                f,
                "{}: head revision {} differs from the live topic text",
                page, head
            ),
            Anomaly::MissingRename {
                title,
                parent: false,
            } => write!(f, "Missing page name replacement for {}", title),
            Anomaly::MissingRename {
                title,
                parent: true,
            } => write!(f, "Missing parent page name replacement {}", title),
            Anomaly::IgnoredParent {
                page,
                parent,
                reason,
            } => write!(f, "{}: ignoring parent topic {} ({})", page, parent, reason),
            Anomaly::ParentCycle { page } => {
                write!(f, "{}: parent chain loops back on itself", page)
            }
            Anomaly::MissingParentRevision {
                page,
                revision,
                next,
            } => write!(
                f,
                "{}: predecessor {} of revision {} was never exported",
                page, next, revision
            ),
            Anomaly::MoveCollision { page, from, to } => write!(
                f,
                "{}: not replaying move [[{}]] -> [[{}]], {} already exists",
                page, from, to, from
            ),
            Anomaly::MalformedMove {
                page,
                revision,
                reason,
            } => write!(
                f,
                "{} revision {}: ignoring unreadable move ({})",
                page, revision, reason
            ),
            Anomaly::DuplicateTitle { title, page } => write!(
                f,
                "{}: title {} is already taken, keeping the topic name",
                page, title
            ),
        }
    }
}

/// Page info must be present exactly once.
pub fn check_metadata(
    page: &str,
    revision: Option<&RevisionNumber>,
    meta: &Metadata,
) -> Option<Anomaly> {
    let revision = revision.cloned();
    match meta.count(&MetaKind::PageInfo) {
        0 => Some(Anomaly::MissingPageInfo {
            page: page.to_string(),
            revision,
        }),
        1 => None,
        count => Some(Anomaly::DuplicatePageInfo {
            page: page.to_string(),
            revision,
            count,
        }),
    }
}

/// Branches, duplicate revision numbers and a dangling head.
pub fn check_history(page: &str, history: &RevisionHistory) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    if history.branch.is_some() {
        anomalies.push(Anomaly::BranchData {
            page: page.to_string(),
            revision: history.branch.clone(),
        });
    }

    let mut seen = FxHashSet::default();
    for delta in &history.deltas {
        if !seen.insert(&delta.revision) {
            anomalies.push(Anomaly::DuplicateRevision {
                page: page.to_string(),
                revision: delta.revision.clone(),
            });
        }
        if !delta.revision.is_trunk() || !delta.branches.is_empty() {
            anomalies.push(Anomaly::BranchData {
                page: page.to_string(),
                revision: Some(delta.revision.clone()),
            });
        }
    }

    if !history.deltas.is_empty() && history.head_revision().is_none() {
        anomalies.push(Anomaly::MissingHead {
            page: page.to_string(),
            head: history.head.clone(),
        });
    }

    anomalies
}

/// The checked-out head must equal the live topic file, trailing newlines aside.
pub fn check_head_text(page: &str, history: &RevisionHistory, live_text: &str) -> Option<Anomaly> {
    let head = history.head_revision()?;
    if head.text.trim_end_matches('\n') == live_text.trim_end_matches('\n') {
        return None;
    }
    Some(Anomaly::HeadTextMismatch {
        page: page.to_string(),
        head: head.revision.clone(),
    })
}

/// Runs every check over one extracted page.
pub fn check_page(page: &Page) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    anomalies.extend(check_metadata(&page.name, None, &page.meta));

    match &page.history {
        None => anomalies.push(Anomaly::MissingHistory {
            page: page.name.clone(),
        }),
        Some(history) => {
            anomalies.extend(check_history(&page.name, history));
            for delta in &history.deltas {
                anomalies.extend(check_metadata(
                    &page.name,
                    Some(&delta.revision),
                    &delta.meta,
                ));
            }
            anomalies.extend(check_head_text(&page.name, history, &page.text));
        }
    }

    anomalies
}
