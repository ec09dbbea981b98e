//! Revision-graph reconstruction and move replay.
//!
//! Pages are converted strictly one after another. A [`MigrationContext`]
//! hands out the global revision and page ids in emission order, so ids are
//! gapless across the whole run, and the [`PageIndex`] is consulted before
//! any redirect title is claimed.

use crate::config::PROGRESS_INTERVAL;
use crate::extract::make_progress_bar;
use crate::index::PageIndex;
use crate::markup::MarkupTransform;
use crate::models::{
    Attributes, Contributor, LegacyRevision, MetaKind, OutputPage, OutputRevision, Page,
    RevisionHistory, RevisionNumber,
};
use crate::stats::MigrationStats;
use crate::timestamp::{parse_epoch, parse_rcs_date};
use crate::validate::Anomaly;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::{debug, info};

/// Sequential id allocation and the settings shared by every page.
#[derive(Debug, Clone)]
pub struct MigrationContext {
    next_revision: u64,
    next_page: u64,
    pub migration_user: String,
    pub migration_timestamp: DateTime<Utc>,
    pub namespace: i32,
}

impl MigrationContext {
    pub fn new(
        migration_user: impl Into<String>,
        migration_timestamp: DateTime<Utc>,
        namespace: i32,
    ) -> Self {
        Self {
            next_revision: 1,
            next_page: 1,
            migration_user: migration_user.into(),
            migration_timestamp,
            namespace,
        }
    }

    pub fn next_revision_id(&mut self) -> u64 {
        let id = self.next_revision;
        self.next_revision += 1;
        id
    }

    pub fn next_page_id(&mut self) -> u64 {
        let id = self.next_page;
        self.next_page += 1;
        id
    }
}

/// Where a revision's text, author and timestamp come from.
#[derive(Debug, Clone, Copy)]
pub enum RevisionSource<'a> {
    /// The live topic file with its TOPICINFO (epoch date, author).
    Live(&'a Page),
    /// A checked-out legacy revision with its RCS date and author.
    Delta(&'a LegacyRevision),
}

/// One TOPICMOVED declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveEvent {
    pub from_web: Option<String>,
    pub from: String,
    pub to_web: Option<String>,
    pub to: String,
    pub by: Option<String>,
    pub date: i64,
    pub timestamp: DateTime<Utc>,
}

fn split_web(name: &str) -> (Option<String>, String) {
    match name.split_once('.') {
        Some((web, topic)) => (Some(web.to_string()), topic.to_string()),
        None => (None, name.to_string()),
    }
}

impl MoveEvent {
    pub fn from_attributes(attrs: &Attributes) -> Result<Self> {
        let date = attrs.get("date").context("TOPICMOVED without date")?;
        let timestamp = parse_epoch(date)?;
        let (from_web, from) = split_web(attrs.get("from").context("TOPICMOVED without from")?);
        let (to_web, to) = split_web(attrs.get("to").context("TOPICMOVED without to")?);
        Ok(Self {
            from_web,
            from,
            to_web,
            to,
            by: attrs.get("by").map(str::to_string),
            date: timestamp.timestamp(),
            timestamp,
        })
    }

    /// Why this move is not replayed on its own, if it isn't.
    fn ignored_reason(&self) -> Option<&'static str> {
        if self.from == self.to {
            return Some("same topic name");
        }
        match (&self.from_web, &self.to_web) {
            (Some(from), Some(to)) if from != to => Some("move between webs"),
            _ => None,
        }
    }
}

/// Replays one move after `last`: a minor revision carrying the pre-move text
/// under the move comment, then a minor redirect revision parented on it,
/// placed on a new redirect page at `old_title`.
pub fn move_transform(
    ctx: &mut MigrationContext,
    last: &OutputRevision,
    old_title: &str,
    new_title: &str,
    user: &str,
    timestamp: DateTime<Utc>,
) -> (OutputRevision, OutputPage) {
    let comment = format!("{} moved page [[{}]] to [[{}]]", user, old_title, new_title);

    let moved_id = ctx.next_revision_id();
    let moved = OutputRevision {
        id: moved_id,
        parent_id: Some(last.id),
        timestamp,
        contributor: Contributor::new(user),
        text: last.text.clone(),
        minor: true,
        comment: Some(comment.clone()),
        origin: last.id,
    };

    let redirect_id = ctx.next_revision_id();
    let redirect = OutputRevision {
        id: redirect_id,
        parent_id: Some(moved_id),
        timestamp,
        contributor: Contributor::new(user),
        text: format!("#REDIRECT [[{}]]", new_title),
        minor: true,
        comment: Some(comment),
        origin: redirect_id,
    };

    let page = OutputPage {
        id: ctx.next_page_id(),
        title: old_title.to_string(),
        namespace: ctx.namespace,
        redirect: Some(new_title.to_string()),
        revisions: vec![redirect],
    };

    (moved, page)
}

/// Converts extracted pages into output pages, in order.
pub struct Migration<'a> {
    ctx: MigrationContext,
    index: PageIndex,
    markup: &'a dyn MarkupTransform,
    stats: &'a MigrationStats,
}

impl<'a> Migration<'a> {
    pub fn new(
        ctx: MigrationContext,
        index: PageIndex,
        markup: &'a dyn MarkupTransform,
        stats: &'a MigrationStats,
    ) -> Self {
        Self {
            ctx,
            index,
            markup,
            stats,
        }
    }

    fn anomaly(&self, anomaly: Anomaly) {
        anomaly.report();
        self.stats.add_anomalies(1);
    }

    /// Builds one output revision; history and live state go through the
    /// same path and differ only in where author and date are read.
    pub fn build_revision(
        &mut self,
        page: &str,
        source: RevisionSource<'_>,
        parent_id: Option<u64>,
    ) -> Result<OutputRevision> {
        let (timestamp, contributor, text) = match source {
            RevisionSource::Delta(delta) => {
                let timestamp = parse_rcs_date(&delta.date).with_context(|| {
                    format!("Bad date on revision {} of {}", delta.revision, page)
                })?;
                (timestamp, Contributor::new(&delta.author), delta.text.as_str())
            }
            RevisionSource::Live(live) => {
                let info = live.meta.page_info();
                match info.and_then(|i| i.get("date")) {
                    Some(date) => {
                        let timestamp = parse_epoch(date)
                            .with_context(|| format!("Bad TOPICINFO date on {}", page))?;
                        let author = info
                            .and_then(|i| i.get("author"))
                            .unwrap_or(self.ctx.migration_user.as_str());
                        (timestamp, Contributor::new(author), live.text.as_str())
                    }
                    None => {
                        self.anomaly(Anomaly::MissingPageInfo {
                            page: page.to_string(),
                            revision: None,
                        });
                        (
                            self.ctx.migration_timestamp,
                            Contributor::new(&self.ctx.migration_user),
                            live.text.as_str(),
                        )
                    }
                }
            }
        };

        let id = self.ctx.next_revision_id();
        Ok(OutputRevision {
            id,
            parent_id,
            timestamp,
            contributor,
            text: self.markup.format(text),
            minor: false,
            comment: None,
            origin: id,
        })
    }

    /// Replays a move on `main` unless the old title is already taken.
    fn replay_move(
        &mut self,
        main: &mut OutputPage,
        redirects: &mut Vec<OutputPage>,
        old_title: &str,
        user: &str,
        timestamp: DateTime<Utc>,
    ) -> Option<u64> {
        let last = main.revisions.last()?;
        if !self.index.claim_redirect(old_title) {
            self.anomaly(Anomaly::MoveCollision {
                page: main.title.clone(),
                from: old_title.to_string(),
                to: main.title.clone(),
            });
            self.stats.inc_moves_skipped();
            return None;
        }

        let (moved, redirect) =
            move_transform(&mut self.ctx, last, old_title, &main.title, user, timestamp);
        debug!(
            from = old_title,
            to = %main.title,
            revision = moved.id,
            "Replayed move"
        );

        self.stats.inc_moves_replayed();
        self.stats.inc_redirect_pages();

        let moved_id = moved.id;
        main.revisions.push(moved);
        redirects.push(redirect);
        Some(moved_id)
    }

    fn replay_history(
        &mut self,
        page: &Page,
        history: &RevisionHistory,
        main: &mut OutputPage,
        redirects: &mut Vec<OutputPage>,
    ) -> Result<()> {
        let mut deltas: Vec<&LegacyRevision> = history.deltas.iter().collect();
        deltas.sort_by(|a, b| a.revision.cmp(&b.revision));

        let mut mapping: FxHashMap<&RevisionNumber, u64> = FxHashMap::default();
        let mut moves_seen: FxHashSet<i64> = FxHashSet::default();

        for delta in deltas {
            let parent_id = match &delta.next {
                None => None,
                Some(next) => match mapping.get(next) {
                    Some(id) => Some(*id),
                    None => {
                        self.anomaly(Anomaly::MissingParentRevision {
                            page: page.name.clone(),
                            revision: delta.revision.clone(),
                            next: next.clone(),
                        });
                        None
                    }
                },
            };

            let revision = self.build_revision(&page.name, RevisionSource::Delta(delta), parent_id)?;
            mapping.insert(&delta.revision, revision.id);
            main.revisions.push(revision);

            for attrs in delta.meta.entries(&MetaKind::Moved) {
                let event = match MoveEvent::from_attributes(attrs) {
                    Ok(event) => event,
                    Err(e) => {
                        self.anomaly(Anomaly::MalformedMove {
                            page: page.name.clone(),
                            revision: delta.revision.clone(),
                            reason: format!("{:#}", e),
                        });
                        self.stats.inc_moves_skipped();
                        continue;
                    }
                };
                if !moves_seen.insert(event.date) {
                    continue;
                }
                if let Some(reason) = event.ignored_reason() {
                    info!(
                        page = %page.name,
                        from = %event.from,
                        to = %event.to,
                        "Ignoring move ({})",
                        reason
                    );
                    self.stats.inc_moves_skipped();
                    continue;
                }

                let user = event
                    .by
                    .clone()
                    .unwrap_or_else(|| delta.author.clone());
                if let Some(moved_id) =
                    self.replay_move(main, redirects, &event.from, &user, event.timestamp)
                {
                    mapping.insert(&delta.revision, moved_id);
                }
            }
        }
        Ok(())
    }

    /// Converts one page: its main page first, then the redirect pages its
    /// moves produced.
    pub fn convert_page(&mut self, page: &Page) -> Result<Vec<OutputPage>> {
        let mut main = OutputPage {
            id: self.ctx.next_page_id(),
            title: page.title.clone(),
            namespace: self.ctx.namespace,
            redirect: None,
            revisions: Vec::new(),
        };
        let mut redirects = Vec::new();

        match &page.history {
            Some(history) if !history.deltas.is_empty() => {
                self.replay_history(page, history, &mut main, &mut redirects)?;
            }
            _ => {
                debug!(page = %page.name, "No history, using live topic state");
                let revision = self.build_revision(&page.name, RevisionSource::Live(page), None)?;
                main.revisions.push(revision);
            }
        }

        if let Some(previous) = &page.previous_title {
            let user = self.ctx.migration_user.clone();
            let timestamp = self.ctx.migration_timestamp;
            self.replay_move(&mut main, &mut redirects, previous, &user, timestamp);
        }

        let mut pages = Vec::with_capacity(1 + redirects.len());
        pages.push(main);
        pages.extend(redirects);
        Ok(pages)
    }

    /// Converts every page in order.
    pub fn convert_all(&mut self, pages: &[Page]) -> Result<Vec<OutputPage>> {
        let pb = make_progress_bar(pages.len() as u64, "Exporting");
        let mut out = Vec::with_capacity(pages.len());

        for (i, page) in pages.iter().enumerate() {
            let converted = self
                .convert_page(page)
                .with_context(|| format!("Failed to convert page {}", page.name))?;
            for output in &converted {
                self.stats.inc_pages_exported();
                self.stats.add_revisions_exported(output.revisions.len() as u64);
            }
            out.extend(converted);

            pb.inc(1);
            if (i as u64 + 1) % PROGRESS_INTERVAL == 0 {
                info!(done = i + 1, total = pages.len(), "Export progress");
            }
        }

        pb.finish_and_clear();
        info!(
            titles = self.index.len(),
            redirects = self.index.redirect_count(),
            "Conversion finished"
        );
        Ok(out)
    }
}
