use crate::models::{MetaKind, Page};
use crate::validate::Anomaly;
use anyhow::{bail, Context, Result};
use rustc_hash::{FxHashMap, FxHashSet};
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

/// Explicit old title -> new title table, one `oldTitle,newTitle` record per line.
#[derive(Debug, Default)]
pub struct PageNames {
    names: FxHashMap<String, String>,
}

impl PageNames {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Failed to open page names file: {:?}", path))?;
        let names = Self::from_reader(file)
            .with_context(|| format!("Failed to read page names file: {:?}", path))?;
        info!(entries = names.len(), path = ?path, "Loaded page names");
        Ok(names)
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .from_reader(reader);

        let mut names = FxHashMap::default();
        for (line, result) in reader.records().enumerate() {
            let record = result?;
            if record.len() < 2 {
                bail!(
                    "record {} has {} field(s), expected oldTitle,newTitle",
                    line + 1,
                    record.len()
                );
            }
            names.insert(record[0].to_string(), record[1].to_string());
        }
        Ok(Self { names })
    }

    pub fn get(&self, title: &str) -> Option<&str> {
        self.names.get(title).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for PageNames {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            names: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

/// Looks a parent reference up as written, then without its `Web.` prefix.
fn lookup_parent<'a>(names: &'a PageNames, parent: &str) -> Option<&'a str> {
    names
        .get(parent)
        .or_else(|| parent.split_once('.').and_then(|(_, topic)| names.get(topic)))
}

/// Renames page titles and the parent references inside their metadata.
///
/// Misses leave the title untouched and come back as anomalies. A renamed
/// parent keeps its previous value under `old_name`.
pub fn apply_renames(pages: &mut [Page], names: &PageNames) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();

    for page in pages.iter_mut() {
        match names.get(&page.title) {
            Some(new_title) => {
                if new_title != page.title {
                    debug!(from = %page.title, to = new_title, "Renaming page");
                }
                page.rename(new_title);
            }
            None => anomalies.push(Anomaly::MissingRename {
                title: page.title.clone(),
                parent: false,
            }),
        }

        for parent in page.meta.entries_mut(&MetaKind::Parent) {
            let Some(old_name) = parent.get("name").map(str::to_string) else {
                continue;
            };
            match lookup_parent(names, &old_name) {
                Some(new_name) if new_name != old_name => {
                    let new_name = new_name.to_string();
                    parent.insert("old_name", old_name);
                    parent.insert("name", new_name);
                }
                Some(_) => {}
                None => anomalies.push(Anomaly::MissingRename {
                    title: old_name,
                    parent: true,
                }),
            }
        }
    }

    anomalies
}

/// Keeps final titles unique: the first page holding a title keeps it, later
/// pages fall back to their topic name. Fails if the topic name is itself
/// taken, since no unique title is left for that page.
pub fn resolve_duplicate_titles(pages: &mut [Page]) -> Result<Vec<Anomaly>> {
    let mut anomalies = Vec::new();
    let mut taken: FxHashSet<String> = pages.iter().map(|p| p.title.clone()).collect();
    let mut seen: FxHashSet<String> = FxHashSet::default();

    for page in pages.iter_mut() {
        if seen.insert(page.title.clone()) {
            continue;
        }
        if taken.contains(&page.name) {
            bail!(
                "Title {} is used twice and topic {} cannot fall back to its name",
                page.title,
                page.name
            );
        }

        anomalies.push(Anomaly::DuplicateTitle {
            title: page.title.clone(),
            page: page.name.clone(),
        });
        page.restore_name();
        taken.insert(page.name.clone());
        seen.insert(page.name.clone());
    }

    Ok(anomalies)
}
