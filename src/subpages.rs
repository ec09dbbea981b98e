use crate::config::USER_NAMESPACE_PREFIX;
use crate::models::{MetaKind, Page};
use crate::validate::Anomaly;
use once_cell::sync::Lazy;
use regex::Regex;
use rustc_hash::{FxHashMap, FxHashSet};
use tracing::debug;

static WEB_NAME_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z][A-Za-z0-9]*$").unwrap());

/// `Main.StagePlot` -> `StagePlot`; anything else is returned unchanged.
fn strip_web(name: &str) -> &str {
    match name.split_once('.') {
        Some((web, topic)) if WEB_NAME_REGEX.is_match(web) && !topic.is_empty() => topic,
        _ => name,
    }
}

/// Turns topic parent chains into `Root/Child/Grandchild` titles.
///
/// Only the first parent reference of a page counts. Pages parented by the
/// home topic, by themselves, or living in the user namespace stay where they
/// are. A page renamed earlier keeps its first previous title.
pub fn flatten_subpages(pages: &mut [Page], home_topic: &str) -> Vec<Anomaly> {
    let mut anomalies = Vec::new();
    let mut parents: FxHashMap<String, String> = FxHashMap::default();

    for page in pages.iter() {
        let Some(entry) = page.meta.first(&MetaKind::Parent) else {
            continue;
        };
        let Some(name) = entry.get("name") else {
            continue;
        };
        let parent = strip_web(name);
        let from_home = entry.get("old_name").map(strip_web) == Some(home_topic);

        if parent == page.title {
            anomalies.push(Anomaly::IgnoredParent {
                page: page.title.clone(),
                parent: parent.to_string(),
                reason: "parent of the same name",
            });
        } else if page.title.starts_with(USER_NAMESPACE_PREFIX) {
            anomalies.push(Anomaly::IgnoredParent {
                page: page.title.clone(),
                parent: parent.to_string(),
                reason: "user page",
            });
        } else if parent != home_topic && !from_home {
            parents.insert(page.title.clone(), parent.to_string());
        }
    }

    let mut renames = Vec::new();
    for page in pages.iter() {
        let Some(parent) = parents.get(&page.title) else {
            continue;
        };

        let mut chain = vec![page.title.as_str(), parent.as_str()];
        let mut seen: FxHashSet<&str> = chain.iter().copied().collect();
        let mut next = parent.as_str();
        while let Some(up) = parents.get(next) {
            if !seen.insert(up.as_str()) {
                anomalies.push(Anomaly::ParentCycle {
                    page: page.title.clone(),
                });
                break;
            }
            chain.push(up.as_str());
            next = up.as_str();
        }

        chain.reverse();
        renames.push(chain.join("/"));
    }

    let mut renames = renames.into_iter();
    for page in pages.iter_mut() {
        if !parents.contains_key(&page.title) {
            continue;
        }
        if let Some(title) = renames.next() {
            debug!(from = %page.title, to = %title, "Flattening into subpage");
            page.rename(title);
        }
    }

    anomalies
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_HOME_TOPIC;
    use crate::models::Metadata;

    fn page(name: &str, parent: Option<&str>) -> Page {
        let mut meta = Metadata::new();
        if let Some(parent) = parent {
            meta.push(MetaKind::Parent, [("name", parent)].into_iter().collect());
        }
        Page::new(name, "", meta)
    }

    fn titles(pages: &[Page]) -> Vec<&str> {
        pages.iter().map(|p| p.title.as_str()).collect()
    }

    #[test]
    fn strips_web_prefix_only() {
        assert_eq!(strip_web("Main.StagePlot"), "StagePlot");
        assert_eq!(strip_web("StagePlot"), "StagePlot");
        assert_eq!(strip_web("Dr. Who"), "Dr. Who");
    }

    #[test]
    fn three_level_chain_flattens_root_first() {
        let mut pages = vec![
            page("A", Some(DEFAULT_HOME_TOPIC)),
            page("B", Some("A")),
            page("C", Some("B")),
        ];
        let anomalies = flatten_subpages(&mut pages, DEFAULT_HOME_TOPIC);

        assert!(anomalies.is_empty());
        assert_eq!(titles(&pages), vec!["A", "A/B", "A/B/C"]);
        assert_eq!(pages[2].previous_title.as_deref(), Some("C"));
        assert!(pages[0].previous_title.is_none());
    }

    #[test]
    fn web_prefixed_parents_are_followed() {
        let mut pages = vec![page("A", None), page("B", Some("Main.A"))];
        flatten_subpages(&mut pages, DEFAULT_HOME_TOPIC);
        assert_eq!(titles(&pages), vec!["A", "A/B"]);
    }

    #[test]
    fn home_parent_is_not_flattened() {
        let mut pages = vec![page("Lighting", Some("Main.WebHome"))];
        flatten_subpages(&mut pages, DEFAULT_HOME_TOPIC);
        assert_eq!(titles(&pages), vec!["Lighting"]);
        assert!(pages[0].previous_title.is_none());
    }

    #[test]
    fn renamed_home_parent_is_still_home() {
        let mut meta = Metadata::new();
        meta.push(
            MetaKind::Parent,
            [("name", "Main Page"), ("old_name", "WebHome")]
                .into_iter()
                .collect(),
        );
        let mut pages = vec![Page::new("Lighting", "", meta), page("Main Page", None)];
        flatten_subpages(&mut pages, DEFAULT_HOME_TOPIC);
        assert_eq!(pages[0].title, "Lighting");
    }

    #[test]
    fn self_parent_and_user_pages_are_ignored() {
        let mut pages = vec![page("Loop", Some("Loop")), page("User:JaneDoe", Some("People"))];
        let anomalies = flatten_subpages(&mut pages, DEFAULT_HOME_TOPIC);

        assert_eq!(titles(&pages), vec!["Loop", "User:JaneDoe"]);
        assert_eq!(anomalies.len(), 2);
        assert!(anomalies
            .iter()
            .all(|a| matches!(a, Anomaly::IgnoredParent { .. })));
    }

    #[test]
    fn earlier_rename_keeps_first_previous_title() {
        let mut child = page("Stage Plot", Some("Stage"));
        child.previous_title = Some("StagePlot".to_string());
        let mut pages = vec![page("Stage", None), child];
        flatten_subpages(&mut pages, DEFAULT_HOME_TOPIC);

        assert_eq!(pages[1].title, "Stage/Stage Plot");
        assert_eq!(pages[1].previous_title.as_deref(), Some("StagePlot"));
    }

    #[test]
    fn parent_cycle_terminates() {
        let mut pages = vec![page("X", Some("Y")), page("Y", Some("X"))];
        let anomalies = flatten_subpages(&mut pages, DEFAULT_HOME_TOPIC);

        assert_eq!(titles(&pages), vec!["Y/X", "X/Y"]);
        assert_eq!(anomalies.len(), 2);
    }

    #[test]
    fn only_first_parent_counts() {
        let mut meta = Metadata::new();
        meta.push(MetaKind::Parent, [("name", "A")].into_iter().collect());
        meta.push(MetaKind::Parent, [("name", "B")].into_iter().collect());
        let mut pages = vec![page("A", None), page("B", None), Page::new("C", "", meta)];
        flatten_subpages(&mut pages, DEFAULT_HOME_TOPIC);
        assert_eq!(pages[2].title, "A/C");
    }
}
