use crate::attrs::parse_attributes;
use crate::models::{MetaKind, Metadata};
use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

static META_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)^%META:([A-Za-z0-9_]+)\{(.*)\}%\r?$").unwrap());

/// Collects every `%META:<TAG>{...}%` line of a topic text, grouped by tag.
///
/// `context` names the page (and revision) in log messages. Missing or
/// duplicated page info and empty entries are logged, never rejected.
pub fn parse_metadata(text: &str, context: &str) -> Metadata {
    let mut meta = Metadata::new();

    for caps in META_REGEX.captures_iter(text) {
        let kind = MetaKind::from_tag(&caps[1]);
        let attributes = parse_attributes(&caps[2]);
        if attributes.is_empty() {
            warn!(page = context, tag = %kind, "Metadata entry parsed empty");
        }
        meta.push(kind, attributes);
    }

    if meta.page_info().is_none() {
        debug!(page = context, "No TOPICINFO metadata");
    }
    for kind in meta.kinds() {
        let count = meta.count(kind);
        if kind.expected_once() && count > 1 {
            debug!(page = context, tag = %kind, count = count, "Duplicate metadata, using first");
        }
    }

    meta
}

/// True for lines that are metadata declarations rather than topic content.
pub fn is_meta_line(line: &str) -> bool {
    META_REGEX.is_match(line)
}
