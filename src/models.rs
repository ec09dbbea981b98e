use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid revision number: {0:?}")]
pub struct ParseRevisionError(pub String);

/// Dotted RCS revision number (`1.3`, `1.2.1.4`), ordered numerically per component.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RevisionNumber(Vec<u32>);

impl RevisionNumber {
    pub fn components(&self) -> &[u32] {
        &self.0
    }

    /// Trunk revisions have exactly two components; anything longer lives on a branch.
    pub fn is_trunk(&self) -> bool {
        self.0.len() == 2
    }
}

impl FromStr for RevisionNumber {
    type Err = ParseRevisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let components = s
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| ParseRevisionError(s.to_string()))?;
        if components.len() < 2 {
            return Err(ParseRevisionError(s.to_string()));
        }
        Ok(Self(components))
    }
}

impl TryFrom<String> for RevisionNumber {
    type Error = ParseRevisionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<RevisionNumber> for String {
    fn from(value: RevisionNumber) -> Self {
        value.to_string()
    }
}

impl fmt::Display for RevisionNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, component) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", component)?;
        }
        Ok(())
    }
}

/// Type tag of a `%META:<TAG>{...}%` declaration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum MetaKind {
    PageInfo,
    Parent,
    Attachment,
    Moved,
    Unknown(String),
}

impl MetaKind {
    pub fn from_tag(tag: &str) -> Self {
        match tag {
            "TOPICINFO" => MetaKind::PageInfo,
            "TOPICPARENT" => MetaKind::Parent,
            "FILEATTACHMENT" => MetaKind::Attachment,
            "TOPICMOVED" => MetaKind::Moved,
            other => MetaKind::Unknown(other.to_string()),
        }
    }

    pub fn tag(&self) -> &str {
        match self {
            MetaKind::PageInfo => "TOPICINFO",
            MetaKind::Parent => "TOPICPARENT",
            MetaKind::Attachment => "FILEATTACHMENT",
            MetaKind::Moved => "TOPICMOVED",
            MetaKind::Unknown(tag) => tag,
        }
    }

    /// Tags that should appear at most once per page or revision.
    pub fn expected_once(&self) -> bool {
        matches!(self, MetaKind::PageInfo | MetaKind::Parent)
    }
}

impl From<String> for MetaKind {
    fn from(value: String) -> Self {
        MetaKind::from_tag(&value)
    }
}

impl From<MetaKind> for String {
    fn from(value: MetaKind) -> Self {
        value.tag().to_string()
    }
}

impl fmt::Display for MetaKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

/// One parsed `key="value"` attribute string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Attributes(BTreeMap<String, String>);

impl Attributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Attributes {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Metadata declarations of a page or revision, grouped by tag. Entries of one
/// tag keep their encounter order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<MetaKind, Vec<Attributes>>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, kind: MetaKind, attributes: Attributes) {
        self.0.entry(kind).or_default().push(attributes);
    }

    pub fn entries(&self, kind: &MetaKind) -> &[Attributes] {
        self.0.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn entries_mut(&mut self, kind: &MetaKind) -> &mut [Attributes] {
        self.0
            .get_mut(kind)
            .map(Vec::as_mut_slice)
            .unwrap_or_default()
    }

    /// First entry of a kind; duplicates are resolved by encounter order.
    pub fn first(&self, kind: &MetaKind) -> Option<&Attributes> {
        self.entries(kind).first()
    }

    pub fn count(&self, kind: &MetaKind) -> usize {
        self.entries(kind).len()
    }

    pub fn kinds(&self) -> impl Iterator<Item = &MetaKind> {
        self.0.keys()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn page_info(&self) -> Option<&Attributes> {
        self.first(&MetaKind::PageInfo)
    }

    pub fn parent_name(&self) -> Option<&str> {
        self.first(&MetaKind::Parent).and_then(|p| p.get("name"))
    }
}

/// One stored legacy revision with its checked-out text.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LegacyRevision {
    pub revision: RevisionNumber,
    pub date: String,
    pub author: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub log: String,
    /// Predecessor on the trunk (RCS `next` points toward the base revision).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next: Option<RevisionNumber>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub branches: Vec<RevisionNumber>,
    pub text: String,
    #[serde(default)]
    pub meta: Metadata,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RevisionHistory {
    pub head: Option<RevisionNumber>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<RevisionNumber>,
    pub deltas: Vec<LegacyRevision>,
}

impl RevisionHistory {
    pub fn head_revision(&self) -> Option<&LegacyRevision> {
        let head = self.head.as_ref()?;
        self.deltas.iter().find(|d| &d.revision == head)
    }
}

/// A legacy topic and everything later passes need to migrate it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page {
    /// Legacy file basename, the page identifier.
    pub name: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub previous_title: Option<String>,
    pub text: String,
    #[serde(default)]
    pub meta: Metadata,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub history: Option<RevisionHistory>,
}

impl Page {
    pub fn new(name: impl Into<String>, text: impl Into<String>, meta: Metadata) -> Self {
        let name = name.into();
        Self {
            title: name.clone(),
            name,
            previous_title: None,
            text: text.into(),
            meta,
            history: None,
        }
    }

    /// Records a title change; the earliest previous title is kept.
    pub fn rename(&mut self, new_title: impl Into<String>) {
        let new_title = new_title.into();
        if new_title == self.title {
            return;
        }
        if self.previous_title.is_none() {
            self.previous_title = Some(self.title.clone());
        }
        self.title = new_title;
    }

    /// Drops every rename and goes back to the topic name.
    pub fn restore_name(&mut self) {
        self.title = self.name.clone();
        self.previous_title = None;
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Contributor {
    pub username: String,
}

impl Contributor {
    /// The target wiki folds the first letter of user names to upper case.
    pub fn new(username: &str) -> Self {
        let mut chars = username.chars();
        let username = match chars.next() {
            Some(first) => first.to_uppercase().chain(chars).collect(),
            None => String::new(),
        };
        Self { username }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputRevision {
    pub id: u64,
    pub parent_id: Option<u64>,
    pub timestamp: DateTime<Utc>,
    pub contributor: Contributor,
    pub text: String,
    pub minor: bool,
    pub comment: Option<String>,
    pub origin: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputPage {
    pub id: u64,
    pub title: String,
    pub namespace: i32,
    pub redirect: Option<String>,
    pub revisions: Vec<OutputRevision>,
}
