use crate::config::{
    CASE_POLICY, CONTENT_FORMAT, CONTENT_MODEL, DEFAULT_HOME_TOPIC, DEFAULT_MIGRATION_USER,
    DEFAULT_NAMESPACE, EXPORT_SCHEMA_LOCATION, EXPORT_SCHEMA_VERSION, EXPORT_XMLNS,
    GENERATOR_NAME, GENERATOR_VERSION, XSI_NAMESPACE,
};
use crate::extract::read_pages;
use crate::index::PageIndex;
use crate::markup::{MarkupTransform, PassThrough, TwikiMarkup};
use crate::models::{OutputPage, OutputRevision};
use crate::rename::{apply_renames, resolve_duplicate_titles, PageNames};
use crate::revisions::{Migration, MigrationContext};
use crate::stats::MigrationStats;
use crate::subpages::flatten_subpages;
use crate::timestamp::format_iso;
use crate::validate::report_all;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;
use regex::Regex;
use std::borrow::Cow;
use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;
use tracing::info;

static BACKSPACE_PAIR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r".\x08").unwrap());
static CONTROL_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\x00-\x08\x0B\x0C\x0E-\x1F]+").unwrap());

/// The `<siteinfo>` header of the document.
#[derive(Debug, Clone)]
pub struct SiteInfo {
    pub site_name: String,
    pub db_name: String,
    pub base_url: String,
}

fn is_forbidden_control(c: char) -> bool {
    c.is_ascii_control() && !matches!(c, '\t' | '\n' | '\r' | '\u{7f}')
}

/// Drops every character erased by a backspace, then any C0 control
/// character XML 1.0 cannot carry (stray backspaces included).
pub fn clean_text(text: &str) -> Cow<'_, str> {
    if !text.chars().any(is_forbidden_control) {
        return Cow::Borrowed(text);
    }
    let text = BACKSPACE_PAIR_REGEX.replace_all(text, "");
    Cow::Owned(CONTROL_REGEX.replace_all(&text, "").into_owned())
}

/// The 18 standard namespaces, keyed -2..=15.
pub fn namespaces(site_name: &str) -> Vec<(i32, Option<String>)> {
    let fixed = |name: &str| Some(name.to_string());
    vec![
        (-2, fixed("Media")),
        (-1, fixed("Special")),
        (0, None),
        (1, fixed("Talk")),
        (2, fixed("User")),
        (3, fixed("User talk")),
        (4, Some(site_name.to_string())),
        (5, Some(format!("{} talk", site_name))),
        (6, fixed("File")),
        (7, fixed("File talk")),
        (8, fixed("MediaWiki")),
        (9, fixed("MediaWiki talk")),
        (10, fixed("Template")),
        (11, fixed("Template talk")),
        (12, fixed("Help")),
        (13, fixed("Help talk")),
        (14, fixed("Category")),
        (15, fixed("Category talk")),
    ]
}

fn text_element<W: Write>(writer: &mut Writer<W>, name: &str, text: &str) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new(name)))?;
    writer.write_event(Event::Text(BytesText::new(text)))?;
    writer.write_event(Event::End(BytesEnd::new(name)))?;
    Ok(())
}

fn number_element<W: Write, N: itoa::Integer>(
    writer: &mut Writer<W>,
    name: &str,
    value: N,
) -> Result<()> {
    let mut buf = itoa::Buffer::new();
    text_element(writer, name, buf.format(value))
}

fn write_siteinfo<W: Write>(writer: &mut Writer<W>, site: &SiteInfo) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("siteinfo")))?;
    text_element(writer, "sitename", &site.site_name)?;
    text_element(writer, "dbname", &site.db_name)?;
    text_element(writer, "base", &site.base_url)?;
    text_element(
        writer,
        "generator",
        &format!("{} {}", GENERATOR_NAME, GENERATOR_VERSION),
    )?;
    text_element(writer, "case", CASE_POLICY)?;

    writer.write_event(Event::Start(BytesStart::new("namespaces")))?;
    let mut buf = itoa::Buffer::new();
    for (key, name) in namespaces(&site.site_name) {
        let start = BytesStart::new("namespace")
            .with_attributes([("key", buf.format(key)), ("case", CASE_POLICY)]);
        match name {
            Some(name) => {
                writer.write_event(Event::Start(start))?;
                writer.write_event(Event::Text(BytesText::new(&name)))?;
                writer.write_event(Event::End(BytesEnd::new("namespace")))?;
            }
            None => writer.write_event(Event::Empty(start))?,
        }
    }
    writer.write_event(Event::End(BytesEnd::new("namespaces")))?;

    writer.write_event(Event::End(BytesEnd::new("siteinfo")))?;
    Ok(())
}

fn write_revision<W: Write>(writer: &mut Writer<W>, revision: &OutputRevision) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("revision")))?;
    number_element(writer, "id", revision.id)?;
    if let Some(parent_id) = revision.parent_id {
        number_element(writer, "parentid", parent_id)?;
    }
    text_element(writer, "timestamp", &format_iso(&revision.timestamp))?;

    writer.write_event(Event::Start(BytesStart::new("contributor")))?;
    text_element(writer, "username", &revision.contributor.username)?;
    writer.write_event(Event::End(BytesEnd::new("contributor")))?;

    if revision.minor {
        writer.write_event(Event::Empty(BytesStart::new("minor")))?;
    }
    if let Some(comment) = &revision.comment {
        text_element(writer, "comment", comment)?;
    }
    number_element(writer, "origin", revision.origin)?;
    text_element(writer, "model", CONTENT_MODEL)?;
    text_element(writer, "format", CONTENT_FORMAT)?;

    let text = clean_text(&revision.text);
    let mut buf = itoa::Buffer::new();
    let start = BytesStart::new("text")
        .with_attributes([("bytes", buf.format(text.len())), ("xml:space", "preserve")]);
    writer.write_event(Event::Start(start))?;
    writer.write_event(Event::Text(BytesText::new(&text)))?;
    writer.write_event(Event::End(BytesEnd::new("text")))?;

    writer.write_event(Event::End(BytesEnd::new("revision")))?;
    Ok(())
}

fn write_page<W: Write>(writer: &mut Writer<W>, page: &OutputPage) -> Result<()> {
    writer.write_event(Event::Start(BytesStart::new("page")))?;
    text_element(writer, "title", &page.title)?;
    number_element(writer, "ns", page.namespace)?;
    number_element(writer, "id", page.id)?;
    if let Some(target) = &page.redirect {
        let redirect = BytesStart::new("redirect").with_attributes([("title", target.as_str())]);
        writer.write_event(Event::Empty(redirect))?;
    }
    for revision in &page.revisions {
        write_revision(writer, revision)?;
    }
    writer.write_event(Event::End(BytesEnd::new("page")))?;
    Ok(())
}

/// Writes the complete interchange document, without an XML declaration.
pub fn write_document<W: Write>(inner: W, site: &SiteInfo, pages: &[OutputPage]) -> Result<()> {
    let mut writer = Writer::new_with_indent(inner, b' ', 2);

    let root = BytesStart::new("mediawiki").with_attributes([
        ("xmlns", EXPORT_XMLNS),
        ("xmlns:xsi", XSI_NAMESPACE),
        ("xsi:schemaLocation", EXPORT_SCHEMA_LOCATION),
        ("version", EXPORT_SCHEMA_VERSION),
        ("xml:lang", "en"),
    ]);
    writer.write_event(Event::Start(root))?;
    write_siteinfo(&mut writer, site)?;
    for page in pages {
        write_page(&mut writer, page)?;
    }
    writer.write_event(Event::End(BytesEnd::new("mediawiki")))?;

    let mut inner = writer.into_inner();
    inner.write_all(b"\n")?;
    inner.flush().context("Failed to flush export output")?;
    Ok(())
}

/// Settings of one `export` run.
#[derive(Debug, Clone)]
pub struct ExportOptions {
    pub input: PathBuf,
    pub output: Option<PathBuf>,
    pub site_name: Option<String>,
    pub db_name: Option<String>,
    pub base_url: Option<String>,
    pub page_names: Option<PathBuf>,
    pub namespace: i32,
    pub migration_user: String,
    pub migration_timestamp: Option<DateTime<Utc>>,
    pub home_topic: String,
    pub format_markup: bool,
}

impl ExportOptions {
    pub fn new(input: impl Into<PathBuf>) -> Self {
        Self {
            input: input.into(),
            output: None,
            site_name: None,
            db_name: None,
            base_url: None,
            page_names: None,
            namespace: DEFAULT_NAMESPACE,
            migration_user: DEFAULT_MIGRATION_USER.to_string(),
            migration_timestamp: None,
            home_topic: DEFAULT_HOME_TOPIC.to_string(),
            format_markup: false,
        }
    }

    /// Site name, database name and base URL are mandatory.
    pub fn site_info(&self) -> Result<SiteInfo> {
        Ok(SiteInfo {
            site_name: self
                .site_name
                .clone()
                .context("Missing required export parameter: --site-name")?,
            db_name: self
                .db_name
                .clone()
                .context("Missing required export parameter: --db-name")?,
            base_url: self
                .base_url
                .clone()
                .context("Missing required export parameter: --base-url")?,
        })
    }
}

/// Export pass: intermediate JSON in, interchange document out.
pub fn run_export(options: &ExportOptions, stats: &MigrationStats) -> Result<()> {
    let site = options.site_info()?;
    let mut pages = read_pages(&options.input)?;
    info!(pages = pages.len(), "Loaded extracted pages");

    match &options.page_names {
        Some(path) => {
            let names = PageNames::load(path)?;
            report_all(&apply_renames(&mut pages, &names), stats);
        }
        None => info!("No page names table, skipping rename pass"),
    }
    report_all(&flatten_subpages(&mut pages, &options.home_topic), stats);
    report_all(&resolve_duplicate_titles(&mut pages)?, stats);

    let markup: &dyn MarkupTransform = if options.format_markup {
        &TwikiMarkup
    } else {
        &PassThrough
    };
    let ctx = MigrationContext::new(
        options.migration_user.clone(),
        options.migration_timestamp.unwrap_or_else(Utc::now),
        options.namespace,
    );

    let mut migration = Migration::new(ctx, PageIndex::build(&pages), markup, stats);
    let output_pages = migration.convert_all(&pages)?;

    match &options.output {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("Failed to create output file: {:?}", path))?;
            write_document(BufWriter::new(file), &site, &output_pages)?;
            info!(path = ?path, pages = output_pages.len(), "Wrote export document");
        }
        None => write_document(BufWriter::new(io::stdout().lock()), &site, &output_pages)?,
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Contributor;
    use chrono::TimeZone;

    fn site() -> SiteInfo {
        SiteInfo {
            site_name: "AB Tech Wiki".to_string(),
            db_name: "abtechwiki".to_string(),
            base_url: "https://wiki.example.org/Main_Page".to_string(),
        }
    }

    fn revision(id: u64, text: &str) -> OutputRevision {
        OutputRevision {
            id,
            parent_id: None,
            timestamp: Utc.with_ymd_and_hms(2004, 5, 1, 12, 0, 0).unwrap(),
            contributor: Contributor::new("janeDoe"),
            text: text.to_string(),
            minor: false,
            comment: None,
            origin: id,
        }
    }

    fn render(pages: &[OutputPage]) -> String {
        let mut out = Vec::new();
        write_document(&mut out, &site(), pages).unwrap();
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn clean_text_removes_backspaced_characters() {
        assert_eq!(clean_text("abc"), "abc");
        assert_eq!(clean_text("ab\u{8}c"), "ac");
        assert_eq!(clean_text("\u{8}\u{8}x"), "x");
    }

    #[test]
    fn clean_text_strips_other_control_characters() {
        assert_eq!(clean_text("page\u{c}break"), "pagebreak");
        assert_eq!(clean_text("\u{1b}[1mbold\u{1b}[0m"), "[1mbold[0m");
        assert_eq!(clean_text("\u{0}a\u{1f}"), "a");
        assert!(matches!(clean_text("tab\there\r\nline"), Cow::Borrowed(_)));
    }

    #[test]
    fn control_characters_never_reach_the_document() {
        let page = OutputPage {
            id: 1,
            title: "Cues".to_string(),
            namespace: 0,
            redirect: None,
            revisions: vec![revision(1, "go\u{c}\u{1b}\n")],
        };
        let xml = render(&[page]);
        assert!(xml.contains("<text bytes=\"3\" xml:space=\"preserve\">go\n</text>"));
        assert!(!xml.chars().any(is_forbidden_control));
    }

    #[test]
    fn namespace_table_has_eighteen_entries() {
        let table = namespaces("Site");
        assert_eq!(table.len(), 18);
        assert_eq!(table.first().unwrap().0, -2);
        assert_eq!(table.last().unwrap().0, 15);
        assert_eq!(table[6].1.as_deref(), Some("Site"));
        assert_eq!(table[7].1.as_deref(), Some("Site talk"));
        assert_eq!(table[2].1, None);
    }

    #[test]
    fn document_root_and_siteinfo() {
        let xml = render(&[]);
        assert!(xml.starts_with("<mediawiki xmlns=\"http://www.mediawiki.org/xml/export-0.11/\""));
        assert!(!xml.contains("<?xml"));
        assert!(xml.contains("version=\"0.11\""));
        assert!(xml.contains("xml:lang=\"en\""));
        assert!(xml.contains("<sitename>AB Tech Wiki</sitename>"));
        assert!(xml.contains("<dbname>abtechwiki</dbname>"));
        assert!(xml.contains(&format!("<generator>twiki2mw {}</generator>", GENERATOR_VERSION)));
        assert!(xml.contains("<case>first-letter</case>"));
        assert!(xml.contains("<namespace key=\"0\" case=\"first-letter\"/>"));
        assert!(xml.contains("<namespace key=\"5\" case=\"first-letter\">AB Tech Wiki talk</namespace>"));
        assert_eq!(xml.matches("<namespace ").count(), 18);
    }

    #[test]
    fn revision_fields_are_written_in_order() {
        let mut moved = revision(2, "#REDIRECT [[New]]");
        moved.parent_id = Some(1);
        moved.minor = true;
        moved.comment = Some("JaneDoe moved page [[Old]] to [[New]]".to_string());
        moved.origin = 1;
        let page = OutputPage {
            id: 7,
            title: "Old".to_string(),
            namespace: 0,
            redirect: Some("New".to_string()),
            revisions: vec![moved],
        };
        let xml = render(&[page]);

        let order = [
            "<title>Old</title>",
            "<ns>0</ns>",
            "<id>7</id>",
            "<redirect title=\"New\"/>",
            "<id>2</id>",
            "<parentid>1</parentid>",
            "<timestamp>2004-05-01T12:00:00Z</timestamp>",
            "<username>JaneDoe</username>",
            "<minor/>",
            "<comment>JaneDoe moved page [[Old]] to [[New]]</comment>",
            "<origin>1</origin>",
            "<model>wikitext</model>",
            "<format>text/x-wiki</format>",
            "<text bytes=\"17\" xml:space=\"preserve\">#REDIRECT [[New]]</text>",
        ];
        let mut pos = 0;
        for needle in order {
            let found = xml[pos..]
                .find(needle)
                .unwrap_or_else(|| panic!("{} missing or out of order", needle));
            pos += found + needle.len();
        }
    }

    #[test]
    fn text_is_escaped_and_measured_in_utf8_bytes() {
        let page = OutputPage {
            id: 1,
            title: "Köln & <Co>".to_string(),
            namespace: 0,
            redirect: None,
            revisions: vec![revision(1, "Köln\u{8}n <b>")],
        };
        let xml = render(&[page]);
        assert!(xml.contains("<title>Köln &amp; &lt;Co&gt;</title>"));
        assert!(xml.contains("<text bytes=\"9\" xml:space=\"preserve\">Köln &lt;b&gt;</text>"));
        assert!(!xml.contains("<parentid>"));
        assert!(!xml.contains("<minor/>"));
    }

    #[test]
    fn missing_site_name_is_fatal() {
        let options = ExportOptions::new("pages.json");
        let err = run_export(&options, &MigrationStats::new()).unwrap_err();
        assert!(err.to_string().contains("--site-name"));
    }
}
