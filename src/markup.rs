//! Legacy markup to wikitext conversion.
//!
//! The transform is a pure `text -> text` function applied to every revision
//! text taken from the legacy data. Synthesized redirect texts never go
//! through it.

use crate::meta::is_meta_line;
use once_cell::sync::Lazy;
use regex::Regex;

pub trait MarkupTransform {
    fn format(&self, text: &str) -> String;
}

/// Leaves texts untouched.
pub struct PassThrough;

impl MarkupTransform for PassThrough {
    fn format(&self, text: &str) -> String {
        text.to_string()
    }
}

/// Rewrites the common TWiki markup into wikitext.
pub struct TwikiMarkup;

const MAX_LIST_DEPTH: usize = 10;

static MATH_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"%\$(.*?)\$%").unwrap());
static DOT_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(/?)dot>").unwrap());
static VERBATIM_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"<(/?)verbatim>").unwrap());
static ANCHOR_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*#(\S+)\s*$").unwrap());
static ESCAPED_WIKIWORD_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:<nop>|!)([A-Z][a-z0-9]+[A-Z])").unwrap());
static IMAGE_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"<img .*?src="Media:(.+?)".*?/>"#).unwrap());

static HEADING_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^---(\+{1,6})(.*)$").unwrap());
static BULLET_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:   |\t)+)\* (.*)$").unwrap());
static NUMBERED_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^((?:   |\t)+)[0-9]\.? (.*)$").unwrap());
static DEFINITION_REGEX: Lazy<Regex> = Lazy::new(|| Regex::new(r"^   \$ ([^:]*)(.*)$").unwrap());

/// Emphasis delimiters in application order with their wikitext replacement.
static EMPHASIS: Lazy<Vec<(Regex, usize, &'static str, &'static str)>> = Lazy::new(|| {
    [
        (r"\*", 1, "'''", "'''"),
        (r"__", 2, "'''''", "'''''"),
        (r"_", 1, "''", "''"),
        (r"==", 2, "'''<tt>", "</tt>'''"),
        (r"=", 1, "<tt>", "</tt>"),
    ]
    .into_iter()
    .map(|(marker, len, open, close)| {
        let pattern = format!(
            r"(^|[\s(]){marker}(\S+?|\S.*?\S){marker}($|[\s).,:;!?])"
        );
        (Regex::new(&pattern).unwrap(), len, open, close)
    })
    .collect()
});

/// Replaces `<marker>text<marker>` spans bounded by whitespace or punctuation.
/// The trailing boundary character is not consumed, so adjacent spans both match.
fn replace_emphasis(line: &str, re: &Regex, marker_len: usize, open: &str, close: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut pos = 0;

    while let Some(caps) = re.captures_at(line, pos) {
        let (Some(whole), Some(lead), Some(inner)) = (caps.get(0), caps.get(1), caps.get(2)) else {
            break;
        };
        out.push_str(&line[pos..whole.start()]);
        out.push_str(lead.as_str());
        out.push_str(open);
        out.push_str(inner.as_str());
        out.push_str(close);
        pos = inner.end() + marker_len;
    }

    out.push_str(&line[pos..]);
    out
}

fn list_depth(indent: &str) -> usize {
    let tabs = indent.matches('\t').count();
    let spaces = indent.len() - tabs;
    (tabs + spaces / 3).min(MAX_LIST_DEPTH)
}

fn format_line(line: &str) -> String {
    if let Some(caps) = HEADING_REGEX.captures(line) {
        let marks = "=".repeat(caps[1].len());
        return format!("{}{} {}", marks, &caps[2], marks);
    }
    if let Some(caps) = BULLET_REGEX.captures(line) {
        return format!("{} {}", "*".repeat(list_depth(&caps[1])), &caps[2]);
    }
    if let Some(caps) = NUMBERED_REGEX.captures(line) {
        return format!("{} {}", "#".repeat(list_depth(&caps[1])), &caps[2]);
    }
    if let Some(caps) = DEFINITION_REGEX.captures(line) {
        return format!("; {} {}", &caps[1], &caps[2]);
    }
    if let Some(caps) = ANCHOR_REGEX.captures(line) {
        return format!("<div id=\"{}\"></div>", &caps[1]);
    }
    line.to_string()
}

impl MarkupTransform for TwikiMarkup {
    fn format(&self, text: &str) -> String {
        let text = MATH_REGEX.replace_all(text, "<math>$1</math>");
        let text = DOT_REGEX.replace_all(&text, "<${1}graphviz>");
        let text = VERBATIM_REGEX.replace_all(&text, "<${1}pre>");

        let mut out = String::with_capacity(text.len());
        for line in text.split_inclusive('\n') {
            let (body, ending) = match line.strip_suffix('\n') {
                Some(body) => (body, "\n"),
                None => (line, ""),
            };
            if is_meta_line(body) {
                continue;
            }

            let mut body = ESCAPED_WIKIWORD_REGEX.replace_all(body, "$1").into_owned();
            body = body.replace("<nop>", "");
            body = IMAGE_REGEX.replace_all(&body, "[[File:$1]]").into_owned();
            // emphasis first: heading output is made of `=` runs
            for (re, len, open, close) in EMPHASIS.iter() {
                body = replace_emphasis(&body, re, *len, open, close);
            }

            out.push_str(&format_line(&body));
            out.push_str(ending);
        }
        out
    }
}
