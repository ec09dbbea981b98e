//! Parser for the `key="value" key2="value two"` attribute strings carried by
//! metadata declarations.

use crate::models::Attributes;
use tracing::warn;

/// Parses an attribute string into a mapping.
///
/// Tokens are split on whitespace outside double quotes. One pair of enclosing
/// quotes is stripped from each value; any other quote characters are kept.
/// A token without `=` is recorded under its own text with an empty value.
pub fn parse_attributes(input: &str) -> Attributes {
    let mut attributes = Attributes::new();

    for token in split_tokens(input) {
        match token.split_once('=') {
            Some((key, value)) if !key.is_empty() => {
                attributes.insert(key, unquote(value));
            }
            _ => {
                warn!(token = token, "Malformed attribute token");
                attributes.insert(token, "");
            }
        }
    }

    attributes
}

/// Splits on whitespace that is not inside a double-quoted run.
fn split_tokens(input: &str) -> Vec<&str> {
    let mut tokens = Vec::new();
    let mut in_quotes = false;
    let mut start: Option<usize> = None;

    for (i, c) in input.char_indices() {
        if c == '"' {
            in_quotes = !in_quotes;
        }
        if c.is_whitespace() && !in_quotes {
            if let Some(s) = start.take() {
                tokens.push(&input[s..i]);
            }
        } else if start.is_none() {
            start = Some(i);
        }
    }
    if let Some(s) = start {
        tokens.push(&input[s..]);
    }

    tokens
}

fn unquote(value: &str) -> &str {
    value
        .strip_prefix('"')
        .and_then(|v| v.strip_suffix('"'))
        .unwrap_or(value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_pairs() {
        let attrs = parse_attributes(r#"author="PerryNaseck" date="1653000000" version="1.3""#);
        assert_eq!(attrs.len(), 3);
        assert_eq!(attrs.get("author"), Some("PerryNaseck"));
        assert_eq!(attrs.get("date"), Some("1653000000"));
        assert_eq!(attrs.get("version"), Some("1.3"));
    }

    #[test]
    fn whitespace_inside_quotes_is_not_a_split() {
        let attrs = parse_attributes(r#"comment="a long  comment" name="x""#);
        assert_eq!(attrs.get("comment"), Some("a long  comment"));
        assert_eq!(attrs.get("name"), Some("x"));
    }

    #[test]
    fn only_enclosing_quotes_are_stripped() {
        let attrs = parse_attributes(r#"title="say "hi" now""#);
        assert_eq!(attrs.get("title"), Some(r#"say "hi" now"#));
    }

    #[test]
    fn unquoted_value_is_kept_verbatim() {
        let attrs = parse_attributes("size=42");
        assert_eq!(attrs.get("size"), Some("42"));
    }

    #[test]
    fn token_without_separator_gets_empty_value() {
        let attrs = parse_attributes(r#"broken name="WebHome""#);
        assert_eq!(attrs.get("broken"), Some(""));
        assert_eq!(attrs.get("name"), Some("WebHome"));
    }

    #[test]
    fn empty_input_gives_empty_mapping() {
        assert!(parse_attributes("").is_empty());
        assert!(parse_attributes("   ").is_empty());
    }

    #[test]
    fn value_may_contain_equals_sign() {
        let attrs = parse_attributes(r#"link="a=b""#);
        assert_eq!(attrs.get("link"), Some("a=b"));
    }

    #[test]
    fn parsing_is_deterministic() {
        let input = r#"from="Main.OldTopic" to="Main.NewTopic" by="JaneDoe" date="1100000000""#;
        assert_eq!(parse_attributes(input), parse_attributes(input));
    }

    #[test]
    fn split_tokens_handles_tabs_and_newlines() {
        let tokens = split_tokens("a=\"1\"\tb=\"2\"\nc=\"3 4\"");
        assert_eq!(tokens, vec!["a=\"1\"", "b=\"2\"", "c=\"3 4\""]);
    }
}
