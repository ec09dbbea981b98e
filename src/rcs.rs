//! Reader for RCS `,v` history files.
//!
//! Only the structure is interpreted: admin header, delta graph, and the log
//! messages of the deltatext section. Diff bodies are kept raw and never
//! applied; full revision texts come from a [`crate::checkout::Checkout`].

use crate::models::{ParseRevisionError, RevisionNumber};
use memchr::memchr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RcsError {
    #[error("unexpected end of input while reading {0}")]
    UnexpectedEof(&'static str),
    #[error("expected {expected} at byte {offset}, found {found}")]
    Unexpected {
        expected: &'static str,
        found: String,
        offset: usize,
    },
    #[error("unterminated @-string starting at byte {0}")]
    UnterminatedString(usize),
    #[error("revision {revision} has no {field}")]
    MissingField {
        revision: String,
        field: &'static str,
    },
    #[error("deltatext for unknown revision {0}")]
    UnknownDelta(String),
    #[error(transparent)]
    Revision(#[from] ParseRevisionError),
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct RcsFile {
    pub head: Option<RevisionNumber>,
    pub branch: Option<RevisionNumber>,
    pub symbols: Vec<(String, RevisionNumber)>,
    pub comment: Option<String>,
    pub expand: Option<String>,
    pub desc: String,
    pub deltas: Vec<Delta>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Delta {
    pub revision: RevisionNumber,
    pub date: String,
    pub author: String,
    pub state: String,
    pub branches: Vec<RevisionNumber>,
    pub next: Option<RevisionNumber>,
    pub log: String,
    /// Full text for the head, reverse diff otherwise. Not trusted for reconstruction.
    pub text: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Token<'a> {
    Word(&'a str),
    Str(String),
    Semicolon,
    Colon,
}

impl Token<'_> {
    fn describe(&self) -> String {
        match self {
            Token::Word(w) => format!("word {:?}", w),
            Token::Str(_) => "string".to_string(),
            Token::Semicolon => "';'".to_string(),
            Token::Colon => "':'".to_string(),
        }
    }
}

struct Lexer<'a> {
    src: &'a str,
    pos: usize,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src, pos: 0 }
    }

    fn next(&mut self) -> Result<Option<Token<'a>>, RcsError> {
        let bytes = self.src.as_bytes();
        while self.pos < bytes.len() && bytes[self.pos].is_ascii_whitespace() {
            self.pos += 1;
        }
        if self.pos >= bytes.len() {
            return Ok(None);
        }

        let start = self.pos;
        match bytes[start] {
            b';' => {
                self.pos += 1;
                Ok(Some(Token::Semicolon))
            }
            b':' => {
                self.pos += 1;
                Ok(Some(Token::Colon))
            }
            b'@' => self.read_string().map(Some),
            _ => {
                let end = bytes[start..]
                    .iter()
                    .position(|b| b.is_ascii_whitespace() || matches!(*b, b';' | b':' | b'@'))
                    .map(|p| start + p)
                    .unwrap_or(bytes.len());
                self.pos = end;
                Ok(Some(Token::Word(&self.src[start..end])))
            }
        }
    }

    fn peek(&mut self) -> Result<Option<Token<'a>>, RcsError> {
        let saved = self.pos;
        let token = self.next();
        self.pos = saved;
        token
    }

    /// `@...@` with `@@` standing for a literal `@`.
    fn read_string(&mut self) -> Result<Token<'a>, RcsError> {
        let bytes = self.src.as_bytes();
        let open = self.pos;
        let mut cursor = open + 1;
        let mut out = String::new();

        loop {
            let rel = memchr(b'@', &bytes[cursor..]).ok_or(RcsError::UnterminatedString(open))?;
            let at = cursor + rel;
            out.push_str(&self.src[cursor..at]);
            if bytes.get(at + 1) == Some(&b'@') {
                out.push('@');
                cursor = at + 2;
            } else {
                self.pos = at + 1;
                return Ok(Token::Str(out));
            }
        }
    }
}

struct Parser<'a> {
    lexer: Lexer<'a>,
}

impl<'a> Parser<'a> {
    fn unexpected(&self, expected: &'static str, found: Option<Token<'_>>) -> RcsError {
        match found {
            Some(token) => RcsError::Unexpected {
                expected,
                found: token.describe(),
                offset: self.lexer.pos,
            },
            None => RcsError::UnexpectedEof(expected),
        }
    }

    fn expect_keyword(&mut self, keyword: &'static str) -> Result<(), RcsError> {
        match self.lexer.next()? {
            Some(Token::Word(w)) if w == keyword => Ok(()),
            other => Err(self.unexpected(keyword, other)),
        }
    }

    fn expect_string(&mut self, what: &'static str) -> Result<String, RcsError> {
        match self.lexer.next()? {
            Some(Token::Str(s)) => Ok(s),
            other => Err(self.unexpected(what, other)),
        }
    }

    /// Everything up to (and consuming) the terminating `;`.
    fn phrase_values(&mut self) -> Result<Vec<Token<'a>>, RcsError> {
        let mut values = Vec::new();
        loop {
            match self.lexer.next()? {
                Some(Token::Semicolon) => return Ok(values),
                Some(token) => values.push(token),
                None => return Err(RcsError::UnexpectedEof("';'")),
            }
        }
    }

    /// True when the next token starts a delta (a revision number) or the `desc` section.
    fn at_section_boundary(&mut self) -> Result<bool, RcsError> {
        Ok(match self.lexer.peek()? {
            Some(Token::Word(w)) => w == "desc" || w.parse::<RevisionNumber>().is_ok(),
            _ => false,
        })
    }

    fn parse_admin(&mut self, file: &mut RcsFile) -> Result<(), RcsError> {
        self.expect_keyword("head")?;
        file.head = first_revision(&self.phrase_values()?)?;

        while !self.at_section_boundary()? {
            let keyword = match self.lexer.next()? {
                Some(Token::Word(w)) => w,
                other => return Err(self.unexpected("admin keyword", other)),
            };
            let values = self.phrase_values()?;
            match keyword {
                "branch" => file.branch = first_revision(&values)?,
                "symbols" => file.symbols = symbol_pairs(&values)?,
                "comment" => file.comment = first_string(&values),
                "expand" => file.expand = first_string(&values),
                // access, locks, strict, integrity and unknown new-phrases
                _ => {}
            }
        }
        Ok(())
    }

    fn parse_delta(&mut self, revision: RevisionNumber) -> Result<Delta, RcsError> {
        let mut date = None;
        let mut author = None;
        let mut state = String::new();
        let mut branches = Vec::new();
        let mut next = None;

        while !self.at_section_boundary()? {
            let keyword = match self.lexer.next()? {
                Some(Token::Word(w)) => w,
                other => return Err(self.unexpected("delta keyword", other)),
            };
            let values = self.phrase_values()?;
            match keyword {
                "date" => date = first_word(&values).map(str::to_string),
                "author" => author = first_word(&values).map(str::to_string),
                "state" => state = first_word(&values).unwrap_or_default().to_string(),
                "branches" => branches = all_revisions(&values)?,
                "next" => next = first_revision(&values)?,
                _ => {}
            }
        }

        let missing = |field: &'static str| RcsError::MissingField {
            revision: revision.to_string(),
            field,
        };
        Ok(Delta {
            date: date.ok_or_else(|| missing("date"))?,
            author: author.ok_or_else(|| missing("author"))?,
            revision,
            state,
            branches,
            next,
            log: String::new(),
            text: None,
        })
    }

    fn parse_deltatext(&mut self, file: &mut RcsFile) -> Result<bool, RcsError> {
        let revision: RevisionNumber = match self.lexer.next()? {
            Some(Token::Word(w)) => w.parse()?,
            None => return Ok(false),
            other => return Err(self.unexpected("deltatext revision", other)),
        };

        let mut log = String::new();
        let text = loop {
            match self.lexer.next()? {
                Some(Token::Word("log")) => log = self.expect_string("log string")?,
                Some(Token::Word("text")) => break self.expect_string("text string")?,
                Some(Token::Word(_)) => {
                    self.phrase_values()?;
                }
                other => return Err(self.unexpected("deltatext keyword", other)),
            }
        };

        let delta = file
            .deltas
            .iter_mut()
            .find(|d| d.revision == revision)
            .ok_or_else(|| RcsError::UnknownDelta(revision.to_string()))?;
        delta.log = log;
        delta.text = Some(text);
        Ok(true)
    }
}

fn first_word<'t>(values: &'t [Token<'_>]) -> Option<&'t str> {
    values.iter().find_map(|t| match t {
        Token::Word(w) => Some(*w),
        _ => None,
    })
}

fn first_string(values: &[Token<'_>]) -> Option<String> {
    values.iter().find_map(|t| match t {
        Token::Str(s) => Some(s.clone()),
        _ => None,
    })
}

fn first_revision(values: &[Token<'_>]) -> Result<Option<RevisionNumber>, RcsError> {
    first_word(values)
        .map(|w| w.parse::<RevisionNumber>())
        .transpose()
        .map_err(RcsError::from)
}

fn all_revisions(values: &[Token<'_>]) -> Result<Vec<RevisionNumber>, RcsError> {
    values
        .iter()
        .filter_map(|t| match t {
            Token::Word(w) => Some(w.parse::<RevisionNumber>()),
            _ => None,
        })
        .collect::<Result<Vec<_>, _>>()
        .map_err(RcsError::from)
}

/// `name:rev name:rev ...`
fn symbol_pairs(values: &[Token<'_>]) -> Result<Vec<(String, RevisionNumber)>, RcsError> {
    let mut pairs = Vec::new();
    for window in values.windows(3) {
        if let [Token::Word(name), Token::Colon, Token::Word(rev)] = window {
            pairs.push((name.to_string(), rev.parse()?));
        }
    }
    Ok(pairs)
}

/// Parses a complete `,v` file.
pub fn parse(src: &str) -> Result<RcsFile, RcsError> {
    let mut parser = Parser {
        lexer: Lexer::new(src),
    };
    let mut file = RcsFile::default();

    parser.parse_admin(&mut file)?;

    loop {
        match parser.lexer.next()? {
            Some(Token::Word("desc")) => break,
            Some(Token::Word(w)) => {
                let revision: RevisionNumber = w.parse()?;
                let delta = parser.parse_delta(revision)?;
                file.deltas.push(delta);
            }
            other => return Err(parser.unexpected("delta or desc", other)),
        }
    }

    file.desc = parser.expect_string("desc string")?;

    while parser.parse_deltatext(&mut file)? {}

    Ok(file)
}
