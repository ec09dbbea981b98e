//! Full-text retrieval of historical revisions.

use crate::models::RevisionNumber;
use rustc_hash::FxHashMap;
use std::io;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum CheckoutError {
    #[error("checkout program {program:?} could not be started: {source}")]
    ToolMissing {
        program: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("checkout of {revision} from {path:?} failed ({status}): {stderr}")]
    Failed {
        path: PathBuf,
        revision: String,
        status: String,
        stderr: String,
    },
    #[error("no text for revision {revision} of {path:?}")]
    NotFound { path: PathBuf, revision: String },
}

/// Byte encoding of the legacy data files.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum LegacyEncoding {
    #[default]
    Latin1,
    Utf8,
}

impl LegacyEncoding {
    pub fn decode(self, bytes: &[u8]) -> String {
        match self {
            LegacyEncoding::Latin1 => bytes.iter().map(|&b| b as char).collect(),
            LegacyEncoding::Utf8 => String::from_utf8_lossy(bytes).into_owned(),
        }
    }
}

/// Gives the exact content of one revision of a history file.
pub trait Checkout {
    fn checkout(&self, history: &Path, revision: &RevisionNumber) -> Result<String, CheckoutError>;
}

/// Runs RCS `co -q -p -r<rev> <file,v>` and decodes its stdout.
pub struct RcsCheckout {
    program: PathBuf,
    encoding: LegacyEncoding,
}

impl RcsCheckout {
    pub fn new(program: impl Into<PathBuf>, encoding: LegacyEncoding) -> Self {
        Self {
            program: program.into(),
            encoding,
        }
    }
}

impl Checkout for RcsCheckout {
    fn checkout(&self, history: &Path, revision: &RevisionNumber) -> Result<String, CheckoutError> {
        debug!(path = ?history, revision = %revision, "Checking out revision");

        let output = Command::new(&self.program)
            .arg("-q")
            .arg("-p")
            .arg(format!("-r{}", revision))
            .arg(history)
            .output()
            .map_err(|source| CheckoutError::ToolMissing {
                program: self.program.clone(),
                source,
            })?;

        if !output.status.success() {
            return Err(CheckoutError::Failed {
                path: history.to_path_buf(),
                revision: revision.to_string(),
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(self.encoding.decode(&output.stdout))
    }
}

/// Deterministic in-memory checkout keyed by history file name and revision.
#[derive(Default)]
pub struct MemoryCheckout {
    texts: FxHashMap<(String, RevisionNumber), String>,
}

impl MemoryCheckout {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, file_name: &str, revision: RevisionNumber, text: impl Into<String>) {
        self.texts
            .insert((file_name.to_string(), revision), text.into());
    }
}

impl Checkout for MemoryCheckout {
    fn checkout(&self, history: &Path, revision: &RevisionNumber) -> Result<String, CheckoutError> {
        let file_name = history
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        self.texts
            .get(&(file_name, revision.clone()))
            .cloned()
            .ok_or_else(|| CheckoutError::NotFound {
                path: history.to_path_buf(),
                revision: revision.to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rev(s: &str) -> RevisionNumber {
        s.parse().unwrap()
    }

    #[test]
    fn latin1_maps_every_byte() {
        let text = LegacyEncoding::Latin1.decode(&[b'K', 0xF6, b'l', b'n']);
        assert_eq!(text, "Köln");
    }

    #[test]
    fn utf8_decodes_lossily() {
        let text = LegacyEncoding::Utf8.decode("Köln".as_bytes());
        assert_eq!(text, "Köln");
        let broken = LegacyEncoding::Utf8.decode(&[b'a', 0xFF]);
        assert_eq!(broken, "a\u{FFFD}");
    }

    #[test]
    fn memory_checkout_finds_by_file_name() {
        let mut checkout = MemoryCheckout::new();
        checkout.insert("Page.txt,v", rev("1.2"), "second");
        let text = checkout
            .checkout(Path::new("/data/Main/Page.txt,v"), &rev("1.2"))
            .unwrap();
        assert_eq!(text, "second");
    }

    #[test]
    fn memory_checkout_missing_revision_fails() {
        let checkout = MemoryCheckout::new();
        let err = checkout
            .checkout(Path::new("Page.txt,v"), &rev("1.1"))
            .unwrap_err();
        assert!(matches!(err, CheckoutError::NotFound { .. }));
    }

    #[test]
    fn missing_program_is_reported_as_tool_missing() {
        let checkout = RcsCheckout::new("/nonexistent/bin/co-does-not-exist", LegacyEncoding::Latin1);
        let err = checkout
            .checkout(Path::new("Page.txt,v"), &rev("1.1"))
            .unwrap_err();
        assert!(matches!(err, CheckoutError::ToolMissing { .. }));
    }
}
