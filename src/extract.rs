use crate::checkout::{Checkout, LegacyEncoding};
use crate::config::{HISTORY_SUFFIX, PAGE_EXTENSION, PROGRESS_INTERVAL};
use crate::history::extract_history;
use crate::meta::parse_metadata;
use crate::models::Page;
use crate::stats::MigrationStats;
use crate::validate::{check_page, report_all};
use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// The files backing one legacy topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFiles {
    pub name: String,
    pub text_path: PathBuf,
    pub history_path: Option<PathBuf>,
}

pub(crate) fn make_progress_bar(total: u64, label: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::default_bar()
        .template(&format!(
            "    {{spinner:.cyan}} {label:<10} [{{bar:30.cyan/blue}}] {{pos}}/{{len}} pages"
        ))
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
    pb.set_style(style);
    pb
}

/// Lists every `*.txt` topic of a data web, sorted by name, paired with its
/// `,v` history when one exists.
pub fn discover_pages(data_dir: &Path) -> Result<Vec<PageFiles>> {
    let entries = fs::read_dir(data_dir)
        .with_context(|| format!("Failed to read data directory: {:?}", data_dir))?;

    let mut pages = Vec::new();
    for entry in entries {
        let path = entry
            .with_context(|| format!("Failed to list data directory: {:?}", data_dir))?
            .path();
        if !path.is_file() || path.extension().and_then(|e| e.to_str()) != Some(PAGE_EXTENSION) {
            continue;
        }
        let Some(name) = path.file_stem().and_then(|s| s.to_str()) else {
            debug!(path = ?path, "Skipping file with non UTF-8 name");
            continue;
        };

        let mut history = path.clone().into_os_string();
        history.push(HISTORY_SUFFIX);
        let history = PathBuf::from(history);

        pages.push(PageFiles {
            name: name.to_string(),
            history_path: history.is_file().then_some(history),
            text_path: path,
        });
    }

    pages.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(pages)
}

/// Reads one topic: live text, live metadata and, when present, its history.
pub fn load_page(
    files: &PageFiles,
    checkout: &dyn Checkout,
    encoding: LegacyEncoding,
) -> Result<Page> {
    let bytes = fs::read(&files.text_path)
        .with_context(|| format!("Failed to read page file: {:?}", files.text_path))?;
    let text = encoding.decode(&bytes);
    let meta = parse_metadata(&text, &files.name);

    let mut page = Page::new(files.name.clone(), text, meta);
    if let Some(history_path) = &files.history_path {
        page.history = Some(extract_history(&files.name, history_path, checkout, encoding)?);
    }
    Ok(page)
}

/// Extraction pass: loads and validates every topic of `data_dir`.
pub fn run_extraction(
    data_dir: &Path,
    checkout: &dyn Checkout,
    encoding: LegacyEncoding,
    stats: &MigrationStats,
) -> Result<Vec<Page>> {
    let files = discover_pages(data_dir)?;
    info!(pages = files.len(), dir = ?data_dir, "Discovered topics");

    let pb = make_progress_bar(files.len() as u64, "Extracting");
    let mut pages = Vec::with_capacity(files.len());

    for (i, file) in files.iter().enumerate() {
        let page = load_page(file, checkout, encoding)?;

        report_all(&check_page(&page), stats);

        let revisions = page.history.as_ref().map_or(0, |h| h.deltas.len());
        stats.inc_pages_extracted();
        stats.add_revisions_extracted(revisions as u64);
        debug!(page = %page.name, revisions = revisions, "Extracted topic");

        pages.push(page);
        pb.inc(1);
        if (i as u64 + 1) % PROGRESS_INTERVAL == 0 {
            info!(done = i + 1, total = files.len(), "Extraction progress");
        }
    }

    pb.finish_and_clear();
    Ok(pages)
}

/// Serializes the intermediate page model as pretty JSON.
pub fn write_pages<W: Write>(writer: W, pages: &[Page]) -> Result<()> {
    let mut writer = BufWriter::new(writer);
    serde_json::to_writer_pretty(&mut writer, pages).context("Failed to serialize pages")?;
    writer.write_all(b"\n")?;
    writer.flush().context("Failed to flush page output")?;
    Ok(())
}

pub fn read_pages(path: &Path) -> Result<Vec<Page>> {
    let file = File::open(path).with_context(|| format!("Failed to open page file: {:?}", path))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("Failed to parse page file: {:?}", path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::checkout::MemoryCheckout;
    use crate::models::MetaKind;
    use tempfile::TempDir;

    const HISTORY: &str = "head\t1.1;\naccess;\nsymbols;\nlocks; strict;\ncomment\t@# @;\n\n\n1.1\ndate\t2004.05.01.12.00.00;\tauthor JohnRoe;\tstate Exp;\nbranches;\nnext\t;\n\n\ndesc\n@@\n\n\n1.1\nlog\n@Initial revision\n@\ntext\n@body\n@\n";

    const LIVE: &str = "%META:TOPICINFO{author=\"JohnRoe\" date=\"1083412800\"}%\nbody\n";

    fn web() -> (TempDir, MemoryCheckout) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("Stage.txt"), LIVE).unwrap();
        fs::write(dir.path().join("Stage.txt,v"), HISTORY).unwrap();
        fs::write(dir.path().join("Attic.txt"), "no metadata here\n").unwrap();
        fs::write(dir.path().join("notes.md"), "ignored").unwrap();

        let mut checkout = MemoryCheckout::new();
        checkout.insert("Stage.txt,v", "1.1".parse().unwrap(), LIVE);
        (dir, checkout)
    }

    #[test]
    fn discovers_topics_sorted_with_history() {
        let (dir, _) = web();
        let files = discover_pages(dir.path()).unwrap();
        let names: Vec<_> = files.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, vec!["Attic", "Stage"]);
        assert!(files[0].history_path.is_none());
        assert_eq!(
            files[1].history_path.as_deref(),
            Some(dir.path().join("Stage.txt,v").as_path())
        );
    }

    #[test]
    fn missing_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        assert!(discover_pages(&dir.path().join("nope")).is_err());
    }

    #[test]
    fn extraction_loads_history_and_counts_anomalies() {
        let (dir, checkout) = web();
        let stats = MigrationStats::new();
        let pages = run_extraction(dir.path(), &checkout, LegacyEncoding::Latin1, &stats).unwrap();

        assert_eq!(pages.len(), 2);
        let stage = &pages[1];
        assert_eq!(stage.title, "Stage");
        assert_eq!(stage.meta.count(&MetaKind::PageInfo), 1);
        assert_eq!(stage.history.as_ref().unwrap().deltas.len(), 1);

        assert_eq!(stats.extracted_pages(), 2);
        assert_eq!(stats.extracted_revisions(), 1);
        // Attic: no history and no TOPICINFO
        assert_eq!(stats.anomaly_count(), 2);
    }

    #[test]
    fn pages_survive_json_round_trip() {
        let (dir, checkout) = web();
        let stats = MigrationStats::new();
        let pages = run_extraction(dir.path(), &checkout, LegacyEncoding::Latin1, &stats).unwrap();

        let path = dir.path().join("pages.json");
        write_pages(File::create(&path).unwrap(), &pages).unwrap();
        let back = read_pages(&path).unwrap();
        assert_eq!(back, pages);
    }
}
