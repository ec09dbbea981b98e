use std::sync::atomic::{AtomicU64, Ordering};

/// Counters collected over one extraction or export run
#[derive(Default)]
pub struct MigrationStats {
    pub pages_extracted: AtomicU64,
    pub revisions_extracted: AtomicU64,
    pub pages_exported: AtomicU64,
    pub revisions_exported: AtomicU64,
    pub moves_replayed: AtomicU64,
    pub moves_skipped: AtomicU64,
    pub redirect_pages: AtomicU64,
    pub anomalies: AtomicU64,
}

impl MigrationStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inc_pages_extracted(&self) {
        self.pages_extracted.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_revisions_extracted(&self, count: u64) {
        self.revisions_extracted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_pages_exported(&self) {
        self.pages_exported.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_revisions_exported(&self, count: u64) {
        self.revisions_exported.fetch_add(count, Ordering::Relaxed);
    }

    pub fn inc_moves_replayed(&self) {
        self.moves_replayed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_moves_skipped(&self) {
        self.moves_skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn inc_redirect_pages(&self) {
        self.redirect_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn add_anomalies(&self, count: u64) {
        self.anomalies.fetch_add(count, Ordering::Relaxed);
    }

    pub fn extracted_pages(&self) -> u64 {
        self.pages_extracted.load(Ordering::Relaxed)
    }

    pub fn extracted_revisions(&self) -> u64 {
        self.revisions_extracted.load(Ordering::Relaxed)
    }

    pub fn exported_pages(&self) -> u64 {
        self.pages_exported.load(Ordering::Relaxed)
    }

    pub fn exported_revisions(&self) -> u64 {
        self.revisions_exported.load(Ordering::Relaxed)
    }

    pub fn moves(&self) -> u64 {
        self.moves_replayed.load(Ordering::Relaxed)
    }

    pub fn skipped_moves(&self) -> u64 {
        self.moves_skipped.load(Ordering::Relaxed)
    }

    pub fn redirects(&self) -> u64 {
        self.redirect_pages.load(Ordering::Relaxed)
    }

    pub fn anomaly_count(&self) -> u64 {
        self.anomalies.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values_are_zero() {
        let stats = MigrationStats::new();
        assert_eq!(stats.extracted_pages(), 0);
        assert_eq!(stats.extracted_revisions(), 0);
        assert_eq!(stats.exported_pages(), 0);
        assert_eq!(stats.exported_revisions(), 0);
        assert_eq!(stats.moves(), 0);
        assert_eq!(stats.skipped_moves(), 0);
        assert_eq!(stats.redirects(), 0);
        assert_eq!(stats.anomaly_count(), 0);
    }

    #[test]
    fn extraction_counters() {
        let stats = MigrationStats::new();
        stats.inc_pages_extracted();
        stats.inc_pages_extracted();
        stats.add_revisions_extracted(5);
        stats.add_revisions_extracted(3);
        assert_eq!(stats.extracted_pages(), 2);
        assert_eq!(stats.extracted_revisions(), 8);
    }

    #[test]
    fn export_counters() {
        let stats = MigrationStats::new();
        stats.inc_pages_exported();
        stats.add_revisions_exported(4);
        stats.inc_moves_replayed();
        stats.inc_moves_skipped();
        stats.inc_moves_skipped();
        stats.inc_redirect_pages();
        stats.add_anomalies(7);

        assert_eq!(stats.exported_pages(), 1);
        assert_eq!(stats.exported_revisions(), 4);
        assert_eq!(stats.moves(), 1);
        assert_eq!(stats.skipped_moves(), 2);
        assert_eq!(stats.redirects(), 1);
        assert_eq!(stats.anomaly_count(), 7);
    }
}
