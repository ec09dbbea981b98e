use crate::models::Page;
use rustc_hash::FxHashSet;
use tracing::info;

/// Every title the export has claimed: live page titles plus the redirect
/// pages synthesized while replaying moves.
#[derive(Debug, Default)]
pub struct PageIndex {
    titles: FxHashSet<String>,
    redirects: usize,
}

impl PageIndex {
    pub fn build(pages: &[Page]) -> Self {
        let mut titles = FxHashSet::default();
        titles.reserve(pages.len());
        for page in pages {
            titles.insert(page.title.clone());
        }

        info!(pages = titles.len(), "Title index built");

        Self {
            titles,
            redirects: 0,
        }
    }

    /// True if `title` is taken, either by a page or by a redirect.
    pub fn contains(&self, title: &str) -> bool {
        self.titles.contains(title)
    }

    /// Claims `title` for a redirect page. Returns false if it was taken.
    pub fn claim_redirect(&mut self, title: impl Into<String>) -> bool {
        let claimed = self.titles.insert(title.into());
        if claimed {
            self.redirects += 1;
        }
        claimed
    }

    pub fn redirect_count(&self) -> usize {
        self.redirects
    }

    pub fn len(&self) -> usize {
        self.titles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.titles.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_collects_page_titles() {
        let mut renamed = Page::new("StagePlot", "", Default::default());
        renamed.rename("Stage/Plot");
        let index = PageIndex::build(&[Page::new("Sound", "", Default::default()), renamed]);
        assert!(index.contains("Sound"));
        assert!(index.contains("Stage/Plot"));
        assert!(!index.contains("StagePlot"));
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn redirects_count_as_taken_titles() {
        let mut index = PageIndex::build(&[Page::new("New", "", Default::default())]);
        assert!(!index.contains("Old"));
        assert!(index.claim_redirect("Old"));
        assert!(index.contains("Old"));
        assert_eq!(index.redirect_count(), 1);
    }

    #[test]
    fn taken_titles_cannot_be_claimed() {
        let mut index = PageIndex::build(&[Page::new("Lighting", "", Default::default())]);
        assert!(!index.claim_redirect("Lighting"));
        assert_eq!(index.redirect_count(), 0);
    }

    #[test]
    fn lookups_are_case_sensitive() {
        let index = PageIndex::build(&[Page::new("Lighting", "", Default::default())]);
        assert!(!index.contains("lighting"));
        assert!(PageIndex::default().is_empty());
    }
}
