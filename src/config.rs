/// Progress update interval (tick every N pages)
pub const PROGRESS_INTERVAL: u64 = 50;

/// Topic that parents the whole web; children of it stay top-level pages
pub const DEFAULT_HOME_TOPIC: &str = "WebHome";

/// Title prefix of pages that live in the user namespace after renaming
pub const USER_NAMESPACE_PREFIX: &str = "User:";

/// Contributor credited with renames performed by the migration itself
pub const DEFAULT_MIGRATION_USER: &str = "TWiki_Migration";

/// RCS checkout binary
pub const DEFAULT_CHECKOUT_PROGRAM: &str = "co";

/// Extension of the page text files in a data web
pub const PAGE_EXTENSION: &str = "txt";

/// Suffix appended to a page file name to find its RCS history
pub const HISTORY_SUFFIX: &str = ",v";

/// Default namespace pages are exported into (main)
pub const DEFAULT_NAMESPACE: i32 = 0;

pub const EXPORT_SCHEMA_VERSION: &str = "0.11";
pub const EXPORT_XMLNS: &str = "http://www.mediawiki.org/xml/export-0.11/";
pub const EXPORT_SCHEMA_LOCATION: &str =
    "http://www.mediawiki.org/xml/export-0.11/ http://www.mediawiki.org/xml/export-0.11.xsd";
pub const XSI_NAMESPACE: &str = "http://www.w3.org/2001/XMLSchema-instance";

pub const GENERATOR_NAME: &str = "twiki2mw";
pub const GENERATOR_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const CASE_POLICY: &str = "first-letter";
pub const CONTENT_MODEL: &str = "wikitext";
pub const CONTENT_FORMAT: &str = "text/x-wiki";
