//! twiki2mw: TWiki data web to MediaWiki XML migration
//!
//! This crate moves the content and full revision history of a TWiki web into a
//! MediaWiki `export-0.11` interchange document, in two passes:
//!
//! 1. **Extraction Pass** -- Read every topic file of a data web with its RCS
//!    `,v` history, check out each historical revision, parse the `%META%`
//!    declarations of every revision, and write the pages as JSON
//! 2. **Export Pass** -- Apply the page name table, flatten topic parents into
//!    subpage titles, rebuild the revision graph with sequential ids, replay
//!    topic moves as move + redirect revisions, and serialize the XML
//!
//! # Architecture
//!
//! - **Checkout over diffs** -- Revision texts come from `co`, never from
//!   applying RCS deltas; the [`checkout::Checkout`] trait lets tests inject texts
//! - **Explicit migration context** -- Revision and page ids are handed out by
//!   [`revisions::MigrationContext`] in emission order, gapless across a run
//! - **Anomalies, not errors** -- Irregular legacy data is logged as a
//!   [`validate::Anomaly`] and worked around; only I/O, tool and parameter
//!   failures abort a run
//!
//! # Key Modules
//!
//! - [`attrs`] -- `key="value"` attribute strings
//! - [`meta`] -- `%META:TAG{...}%` declarations
//! - [`rcs`] -- RCS `,v` file reader
//! - [`checkout`] -- Full-text revision retrieval (`co` or in-memory)
//! - [`history`] -- Per-page revision history extraction
//! - [`extract`] -- Data web discovery and the extraction pass
//! - [`validate`] -- Structural consistency checks
//! - [`rename`] -- Page name table
//! - [`subpages`] -- Parent chains to subpage titles
//! - [`index`] -- Claimed titles for collision checks
//! - [`revisions`] -- Revision graph reconstruction and move replay
//! - [`markup`] -- TWiki markup to wikitext
//! - [`export`] -- XML document writer and the export pass
//! - [`models`] -- Core data types
//! - [`stats`] -- Run counters
//! - [`config`] -- Constants
//!
//! # Example Usage
//!
//! ```bash
//! # Extract a data web into JSON
//! twiki2mw extract -i /var/lib/twiki/data/Main -o main.json
//!
//! # Export with a page name table
//! twiki2mw export -i main.json --site-name "Wiki" --db-name wiki \
//!     --base-url https://wiki.example.org/Main_Page --page-names names.csv -o main.xml
//! ```

pub mod attrs;
pub mod checkout;
pub mod config;
pub mod export;
pub mod extract;
pub mod history;
pub mod index;
pub mod markup;
pub mod meta;
pub mod models;
pub mod rcs;
pub mod rename;
pub mod revisions;
pub mod stats;
pub mod subpages;
pub mod timestamp;
pub mod validate;
