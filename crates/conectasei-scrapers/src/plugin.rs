//! The capability interface every scraper plugin implements, plus the data
//! shapes exchanged with the extractor/downloader.
//!
//! Navigation operations (`login`, `list_processes`, `open_process`,
//! `download_document`) drive a live [`Page`]. Classification operations
//! (`classify_access`, `extract_authority`, `list_documents`) are pure
//! functions over the page's rendered HTML: the extractor captures
//! `page.content()` once per process (the "merged stage" contract — one
//! navigation, then as many pure reads of that one snapshot as needed) and
//! hands the markup to the plugin, which keeps the plugin logic unit
//! testable without a live browser.

use async_trait::async_trait;
use chromiumoxide::Page;
use conectasei_types::error::ConectaError;
use conectasei_utils::CancellationToken;
use std::path::PathBuf;
use std::time::Duration;

use crate::selectors::{DocumentSelectors, LoginSelectors, ProcessSelectors};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProcess {
    pub process_number: String,
    pub link_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredDocument {
    pub document_number: String,
    pub doc_type: String,
    pub date: String,
    pub signer: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageAccessType {
    Integral,
    Partial,
    Error,
}

impl From<PageAccessType> for conectasei_types::domain::AccessType {
    fn from(value: PageAccessType) -> Self {
        match value {
            PageAccessType::Integral => conectasei_types::domain::AccessType::Integral,
            PageAccessType::Partial => conectasei_types::domain::AccessType::Partial,
            PageAccessType::Error => conectasei_types::domain::AccessType::Error,
        }
    }
}

/// A file captured from a triggered download, living in a scoped temporary
/// directory the caller owns and cleans up.
#[derive(Debug)]
pub struct DownloadedFile {
    pub path: PathBuf,
    pub original_filename: String,
}

/// Universal capability interface. Every upstream-system version, however
/// different its markup, is reached through this one surface.
#[async_trait]
pub trait ScraperPlugin: Send + Sync {
    /// The `scraper_version` string this plugin instance answers to.
    fn version(&self) -> &str;

    fn login_selectors(&self) -> &LoginSelectors;
    fn process_selectors(&self) -> &ProcessSelectors;
    fn document_selectors(&self) -> &DocumentSelectors;

    /// Advisory only: used during tenant onboarding, never to pick a
    /// plugin at run time. Returns `None` when the page doesn't match any
    /// version fingerprint this plugin knows.
    fn detect_version(&self, html: &str) -> Option<String>;

    async fn login(&self, page: &Page, email: &str, password: &str) -> Result<(), ConectaError>;

    /// Enumerate the process listing page, yielding every
    /// `(process_number, link_id)` pair currently visible to the account.
    async fn list_processes(&self, page: &Page) -> Result<Vec<DiscoveredProcess>, ConectaError>;

    /// Navigate to a process view via `link_id` and wait until the
    /// document table is ready. One navigation per process — no second
    /// pass is permitted by the merged-stage contract. Bounded by
    /// `nav_timeout` and `cancel`, retried once on failure.
    async fn open_process(
        &self,
        page: &Page,
        link_id: &str,
        nav_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ConectaError>;

    fn classify_access(&self, html: &str) -> PageAccessType;

    fn extract_authority(&self, html: &str) -> String;

    fn list_documents(&self, html: &str) -> Vec<DiscoveredDocument>;

    /// Trigger one document's download, dismissing any dialog the action
    /// raises, and return the captured file.
    async fn download_document(
        &self,
        page: &Page,
        document_number: &str,
        scratch_dir: &std::path::Path,
    ) -> Result<DownloadedFile, ConectaError>;
}
