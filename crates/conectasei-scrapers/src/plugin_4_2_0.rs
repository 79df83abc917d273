//! Version `4.2.0` plugin: composes the v4 family default and overrides only
//! the one behavior that release actually changed — access classification
//! moved from a banner element's text to a `data-acesso` attribute on the
//! process header.

use async_trait::async_trait;
use chromiumoxide::Page;
use conectasei_types::error::ConectaError;
use conectasei_utils::CancellationToken;
use scraper::Html;
use std::time::Duration;

use crate::family_v4::V4FamilyScraper;
use crate::plugin::{DiscoveredDocument, DiscoveredProcess, DownloadedFile, PageAccessType, ScraperPlugin};
use crate::selectors::{DocumentSelectors, LoginSelectors, ProcessSelectors};

#[derive(Debug, Clone, Default)]
pub struct Sei420Scraper {
    pub family: V4FamilyScraper,
}

#[async_trait]
impl ScraperPlugin for Sei420Scraper {
    fn version(&self) -> &str {
        "4.2.0"
    }

    fn login_selectors(&self) -> &LoginSelectors {
        self.family.login_selectors()
    }

    fn process_selectors(&self) -> &ProcessSelectors {
        self.family.process_selectors()
    }

    fn document_selectors(&self) -> &DocumentSelectors {
        self.family.document_selectors()
    }

    fn detect_version(&self, html: &str) -> Option<String> {
        let document = Html::parse_document(html);
        let selector = scraper::Selector::parse("[data-acesso]").ok()?;
        document
            .select(&selector)
            .next()
            .map(|_| "4.2.0".to_string())
    }

    async fn login(&self, page: &Page, email: &str, password: &str) -> Result<(), ConectaError> {
        self.family.login(page, email, password).await
    }

    async fn list_processes(&self, page: &Page) -> Result<Vec<DiscoveredProcess>, ConectaError> {
        self.family.list_processes(page).await
    }

    async fn open_process(
        &self,
        page: &Page,
        link_id: &str,
        nav_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ConectaError> {
        self.family.open_process(page, link_id, nav_timeout, cancel).await
    }

    /// 4.2.0 moved the access marker from `.acesso-restrito-banner` text to
    /// a `data-acesso` attribute on the process header; read that instead.
    fn classify_access(&self, html: &str) -> PageAccessType {
        let document = Html::parse_document(html);
        let Ok(header_selector) = scraper::Selector::parse("[data-acesso]") else {
            return self.family.classify_access(html);
        };
        match document
            .select(&header_selector)
            .next()
            .and_then(|el| el.value().attr("data-acesso"))
        {
            Some("restrito") => PageAccessType::Partial,
            Some("erro") => PageAccessType::Error,
            Some(_) => PageAccessType::Integral,
            None => self.family.classify_access(html),
        }
    }

    fn extract_authority(&self, html: &str) -> String {
        self.family.extract_authority(html)
    }

    fn list_documents(&self, html: &str) -> Vec<DiscoveredDocument> {
        self.family.list_documents(html)
    }

    async fn download_document(
        &self,
        page: &Page,
        document_number: &str,
        scratch_dir: &std::path::Path,
    ) -> Result<DownloadedFile, ConectaError> {
        self.family
            .download_document(page, document_number, scratch_dir)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_access_from_data_attribute() {
        let scraper = Sei420Scraper::default();
        let html = r#"<html><body><div data-acesso="restrito"></div></body></html>"#;
        assert!(matches!(scraper.classify_access(html), PageAccessType::Partial));
    }

    #[test]
    fn falls_back_to_family_classification_without_attribute() {
        let scraper = Sei420Scraper::default();
        let html = r#"<html><body><div class="acesso-restrito-banner">Acesso Restrito</div></body></html>"#;
        assert!(matches!(scraper.classify_access(html), PageAccessType::Partial));
    }

    #[test]
    fn version_string_is_4_2_0() {
        let scraper = Sei420Scraper::default();
        assert_eq!(scraper.version(), "4.2.0");
    }
}
