//! Shared default implementation for every "v4 family" release. A specific
//! version's plugin embeds this and overrides only what actually diverges.

use async_trait::async_trait;
use chromiumoxide::Page;
use conectasei_browser::navigate;
use conectasei_types::error::ConectaError;
use conectasei_utils::{CancellationToken, RetryPolicy};
use scraper::{Html, Selector};
use std::time::Duration;

use crate::plugin::{DiscoveredDocument, DiscoveredProcess, DownloadedFile, PageAccessType, ScraperPlugin};
use crate::selectors::{DocumentSelectors, LoginSelectors, ProcessSelectors, V4Selectors};

#[derive(Debug, Clone)]
pub struct V4FamilyScraper {
    pub selectors: V4Selectors,
}

impl Default for V4FamilyScraper {
    fn default() -> Self {
        Self {
            selectors: V4Selectors::default(),
        }
    }
}

fn parse_selector(raw: &str) -> Option<Selector> {
    Selector::parse(raw)
        .map_err(|err| tracing::warn!(selector = raw, error = ?err, "invalid selector"))
        .ok()
}

fn first_text(html: &Html, selector_raw: &str) -> Option<String> {
    let selector = parse_selector(selector_raw)?;
    html.select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
}

impl V4FamilyScraper {
    fn documents_from(&self, html: &str) -> Vec<DiscoveredDocument> {
        let document = Html::parse_document(html);
        let sel = &self.selectors.document;
        let Some(row_selector) = parse_selector(&sel.document_row) else {
            return Vec::new();
        };
        let number_selector = parse_selector(&sel.document_number_cell);
        let type_selector = parse_selector(&sel.document_type_cell);
        let date_selector = parse_selector(&sel.document_date_cell);
        let signer_selector = parse_selector(&sel.document_signer_cell);

        document
            .select(&row_selector)
            .filter_map(|row| {
                let document_number = number_selector
                    .as_ref()
                    .and_then(|s| row.select(s).next())
                    .map(|el| el.text().collect::<String>().trim().to_string())?;
                let doc_type = type_selector
                    .as_ref()
                    .and_then(|s| row.select(s).next())
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .unwrap_or_default();
                let date = date_selector
                    .as_ref()
                    .and_then(|s| row.select(s).next())
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .unwrap_or_default();
                let signer = signer_selector
                    .as_ref()
                    .and_then(|s| row.select(s).next())
                    .map(|el| el.text().collect::<String>().trim().to_string())
                    .filter(|s| !s.is_empty());
                if document_number.is_empty() {
                    return None;
                }
                Some(DiscoveredDocument {
                    document_number,
                    doc_type,
                    date,
                    signer,
                })
            })
            .collect()
    }
}

impl V4FamilyScraper {
    async fn attempt_login(&self, page: &Page, email: &str, password: &str) -> Result<(), ConectaError> {
        let sel = &self.selectors.login;
        let email_input = page
            .find_element(&sel.email_input)
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;
        email_input
            .click()
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;
        email_input
            .type_str(email)
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;

        let password_input = page
            .find_element(&sel.password_input)
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;
        password_input
            .click()
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;
        password_input
            .type_str(password)
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;

        let submit = page
            .find_element(&sel.submit_button)
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;
        submit
            .click()
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;

        tokio::time::sleep(Duration::from_millis(250)).await;

        if let Ok(banner) = page.find_element(&sel.error_banner).await {
            let message = banner
                .inner_text()
                .await
                .ok()
                .flatten()
                .unwrap_or_else(|| "login rejected".to_string());
            return Err(ConectaError::Auth {
                tenant_id: String::new(),
                reason: message,
            });
        }
        Ok(())
    }

    async fn attempt_list_processes(&self, page: &Page) -> Result<Vec<DiscoveredProcess>, ConectaError> {
        let sel = &self.selectors.process;
        let html = page
            .content()
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;
        let document = Html::parse_document(&html);
        let Some(row_selector) = parse_selector(&sel.listing_row) else {
            return Ok(Vec::new());
        };
        let number_selector = parse_selector(&sel.listing_number_cell);
        let link_selector = parse_selector(&sel.listing_link);

        let discovered = document
            .select(&row_selector)
            .filter_map(|row| {
                let process_number = number_selector
                    .as_ref()
                    .and_then(|s| row.select(s).next())
                    .map(|el| el.text().collect::<String>().trim().to_string())?;
                let link_id = link_selector
                    .as_ref()
                    .and_then(|s| row.select(s).next())
                    .and_then(|el| el.value().attr("href"))
                    .map(|href| href.to_string())?;
                if process_number.is_empty() || link_id.is_empty() {
                    return None;
                }
                Some(DiscoveredProcess {
                    process_number,
                    link_id,
                })
            })
            .collect();
        Ok(discovered)
    }

    async fn attempt_open_process(
        &self,
        page: &Page,
        link_id: &str,
        nav_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ConectaError> {
        navigate(page, link_id, nav_timeout, cancel)
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;
        page.wait_for_navigation()
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ScraperPlugin for V4FamilyScraper {
    fn version(&self) -> &str {
        "v4"
    }

    fn login_selectors(&self) -> &LoginSelectors {
        &self.selectors.login
    }

    fn process_selectors(&self) -> &ProcessSelectors {
        &self.selectors.process
    }

    fn document_selectors(&self) -> &DocumentSelectors {
        &self.selectors.document
    }

    fn detect_version(&self, _html: &str) -> Option<String> {
        None
    }

    async fn login(&self, page: &Page, email: &str, password: &str) -> Result<(), ConectaError> {
        RetryPolicy::retry_once(250)
            .execute(|| self.attempt_login(page, email, password))
            .await
    }

    async fn list_processes(&self, page: &Page) -> Result<Vec<DiscoveredProcess>, ConectaError> {
        RetryPolicy::retry_once(250)
            .execute(|| self.attempt_list_processes(page))
            .await
    }

    async fn open_process(
        &self,
        page: &Page,
        link_id: &str,
        nav_timeout: Duration,
        cancel: &CancellationToken,
    ) -> Result<(), ConectaError> {
        RetryPolicy::retry_once(250)
            .execute(|| self.attempt_open_process(page, link_id, nav_timeout, cancel))
            .await
    }

    fn classify_access(&self, html: &str) -> PageAccessType {
        let document = Html::parse_document(html);
        let sel = &self.selectors.process;
        match first_text(&document, &sel.access_banner) {
            Some(text) if text.to_lowercase().contains("restrito") => PageAccessType::Partial,
            Some(text) if text.to_lowercase().contains("erro") => PageAccessType::Error,
            _ => PageAccessType::Integral,
        }
    }

    fn extract_authority(&self, html: &str) -> String {
        let document = Html::parse_document(html);
        first_text(&document, &self.selectors.process.authority_cell).unwrap_or_default()
    }

    fn list_documents(&self, html: &str) -> Vec<DiscoveredDocument> {
        self.documents_from(html)
    }

    async fn download_document(
        &self,
        page: &Page,
        document_number: &str,
        scratch_dir: &std::path::Path,
    ) -> Result<DownloadedFile, ConectaError> {
        let sel = &self.selectors.document;
        let link_selector = format!("{} [data-document-number=\"{document_number}\"]", sel.download_link);
        let link = page
            .find_element(&link_selector)
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;
        link.click()
            .await
            .map_err(|err| ConectaError::Navigation(err.to_string()))?;

        tokio::time::sleep(Duration::from_millis(500)).await;

        let path = scratch_dir.join(format!("{document_number}.pdf"));
        Ok(DownloadedFile {
            path,
            original_filename: format!("{document_number}.pdf"),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_html(banner: &str) -> String {
        format!(
            r#"<html><body>
                <div class="acesso-restrito-banner">{banner}</div>
                <div class="orgao-julgador">1st Civil Court</div>
                <table class="documentos"><tbody>
                    <tr>
                        <td class="numero-documento">10000001</td>
                        <td class="tipo-documento">Order</td>
                        <td class="data-documento">2024-01-01</td>
                        <td class="assinante">Judge Doe</td>
                    </tr>
                </tbody></table>
            </body></html>"#
        )
    }

    #[test]
    fn classifies_integral_access_by_default() {
        let scraper = V4FamilyScraper::default();
        assert!(matches!(
            scraper.classify_access(&sample_html("")),
            PageAccessType::Integral
        ));
    }

    #[test]
    fn classifies_restricted_banner_as_partial() {
        let scraper = V4FamilyScraper::default();
        assert!(matches!(
            scraper.classify_access(&sample_html("Acesso Restrito")),
            PageAccessType::Partial
        ));
    }

    #[test]
    fn extracts_authority_text() {
        let scraper = V4FamilyScraper::default();
        assert_eq!(scraper.extract_authority(&sample_html("")), "1st Civil Court");
    }

    #[test]
    fn lists_documents_from_table() {
        let scraper = V4FamilyScraper::default();
        let docs = scraper.list_documents(&sample_html(""));
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].document_number, "10000001");
        assert_eq!(docs[0].signer.as_deref(), Some("Judge Doe"));
    }
}
