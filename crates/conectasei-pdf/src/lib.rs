//! Document normalization for the downloader: upstream systems occasionally
//! serve a rendered HTML page in lieu of a PDF for a given document; this
//! module renders it to PDF via the browser engine's page-to-PDF
//! capability, and sanitizes filenames that are purely an 8-digit document
//! number.

use anyhow::{Context, Result};
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::Page;
use conectasei_types::validation::sanitize_filename_component;

/// Render the currently loaded page to PDF bytes using the browser
/// engine's print-to-PDF capability. Used when a document download turned
/// out to be HTML rather than a PDF.
pub async fn render_page_to_pdf(page: &Page) -> Result<Vec<u8>> {
    let params = PrintToPdfParams::builder()
        .print_background(true)
        .prefer_css_page_size(true)
        .build();
    let pdf = page
        .pdf(params)
        .await
        .context("failed to render page to PDF")?;
    Ok(pdf)
}

/// True when `name` (sans extension) is purely digits — i.e. the upstream
/// handed back a bare document number instead of a descriptive filename.
fn is_bare_document_number(stem: &str) -> bool {
    stem.len() == 8 && stem.chars().all(|c| c.is_ascii_digit())
}

/// Apply the downloader's rename rule: if the downloaded filename is
/// exactly an 8-digit document number, prepend the sanitized document
/// type so the object store key stays descriptive without changing the
/// canonical `{document_number}.pdf` suffix used for lookups.
pub fn normalize_download_filename(original_stem: &str, document_type: &str) -> String {
    if is_bare_document_number(original_stem) {
        let sanitized_type = sanitize_filename_component(document_type);
        if sanitized_type.is_empty() {
            original_stem.to_string()
        } else {
            format!("{sanitized_type}_{original_stem}")
        }
    } else {
        original_stem.to_string()
    }
}

/// True when a downloaded file's extension indicates the upstream served
/// rendered HTML instead of a PDF.
pub fn is_html_payload(extension: &str) -> bool {
    matches!(extension.to_ascii_lowercase().as_str(), "html" | "htm")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prepends_type_for_bare_document_number() {
        assert_eq!(
            normalize_download_filename("10000001", "Order"),
            "Order_10000001"
        );
    }

    #[test]
    fn leaves_descriptive_filenames_untouched() {
        assert_eq!(
            normalize_download_filename("Order-10000001", "Order"),
            "Order-10000001"
        );
    }

    #[test]
    fn sanitizes_reserved_characters_in_type() {
        assert_eq!(
            normalize_download_filename("20000001", "Order/Petition"),
            "Order_Petition_20000001"
        );
    }

    #[test]
    fn detects_html_payload_case_insensitively() {
        assert!(is_html_payload("HTML"));
        assert!(is_html_payload("htm"));
        assert!(!is_html_payload("pdf"));
    }
}
