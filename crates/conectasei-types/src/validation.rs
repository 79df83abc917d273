//! Shared format validation for process and document numbers.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ConectaError;

/// `NNNNN.NNNNNN/YYYY-DD`
static PROCESS_NUMBER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}\.\d{6}/\d{4}-\d{2}$").expect("valid regex"));

/// 8 digits.
static DOCUMENT_NUMBER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d{8}$").expect("valid regex"));

pub fn validate_process_number(value: &str) -> Result<(), ConectaError> {
    if PROCESS_NUMBER_RE.is_match(value) {
        Ok(())
    } else {
        Err(ConectaError::InvalidProcessNumber(value.to_string()))
    }
}

pub fn validate_document_number(value: &str) -> Result<(), ConectaError> {
    if DOCUMENT_NUMBER_RE.is_match(value) {
        Ok(())
    } else {
        Err(ConectaError::InvalidDocumentNumber(value.to_string()))
    }
}

/// Strip characters that are reserved in common filesystems, used when a
/// document's original filename is just its number and the document type
/// needs to be prepended.
pub fn sanitize_filename_component(value: &str) -> String {
    value
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' => '_',
            other => other,
        })
        .collect::<String>()
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_well_formed_process_number() {
        assert!(validate_process_number("12345.001234/2024-56").is_ok());
    }

    #[test]
    fn rejects_malformed_process_number() {
        assert!(validate_process_number("12345.1234/2024-56").is_err());
    }

    #[test]
    fn accepts_eight_digit_document_number() {
        assert!(validate_document_number("10000001").is_ok());
    }

    #[test]
    fn rejects_short_document_number() {
        assert!(validate_document_number("123").is_err());
    }

    #[test]
    fn sanitizes_reserved_characters() {
        assert_eq!(sanitize_filename_component("Order/Type:1"), "Order_Type_1");
    }
}
