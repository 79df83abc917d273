//! Pure logic for picking which documents a download run targets, kept
//! free of I/O so it is unit-testable without a browser or database.

use std::collections::HashMap;

use conectasei_types::domain::{DocumentRecord, DocumentStatus, RequestedDocuments};

/// Resolve a [`RequestedDocuments`] selection against a process's current
/// document map. `All` means every document not already `downloaded`;
/// `Subset` is taken at face value except for documents already
/// `downloaded`, which are always skipped to preserve idempotence.
pub fn resolve_targets(
    requested: &RequestedDocuments,
    documents: &HashMap<String, DocumentRecord>,
) -> Vec<String> {
    match requested {
        RequestedDocuments::All => documents
            .iter()
            .filter(|(_, record)| record.status != DocumentStatus::Downloaded)
            .map(|(number, _)| number.clone())
            .collect(),
        RequestedDocuments::Subset(numbers) => numbers
            .iter()
            .filter(|number| {
                documents
                    .get(*number)
                    .map(|record| record.status != DocumentStatus::Downloaded)
                    .unwrap_or(true)
            })
            .cloned()
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn record(status: DocumentStatus) -> DocumentRecord {
        DocumentRecord {
            doc_type: "Order".to_string(),
            date: "01/01/2024".to_string(),
            status,
            last_checked: Utc::now(),
            signer: None,
        }
    }

    #[test]
    fn all_skips_already_downloaded() {
        let mut documents = HashMap::new();
        documents.insert("10000001".to_string(), record(DocumentStatus::NotDownloaded));
        documents.insert("10000002".to_string(), record(DocumentStatus::Downloaded));
        let mut targets = resolve_targets(&RequestedDocuments::All, &documents);
        targets.sort();
        assert_eq!(targets, vec!["10000001".to_string()]);
    }

    #[test]
    fn all_includes_errored_documents() {
        let mut documents = HashMap::new();
        documents.insert("10000001".to_string(), record(DocumentStatus::Error));
        let targets = resolve_targets(&RequestedDocuments::All, &documents);
        assert_eq!(targets, vec!["10000001".to_string()]);
    }

    #[test]
    fn subset_skips_downloaded_even_when_requested() {
        let mut documents = HashMap::new();
        documents.insert("10000001".to_string(), record(DocumentStatus::Downloaded));
        documents.insert("10000002".to_string(), record(DocumentStatus::NotDownloaded));
        let requested = RequestedDocuments::Subset(vec![
            "10000001".to_string(),
            "10000002".to_string(),
        ]);
        let targets = resolve_targets(&requested, &documents);
        assert_eq!(targets, vec!["10000002".to_string()]);
    }

    #[test]
    fn subset_passes_through_unknown_numbers() {
        let documents = HashMap::new();
        let requested = RequestedDocuments::Subset(vec!["10000003".to_string()]);
        let targets = resolve_targets(&requested, &documents);
        assert_eq!(targets, vec!["10000003".to_string()]);
    }
}
