//! Pure, synchronous decision logic for folding one run's link visits into
//! an existing (or brand new) [`Process`]. Kept free of I/O so the access
//! policy and link-selection tie-breaks are unit-testable without a
//! browser or database.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use conectasei_scrapers::DiscoveredDocument;
use conectasei_types::domain::{
    AccessType, CategoryStatus, DocumentRecord, DocumentStatus, LinkRecord, LinkStatus,
};

/// The outcome of navigating to one candidate link this run. The page
/// snapshot used for classification is kept by the caller (keyed by link
/// id) so it can be reused for document listing without a second
/// navigation.
pub enum LinkVisitOutcome {
    Reached { access_type: AccessType },
    /// Navigation itself failed (timeout, unreachable, retried once).
    Errored,
}

fn access_rank(access_type: AccessType) -> u8 {
    match access_type {
        AccessType::Integral => 2,
        AccessType::Partial => 1,
        AccessType::Error => 0,
    }
}

/// Apply this run's visit outcome to a link's stored record, creating the
/// record if this is the first time the link has been seen.
pub fn record_link_visit(
    links: &mut HashMap<String, LinkRecord>,
    link_id: &str,
    outcome: &LinkVisitOutcome,
    at: DateTime<Utc>,
) {
    let record = links.entry(link_id.to_string()).or_insert_with(|| LinkRecord {
        status: LinkStatus::Inactive,
        access_type: AccessType::Error,
        last_checked: at,
        history: Vec::new(),
    });
    match outcome {
        LinkVisitOutcome::Reached { access_type } => {
            record.record_check(LinkStatus::Active, *access_type, at);
        }
        LinkVisitOutcome::Errored => {
            record.record_check(LinkStatus::Inactive, AccessType::Error, at);
        }
    }
}

/// The link chosen to drive this run's category/document decisions: the
/// active link with the best access level, ties broken by most recent
/// successful check, further ties broken lexicographically by link id.
/// `access_type` takes precedence over recency — a same-run `integral`
/// link always outranks a `partial` one, however recently each was
/// checked (see scenario 2 in the extraction walkthrough).
pub fn select_best_link<'a>(links: &'a HashMap<String, LinkRecord>) -> Option<(&'a str, &'a LinkRecord)> {
    links
        .iter()
        .filter(|(_, record)| record.status == LinkStatus::Active)
        .max_by(|(id_a, a), (id_b, b)| {
            access_rank(a.access_type)
                .cmp(&access_rank(b.access_type))
                .then_with(|| a.last_checked.cmp(&b.last_checked))
                .then_with(|| id_a.cmp(id_b))
        })
        .map(|(id, record)| (id.as_str(), record))
}

/// The category-side effects of the chosen link's access level. Computed
/// purely from the *current* best link plus the process's prior category
/// state; never from individual, possibly-stale link visits.
pub struct AccessDecision {
    pub access_type: AccessType,
    pub category: Option<String>,
    pub category_status: CategoryStatus,
    pub proceed_with_documents: bool,
}

pub fn decide_access(
    best_access: AccessType,
    existing_category: &Option<String>,
    existing_category_status: CategoryStatus,
) -> AccessDecision {
    match best_access {
        AccessType::Integral => AccessDecision {
            access_type: AccessType::Integral,
            category: Some("restricted".to_string()),
            category_status: CategoryStatus::Categorized,
            proceed_with_documents: true,
        },
        AccessType::Partial => {
            if existing_category_status != CategoryStatus::Categorized {
                AccessDecision {
                    access_type: AccessType::Partial,
                    category: existing_category.clone(),
                    category_status: CategoryStatus::Pending,
                    proceed_with_documents: false,
                }
            } else if existing_category.as_deref() == Some("restricted") {
                AccessDecision {
                    access_type: AccessType::Partial,
                    category: existing_category.clone(),
                    category_status: CategoryStatus::Categorized,
                    proceed_with_documents: true,
                }
            } else {
                AccessDecision {
                    access_type: AccessType::Partial,
                    category: existing_category.clone(),
                    category_status: CategoryStatus::Categorized,
                    proceed_with_documents: false,
                }
            }
        }
        AccessType::Error => AccessDecision {
            access_type: AccessType::Error,
            category: existing_category.clone(),
            category_status: existing_category_status,
            proceed_with_documents: false,
        },
    }
}

/// `document_number`s newly discovered or previously recorded in error —
/// these count toward the run's `new_documents` summary.
pub fn compute_new_documents(
    discovered: &[DiscoveredDocument],
    existing: &HashMap<String, DocumentRecord>,
) -> Vec<String> {
    discovered
        .iter()
        .filter(|doc| {
            !existing
                .get(&doc.document_number)
                .is_some_and(|record| record.status != DocumentStatus::Error)
        })
        .map(|doc| doc.document_number.clone())
        .collect()
}

/// Merge freshly listed documents into the existing map, preserving any
/// `downloaded`/`partial` status a prior download already recorded.
pub fn merge_documents(
    discovered: Vec<DiscoveredDocument>,
    existing: &mut HashMap<String, DocumentRecord>,
    at: DateTime<Utc>,
) {
    for doc in discovered {
        existing
            .entry(doc.document_number.clone())
            .and_modify(|record| {
                record.doc_type = doc.doc_type.clone();
                record.date = doc.date.clone();
                record.signer = doc.signer.clone();
                record.last_checked = at;
            })
            .or_insert_with(|| DocumentRecord {
                doc_type: doc.doc_type,
                date: doc.date,
                status: DocumentStatus::NotDownloaded,
                last_checked: at,
                signer: doc.signer,
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn link(status: LinkStatus, access_type: AccessType, last_checked: DateTime<Utc>) -> LinkRecord {
        LinkRecord {
            status,
            access_type,
            last_checked,
            history: Vec::new(),
        }
    }

    #[test]
    fn selects_integral_over_more_recent_partial() {
        let now = Utc::now();
        let mut links = HashMap::new();
        links.insert(
            "ABC".to_string(),
            link(LinkStatus::Active, AccessType::Partial, now),
        );
        links.insert(
            "DEF".to_string(),
            link(LinkStatus::Active, AccessType::Integral, now - chrono::Duration::hours(1)),
        );
        let (best_id, best) = select_best_link(&links).expect("a link is chosen");
        assert_eq!(best_id, "DEF");
        assert_eq!(best.access_type, AccessType::Integral);
    }

    #[test]
    fn ignores_inactive_links() {
        let now = Utc::now();
        let mut links = HashMap::new();
        links.insert(
            "ABC".to_string(),
            link(LinkStatus::Inactive, AccessType::Integral, now),
        );
        assert!(select_best_link(&links).is_none());
    }

    #[test]
    fn breaks_ties_lexicographically() {
        let now = Utc::now();
        let mut links = HashMap::new();
        links.insert("DEF".to_string(), link(LinkStatus::Active, AccessType::Integral, now));
        links.insert("ABC".to_string(), link(LinkStatus::Active, AccessType::Integral, now));
        let (best_id, _) = select_best_link(&links).expect("a link is chosen");
        assert_eq!(best_id, "DEF");
    }

    #[test]
    fn integral_access_categorizes_as_restricted() {
        let decision = decide_access(AccessType::Integral, &None, CategoryStatus::Pending);
        assert_eq!(decision.category.as_deref(), Some("restricted"));
        assert_eq!(decision.category_status, CategoryStatus::Categorized);
        assert!(decision.proceed_with_documents);
    }

    #[test]
    fn partial_access_on_unseen_process_goes_pending() {
        let decision = decide_access(AccessType::Partial, &None, CategoryStatus::Pending);
        assert_eq!(decision.category_status, CategoryStatus::Pending);
        assert!(!decision.proceed_with_documents);
    }

    #[test]
    fn partial_access_already_categorized_restricted_proceeds() {
        let decision = decide_access(
            AccessType::Partial,
            &Some("restricted".to_string()),
            CategoryStatus::Categorized,
        );
        assert!(decision.proceed_with_documents);
    }

    #[test]
    fn partial_access_categorized_other_than_restricted_skips() {
        let decision = decide_access(
            AccessType::Partial,
            &Some("general".to_string()),
            CategoryStatus::Categorized,
        );
        assert!(!decision.proceed_with_documents);
    }

    #[test]
    fn new_documents_include_those_previously_errored() {
        let mut existing = HashMap::new();
        existing.insert(
            "10000001".to_string(),
            DocumentRecord {
                doc_type: "Order".to_string(),
                date: "01/01/2024".to_string(),
                status: DocumentStatus::Error,
                last_checked: Utc::now(),
                signer: None,
            },
        );
        let discovered = vec![DiscoveredDocument {
            document_number: "10000001".to_string(),
            doc_type: "Order".to_string(),
            date: "01/01/2024".to_string(),
            signer: None,
        }];
        let new_docs = compute_new_documents(&discovered, &existing);
        assert_eq!(new_docs, vec!["10000001".to_string()]);
    }
}
