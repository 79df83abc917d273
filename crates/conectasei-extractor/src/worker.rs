//! Phase B: one spawned task per distinct process number, bounded by a
//! semaphore. A process with more than one candidate link (the same
//! process listed twice under different access links) visits every one
//! of its links from a single owned session before choosing the best,
//! rather than racing independent per-link workers against the same
//! process row — see the grounding ledger for why.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use conectasei_browser::BrowserPool;
use conectasei_scrapers::{DiscoveredProcess, ScraperPlugin};
use conectasei_types::domain::{CategoryStatus, Process, Tenant};
use conectasei_types::ports::{NewDocumentNotice, PendingCategorization};
use conectasei_types::validation::validate_document_number;
use conectasei_utils::CancellationToken;
use tracing::warn;

use crate::merge::{
    compute_new_documents, decide_access, merge_documents, record_link_visit, select_best_link,
    LinkVisitOutcome,
};

pub struct NotifyBundle {
    pub pending_categorization: Option<PendingCategorization>,
    pub new_documents: Vec<NewDocumentNotice>,
}

pub enum ProcessOutcome {
    Upserted {
        process: Process,
        is_new: bool,
        new_document_count: usize,
        notify: NotifyBundle,
    },
    Failed {
        process_number: String,
        reason: String,
    },
}

#[allow(clippy::too_many_arguments)]
pub async fn process_one(
    pool: Arc<BrowserPool>,
    plugin: Arc<dyn ScraperPlugin>,
    tenant: Tenant,
    email: String,
    password: String,
    process_number: String,
    links: Vec<DiscoveredProcess>,
    existing: Option<Process>,
    cancel: CancellationToken,
) -> ProcessOutcome {
    let is_new = existing.is_none();
    let mut process =
        existing.unwrap_or_else(|| Process::new(tenant.id.clone(), process_number.clone()));

    let login_plugin = plugin.clone();
    let session = match pool
        .acquire(&tenant.upstream_url, &cancel, move |page| async move {
            login_plugin.login(&page, &email, &password).await?;
            Ok(page)
        })
        .await
    {
        Ok(session) => session,
        Err(err) => {
            return ProcessOutcome::Failed {
                process_number,
                reason: format!("browser session unavailable: {err}"),
            }
        }
    };

    let mut htmls: HashMap<String, String> = HashMap::new();
    for link in &links {
        if cancel.is_cancelled() {
            break;
        }
        let outcome = match plugin
            .open_process(session.page(), &link.link_id, pool.nav_timeout(), &cancel)
            .await
        {
            Ok(()) => match session.page().content().await {
                Ok(html) => {
                    let access = plugin.classify_access(&html);
                    htmls.insert(link.link_id.clone(), html);
                    LinkVisitOutcome::Reached {
                        access_type: access.into(),
                    }
                }
                Err(err) => {
                    warn!(process_number = %process_number, link_id = %link.link_id, error = %err, "failed to capture page content");
                    LinkVisitOutcome::Errored
                }
            },
            Err(err) => {
                warn!(process_number = %process_number, link_id = %link.link_id, error = %err, "navigation failed");
                LinkVisitOutcome::Errored
            }
        };
        record_link_visit(&mut process.links, &link.link_id, &outcome, Utc::now());
    }
    pool.release(session).await;

    let best = select_best_link(&process.links).map(|(id, record)| (id.to_string(), record.access_type));

    let mut notify = NotifyBundle {
        pending_categorization: None,
        new_documents: Vec::new(),
    };
    let mut new_document_count = 0usize;

    match best {
        Some((link_id, access_type)) => {
            process.best_current_link = Some(link_id.clone());
            process.no_valid_links = false;

            let decision = decide_access(access_type, &process.category, process.category_status);
            process.access_type = decision.access_type;
            process.category = decision.category;
            process.category_status = decision.category_status;

            if decision.proceed_with_documents {
                if let Some(html) = htmls.get(&link_id) {
                    if process.authority.is_empty() {
                        process.authority = plugin.extract_authority(html);
                    }
                    let discovered_docs: Vec<_> = plugin
                        .list_documents(html)
                        .into_iter()
                        .filter(|doc| match validate_document_number(&doc.document_number) {
                            Ok(()) => true,
                            Err(err) => {
                                warn!(process_number = %process_number, document_number = %doc.document_number, error = %err, "dropping malformed document number");
                                false
                            }
                        })
                        .collect();
                    let new_numbers = compute_new_documents(&discovered_docs, &process.documents);
                    merge_documents(discovered_docs, &mut process.documents, Utc::now());
                    new_document_count = new_numbers.len();
                    for number in new_numbers {
                        if let Some(record) = process.documents.get(&number) {
                            notify.new_documents.push(NewDocumentNotice {
                                process_number: process_number.clone(),
                                document_number: number,
                                record: record.clone(),
                            });
                        }
                    }
                }
            }

            if process.category_status == CategoryStatus::Pending {
                notify.pending_categorization = Some(PendingCategorization {
                    tenant_id: tenant.id.clone(),
                    process_number: process_number.clone(),
                });
            }
        }
        None => {
            process.no_valid_links = true;
            process.best_current_link = None;
        }
    }

    process.last_updated = Utc::now();
    process.updated_at = Utc::now();

    ProcessOutcome::Upserted {
        process,
        is_new,
        new_document_count,
        notify,
    }
}
