use gdrive_core::DriveFile;
use thiserror::Error;
use tracing::{info, warn};

use super::drive::{DriveService, ServiceError};
use super::records::DriveItem;
use super::retry::RetryPolicy;

/// What to do once a page keeps failing with retryable errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExhaustedRetries {
    /// Stop paginating and hand back what was collected, flagged as truncated.
    ReturnPartial,
    Fail,
}

#[derive(Debug, Clone)]
pub struct ListingPolicy {
    pub page_size: u32,
    pub retry: RetryPolicy,
    pub on_exhausted: ExhaustedRetries,
}

impl Default for ListingPolicy {
    fn default() -> Self {
        Self {
            page_size: 100,
            retry: RetryPolicy::default(),
            on_exhausted: ExhaustedRetries::ReturnPartial,
        }
    }
}

#[derive(Debug, Error)]
pub enum ListError {
    #[error("listing children of {parent_id} failed on page {page}: {source}")]
    Fatal {
        parent_id: String,
        page: u32,
        #[source]
        source: ServiceError,
    },
    #[error("listing children of {parent_id} gave up on page {page} after {attempts} attempts: {source}")]
    Exhausted {
        parent_id: String,
        page: u32,
        attempts: u32,
        #[source]
        source: ServiceError,
    },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Listing {
    pub items: Vec<DriveItem>,
    /// Pagination stopped early; `items` is only a prefix of the folder.
    pub truncated: bool,
}

enum PageOutcome {
    More { files: Vec<DriveFile>, token: String },
    Last { files: Vec<DriveFile> },
    Recoverable(ServiceError),
    Fatal(ServiceError),
}

async fn fetch_page<D>(
    drive: &mut D,
    parent_id: &str,
    page_token: Option<&str>,
    page_size: u32,
) -> PageOutcome
where
    D: DriveService,
{
    match drive.list_page(parent_id, page_token, page_size).await {
        Ok(page) => match page.next_page_token.filter(|token| !token.is_empty()) {
            Some(token) => PageOutcome::More {
                files: page.files,
                token,
            },
            None => PageOutcome::Last { files: page.files },
        },
        Err(err) if err.is_retryable() => PageOutcome::Recoverable(err),
        Err(err) => PageOutcome::Fatal(err),
    }
}

/// Lists the immediate children of `parent_id`, following continuation
/// tokens until the last page. Trashed entries are dropped unless
/// `include_trashed` is set; entries without an id or name are dropped with a
/// warning.
pub async fn list_children<D>(
    drive: &mut D,
    parent_id: &str,
    include_trashed: bool,
    policy: &ListingPolicy,
) -> Result<Listing, ListError>
where
    D: DriveService,
{
    let mut listing = Listing::default();
    let mut page_token: Option<String> = None;
    let mut page = 1u32;

    loop {
        info!("Requesting page #{page} of folder {parent_id}...");
        let mut attempt = 0u32;
        let outcome = loop {
            match fetch_page(drive, parent_id, page_token.as_deref(), policy.page_size).await {
                PageOutcome::Recoverable(err) if policy.retry.allows_retry(attempt) => {
                    let delay = policy.retry.delay_for_retry(attempt);
                    attempt += 1;
                    warn!(
                        "page #{page} of folder {parent_id} failed (attempt {attempt}/{}), retrying in {}ms: {err}",
                        policy.retry.attempts(),
                        delay.as_millis()
                    );
                    tokio::time::sleep(delay).await;
                }
                outcome => break outcome,
            }
        };

        match outcome {
            PageOutcome::More { files, token } => {
                collect(&mut listing.items, files, include_trashed);
                page_token = Some(token);
                page += 1;
            }
            PageOutcome::Last { files } => {
                collect(&mut listing.items, files, include_trashed);
                return Ok(listing);
            }
            PageOutcome::Recoverable(source) => match policy.on_exhausted {
                ExhaustedRetries::ReturnPartial => {
                    warn!(
                        "giving up on folder {parent_id} at page #{page}; continuing with {} entries: {source}",
                        listing.items.len()
                    );
                    listing.truncated = true;
                    return Ok(listing);
                }
                ExhaustedRetries::Fail => {
                    return Err(ListError::Exhausted {
                        parent_id: parent_id.to_string(),
                        page,
                        attempts: attempt + 1,
                        source,
                    });
                }
            },
            PageOutcome::Fatal(source) => {
                return Err(ListError::Fatal {
                    parent_id: parent_id.to_string(),
                    page,
                    source,
                });
            }
        }
    }
}

fn collect(items: &mut Vec<DriveItem>, files: Vec<DriveFile>, include_trashed: bool) {
    for file in files {
        match DriveItem::try_from(file) {
            Ok(item) if include_trashed || !item.trashed => items.push(item),
            Ok(_) => {}
            Err(err) => warn!("skipping malformed drive entry: {err}"),
        }
    }
}

#[cfg(test)]
#[path = "lister_tests.rs"]
mod tests;
