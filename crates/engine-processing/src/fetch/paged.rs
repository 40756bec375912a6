use crate::{error::FetchError, retry::classify_remote_error};
use engine_core::{error::RemoteError, metrics::SyncMetrics, remote::timed, retry::RetryPolicy};
use futures::{Stream, TryStreamExt, stream};
use model::pagination::page::PageRequest;
use std::{
    future::Future,
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
};
use tracing::{debug, error};

/// Bounds of one paginated listing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FetchLimits {
    pub page_size: usize,
    pub start_offset: usize,
    pub max_records: Option<usize>,
}

impl FetchLimits {
    pub fn new(page_size: usize) -> Self {
        Self {
            page_size,
            start_offset: 0,
            max_records: None,
        }
    }

    pub fn starting_at(mut self, offset: usize) -> Self {
        self.start_offset = offset;
        self
    }

    pub fn at_most(mut self, max_records: Option<usize>) -> Self {
        self.max_records = max_records;
        self
    }
}

enum Progress {
    Next { page: PageRequest, fetched: usize },
    Invalid,
    Done,
}

/// Drains server-paginated listings page by page.
///
/// Each page gets its own retry budget, so a flaky page does not eat into
/// the attempts of the pages after it. A page that exhausts its budget ends
/// the listing with [`FetchError::PageFailed`]; pages already yielded stay
/// valid, and the listing can be resumed from the failed offset.
#[derive(Debug, Clone)]
pub struct PagedFetcher {
    retry: RetryPolicy,
    page_timeout: Duration,
    metrics: SyncMetrics,
}

impl PagedFetcher {
    pub fn new(retry: RetryPolicy, page_timeout: Duration, metrics: SyncMetrics) -> Self {
        Self {
            retry,
            page_timeout,
            metrics,
        }
    }

    /// Lazily yields one batch per page. Offsets advance by the page size,
    /// the sequence ends at the first short page or once `max_records` have
    /// been yielded, and an error is always the final item.
    pub fn pages<'a, T, F, Fut>(
        &'a self,
        limits: FetchLimits,
        op: F,
    ) -> impl Stream<Item = Result<Vec<T>, FetchError>> + 'a
    where
        T: 'a,
        F: Fn(PageRequest) -> Fut + 'a,
        Fut: Future<Output = Result<Vec<T>, RemoteError>> + 'a,
    {
        let initial = if limits.page_size == 0 {
            Progress::Invalid
        } else if limits.max_records == Some(0) {
            Progress::Done
        } else {
            Progress::Next {
                page: PageRequest::new(limits.page_size, limits.start_offset),
                fetched: 0,
            }
        };

        stream::unfold((op, initial), move |(op, progress)| async move {
            let (page, fetched) = match progress {
                Progress::Next { page, fetched } => (page, fetched),
                Progress::Invalid => {
                    return Some((Err(FetchError::InvalidPageSize), (op, Progress::Done)));
                }
                Progress::Done => return None,
            };

            match self.fetch_page(&op, page).await {
                Ok(mut records) => {
                    let mut done = page.is_last(records.len());
                    if let Some(max) = limits.max_records {
                        if fetched + records.len() >= max {
                            records.truncate(max - fetched);
                            done = true;
                        }
                    }
                    let next = if done {
                        Progress::Done
                    } else {
                        Progress::Next {
                            page: page.next(),
                            fetched: fetched + records.len(),
                        }
                    };
                    Some((Ok(records), (op, next)))
                }
                Err(err) => Some((Err(err), (op, Progress::Done))),
            }
        })
    }

    /// Concatenates every page of the listing in server order.
    pub async fn fetch_all<T, F, Fut>(&self, limits: FetchLimits, op: F) -> Result<Vec<T>, FetchError>
    where
        F: Fn(PageRequest) -> Fut,
        Fut: Future<Output = Result<Vec<T>, RemoteError>>,
    {
        self.pages(limits, op).try_concat().await
    }

    async fn fetch_page<T, F, Fut>(&self, op: &F, page: PageRequest) -> Result<Vec<T>, FetchError>
    where
        F: Fn(PageRequest) -> Fut,
        Fut: Future<Output = Result<Vec<T>, RemoteError>>,
    {
        let attempts = AtomicUsize::new(0);
        let attempts_ref = &attempts;
        let limit = self.page_timeout;

        let result = self
            .retry
            .run(
                move || {
                    attempts_ref.fetch_add(1, Ordering::Relaxed);
                    timed("list_page", limit, op(page))
                },
                classify_remote_error,
            )
            .await;

        let made = attempts.load(Ordering::Relaxed);
        if made > 1 {
            self.metrics.increment_page_retries((made - 1) as u64);
        }

        match result {
            Ok(records) => {
                self.metrics.record_page(records.len());
                debug!(
                    offset = page.offset,
                    limit = page.limit,
                    returned = records.len(),
                    attempts = made,
                    "Fetched page"
                );
                Ok(records)
            }
            Err(err) => {
                let attempts = err.attempts();
                let source = err.into_inner();
                error!(
                    offset = page.offset,
                    limit = page.limit,
                    attempts,
                    error = %source,
                    "Giving up on page"
                );
                Err(FetchError::PageFailed {
                    offset: page.offset,
                    attempts,
                    source,
                })
            }
        }
    }
}
