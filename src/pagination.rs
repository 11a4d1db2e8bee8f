//! Draining of cursor/count/total paginated APIs.
//!
//! The server's own `{cursor, count, total}` triple is the only source of
//! truth: page sizes are not assumed uniform. The loop is strictly
//! sequential because page N+1's cursor comes from page N's response.

use crate::error::{HarvestError, Result};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Pagination metadata reported by the server for one page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PageWindow {
    /// Offset of the first item in this page
    pub cursor: u64,
    /// Number of items the server says this page holds
    pub count: u64,
    /// Total number of items in the collection
    pub total: u64,
}

impl PageWindow {
    /// Cursor of the page after this one, saturating at `u64::MAX`.
    pub fn next_cursor(&self) -> u64 {
        self.cursor.saturating_add(self.count)
    }

    /// True once this page reaches the declared total.
    pub fn is_last(&self) -> bool {
        self.next_cursor() >= self.total
    }
}

/// One page of items plus its window.
#[derive(Debug, Clone)]
pub struct Page<T> {
    /// Server-reported position of this page
    pub window: PageWindow,
    /// Items carried by this page
    pub items: Vec<T>,
}

/// A remote collection that can be read one page at a time.
pub trait PageSource {
    type Item;

    /// Fetch the page starting at `cursor`.
    fn fetch_page(&self, cursor: u64) -> impl Future<Output = Result<Page<Self::Item>>> + Send;
}

/// Fetch every page from `start` until the declared total is consumed.
///
/// `delay` is slept between consecutive requests, not after the last one.
pub async fn drain<S: PageSource>(source: &S, start: u64, delay: Duration) -> Result<Vec<S::Item>> {
    let mut collected: Vec<S::Item> = Vec::new();
    let mut cursor = start;

    loop {
        let page = source.fetch_page(cursor).await?;
        let window = page.window;
        debug!(
            cursor = window.cursor,
            count = window.count,
            total = window.total,
            "Fetched page"
        );

        if window.total == 0 {
            break;
        }

        if !window.is_last() && window.next_cursor() <= cursor {
            return Err(HarvestError::StalledPagination {
                cursor,
                total: window.total,
            });
        }

        if page.items.len() as u64 != window.count {
            warn!(
                cursor = window.cursor,
                declared = window.count,
                received = page.items.len(),
                "Page size differs from declared count"
            );
        }

        collected.extend(page.items);

        if window.is_last() {
            break;
        }

        if window.cursor != cursor {
            warn!(
                requested = cursor,
                reported = window.cursor,
                "Server reported a different cursor than requested"
            );
        }

        cursor = window.next_cursor();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    info!(total = collected.len(), "Pagination complete");
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Serves `0..total` split into pages of the given sizes.
    struct FakeSource {
        sizes: Vec<u64>,
        requests: AtomicUsize,
    }

    impl FakeSource {
        fn new(sizes: Vec<u64>) -> Self {
            Self {
                sizes,
                requests: AtomicUsize::new(0),
            }
        }

        fn total(&self) -> u64 {
            self.sizes.iter().sum()
        }
    }

    impl PageSource for FakeSource {
        type Item = u64;

        async fn fetch_page(&self, cursor: u64) -> Result<Page<u64>> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            let mut start = 0;
            for size in &self.sizes {
                if start == cursor {
                    return Ok(Page {
                        window: PageWindow {
                            cursor,
                            count: *size,
                            total: self.total(),
                        },
                        items: (start..start + size).collect(),
                    });
                }
                start += size;
            }
            Err(HarvestError::Api {
                code: 404,
                message: format!("no page at cursor {}", cursor),
            })
        }
    }

    #[tokio::test]
    async fn test_drain_irregular_pages_returns_total() {
        for sizes in [vec![30, 30, 7], vec![1], vec![5, 1, 12, 2], vec![100]] {
            let source = FakeSource::new(sizes);
            let items = drain(&source, 0, Duration::ZERO).await.unwrap();
            assert_eq!(items.len() as u64, source.total());
            assert_eq!(items, (0..source.total()).collect::<Vec<_>>());
        }
    }

    #[tokio::test]
    async fn test_drain_requests_one_call_per_page() {
        let source = FakeSource::new(vec![10, 10, 3]);
        drain(&source, 0, Duration::ZERO).await.unwrap();
        assert_eq!(source.requests.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_drain_empty_collection() {
        let source = FakeSource::new(vec![0]);
        let items = drain(&source, 0, Duration::ZERO).await.unwrap();
        assert!(items.is_empty());
    }

    #[tokio::test]
    async fn test_drain_propagates_fetch_error() {
        struct Failing;
        impl PageSource for Failing {
            type Item = u64;
            async fn fetch_page(&self, _cursor: u64) -> Result<Page<u64>> {
                Err(HarvestError::Parse("truncated body".into()))
            }
        }

        let err = drain(&Failing, 0, Duration::ZERO).await.unwrap_err();
        assert!(err.is_fetch_error());
    }

    #[tokio::test]
    async fn test_drain_detects_stalled_pagination() {
        struct Stuck;
        impl PageSource for Stuck {
            type Item = u64;
            async fn fetch_page(&self, cursor: u64) -> Result<Page<u64>> {
                Ok(Page {
                    window: PageWindow {
                        cursor,
                        count: 0,
                        total: 50,
                    },
                    items: Vec::new(),
                })
            }
        }

        match drain(&Stuck, 0, Duration::ZERO).await {
            Err(HarvestError::StalledPagination { cursor: 0, total: 50 }) => {}
            other => panic!("expected stalled pagination, got {:?}", other.map(|v| v.len())),
        }
    }

    /// Always answers with the first window, whatever cursor is requested.
    struct Rewinding;

    impl PageSource for Rewinding {
        type Item = u64;

        async fn fetch_page(&self, _cursor: u64) -> Result<Page<u64>> {
            Ok(Page {
                window: PageWindow {
                    cursor: 0,
                    count: 30,
                    total: 100,
                },
                items: (0..30).collect(),
            })
        }
    }

    #[tokio::test]
    async fn test_drain_rejects_cursor_that_does_not_advance() {
        let result = tokio::time::timeout(Duration::from_secs(5), drain(&Rewinding, 0, Duration::ZERO))
            .await
            .expect("drain must terminate");
        match result {
            Err(HarvestError::StalledPagination { cursor: 30, total: 100 }) => {}
            other => panic!("expected stalled pagination, got {:?}", other.map(|v| v.len())),
        }
    }

    #[test]
    fn test_next_cursor_saturates() {
        let window = PageWindow {
            cursor: u64::MAX - 1,
            count: 10,
            total: u64::MAX,
        };
        assert_eq!(window.next_cursor(), u64::MAX);
        assert!(window.is_last());
    }

    #[tokio::test(start_paused = true)]
    async fn test_drain_sleeps_between_pages_only() {
        let source = FakeSource::new(vec![2, 2, 2]);
        let started = tokio::time::Instant::now();
        drain(&source, 0, Duration::from_secs(1)).await.unwrap();
        assert_eq!(started.elapsed(), Duration::from_secs(2));
    }
}
