//! Session-wide listing filters: category, search text and current page.
//!
//! `FilterStore` is the write half, held by filter controls. `FilterReader`
//! is the read half, held by list views. Both wrap the same `watch` channel,
//! so readers can also wait for the next change.

use std::sync::Arc;

use tokio::sync::watch;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Filters {
    pub category: Option<String>,
    /// Empty means "no search".
    pub search: String,
    /// 1-based.
    pub page: u32,
}

impl Default for Filters {
    fn default() -> Self {
        Self {
            category: None,
            search: String::new(),
            page: 1,
        }
    }
}

impl Filters {
    pub fn is_searching(&self) -> bool {
        !self.search.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct FilterStore {
    tx: Arc<watch::Sender<Filters>>,
}

impl Default for FilterStore {
    fn default() -> Self {
        Self::new()
    }
}

impl FilterStore {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(Filters::default());
        Self { tx: Arc::new(tx) }
    }

    pub fn reader(&self) -> FilterReader {
        FilterReader { rx: self.tx.subscribe() }
    }

    pub fn snapshot(&self) -> Filters {
        self.tx.borrow().clone()
    }

    /// Select a category, or all categories with `None`. Returns to page 1.
    pub fn set_category(&self, category: Option<String>) {
        self.tx.send_if_modified(|filters| {
            if filters.category == category {
                return false;
            }
            filters.category = category;
            filters.page = 1;
            true
        });
    }

    pub fn set_search(&self, text: impl Into<String>) {
        let text = text.into();
        self.tx.send_if_modified(|filters| {
            if filters.search == text {
                return false;
            }
            filters.search = text;
            true
        });
    }

    /// Pages are 1-based; 0 is treated as 1.
    pub fn set_page(&self, page: u32) {
        let page = page.max(1);
        self.tx.send_if_modified(|filters| {
            if filters.page == page {
                return false;
            }
            filters.page = page;
            true
        });
    }

    pub fn reset(&self) {
        self.tx.send_replace(Filters::default());
    }
}

#[derive(Debug, Clone)]
pub struct FilterReader {
    rx: watch::Receiver<Filters>,
}

impl FilterReader {
    pub fn snapshot(&self) -> Filters {
        self.rx.borrow().clone()
    }

    /// Wait for the next change. Returns `false` once every `FilterStore`
    /// handle has been dropped.
    pub async fn changed(&mut self) -> bool {
        self.rx.changed().await.is_ok()
    }
}
