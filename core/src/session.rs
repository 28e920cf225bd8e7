//! The per-session object views are built from.
//!
//! # Design
//! `CatalogSession` bundles the API, one query cache shared by every view,
//! the filter store and the navigator. Nothing here is global: a session is
//! created once and handed to each view explicitly.
//!
//! The cache holds `CatalogData`, the sum of every value shape the catalog
//! caches. `QueryHandle<T>` projects a subscription back to the concrete
//! type a view asked for.

use std::sync::Arc;

use crate::api::CatalogApi;
use crate::cache::{QueryCache, QueryState, Subscription};
use crate::client::CatalogClient;
use crate::config::ClientConfig;
use crate::error::{ApiError, TransportError};
use crate::filters::{FilterReader, FilterStore};
use crate::http::Transport;
use crate::key::QueryKey;
use crate::navigation::{Navigator, Route};
use crate::transport::ReqwestTransport;
use crate::types::{PaginatedProducts, Product, Review};
use crate::views::{AddProductView, EditProductView, HomeView, ProductDetailView, ProductListView};

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogData {
    Page(PaginatedProducts),
    Product(Product),
    Products(Vec<Product>),
    Reviews(Vec<Review>),
    Categories(Vec<String>),
}

impl CatalogData {
    pub fn into_page(self) -> Option<PaginatedProducts> {
        match self {
            CatalogData::Page(page) => Some(page),
            _ => None,
        }
    }

    pub fn into_product(self) -> Option<Product> {
        match self {
            CatalogData::Product(product) => Some(product),
            _ => None,
        }
    }

    pub fn into_products(self) -> Option<Vec<Product>> {
        match self {
            CatalogData::Products(products) => Some(products),
            _ => None,
        }
    }

    pub fn into_reviews(self) -> Option<Vec<Review>> {
        match self {
            CatalogData::Reviews(reviews) => Some(reviews),
            _ => None,
        }
    }

    pub fn into_categories(self) -> Option<Vec<String>> {
        match self {
            CatalogData::Categories(categories) => Some(categories),
            _ => None,
        }
    }
}

/// A typed read subscription.
#[derive(Debug)]
pub struct QueryHandle<T> {
    subscription: Subscription<CatalogData>,
    project: fn(CatalogData) -> Option<T>,
}

impl<T> QueryHandle<T> {
    fn new(subscription: Subscription<CatalogData>, project: fn(CatalogData) -> Option<T>) -> Self {
        Self { subscription, project }
    }

    pub fn key(&self) -> &QueryKey {
        self.subscription.key()
    }

    pub fn current(&self) -> QueryState<T> {
        self.subscription.current().map(self.project)
    }

    pub async fn changed(&mut self) -> bool {
        self.subscription.changed().await
    }

    pub async fn settled(&mut self) -> Result<T, ApiError> {
        let data = self.subscription.settled().await?;
        (self.project)(data).ok_or_else(|| {
            TransportError::MalformedResponse(format!("unexpected cached value under {}", self.key())).into()
        })
    }
}

pub struct CatalogSession<T> {
    api: CatalogApi<T>,
    cache: QueryCache<CatalogData>,
    filters: FilterStore,
    navigator: Arc<dyn Navigator>,
}

impl<T> Clone for CatalogSession<T> {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            cache: self.cache.clone(),
            filters: self.filters.clone(),
            navigator: Arc::clone(&self.navigator),
        }
    }
}

impl CatalogSession<ReqwestTransport> {
    /// A session talking to the configured backend over HTTP.
    pub fn connect(config: &ClientConfig, navigator: Arc<dyn Navigator>) -> Self {
        let api = CatalogApi::new(CatalogClient::new(config.base_url()), ReqwestTransport::new());
        Self::new(api, navigator)
    }
}

impl<T: Transport> CatalogSession<T> {
    pub fn new(api: CatalogApi<T>, navigator: Arc<dyn Navigator>) -> Self {
        Self {
            api,
            cache: QueryCache::new(),
            filters: FilterStore::new(),
            navigator,
        }
    }

    pub fn api(&self) -> &CatalogApi<T> {
        &self.api
    }

    pub fn cache(&self) -> &QueryCache<CatalogData> {
        &self.cache
    }

    /// Write access, for filter controls.
    pub fn filters(&self) -> &FilterStore {
        &self.filters
    }

    /// Read access, for list views.
    pub fn filter_reader(&self) -> FilterReader {
        self.filters.reader()
    }

    pub fn home(&self) -> HomeView<T> {
        HomeView::new(self.clone())
    }

    pub fn product_list(&self) -> ProductListView<T> {
        ProductListView::new(self.clone())
    }

    pub fn product_detail(&self, id: &str) -> ProductDetailView<T> {
        ProductDetailView::new(self.clone(), id)
    }

    pub fn add_product(&self) -> AddProductView<T> {
        AddProductView::new(self.clone())
    }

    pub fn edit_product(&self, id: &str) -> EditProductView<T> {
        EditProductView::new(self.clone(), id)
    }

    /// Drop every cached entry, e.g. on logout.
    pub fn teardown(&self) {
        self.cache.clear();
        self.filters.reset();
    }

    // --- reads ----------------------------------------------------------------

    pub(crate) fn products_page(&self, page: u32, category: Option<String>) -> QueryHandle<PaginatedProducts> {
        let key = QueryKey::products_page(page, category.as_deref());
        let api = self.api.clone();
        let subscription = self.cache.read(key, move || {
            let api = api.clone();
            let category = category.clone();
            async move { api.list_products(page, category.as_deref()).await.map(CatalogData::Page) }
        });
        QueryHandle::new(subscription, CatalogData::into_page)
    }

    pub(crate) fn product(&self, id: &str) -> QueryHandle<Product> {
        let api = self.api.clone();
        let id = id.to_string();
        let subscription = self.cache.read(QueryKey::product(&id), move || {
            let api = api.clone();
            let id = id.clone();
            async move { api.get_product(&id).await.map(CatalogData::Product) }
        });
        QueryHandle::new(subscription, CatalogData::into_product)
    }

    pub(crate) fn reviews(&self, product_id: &str) -> QueryHandle<Vec<Review>> {
        let api = self.api.clone();
        let product_id = product_id.to_string();
        let subscription = self.cache.read(QueryKey::reviews(&product_id), move || {
            let api = api.clone();
            let product_id = product_id.clone();
            async move { api.list_reviews(&product_id).await.map(CatalogData::Reviews) }
        });
        QueryHandle::new(subscription, CatalogData::into_reviews)
    }

    /// `None` when there is no search text.
    pub(crate) fn search(&self, text: &str) -> Option<QueryHandle<Vec<Product>>> {
        if text.is_empty() {
            return None;
        }
        let api = self.api.clone();
        let text = text.to_string();
        let subscription = self.cache.read(QueryKey::search(&text), move || {
            let api = api.clone();
            let text = text.clone();
            async move { api.search_products(&text).await.map(CatalogData::Products) }
        });
        Some(QueryHandle::new(subscription, CatalogData::into_products))
    }

    pub(crate) fn categories(&self) -> QueryHandle<Vec<String>> {
        let api = self.api.clone();
        let subscription = self.cache.read(QueryKey::categories(), move || {
            let api = api.clone();
            async move { api.list_categories().await.map(CatalogData::Categories) }
        });
        QueryHandle::new(subscription, CatalogData::into_categories)
    }

    // --- effects --------------------------------------------------------------

    pub(crate) fn invalidate(&self, prefixes: &[QueryKey]) {
        for prefix in prefixes {
            self.cache.invalidate(prefix);
        }
    }

    pub(crate) fn navigate(&self, route: Route) {
        self.navigator.navigate(route);
    }
}
