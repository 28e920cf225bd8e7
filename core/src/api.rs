//! Async resource operations: `CatalogClient` request shaping joined with a
//! `Transport`.

use std::sync::Arc;

use crate::client::CatalogClient;
use crate::error::ApiError;
use crate::http::Transport;
use crate::types::{
    DescriptionRequest, GeneratedDescription, NewProduct, PaginatedProducts, Product, ProductPatch,
    Review, ReviewInput,
};

/// Product and review operations, one round-trip each.
///
/// Cloning is cheap; clones share the transport.
#[derive(Debug)]
pub struct CatalogApi<T> {
    client: CatalogClient,
    transport: Arc<T>,
}

impl<T> Clone for CatalogApi<T> {
    fn clone(&self) -> Self {
        Self {
            client: self.client.clone(),
            transport: Arc::clone(&self.transport),
        }
    }
}

impl<T: Transport> CatalogApi<T> {
    pub fn new(client: CatalogClient, transport: T) -> Self {
        Self {
            client,
            transport: Arc::new(transport),
        }
    }

    pub fn client(&self) -> &CatalogClient {
        &self.client
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub async fn list_products(&self, page: u32, category: Option<&str>) -> Result<PaginatedProducts, ApiError> {
        let request = self.client.build_list_products(page, category)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_list_products(response)
    }

    pub async fn get_product(&self, id: &str) -> Result<Product, ApiError> {
        let request = self.client.build_get_product(id)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_get_product(response)
    }

    pub async fn search_products(&self, text: &str) -> Result<Vec<Product>, ApiError> {
        let request = self.client.build_search_products(text)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_search_products(response)
    }

    pub async fn list_categories(&self) -> Result<Vec<String>, ApiError> {
        let request = self.client.build_list_categories()?;
        let response = self.transport.execute(request).await?;
        self.client.parse_list_categories(response)
    }

    pub async fn create_product(&self, input: &NewProduct) -> Result<Product, ApiError> {
        let request = self.client.build_create_product(input)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_create_product(response)
    }

    pub async fn update_product(&self, id: &str, patch: &ProductPatch) -> Result<Product, ApiError> {
        let request = self.client.build_update_product(id, patch)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_update_product(response)
    }

    pub async fn delete_product(&self, id: &str) -> Result<(), ApiError> {
        let request = self.client.build_delete_product(id)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_delete_product(response)
    }

    pub async fn generate_description(&self, input: &DescriptionRequest) -> Result<GeneratedDescription, ApiError> {
        let request = self.client.build_generate_description(input)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_generate_description(response)
    }

    pub async fn list_reviews(&self, product_id: &str) -> Result<Vec<Review>, ApiError> {
        let request = self.client.build_list_reviews(product_id)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_list_reviews(response)
    }

    /// Fails with `ApiError::Validation` before any I/O when the rating is
    /// outside 1..=5.
    pub async fn create_review(&self, product_id: &str, input: &ReviewInput) -> Result<Review, ApiError> {
        let request = self.client.build_create_review(product_id, input)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_create_review(response)
    }

    pub async fn update_review(
        &self,
        product_id: &str,
        review_id: &str,
        input: &ReviewInput,
    ) -> Result<Review, ApiError> {
        let request = self.client.build_update_review(product_id, review_id, input)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_update_review(response)
    }

    pub async fn delete_review(&self, product_id: &str, review_id: &str) -> Result<(), ApiError> {
        let request = self.client.build_delete_review(product_id, review_id)?;
        let response = self.transport.execute(request).await?;
        self.client.parse_delete_review(response)
    }
}
