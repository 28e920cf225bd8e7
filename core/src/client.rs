//! Stateless HTTP request builder and response parser for the catalog API.
//!
//! # Design
//! `CatalogClient` holds only a `base_url` and carries no mutable state
//! between calls. Each operation is split into a `build_*` method that
//! produces an `HttpRequest` and a `parse_*` method that consumes an
//! `HttpResponse`. The round-trip in between belongs to a `Transport`.
//!
//! Review ratings are checked in `build_*`: an out-of-range rating never
//! produces a request, so it cannot reach the network.

use reqwest::{StatusCode, Url};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ApiError, ErrorEnvelope, TransportError, ValidationError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::types::{
    DescriptionRequest, GeneratedDescription, NewProduct, PaginatedProducts, Product, ProductPatch,
    Review, ReviewInput, MAX_RATING, MIN_RATING,
};

/// Synchronous, stateless client for the catalog API.
#[derive(Debug, Clone)]
pub struct CatalogClient {
    base_url: String,
}

impl CatalogClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    // --- products -----------------------------------------------------------

    pub fn build_list_products(&self, page: u32, category: Option<&str>) -> Result<HttpRequest, ApiError> {
        let page = page.to_string();
        let mut query = vec![("page", page.as_str())];
        if let Some(category) = category {
            query.push(("category", category));
        }
        self.get(&["products"], &query)
    }

    pub fn build_get_product(&self, id: &str) -> Result<HttpRequest, ApiError> {
        self.get(&["products", id], &[])
    }

    /// Callers gate this on non-empty `text`; an empty query is sent as-is.
    pub fn build_search_products(&self, text: &str) -> Result<HttpRequest, ApiError> {
        self.get(&["products", "search"], &[("q", text)])
    }

    pub fn build_list_categories(&self) -> Result<HttpRequest, ApiError> {
        self.get(&["products", "categories"], &[])
    }

    pub fn build_create_product(&self, input: &NewProduct) -> Result<HttpRequest, ApiError> {
        self.with_body(HttpMethod::Post, &["products"], input)
    }

    pub fn build_update_product(&self, id: &str, patch: &ProductPatch) -> Result<HttpRequest, ApiError> {
        self.with_body(HttpMethod::Put, &["products", id], patch)
    }

    pub fn build_delete_product(&self, id: &str) -> Result<HttpRequest, ApiError> {
        self.bodyless(HttpMethod::Delete, &["products", id], &[])
    }

    pub fn build_generate_description(&self, input: &DescriptionRequest) -> Result<HttpRequest, ApiError> {
        self.with_body(HttpMethod::Post, &["ai", "generate-description"], input)
    }

    // --- reviews ------------------------------------------------------------

    pub fn build_list_reviews(&self, product_id: &str) -> Result<HttpRequest, ApiError> {
        self.get(&["products", product_id, "reviews"], &[])
    }

    pub fn build_create_review(&self, product_id: &str, input: &ReviewInput) -> Result<HttpRequest, ApiError> {
        check_rating(input.rating)?;
        self.with_body(HttpMethod::Post, &["products", product_id, "reviews"], input)
    }

    pub fn build_update_review(
        &self,
        product_id: &str,
        review_id: &str,
        input: &ReviewInput,
    ) -> Result<HttpRequest, ApiError> {
        check_rating(input.rating)?;
        self.with_body(HttpMethod::Put, &["products", product_id, "reviews", review_id], input)
    }

    pub fn build_delete_review(&self, product_id: &str, review_id: &str) -> Result<HttpRequest, ApiError> {
        self.bodyless(HttpMethod::Delete, &["products", product_id, "reviews", review_id], &[])
    }

    // --- parsing ------------------------------------------------------------

    pub fn parse_list_products(&self, response: HttpResponse) -> Result<PaginatedProducts, ApiError> {
        parse_json(response)
    }

    pub fn parse_get_product(&self, response: HttpResponse) -> Result<Product, ApiError> {
        parse_json(response)
    }

    pub fn parse_search_products(&self, response: HttpResponse) -> Result<Vec<Product>, ApiError> {
        parse_json(response)
    }

    pub fn parse_list_categories(&self, response: HttpResponse) -> Result<Vec<String>, ApiError> {
        parse_json(response)
    }

    pub fn parse_create_product(&self, response: HttpResponse) -> Result<Product, ApiError> {
        parse_json(response)
    }

    pub fn parse_update_product(&self, response: HttpResponse) -> Result<Product, ApiError> {
        parse_json(response)
    }

    pub fn parse_delete_product(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    pub fn parse_generate_description(&self, response: HttpResponse) -> Result<GeneratedDescription, ApiError> {
        parse_json(response)
    }

    pub fn parse_list_reviews(&self, response: HttpResponse) -> Result<Vec<Review>, ApiError> {
        parse_json(response)
    }

    pub fn parse_create_review(&self, response: HttpResponse) -> Result<Review, ApiError> {
        parse_json(response)
    }

    pub fn parse_update_review(&self, response: HttpResponse) -> Result<Review, ApiError> {
        parse_json(response)
    }

    pub fn parse_delete_review(&self, response: HttpResponse) -> Result<(), ApiError> {
        check_status(&response)
    }

    // --- helpers ------------------------------------------------------------

    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<String, ApiError> {
        let invalid = |reason: String| TransportError::InvalidUrl(format!("{}: {reason}", self.base_url));
        let mut url = Url::parse(&self.base_url).map_err(|e| invalid(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|()| invalid("cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url.into())
    }

    fn get(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<HttpRequest, ApiError> {
        self.bodyless(HttpMethod::Get, segments, query)
    }

    fn bodyless(
        &self,
        method: HttpMethod,
        segments: &[&str],
        query: &[(&str, &str)],
    ) -> Result<HttpRequest, ApiError> {
        Ok(HttpRequest {
            method,
            path: self.url(segments, query)?,
            headers: Vec::new(),
            body: None,
        })
    }

    fn with_body<B: Serialize>(&self, method: HttpMethod, segments: &[&str], body: &B) -> Result<HttpRequest, ApiError> {
        let body = serde_json::to_string(body).map_err(|e| TransportError::Serialization(e.to_string()))?;
        Ok(HttpRequest {
            method,
            path: self.url(segments, &[])?,
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: Some(body),
        })
    }
}

fn check_rating(rating: i64) -> Result<(), ValidationError> {
    if rating < i64::from(MIN_RATING) {
        return Err(ValidationError::field(
            "rating",
            "too_small",
            format!("Rating must be at least {MIN_RATING}"),
        ));
    }
    if rating > i64::from(MAX_RATING) {
        return Err(ValidationError::field(
            "rating",
            "too_big",
            format!("Rating must be at most {MAX_RATING}"),
        ));
    }
    Ok(())
}

fn parse_json<T: DeserializeOwned>(response: HttpResponse) -> Result<T, ApiError> {
    check_status(&response)?;
    serde_json::from_str(&response.body).map_err(|e| TransportError::MalformedResponse(e.to_string()).into())
}

/// Map non-success status codes to the appropriate `ApiError` variant.
///
/// 404 is always `NotFound`. Other 4xx responses carrying the error envelope
/// become `Validation`; everything else is a `TransportError::Status`.
fn check_status(response: &HttpResponse) -> Result<(), ApiError> {
    if (200..300).contains(&response.status) {
        return Ok(());
    }
    if response.status == 404 {
        return Err(ApiError::NotFound);
    }
    let envelope = serde_json::from_str::<ErrorEnvelope>(&response.body).ok();
    match envelope {
        Some(envelope) if (400..500).contains(&response.status) => Err(ApiError::Validation(envelope.into())),
        envelope => {
            let message = envelope.map(|e| e.error).unwrap_or_else(|| status_line(response.status));
            Err(TransportError::Status {
                status: response.status,
                message,
            }
            .into())
        }
    }
}

fn status_line(status: u16) -> String {
    StatusCode::from_u16(status)
        .ok()
        .and_then(|code| code.canonical_reason())
        .unwrap_or("Unknown Status")
        .to_string()
}
