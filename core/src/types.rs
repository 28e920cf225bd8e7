//! Domain DTOs for the catalog API.
//!
//! # Design
//! These types mirror the backend's camelCase JSON schema but are defined
//! independently from the mock-server crate; integration tests catch any
//! drift between the two. Server-owned fields (`id`, timestamps,
//! `averageRating`) only appear on the read types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Inclusive bounds for a review rating.
pub const MIN_RATING: u8 = 1;
pub const MAX_RATING: u8 = 5;

/// A product returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Product {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    pub date_added: DateTime<Utc>,
    #[serde(default)]
    pub average_rating: f64,
}

/// One page of the product listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PaginatedProducts {
    pub products: Vec<Product>,
    pub total_pages: u32,
    pub current_page: u32,
}

impl PaginatedProducts {
    pub fn items(&self) -> &[Product] {
        &self.products
    }

    pub fn has_next(&self) -> bool {
        self.current_page < self.total_pages
    }
}

/// Request payload for creating a product.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Partial update for a product. Omitted fields remain unchanged on the
/// server.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl From<NewProduct> for ProductPatch {
    fn from(product: NewProduct) -> Self {
        Self {
            name: Some(product.name),
            description: Some(product.description),
            category: Some(product.category),
            price: Some(product.price),
            image_url: product.image_url,
        }
    }
}

/// A review returned by the API.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub author: String,
    pub rating: u8,
    pub comment: String,
    pub date: DateTime<Utc>,
}

/// Request payload for creating or replacing a review.
///
/// `rating` is an `i64` so out-of-range input coming from a form can be
/// represented and rejected locally instead of failing to parse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReviewInput {
    pub author: String,
    pub rating: i64,
    pub comment: String,
}

impl From<&Review> for ReviewInput {
    fn from(review: &Review) -> Self {
        Self {
            author: review.author.clone(),
            rating: i64::from(review.rating),
            comment: review.comment.clone(),
        }
    }
}

/// Request payload for the description generator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRequest {
    pub product_name: String,
    pub category: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub features: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedDescription {
    pub description: String,
}
