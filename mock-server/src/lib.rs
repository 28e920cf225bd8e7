use std::{collections::BTreeSet, sync::Arc};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::{net::TcpListener, sync::RwLock};
use tracing::{debug, info};
use uuid::Uuid;

pub const PAGE_SIZE: usize = 6;

#[derive(Clone, Debug, Serialize, Deserialize)]
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
    pub average_rating: f64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    pub id: String,
    pub product_id: String,
    pub author: String,
    pub rating: u8,
    pub comment: String,
    pub date: DateTime<Utc>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total_pages: usize,
    pub current_page: usize,
}

/// Product fields as sent by clients. Every field is optional so that
/// missing ones can be reported in the validation envelope; creation
/// requires all of them except `imageUrl`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductInput {
    pub name: Option<String>,
    pub description: Option<String>,
    pub category: Option<String>,
    pub price: Option<f64>,
    pub image_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReviewInput {
    pub author: Option<String>,
    pub rating: Option<f64>,
    pub comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionInput {
    pub product_name: Option<String>,
    pub category: Option<String>,
    pub features: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct ListParams {
    pub page: Option<usize>,
    pub category: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub q: Option<String>,
}

/// One entry of the error envelope's `details`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Issue {
    pub code: String,
    pub expected: String,
    pub received: String,
    pub path: Vec<String>,
    pub message: String,
}

impl Issue {
    fn required(field: &str, expected: &str) -> Self {
        Self {
            code: "invalid_type".to_string(),
            expected: expected.to_string(),
            received: "undefined".to_string(),
            path: vec![field.to_string()],
            message: "Required".to_string(),
        }
    }

    fn too_small(field: &str, expected: &str, message: &str) -> Self {
        Self {
            code: "too_small".to_string(),
            expected: expected.to_string(),
            received: expected.to_string(),
            path: vec![field.to_string()],
            message: message.to_string(),
        }
    }

    fn too_big(field: &str, expected: &str, message: &str) -> Self {
        Self {
            code: "too_big".to_string(),
            expected: expected.to_string(),
            received: expected.to_string(),
            path: vec![field.to_string()],
            message: message.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub details: Vec<Issue>,
}

#[derive(Debug)]
pub enum ServerError {
    NotFound(&'static str),
    Invalid(Vec<Issue>),
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ServerError::NotFound(what) => (
                StatusCode::NOT_FOUND,
                ErrorBody {
                    error: format!("{what} not found"),
                    details: Vec::new(),
                },
            ),
            ServerError::Invalid(details) => (
                StatusCode::BAD_REQUEST,
                ErrorBody {
                    error: "Validation failed".to_string(),
                    details,
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

#[derive(Debug, Default)]
pub struct Store {
    products: Vec<Product>,
    reviews: Vec<Review>,
}

impl Store {
    fn product_mut(&mut self, id: &str) -> Result<&mut Product, ServerError> {
        self.products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or(ServerError::NotFound("Product"))
    }

    fn ensure_product(&self, id: &str) -> Result<(), ServerError> {
        if self.products.iter().any(|p| p.id == id) {
            Ok(())
        } else {
            Err(ServerError::NotFound("Product"))
        }
    }

    /// Recompute the product's average rating, rounded to one decimal.
    fn refresh_rating(&mut self, product_id: &str) {
        let ratings: Vec<f64> = self
            .reviews
            .iter()
            .filter(|r| r.product_id == product_id)
            .map(|r| f64::from(r.rating))
            .collect();
        let average = if ratings.is_empty() {
            0.0
        } else {
            let mean = ratings.iter().sum::<f64>() / ratings.len() as f64;
            (mean * 10.0).round() / 10.0
        };
        if let Some(product) = self.products.iter_mut().find(|p| p.id == product_id) {
            product.average_rating = average;
        }
    }
}

pub type Db = Arc<RwLock<Store>>;

pub fn app() -> Router {
    router(Db::default())
}

pub fn router(db: Db) -> Router {
    Router::new()
        .route("/products", get(list_products).post(create_product))
        .route("/products/search", get(search_products))
        .route("/products/categories", get(list_categories))
        .route(
            "/products/{id}",
            get(get_product).put(update_product).delete(delete_product),
        )
        .route("/products/{id}/reviews", get(list_reviews).post(create_review))
        .route(
            "/products/{id}/reviews/{review_id}",
            put(update_review).delete(delete_review),
        )
        .route("/ai/generate-description", post(generate_description))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

// --- products ---------------------------------------------------------------

async fn list_products(State(db): State<Db>, Query(params): Query<ListParams>) -> Json<ProductPage> {
    let store = db.read().await;
    let category = params.category.filter(|c| !c.is_empty());
    let matching: Vec<&Product> = store
        .products
        .iter()
        .filter(|p| category.as_deref().is_none_or(|c| p.category == c))
        .collect();
    let total_pages = matching.len().div_ceil(PAGE_SIZE).max(1);
    let current_page = params.page.unwrap_or(1).max(1);
    let products = matching
        .into_iter()
        .skip((current_page - 1).saturating_mul(PAGE_SIZE))
        .take(PAGE_SIZE)
        .cloned()
        .collect();
    Json(ProductPage {
        products,
        total_pages,
        current_page,
    })
}

async fn search_products(State(db): State<Db>, Query(params): Query<SearchParams>) -> Json<Vec<Product>> {
    let needle = params.q.unwrap_or_default().trim().to_lowercase();
    if needle.is_empty() {
        return Json(Vec::new());
    }
    let store = db.read().await;
    let hits = store
        .products
        .iter()
        .filter(|p| {
            [&p.name, &p.description, &p.category]
                .iter()
                .any(|field| field.to_lowercase().contains(&needle))
        })
        .cloned()
        .collect();
    Json(hits)
}

async fn list_categories(State(db): State<Db>) -> Json<Vec<String>> {
    let store = db.read().await;
    let categories: BTreeSet<String> = store.products.iter().map(|p| p.category.clone()).collect();
    Json(categories.into_iter().collect())
}

async fn get_product(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Product>, ServerError> {
    let store = db.read().await;
    store
        .products
        .iter()
        .find(|p| p.id == id)
        .cloned()
        .map(Json)
        .ok_or(ServerError::NotFound("Product"))
}

async fn create_product(
    State(db): State<Db>,
    Json(input): Json<ProductInput>,
) -> Result<(StatusCode, Json<Product>), ServerError> {
    let mut issues = Vec::new();
    let name = required_text(&mut issues, "name", input.name);
    let description = required_text(&mut issues, "description", input.description);
    let category = required_text(&mut issues, "category", input.category);
    let price = match input.price {
        Some(price) => check_price(&mut issues, price),
        None => {
            issues.push(Issue::required("price", "number"));
            None
        }
    };
    let (Some(name), Some(description), Some(category), Some(price)) = (name, description, category, price) else {
        return Err(ServerError::Invalid(issues));
    };

    let product = Product {
        id: Uuid::new_v4().to_string(),
        name,
        description,
        category,
        price,
        image_url: input.image_url.filter(|url| !url.is_empty()),
        date_added: Utc::now(),
        average_rating: 0.0,
    };
    info!(id = %product.id, name = %product.name, "created product");
    db.write().await.products.push(product.clone());
    Ok((StatusCode::CREATED, Json(product)))
}

async fn update_product(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>, ServerError> {
    let mut issues = Vec::new();
    let name = input.name.map(|v| non_empty(&mut issues, "name", v));
    let description = input.description.map(|v| non_empty(&mut issues, "description", v));
    let category = input.category.map(|v| non_empty(&mut issues, "category", v));
    let price = input.price.map(|v| check_price(&mut issues, v));
    if !issues.is_empty() {
        return Err(ServerError::Invalid(issues));
    }

    let mut store = db.write().await;
    let product = store.product_mut(&id)?;
    if let Some(Some(name)) = name {
        product.name = name;
    }
    if let Some(Some(description)) = description {
        product.description = description;
    }
    if let Some(Some(category)) = category {
        product.category = category;
    }
    if let Some(Some(price)) = price {
        product.price = price;
    }
    if let Some(image_url) = input.image_url {
        product.image_url = Some(image_url).filter(|url| !url.is_empty());
    }
    debug!(id = %product.id, "updated product");
    Ok(Json(product.clone()))
}

async fn delete_product(State(db): State<Db>, Path(id): Path<String>) -> Result<StatusCode, ServerError> {
    let mut store = db.write().await;
    store.ensure_product(&id)?;
    store.products.retain(|p| p.id != id);
    store.reviews.retain(|r| r.product_id != id);
    info!(id = %id, "deleted product and its reviews");
    Ok(StatusCode::NO_CONTENT)
}

// --- reviews ----------------------------------------------------------------

async fn list_reviews(State(db): State<Db>, Path(id): Path<String>) -> Result<Json<Vec<Review>>, ServerError> {
    let store = db.read().await;
    store.ensure_product(&id)?;
    let reviews = store.reviews.iter().filter(|r| r.product_id == id).cloned().collect();
    Ok(Json(reviews))
}

async fn create_review(
    State(db): State<Db>,
    Path(id): Path<String>,
    Json(input): Json<ReviewInput>,
) -> Result<(StatusCode, Json<Review>), ServerError> {
    let (author, rating, comment) = check_review(input)?;
    let mut store = db.write().await;
    store.ensure_product(&id)?;
    let review = Review {
        id: Uuid::new_v4().to_string(),
        product_id: id.clone(),
        author,
        rating,
        comment,
        date: Utc::now(),
    };
    store.reviews.push(review.clone());
    store.refresh_rating(&id);
    debug!(product = %id, review = %review.id, "created review");
    Ok((StatusCode::CREATED, Json(review)))
}

async fn update_review(
    State(db): State<Db>,
    Path((id, review_id)): Path<(String, String)>,
    Json(input): Json<ReviewInput>,
) -> Result<Json<Review>, ServerError> {
    let (author, rating, comment) = check_review(input)?;
    let mut store = db.write().await;
    store.ensure_product(&id)?;
    let review = store
        .reviews
        .iter_mut()
        .find(|r| r.id == review_id && r.product_id == id)
        .ok_or(ServerError::NotFound("Review"))?;
    review.author = author;
    review.rating = rating;
    review.comment = comment;
    let review = review.clone();
    store.refresh_rating(&id);
    Ok(Json(review))
}

async fn delete_review(
    State(db): State<Db>,
    Path((id, review_id)): Path<(String, String)>,
) -> Result<StatusCode, ServerError> {
    let mut store = db.write().await;
    store.ensure_product(&id)?;
    let before = store.reviews.len();
    store.reviews.retain(|r| !(r.id == review_id && r.product_id == id));
    if store.reviews.len() == before {
        return Err(ServerError::NotFound("Review"));
    }
    store.refresh_rating(&id);
    Ok(StatusCode::NO_CONTENT)
}

// --- ai ---------------------------------------------------------------------

#[derive(Debug, Serialize, Deserialize)]
pub struct GeneratedDescription {
    pub description: String,
}

async fn generate_description(Json(input): Json<DescriptionInput>) -> Result<Json<GeneratedDescription>, ServerError> {
    let mut issues = Vec::new();
    let name = required_text(&mut issues, "productName", input.product_name);
    let category = required_text(&mut issues, "category", input.category);
    let (Some(name), Some(category)) = (name, category) else {
        return Err(ServerError::Invalid(issues));
    };
    Ok(Json(GeneratedDescription {
        description: describe(&name, &category, input.features.as_deref()),
    }))
}

/// Deterministic stand-in for the generator.
pub fn describe(name: &str, category: &str, features: Option<&[String]>) -> String {
    let mut description = format!("Meet the {name}, a standout pick in {category}.");
    if let Some(features) = features.filter(|f| !f.is_empty()) {
        description.push_str(&format!(" Highlights: {}.", features.join(", ")));
    }
    description.push_str(" Built to earn its place in your everyday routine.");
    description
}

// --- validation -------------------------------------------------------------

fn required_text(issues: &mut Vec<Issue>, field: &str, value: Option<String>) -> Option<String> {
    match value {
        Some(value) => non_empty(issues, field, value),
        None => {
            issues.push(Issue::required(field, "string"));
            None
        }
    }
}

fn non_empty(issues: &mut Vec<Issue>, field: &str, value: String) -> Option<String> {
    if value.trim().is_empty() {
        issues.push(Issue::too_small(field, "string", "Must not be empty"));
        return None;
    }
    Some(value)
}

fn check_price(issues: &mut Vec<Issue>, price: f64) -> Option<f64> {
    if !price.is_finite() || price < 0.0 {
        issues.push(Issue::too_small("price", "number", "Price must be non-negative"));
        return None;
    }
    Some(price)
}

fn check_review(input: ReviewInput) -> Result<(String, u8, String), ServerError> {
    let mut issues = Vec::new();
    let author = required_text(&mut issues, "author", input.author);
    let comment = required_text(&mut issues, "comment", input.comment);
    let rating = match input.rating {
        None => {
            issues.push(Issue::required("rating", "number"));
            None
        }
        Some(r) if r.fract() != 0.0 => {
            issues.push(Issue {
                code: "invalid_type".to_string(),
                expected: "integer".to_string(),
                received: "float".to_string(),
                path: vec!["rating".to_string()],
                message: "Rating must be a whole number".to_string(),
            });
            None
        }
        Some(r) if r < 1.0 => {
            issues.push(Issue::too_small("rating", "number", "Rating must be at least 1"));
            None
        }
        Some(r) if r > 5.0 => {
            issues.push(Issue::too_big("rating", "number", "Rating must be at most 5"));
            None
        }
        Some(r) => Some(r as u8),
    };
    match (author, rating, comment) {
        (Some(author), Some(rating), Some(comment)) => Ok((author, rating, comment)),
        _ => Err(ServerError::Invalid(issues)),
    }
}
