//! Page view models: reads bound to cache keys, plus mutation triggers that
//! invalidate dependent keys and navigate on success.
//!
//! What each mutation invalidates:
//!
//! | mutation              | invalidated prefixes                                   |
//! |-----------------------|--------------------------------------------------------|
//! | create product        | products, search, categories                           |
//! | update product        | products, product(id), search, categories              |
//! | delete product        | products, product(id), reviews(id), search, categories |
//! | add/edit/delete review| reviews(pid), product(pid), products, search           |
//!
//! Review mutations touch the product entries because the server
//! recomputes `averageRating` on every review change.

use crate::error::{ApiError, FieldIssue, PathSegment, ValidationError};
use crate::filters::{FilterReader, Filters};
use crate::http::Transport;
use crate::key::QueryKey;
use crate::mutation::{MutationTrigger, ViewError};
use crate::navigation::Route;
use crate::session::{CatalogSession, QueryHandle};
use crate::types::{
    DescriptionRequest, GeneratedDescription, NewProduct, PaginatedProducts, Product, ProductPatch,
    Review, ReviewInput,
};

fn product_lists() -> [QueryKey; 3] {
    [QueryKey::products(), QueryKey::searches(), QueryKey::categories()]
}

/// Landing page: the first page of products, or search results while the
/// shared search text is non-empty.
pub struct HomeView<T> {
    session: CatalogSession<T>,
    filters: FilterReader,
}

impl<T: Transport> HomeView<T> {
    pub(crate) fn new(session: CatalogSession<T>) -> Self {
        let filters = session.filter_reader();
        Self { session, filters }
    }

    pub fn featured(&self) -> QueryHandle<PaginatedProducts> {
        self.session.products_page(1, None)
    }

    pub fn search_results(&self) -> Option<QueryHandle<Vec<Product>>> {
        self.session.search(&self.filters.snapshot().search)
    }
}

/// Product listing with category filter, pagination and search.
pub struct ProductListView<T> {
    session: CatalogSession<T>,
    filters: FilterReader,
}

impl<T: Transport> ProductListView<T> {
    pub(crate) fn new(session: CatalogSession<T>) -> Self {
        let filters = session.filter_reader();
        Self { session, filters }
    }

    pub fn filters(&self) -> Filters {
        self.filters.snapshot()
    }

    /// Wait for a filter change; re-read afterwards to follow it.
    pub async fn filters_changed(&mut self) -> bool {
        self.filters.changed().await
    }

    /// The page selected by the current filters.
    pub fn products(&self) -> QueryHandle<PaginatedProducts> {
        let Filters { category, page, .. } = self.filters.snapshot();
        self.session.products_page(page, category)
    }

    pub fn categories(&self) -> QueryHandle<Vec<String>> {
        self.session.categories()
    }

    pub fn search_results(&self) -> Option<QueryHandle<Vec<Product>>> {
        self.session.search(&self.filters.snapshot().search)
    }

    pub fn select_category(&self, category: Option<String>) {
        self.session.filters().set_category(category);
    }

    pub fn go_to_page(&self, page: u32) {
        self.session.filters().set_page(page);
    }
}

/// One product with its reviews.
pub struct ProductDetailView<T> {
    session: CatalogSession<T>,
    id: String,
    add_review: MutationTrigger,
    update_review: MutationTrigger,
    delete_review: MutationTrigger,
    delete_product: MutationTrigger,
}

impl<T: Transport> ProductDetailView<T> {
    pub(crate) fn new(session: CatalogSession<T>, id: &str) -> Self {
        Self {
            session,
            id: id.to_string(),
            add_review: MutationTrigger::new("add_review"),
            update_review: MutationTrigger::new("update_review"),
            delete_review: MutationTrigger::new("delete_review"),
            delete_product: MutationTrigger::new("delete_product"),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn product(&self) -> QueryHandle<Product> {
        self.session.product(&self.id)
    }

    pub fn reviews(&self) -> QueryHandle<Vec<Review>> {
        self.session.reviews(&self.id)
    }

    pub fn add_review_state(&self) -> &MutationTrigger {
        &self.add_review
    }

    pub fn update_review_state(&self) -> &MutationTrigger {
        &self.update_review
    }

    pub fn delete_review_state(&self) -> &MutationTrigger {
        &self.delete_review
    }

    pub fn delete_product_state(&self) -> &MutationTrigger {
        &self.delete_product
    }

    pub async fn add_review(&self, input: &ReviewInput) -> Result<Review, ViewError> {
        let api = self.session.api();
        self.add_review
            .run(api.create_review(&self.id, input), |_| self.reviews_changed())
            .await
    }

    pub async fn update_review(&self, review_id: &str, input: &ReviewInput) -> Result<Review, ViewError> {
        let api = self.session.api();
        self.update_review
            .run(api.update_review(&self.id, review_id, input), |_| self.reviews_changed())
            .await
    }

    pub async fn delete_review(&self, review_id: &str) -> Result<(), ViewError> {
        let api = self.session.api();
        self.delete_review
            .run(api.delete_review(&self.id, review_id), |_| self.reviews_changed())
            .await
    }

    /// Delete the product and go back to wherever the user came from.
    pub async fn delete_product(&self) -> Result<(), ViewError> {
        let api = self.session.api();
        self.delete_product
            .run(api.delete_product(&self.id), |_| {
                let [products, searches, categories] = product_lists();
                self.session.invalidate(&[
                    products,
                    QueryKey::product(&self.id),
                    QueryKey::reviews(&self.id),
                    searches,
                    categories,
                ]);
                self.session.navigate(Route::Back);
            })
            .await
    }

    fn reviews_changed(&self) {
        self.session.invalidate(&[
            QueryKey::reviews(&self.id),
            QueryKey::product(&self.id),
            QueryKey::products(),
            QueryKey::searches(),
        ]);
    }
}

/// New-product form.
pub struct AddProductView<T> {
    session: CatalogSession<T>,
    create: MutationTrigger,
    describe: MutationTrigger,
}

impl<T: Transport> AddProductView<T> {
    pub(crate) fn new(session: CatalogSession<T>) -> Self {
        Self {
            session,
            create: MutationTrigger::new("create_product"),
            describe: MutationTrigger::new("generate_description"),
        }
    }

    pub fn create_state(&self) -> &MutationTrigger {
        &self.create
    }

    pub fn describe_state(&self) -> &MutationTrigger {
        &self.describe
    }

    pub async fn create_product(&self, input: &NewProduct) -> Result<Product, ViewError> {
        let api = self.session.api();
        self.create
            .run(api.create_product(input), |_| {
                self.session.invalidate(&product_lists());
                self.session.navigate(Route::Back);
            })
            .await
    }

    /// Ask the backend to draft a description. Name and category must
    /// already be filled in; otherwise this fails without a request.
    pub async fn generate_description(
        &self,
        name: &str,
        category: &str,
        features: Option<Vec<String>>,
    ) -> Result<GeneratedDescription, ViewError> {
        let request = DescriptionRequest {
            product_name: name.trim().to_string(),
            category: category.trim().to_string(),
            features,
        };
        let api = self.session.api();
        self.describe
            .run(
                async {
                    check_description_request(&request)?;
                    api.generate_description(&request).await
                },
                |_| {},
            )
            .await
    }
}

fn check_description_request(request: &DescriptionRequest) -> Result<(), ApiError> {
    let mut details = Vec::new();
    for (field, value) in [("name", &request.product_name), ("category", &request.category)] {
        if value.is_empty() {
            details.push(FieldIssue {
                code: "too_small".to_string(),
                expected: None,
                received: None,
                path: vec![PathSegment::Key(field.to_string())],
                message: format!("Enter a product {field} first"),
            });
        }
    }
    if details.is_empty() {
        return Ok(());
    }
    Err(ApiError::Validation(ValidationError {
        message: "Product name and category are required".to_string(),
        details,
    }))
}

/// Edit form for an existing product.
pub struct EditProductView<T> {
    session: CatalogSession<T>,
    id: String,
    update: MutationTrigger,
}

impl<T: Transport> EditProductView<T> {
    pub(crate) fn new(session: CatalogSession<T>, id: &str) -> Self {
        Self {
            session,
            id: id.to_string(),
            update: MutationTrigger::new("update_product"),
        }
    }

    pub fn product(&self) -> QueryHandle<Product> {
        self.session.product(&self.id)
    }

    pub fn update_state(&self) -> &MutationTrigger {
        &self.update
    }

    /// Save changes and show the product page.
    pub async fn update_product(&self, patch: &ProductPatch) -> Result<Product, ViewError> {
        let api = self.session.api();
        self.update
            .run(api.update_product(&self.id, patch), |_| {
                let [products, searches, categories] = product_lists();
                self.session
                    .invalidate(&[products, QueryKey::product(&self.id), searches, categories]);
                self.session.navigate(Route::Product(self.id.clone()));
            })
            .await
    }
}

/// Form values as typed, before conversion. Used to prefill the edit form.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProductForm {
    pub name: String,
    pub description: String,
    pub category: String,
    pub price: String,
    pub image_url: String,
}

impl From<&Product> for ProductForm {
    fn from(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            category: product.category.clone(),
            price: product.price.to_string(),
            image_url: product.image_url.clone().unwrap_or_default(),
        }
    }
}

impl ProductForm {
    /// Convert to a create payload. An unparsable, non-finite or negative
    /// price is reported on the `price` field; an empty image URL is omitted.
    pub fn to_new_product(&self) -> Result<NewProduct, ViewError> {
        let price = parse_price(&self.price).map_err(|err| ViewError::from(ApiError::from(err)))?;
        let image_url = Some(self.image_url.trim().to_string()).filter(|url| !url.is_empty());
        Ok(NewProduct {
            name: self.name.clone(),
            description: self.description.clone(),
            category: self.category.clone(),
            price,
            image_url,
        })
    }

    pub fn to_patch(&self) -> Result<ProductPatch, ViewError> {
        self.to_new_product().map(ProductPatch::from)
    }
}

/// `f64` parsing accepts `NaN` and `inf`, which serialize as `null`.
fn parse_price(text: &str) -> Result<f64, ValidationError> {
    let price = text
        .trim()
        .parse::<f64>()
        .map_err(|_| ValidationError::field("price", "invalid_type", "Price must be a number"))?;
    if !price.is_finite() {
        return Err(ValidationError::field("price", "invalid_type", "Price must be a number"));
    }
    if price < 0.0 {
        return Err(ValidationError::field("price", "too_small", "Price must be non-negative"));
    }
    Ok(price)
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    #[test]
    fn description_request_requires_name_and_category() {
        let request = DescriptionRequest {
            product_name: String::new(),
            category: "Home".to_string(),
            features: None,
        };
        let err = ViewError::from(check_description_request(&request).unwrap_err());
        match err {
            ViewError::Fields(fields) => {
                assert_eq!(fields.len(), 1);
                assert!(fields.contains_key("name"));
            }
            other => panic!("expected field errors, got {other:?}"),
        }
    }

    #[test]
    fn form_converts_to_payload() {
        let form = ProductForm {
            name: "Lamp".to_string(),
            description: "Bright".to_string(),
            category: "Home".to_string(),
            price: " 12.50 ".to_string(),
            image_url: "  ".to_string(),
        };
        let product = form.to_new_product().unwrap();
        assert_eq!(product.price, 12.5);
        assert_eq!(product.image_url, None);
        assert_eq!(form.to_patch().unwrap().name.as_deref(), Some("Lamp"));
    }

    #[test]
    fn form_rejects_unparsable_price() {
        let form = ProductForm {
            price: "twelve".to_string(),
            ..ProductForm::default()
        };
        let err = form.to_new_product().unwrap_err();
        assert!(matches!(err, ViewError::Fields(fields) if fields.contains_key("price")));
    }

    #[test]
    fn form_rejects_non_finite_and_negative_prices() {
        for (price, message) in [
            ("NaN", "Price must be a number"),
            ("inf", "Price must be a number"),
            ("-inf", "Price must be a number"),
            ("-5", "Price must be non-negative"),
        ] {
            let form = ProductForm {
                price: price.to_string(),
                ..ProductForm::default()
            };
            let err = form.to_new_product().unwrap_err();
            assert_eq!(
                err,
                ViewError::Fields(BTreeMap::from([("price".to_string(), message.to_string())])),
                "price {price:?}"
            );
            assert!(form.to_patch().is_err());
        }

        let form = ProductForm {
            price: "0".to_string(),
            ..ProductForm::default()
        };
        assert_eq!(form.to_new_product().unwrap().price, 0.0);
    }
}
