//! Data-access and cache-invalidation core for the product catalog client.
//!
//! # Overview
//! Sits between page views and the catalog REST backend. Requests are
//! shaped and responses classified without I/O (`CatalogClient`); a
//! `Transport` performs the round-trip; `QueryCache` dedupes reads, serves
//! stale values while revalidating and propagates mutations through prefix
//! invalidation; the view models in `views` compose all of it per page.
//!
//! # Design
//! - `CatalogClient` is stateless and split into `build_*` / `parse_*`, so
//!   the I/O boundary is explicit and testable without a server.
//! - Every read and mutation ends in a discriminated outcome (`ApiError`,
//!   `ViewError`); nothing panics on expected failures.
//! - Shared state is explicit: one `CatalogSession` per user session owns
//!   the cache and the filter store and is passed to each view.
//! - DTOs are defined independently from the mock-server crate; integration
//!   tests catch schema drift.

pub mod api;
pub mod cache;
pub mod client;
pub mod config;
pub mod error;
pub mod filters;
pub mod http;
pub mod key;
pub mod mutation;
pub mod navigation;
pub mod session;
pub mod transport;
pub mod types;
pub mod views;

pub use api::CatalogApi;
pub use cache::{Freshness, QueryCache, QueryState, Subscription};
pub use client::CatalogClient;
pub use config::{ClientConfig, ConfigError};
pub use error::{ApiError, FieldIssue, PathSegment, TransportError, ValidationError};
pub use filters::{FilterReader, FilterStore, Filters};
pub use http::{HttpMethod, HttpRequest, HttpResponse, Transport};
pub use key::{KeyPart, QueryKey};
pub use mutation::{MutationState, MutationTrigger, ViewError};
pub use navigation::{Navigator, Route, RouteLog};
pub use session::{CatalogData, CatalogSession, QueryHandle};
pub use transport::ReqwestTransport;
pub use types::{
    DescriptionRequest, GeneratedDescription, NewProduct, PaginatedProducts, Product, ProductPatch,
    Review, ReviewInput,
};
pub use views::{AddProductView, EditProductView, HomeView, ProductDetailView, ProductForm, ProductListView};
