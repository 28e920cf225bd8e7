//! Full catalog lifecycle against the live mock server.
//!
//! # Design
//! Starts the mock server on a random port, then exercises every API
//! operation over real HTTP through `ReqwestTransport`. Validates that the
//! core's request building and response parsing agree with the server's
//! schema end to end.

use std::sync::Arc;

use catalog_core::{
    ApiError, CatalogApi, CatalogClient, CatalogSession, ClientConfig, DescriptionRequest, NewProduct,
    ProductPatch, ReqwestTransport, ReviewInput, Route, RouteLog,
};

async fn start_server() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(mock_server::run(listener));
    format!("http://{addr}")
}

fn lamp() -> NewProduct {
    NewProduct {
        name: "Desk Lamp".to_string(),
        description: "Warm light for late nights".to_string(),
        category: "Home".to_string(),
        price: 24.0,
        image_url: None,
    }
}

#[tokio::test(flavor = "multi_thread")]
async fn catalog_lifecycle() {
    let base_url = start_server().await;
    let api = CatalogApi::new(CatalogClient::new(&base_url), ReqwestTransport::new());

    // Step 1: empty catalog.
    let page = api.list_products(1, None).await.unwrap();
    assert!(page.items().is_empty());
    assert_eq!(page.total_pages, 1);
    assert!(api.list_categories().await.unwrap().is_empty());

    // Step 2: create.
    let created = api.create_product(&lamp()).await.unwrap();
    assert_eq!(created.name, "Desk Lamp");
    assert_eq!(created.average_rating, 0.0);
    let id = created.id.clone();

    // Step 3: read it back every way.
    assert_eq!(api.get_product(&id).await.unwrap(), created);
    let page = api.list_products(1, Some("Home")).await.unwrap();
    assert_eq!(page.items().len(), 1);
    assert!(api.list_products(1, Some("Office")).await.unwrap().items().is_empty());
    assert_eq!(api.search_products("lamp").await.unwrap().len(), 1);
    assert_eq!(api.list_categories().await.unwrap(), vec!["Home".to_string()]);

    // Step 4: partial update.
    let patch = ProductPatch {
        price: Some(19.5),
        ..ProductPatch::default()
    };
    let updated = api.update_product(&id, &patch).await.unwrap();
    assert_eq!(updated.price, 19.5);
    assert_eq!(updated.name, "Desk Lamp");

    // Step 5: reviews move the average rating.
    let review = api
        .create_review(
            &id,
            &ReviewInput {
                author: "Ada".to_string(),
                rating: 5,
                comment: "Lovely".to_string(),
            },
        )
        .await
        .unwrap();
    api.create_review(
        &id,
        &ReviewInput {
            author: "Grace".to_string(),
            rating: 2,
            comment: "Flickers".to_string(),
        },
    )
    .await
    .unwrap();
    assert_eq!(api.get_product(&id).await.unwrap().average_rating, 3.5);

    let mut input = ReviewInput::from(&review);
    input.rating = 4;
    let edited = api.update_review(&id, &review.id, &input).await.unwrap();
    assert_eq!(edited.rating, 4);
    assert_eq!(api.get_product(&id).await.unwrap().average_rating, 3.0);

    api.delete_review(&id, &review.id).await.unwrap();
    assert_eq!(api.list_reviews(&id).await.unwrap().len(), 1);

    // Step 6: description generator.
    let generated = api
        .generate_description(&DescriptionRequest {
            product_name: "Desk Lamp".to_string(),
            category: "Home".to_string(),
            features: Some(vec!["dimmable".to_string()]),
        })
        .await
        .unwrap();
    assert!(generated.description.contains("Desk Lamp"));

    // Step 7: delete, then everything about it is gone.
    api.delete_product(&id).await.unwrap();
    assert_eq!(api.get_product(&id).await, Err(ApiError::NotFound));
    assert_eq!(api.list_reviews(&id).await, Err(ApiError::NotFound));
    assert_eq!(api.delete_product(&id).await, Err(ApiError::NotFound));
    assert!(api.list_products(1, None).await.unwrap().items().is_empty());
}

#[tokio::test(flavor = "multi_thread")]
async fn server_validation_becomes_field_errors() {
    let base_url = start_server().await;
    let api = CatalogApi::new(CatalogClient::new(&base_url), ReqwestTransport::new());

    let mut input = lamp();
    input.price = -3.0;
    input.name = String::new();
    let err = api.create_product(&input).await.unwrap_err();
    let validation = err.validation().expect("validation error");
    assert_eq!(validation.message, "Validation failed");
    let fields = validation.field_errors();
    assert!(fields.contains_key("price"));
    assert!(fields.contains_key("name"));
}

#[tokio::test(flavor = "multi_thread")]
async fn unreachable_server_is_a_network_error() {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let api = CatalogApi::new(CatalogClient::new(&format!("http://{addr}")), ReqwestTransport::new());
    let err = api.list_categories().await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(catalog_core::TransportError::Network(_))));
}

#[tokio::test(flavor = "multi_thread")]
async fn connected_session_drives_views_over_http() {
    let base_url = start_server().await;
    let config = ClientConfig::new(&format!("{base_url}/")).unwrap();
    let routes = Arc::new(RouteLog::new());
    let session = CatalogSession::connect(&config, routes.clone());

    let list = session.product_list();
    let mut page = list.products();
    assert!(page.settled().await.unwrap().items().is_empty());

    let created = session.add_product().create_product(&lamp()).await.unwrap();
    assert_eq!(routes.last(), Some(Route::Back));
    assert_eq!(page.settled().await.unwrap().items(), &[created.clone()]);

    let mut categories = list.categories();
    assert_eq!(categories.settled().await.unwrap(), vec!["Home".to_string()]);

    session.teardown();
    assert!(session.cache().is_empty());
    let detail = session.product_detail(&created.id);
    assert_eq!(detail.product().settled().await.unwrap(), created);
}
