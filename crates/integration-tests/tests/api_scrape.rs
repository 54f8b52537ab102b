//! Integration tests for `POST /api/scrape`.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::{Value, json};

use prizey_integration_tests::TestApp;

async fn scrape(app: &TestApp, body: Value) -> (StatusCode, Value) {
    let resp = app
        .client
        .post(app.url("/api/scrape"))
        .json(&body)
        .send()
        .await
        .unwrap();
    (resp.status(), resp.json().await.unwrap())
}

#[tokio::test]
async fn test_blank_query_is_rejected() {
    let app = TestApp::spawn().await;

    for body in [json!({}), json!({"query": "   "})] {
        let (status, body) = scrape(&app, body).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({"success": false, "error": "Search query is required"})
        );
    }
    assert!(app.source.searches().is_empty());
}

#[tokio::test]
async fn test_non_string_query_is_json_400() {
    let app = TestApp::spawn().await;

    let (status, body) = scrape(&app, json!({"query": 42})).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body, json!({"success": false, "error": "Invalid request body"}));
    assert!(app.source.searches().is_empty());
}

#[tokio::test]
async fn test_search_maps_and_saves_results() {
    let app = TestApp::spawn().await;
    app.source.respond_with(vec![
        json!({
            "asin": "B0KETTLE01",
            "title": "Electric Kettle 1.5L",
            "price": {"value": 1299, "currency": "INR"},
            "brand": "Prestige",
            "stars": 4.3,
            "reviewsCount": 5120,
            "inStock": true,
            "url": "https://www.amazon.in/dp/B0KETTLE01"
        }),
        json!({"asin": "B0NOTITLE1", "price": 499}),
        json!({"title": "Kettle without details"}),
    ]);

    let (status, body) = scrape(&app, json!({"query": "electric kettle"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        app.source.searches(),
        ["https://www.amazon.in/s?k=electric%20kettle"]
    );

    assert_eq!(body["success"], true);
    assert_eq!(body["total"], 2);

    let first = &body["products"][0];
    assert_eq!(first["price"], json!({"value": 1299.0, "currency": "INR"}));
    assert_eq!(first["metadata"]["source"], "Amazon India");
    assert_eq!(first["metadata"]["searchQuery"], "electric kettle");

    let second = &body["products"][1];
    assert_eq!(second["brand"], "Unknown Brand");
    assert_eq!(second["inStock"], false);
    assert_eq!(second["url"], "https://www.amazon.in/s?k=electric%20kettle");

    let saved = body["savedProducts"].as_array().unwrap();
    assert_eq!(saved.len(), 2);
    assert_eq!(saved[0]["asin"], "B0KETTLE01");
    assert_eq!(saved[0]["priceHistory"][0]["source"], "Scraper");

    // Saved products show up in the catalog
    let catalog: Value = app
        .client
        .get(app.url("/api/product?q=kettle"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    assert_eq!(catalog["products"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_empty_results_still_succeed() {
    let app = TestApp::spawn().await;

    let (status, body) = scrape(&app, json!({"query": "unobtainium"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["total"], 0);
    assert_eq!(body["savedProducts"], json!([]));

    // Every item dropped during mapping
    app.source
        .respond_with(vec![json!({"asin": "B0NOTITLE1"}), json!({"price": 10})]);
    let (status, body) = scrape(&app, json!({"query": "unobtainium"})).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["products"], json!([]));
    assert_eq!(body["savedProducts"], json!([]));
}

#[tokio::test]
async fn test_actor_failure_is_500() {
    let app = TestApp::spawn().await;
    app.source.fail();

    let (status, body) = scrape(&app, json!({"query": "kettle"})).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(
        body,
        json!({"success": false, "error": "An unexpected error occurred during product search"})
    );
}
