//! Integration tests for sign-in, sessions and OAuth.

#![allow(clippy::unwrap_used, clippy::indexing_slicing)]

use reqwest::StatusCode;
use serde_json::{Value, json};
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, ResponseTemplate};

use prizey_integration_tests::TestApp;

async fn session_user(app: &TestApp, client: &reqwest::Client) -> Value {
    let body: Value = client
        .get(app.url("/api/auth/session"))
        .send()
        .await
        .unwrap()
        .json()
        .await
        .unwrap();
    body["user"].clone()
}

#[tokio::test]
async fn test_health_endpoints() {
    let app = TestApp::spawn().await;

    let resp = app.client.get(app.url("/health")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(resp.text().await.unwrap(), "ok");

    let resp = app.client.get(app.url("/health/ready")).send().await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn test_register_signs_in() {
    let app = TestApp::spawn().await;

    assert!(session_user(&app, &app.client).await.is_null());

    let body = app
        .sign_up(&app.client, "Ana@Example.com", "correct horse")
        .await;
    assert_eq!(body["user"]["email"], "ana@example.com");

    let user = session_user(&app, &app.client).await;
    assert_eq!(user["email"], "ana@example.com");

    // Another browser is still signed out
    assert!(session_user(&app, &app.new_client()).await.is_null());
}

#[tokio::test]
async fn test_register_validation() {
    let app = TestApp::spawn().await;
    app.sign_up(&app.client, "ana@example.com", "correct horse")
        .await;

    let cases = [
        (json!({"email": "ana@example.com", "password": "another one"}), StatusCode::CONFLICT),
        (json!({"email": "not-an-email", "password": "correct horse"}), StatusCode::BAD_REQUEST),
        (json!({"email": "bo@example.com", "password": "short"}), StatusCode::BAD_REQUEST),
    ];

    for (payload, expected) in cases {
        let resp = app
            .new_client()
            .post(app.url("/api/auth/register"))
            .json(&payload)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), expected, "payload {payload}");

        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["success"], false);
        assert!(body["error"].is_string());
    }
}

#[tokio::test]
async fn test_login_checks_password() {
    let app = TestApp::spawn().await;
    app.sign_up(&app.new_client(), "ana@example.com", "correct horse")
        .await;

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({"email": "ana@example.com", "password": "wrong horse"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body: Value = resp.json().await.unwrap();
    assert_eq!(body["error"], "Invalid credentials");

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({"email": "ana@example.com", "password": "correct horse"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(session_user(&app, &app.client).await["email"], "ana@example.com");
}

#[tokio::test]
async fn test_login_registers_unknown_email() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({"email": "new@example.com", "password": "first time in"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    // Second sign-in uses the stored password
    let resp = app
        .new_client()
        .post(app.url("/api/auth/login"))
        .json(&json!({"email": "new@example.com", "password": "something else"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_login_rejects_oauth_only_user() {
    let app = TestApp::spawn().await;
    app.seed_user("oauth@example.com", "OAuth Only").await;

    let resp = app
        .client
        .post(app.url("/api/auth/login"))
        .json(&json!({"email": "oauth@example.com", "password": "any password"}))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_clears_session() {
    let app = TestApp::spawn().await;
    app.sign_up(&app.client, "ana@example.com", "correct horse")
        .await;

    let resp = app
        .client
        .post(app.url("/api/auth/logout"))
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    assert!(session_user(&app, &app.client).await.is_null());
}

#[tokio::test]
async fn test_oauth_unknown_or_unconfigured_provider() {
    let app = TestApp::spawn().await;

    for provider in ["gitlab", "google"] {
        let resp = app
            .client
            .get(app.url(&format!("/api/auth/oauth/{provider}/login")))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{provider}");
    }
}

fn location(resp: &reqwest::Response) -> String {
    resp.headers()["location"].to_str().unwrap().to_string()
}

/// Start the flow and return the state the server put in the redirect.
async fn start_github_login(app: &TestApp) -> String {
    let resp = app
        .client
        .get(app.url("/api/auth/oauth/github/login"))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());

    let location = location(&resp);
    assert!(location.starts_with(&format!("{}/login/oauth/authorize?", app.github.uri())));
    assert!(location.contains("client_id=test-client"));

    location
        .split("state=")
        .nth(1)
        .unwrap()
        .split('&')
        .next()
        .unwrap()
        .to_string()
}

#[tokio::test]
async fn test_github_sign_in() {
    let app = TestApp::spawn().await;

    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(body_string_contains("code=gh-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "gho_test",
            "token_type": "bearer"
        })))
        .mount(&app.github)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": 4242,
            "login": "octo",
            "name": null,
            "email": null
        })))
        .mount(&app.github)
        .await;
    Mock::given(method("GET"))
        .and(path("/user/emails"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"email": "old@example.com", "primary": false, "verified": true},
            {"email": "octo@example.com", "primary": true, "verified": true}
        ])))
        .mount(&app.github)
        .await;

    let state = start_github_login(&app).await;

    let resp = app
        .client
        .get(app.url(&format!(
            "/api/auth/oauth/github/callback?code=gh-code&state={state}"
        )))
        .send()
        .await
        .unwrap();
    assert!(resp.status().is_redirection());
    assert_eq!(location(&resp), app.url("/home"));

    let user = session_user(&app, &app.client).await;
    assert_eq!(user["email"], "octo@example.com");
    assert_eq!(user["name"], "octo");

    // The state is single use
    let resp = app
        .client
        .get(app.url(&format!(
            "/api/auth/oauth/github/callback?code=gh-code&state={state}"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&resp), app.url("/sign-in?error=invalid_state"));
}

#[tokio::test]
async fn test_github_callback_failures_redirect_to_sign_in() {
    let app = TestApp::spawn().await;

    let resp = app
        .client
        .get(app.url("/api/auth/oauth/github/callback?error=access_denied"))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&resp), app.url("/sign-in?error=access_denied"));

    let resp = app
        .client
        .get(app.url("/api/auth/oauth/github/callback?code=abc&state=forged"))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&resp), app.url("/sign-in?error=invalid_state"));

    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "bad_verification_code"
        })))
        .mount(&app.github)
        .await;

    let state = start_github_login(&app).await;
    let resp = app
        .client
        .get(app.url(&format!(
            "/api/auth/oauth/github/callback?code=stale&state={state}"
        )))
        .send()
        .await
        .unwrap();
    assert_eq!(location(&resp), app.url("/sign-in?error=token_exchange"));
    assert!(session_user(&app, &app.client).await.is_null());
}
