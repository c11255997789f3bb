//! End-to-end request pipeline scenarios against a mock backend

use std::time::Duration;

use serde_json::json;
use shopdesk_client::{ApiError, ApiResponse, ProductFilter, ProductPatch, RequestOptions};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

use crate::common::{record, settle, TestConsole};

#[test_log::test(tokio::test)]
async fn test_login_then_list_sends_bearer_token() {
    let app = TestConsole::start().await.unwrap();
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"token": "abc"})))
        .expect(1)
        .mount(&app.server)
        .await;
    Mock::given(method("GET"))
        .and(path("/products"))
        .and(query_param("page", "1"))
        .and(header("authorization", "Bearer abc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([
                    {"id": 1, "name": "Wireless Mouse", "description": "", "price": 29.99, "stock": 150},
                    {"id": 2, "name": "Keyboard", "description": "", "price": 89.0, "stock": 3}
                ]))
                .insert_header("X-Total-Count", "42"),
        )
        .expect(1)
        .mount(&app.server)
        .await;

    let console = &app.console;
    let (events, _sub) = record(&console.session);
    settle().await;
    assert_eq!(*events.lock().unwrap(), vec![false]);

    console.client.auth().login("admin", "secret").await.unwrap();
    assert_eq!(*events.lock().unwrap(), vec![false, true]);

    let page = console
        .client
        .products()
        .list(1, &ProductFilter::default())
        .await
        .unwrap();
    assert_eq!(page.items.len(), 2);
    assert_eq!(page.total, 42);
    assert_eq!(page.total_pages(shopdesk_client::PER_PAGE), 3);
}

#[test_log::test(tokio::test)]
async fn test_unauthorized_clears_persisted_session_and_restarts() {
    let app = TestConsole::start().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/orders"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({"error": "Token expired"})))
        .mount(&app.server)
        .await;

    let console = &app.console;
    console.session.set_token("abc");
    settle().await;
    let (events, _sub) = record(&console.session);

    let err = console
        .client
        .request("/orders", RequestOptions::get())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized));
    assert!(!console.session.is_authenticated());
    assert_eq!(*events.lock().unwrap(), vec![false]);
    tokio::time::timeout(Duration::from_secs(1), console.restart.requested())
        .await
        .expect("restart was not requested");

    // The cleared session is gone from disk too
    let reopened = app.reopen().unwrap();
    assert!(!reopened.session.is_authenticated());
}

#[test_log::test(tokio::test)]
async fn test_rejected_login_keeps_existing_session() {
    let app = TestConsole::start().await.unwrap();
    Mock::given(method("POST"))
        .and(path("/login"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({"error": "Invalid credentials"})),
        )
        .mount(&app.server)
        .await;

    let console = &app.console;
    console.session.set_token("abc");

    let err = console
        .client
        .auth()
        .login("admin", "wrong")
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::LoginFailed(ref message) if message == "Invalid credentials"));
    assert_eq!(console.session.get_token().as_deref(), Some("abc"));
}

#[test_log::test(tokio::test)]
async fn test_anonymous_request_has_no_authorization_header() {
    let app = TestConsole::start().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/health"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
        .mount(&app.server)
        .await;

    let response = app
        .console
        .client
        .request("/health", RequestOptions::get())
        .await
        .unwrap();
    assert!(matches!(response, ApiResponse::Json(_)));

    let requests = app.server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    assert!(!requests[0].headers.contains_key("authorization"));
}

#[test_log::test(tokio::test)]
async fn test_patch_with_no_content_response() {
    let app = TestConsole::start().await.unwrap();
    Mock::given(method("PATCH"))
        .and(path("/products/7"))
        .and(header("content-type", "application/json"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&app.server)
        .await;

    let console = &app.console;
    console.session.set_token("abc");

    let patch = ProductPatch {
        price: Some(19.99),
        stock: None,
    };
    console.client.products().update(7, &patch).await.unwrap();
    assert!(console.session.is_authenticated());
}

#[test_log::test(tokio::test)]
async fn test_server_error_leaves_session_alone() {
    let app = TestConsole::start().await.unwrap();
    Mock::given(method("GET"))
        .and(path("/users/1"))
        .respond_with(ResponseTemplate::new(500).set_body_json(json!({"error": "boom"})))
        .mount(&app.server)
        .await;

    let console = &app.console;
    console.session.set_token("abc");

    let err = console.client.users().get(1).await.unwrap_err();
    assert!(matches!(
        err,
        ApiError::Response { status: 500, ref message } if message == "boom"
    ));
    assert!(console.session.is_authenticated());
}

mod common;
