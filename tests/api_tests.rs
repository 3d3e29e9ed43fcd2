//! Router-level tests against the in-memory store

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt;

use bookshelf_server::{api, repository::MemoryStore, AppConfig, AppState};

const FORM: &str = "application/x-www-form-urlencoded";

fn app() -> Router {
    let store = Arc::new(MemoryStore::new());
    api::create_router(AppState::new(AppConfig::default(), store))
}

async fn send(app: &Router, request: Request<Body>) -> Response {
    app.clone()
        .oneshot(request)
        .await
        .expect("router never fails")
}

async fn body_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX)
        .await
        .expect("Failed to read body");
    serde_json::from_slice(&bytes).expect("Failed to parse response")
}

fn location(response: &Response) -> &str {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
        .expect("No location header")
}

fn json_request(method: &str, uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_with_session(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

fn get_with_session(uri: &str, cookie: &str) -> Request<Body> {
    Request::builder()
        .uri(uri)
        .header(header::COOKIE, cookie)
        .body(Body::empty())
        .unwrap()
}

/// Register a user and return the `name=value` session cookie
async fn register(app: &Router, username: &str) -> String {
    let response = send(
        app,
        Request::builder()
            .method("POST")
            .uri("/accounts/register/")
            .header(header::CONTENT_TYPE, FORM)
            .body(Body::from(format!(
                "username={}&password=page-turner-1&password_confirm=page-turner-1",
                username
            )))
            .unwrap(),
    )
    .await;

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    let set_cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .expect("No session cookie");
    set_cookie.split(';').next().unwrap().to_string()
}

async fn create_category(app: &Router, name: &str) -> i64 {
    let response = send(app, json_request("POST", "/api/categories/", json!({ "name": name }))).await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_i64().unwrap()
}

async fn create_book(app: &Router, category_id: i64, title: &str, total_copies: i64) -> i64 {
    let response = send(
        app,
        json_request(
            "POST",
            "/api/books/",
            json!({
                "title": title,
                "author": "Ursula K. Le Guin",
                "category_id": category_id,
                "total_copies": total_copies
            }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    body_json(response).await["id"].as_i64().unwrap()
}

async fn book(app: &Router, id: i64) -> Value {
    let response = send(app, get(&format!("/api/books/{}/", id))).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

#[tokio::test]
async fn test_health_check() {
    let app = app();
    let response = send(&app, get("/health")).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["status"], "healthy");

    let response = send(&app, get("/ready")).await;
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_borrow_and_return_flow() {
    let app = app();
    let category = create_category(&app, "Fiction").await;
    let book_id = create_book(&app, category, "The Dispossessed", 1).await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;

    let borrow_uri = format!("/books/{}/borrow/", book_id);
    let response = send(&app, post_with_session(&borrow_uri, &alice)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/my-history/");
    assert_eq!(book(&app, book_id).await["available_copies"], 0);

    let response = send(&app, post_with_session(&borrow_uri, &bob)).await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
    let view = body_json(response).await;
    assert_eq!(view["view"], "error");
    assert_eq!(view["message"], "No copies available.");

    let history = body_json(send(&app, get_with_session("/my-history/", &alice)).await).await;
    let borrow_id = history["borrows"][0]["id"].as_i64().unwrap();
    assert_eq!(history["borrows"][0]["is_returned"], false);

    // Another user's return attempt is redirected without effect.
    let return_uri = format!("/borrows/{}/return/", borrow_id);
    let response = send(&app, post_with_session(&return_uri, &bob)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(book(&app, book_id).await["available_copies"], 0);

    let response = send(&app, post_with_session(&return_uri, &alice)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/my-history/");
    assert_eq!(book(&app, book_id).await["available_copies"], 1);

    // Returning twice is a no-op.
    let response = send(&app, post_with_session(&return_uri, &alice)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(book(&app, book_id).await["available_copies"], 1);

    let history = body_json(send(&app, get_with_session("/my-history/", &alice)).await).await;
    assert_eq!(history["borrows"][0]["is_returned"], true);
    assert!(history["borrows"][0]["returned_at"].is_string());

    let bob_history = body_json(send(&app, get_with_session("/my-history/", &bob)).await).await;
    assert_eq!(bob_history["borrows"].as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_borrow_requires_login() {
    let app = app();
    let category = create_category(&app, "Fiction").await;
    let book_id = create_book(&app, category, "Lathe of Heaven", 1).await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri(format!("/books/{}/borrow/", book_id))
            .body(Body::empty())
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(
        location(&response),
        format!("/accounts/login/?next=%2Fbooks%2F{}%2Fborrow%2F", book_id)
    );
    assert_eq!(book(&app, book_id).await["available_copies"], 1);

    let response = send(&app, get("/my-history/")).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_login_and_logout() {
    let app = app();
    register(&app, "carol").await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/accounts/login/")
            .header(header::CONTENT_TYPE, FORM)
            .body(Body::from("username=carol&password=wrong-password"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/accounts/login/")
            .header(header::CONTENT_TYPE, FORM)
            .body(Body::from("username=carol&password=page-turner-1&next=%2Fmy-history%2F"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/my-history/");
    let cookie = response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
        .unwrap()
        .split(';')
        .next()
        .unwrap()
        .to_string();

    let response = send(&app, get_with_session("/my-history/", &cookie)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["username"], "carol");

    let response = send(&app, post_with_session("/accounts/logout/", &cookie)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(response.headers().get(header::SET_COOKIE).is_some());
}

#[tokio::test]
async fn test_register_rejects_duplicates_and_weak_passwords() {
    let app = app();
    register(&app, "dave").await;

    let request = |body: &'static str| {
        Request::builder()
            .method("POST")
            .uri("/accounts/register/")
            .header(header::CONTENT_TYPE, FORM)
            .body(Body::from(body))
            .unwrap()
    };

    let response = send(
        &app,
        request("username=dave&password=page-turner-1&password_confirm=page-turner-1"),
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);

    let response = send(&app, request("username=erin&password=1234&password_confirm=1234")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_create_book_missing_author() {
    let app = app();
    let category = create_category(&app, "Science").await;

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/books/",
            json!({ "title": "Cosmos", "category_id": category }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "BadValue");

    let books = body_json(send(&app, get("/api/books/")).await).await;
    assert_eq!(books.as_array().unwrap().len(), 0);
}

#[tokio::test]
async fn test_create_book_bad_json_and_unknown_category() {
    let app = app();

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/api/books/")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = send(
        &app,
        json_request(
            "POST",
            "/api/books/",
            json!({ "title": "Cosmos", "author": "Carl Sagan", "category_id": 99 }),
        ),
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_book_read_projection() {
    let app = app();
    let category = create_category(&app, "Science").await;
    let response = send(
        &app,
        json_request(
            "POST",
            "/api/books/",
            json!({ "title": "Cosmos", "author": "Carl Sagan", "category_id": category }),
        ),
    )
    .await;
    let id = body_json(response).await["id"].as_i64().unwrap();

    let book = book(&app, id).await;
    assert_eq!(book["category"], "Science");
    assert_eq!(book["category_id"], category);
    assert_eq!(book["total_copies"], 1);
    assert_eq!(book["available_copies"], 1);

    let response = send(&app, get("/api/books/999/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_update_below_borrowed_is_rejected() {
    let app = app();
    let category = create_category(&app, "Fiction").await;
    let book_id = create_book(&app, category, "Always Coming Home", 2).await;
    let alice = register(&app, "alice").await;
    let bob = register(&app, "bob").await;
    let borrow_uri = format!("/books/{}/borrow/", book_id);
    send(&app, post_with_session(&borrow_uri, &alice)).await;
    send(&app, post_with_session(&borrow_uri, &bob)).await;

    let uri = format!("/api/books/{}/", book_id);
    let response = send(&app, json_request("PUT", &uri, json!({ "total_copies": 1 }))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let stored = book(&app, book_id).await;
    assert_eq!(stored["total_copies"], 2);
    assert_eq!(stored["available_copies"], 0);

    let response = send(&app, json_request("PUT", &uri, json!({ "total_copies": 4 }))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let stored = book(&app, book_id).await;
    assert_eq!(stored["total_copies"], 4);
    assert_eq!(stored["available_copies"], 2);
}

#[tokio::test]
async fn test_delete_rules() {
    let app = app();
    let category = create_category(&app, "Fiction").await;
    let lent = create_book(&app, category, "Tehanu", 1).await;
    let unused = create_book(&app, category, "Earthsea", 1).await;
    let alice = register(&app, "alice").await;
    send(&app, post_with_session(&format!("/books/{}/borrow/", lent), &alice)).await;

    let response = send(&app, json_request("DELETE", &format!("/api/books/{}/", lent), json!({}))).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    book(&app, lent).await;

    let response = send(&app, json_request("DELETE", &format!("/api/books/{}/", unused), json!({}))).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);
    let response = send(&app, get(&format!("/api/books/{}/", unused))).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // The category is still protected by the remaining book.
    let response = send(
        &app,
        json_request("DELETE", &format!("/api/categories/{}/", category), json!({})),
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_catalog_filter_and_detail() {
    let app = app();
    let fiction = create_category(&app, "Fiction").await;
    let science = create_category(&app, "Science").await;
    create_book(&app, fiction, "The Word for World Is Forest", 1).await;
    let cosmos = create_book(&app, science, "Cosmos", 3).await;

    let catalog = body_json(send(&app, get("/")).await).await;
    let titles: Vec<_> = catalog["books"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["Cosmos", "The Word for World Is Forest"]);
    assert_eq!(catalog["categories"][0]["name"], "Fiction");
    assert!(catalog["selected_category"].is_null());

    let filtered = body_json(send(&app, get(&format!("/?category={}", science))).await).await;
    assert_eq!(filtered["books"].as_array().unwrap().len(), 1);
    assert_eq!(filtered["selected_category"], science);

    let response = send(&app, get("/?category=abc")).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let detail = body_json(send(&app, get(&format!("/books/{}/", cosmos))).await).await;
    assert_eq!(detail["book"]["title"], "Cosmos");
    assert_eq!(detail["book"]["can_borrow"], true);

    let response = send(&app, get("/books/999/")).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_get_on_borrow_and_return_redirects_after_login() {
    let app = app();
    let category = create_category(&app, "Fiction").await;
    let book_id = create_book(&app, category, "Four Ways to Forgiveness", 1).await;
    let alice = register(&app, "alice").await;

    // Following `next` after login arrives as a GET.
    let response = send(&app, get_with_session(&format!("/books/{}/borrow/", book_id), &alice)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), format!("/books/{}/", book_id));
    assert_eq!(book(&app, book_id).await["available_copies"], 1);

    let response = send(&app, get_with_session("/borrows/1/return/", &alice)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/my-history/");

    let response = send(&app, get(&format!("/books/{}/borrow/", book_id))).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert!(location(&response).starts_with("/accounts/login/?next="));
}

#[tokio::test]
async fn test_login_page() {
    let app = app();

    let response = send(&app, get("/accounts/login/?next=%2Fmy-history%2F")).await;
    assert_eq!(response.status(), StatusCode::OK);
    let view = body_json(response).await;
    assert_eq!(view["view"], "login");
    assert_eq!(view["next"], "/my-history/");

    let alice = register(&app, "alice").await;
    let response = send(&app, get_with_session("/accounts/login/", &alice)).await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_login_ignores_off_site_next() {
    let app = app();
    register(&app, "alice").await;

    let response = send(
        &app,
        Request::builder()
            .method("POST")
            .uri("/accounts/login/")
            .header(header::CONTENT_TYPE, FORM)
            .body(Body::from(
                "username=alice&password=page-turner-1&next=%2F%5Cevil.example",
            ))
            .unwrap(),
    )
    .await;
    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response), "/");
}

#[tokio::test]
async fn test_history_page_lists_newest_first() {
    let app = app();
    let category = create_category(&app, "Fiction").await;
    let first = create_book(&app, category, "The Dispossessed", 1).await;
    let second = create_book(&app, category, "The Telling", 1).await;
    let alice = register(&app, "alice").await;

    send(&app, post_with_session(&format!("/books/{}/borrow/", first), &alice)).await;
    send(&app, post_with_session(&format!("/books/{}/borrow/", second), &alice)).await;

    let history = body_json(send(&app, get_with_session("/my-history/", &alice)).await).await;
    let titles: Vec<_> = history["borrows"]
        .as_array()
        .unwrap()
        .iter()
        .map(|b| b["book_title"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(titles, ["The Telling", "The Dispossessed"]);
}
