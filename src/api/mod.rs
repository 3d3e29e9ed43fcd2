//! HTTP handlers, extractors and routing

pub mod accounts;
pub mod books;
pub mod categories;
pub mod health;
pub mod openapi;
pub mod pages;

use axum::{
    async_trait,
    extract::{FromRequest, FromRequestParts},
    http::request::Parts,
    response::{IntoResponse, Redirect, Response},
    routing::{delete, get, post},
    RequestPartsExt, Router,
};
use axum_extra::{
    extract::cookie::CookieJar,
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    compression::CompressionLayer,
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

use crate::{error::AppError, models::UserClaims, AppState};

pub const LOGIN_PATH: &str = "/accounts/login/";
pub const HISTORY_PATH: &str = "/my-history/";
pub const CATALOG_PATH: &str = "/";

/// JSON body extractor whose rejections are `AppError::Validation` (400)
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// Form body extractor whose rejections are `AppError::Validation` (400)
#[derive(FromRequest)]
#[from_request(via(axum::Form), rejection(AppError))]
pub struct FormData<T>(pub T);

/// Authenticated user, read from the session cookie or a Bearer token
pub struct SessionUser(pub UserClaims);

/// Rejection for protected pages: send the visitor to the login page
pub struct LoginRedirect {
    next: String,
}

impl IntoResponse for LoginRedirect {
    fn into_response(self) -> Response {
        Redirect::to(&format!("{}?next={}", LOGIN_PATH, urlencoding::encode(&self.next)))
            .into_response()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for SessionUser {
    type Rejection = LoginRedirect;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let redirect = LoginRedirect {
            next: parts.uri.path().to_string(),
        };

        let bearer = parts
            .extract::<TypedHeader<Authorization<Bearer>>>()
            .await
            .ok()
            .map(|TypedHeader(auth)| auth.token().to_string());

        let token = bearer.or_else(|| {
            CookieJar::from_headers(&parts.headers)
                .get(&state.config.auth.cookie_name)
                .map(|cookie| cookie.value().to_string())
        });

        let Some(token) = token else {
            return Err(redirect);
        };

        state
            .services
            .accounts
            .verify_token(&token)
            .map(SessionUser)
            .map_err(|e| {
                tracing::debug!("Rejected session token: {}", e);
                redirect
            })
    }
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let media = ServeDir::new(&state.config.media.root);

    let routes = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Catalog pages
        .route(CATALOG_PATH, get(pages::catalog))
        .route("/books/:id/", get(pages::book_detail))
        .route(
            "/books/:id/borrow/",
            get(pages::borrow_redirect).post(pages::borrow_book),
        )
        .route(
            "/borrows/:id/return/",
            get(pages::return_redirect).post(pages::return_borrow),
        )
        .route(HISTORY_PATH, get(pages::my_history))
        // Accounts
        .route("/accounts/register/", post(accounts::register))
        .route(LOGIN_PATH, get(accounts::login_form).post(accounts::login))
        .route("/accounts/logout/", post(accounts::logout))
        // Books API
        .route("/api/books/", get(books::list_books).post(books::create_book))
        .route(
            "/api/books/:id/",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        // Categories API
        .route(
            "/api/categories/",
            get(categories::list_categories).post(categories::create_category),
        )
        .route("/api/categories/:id/", delete(categories::delete_category))
        .with_state(state);

    Router::new()
        .merge(routes)
        .nest_service("/media", media)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(cors)
}
