//! Catalog pages, rendered as JSON view models

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{
    error::{AppError, AppResult},
    models::{BookResponse, BorrowDetails, Category},
    AppState,
};

use super::{SessionUser, HISTORY_PATH};

#[derive(Debug, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<String>,
}

#[derive(Serialize)]
pub struct CatalogView {
    pub view: &'static str,
    pub books: Vec<BookResponse>,
    pub categories: Vec<Category>,
    pub selected_category: Option<i32>,
}

#[derive(Serialize)]
pub struct BookView {
    pub view: &'static str,
    pub book: BookResponse,
}

#[derive(Serialize)]
pub struct HistoryView {
    pub view: &'static str,
    pub username: String,
    pub borrows: Vec<BorrowDetails>,
}

#[derive(Serialize)]
pub struct ErrorView {
    pub view: &'static str,
    pub message: String,
}

/// Catalog listing with optional `?category=<id>` filter
pub async fn catalog(
    State(state): State<AppState>,
    Query(query): Query<CatalogQuery>,
) -> AppResult<Json<CatalogView>> {
    let selected_category = match query.category.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(raw.parse::<i32>().map_err(|_| {
            AppError::Validation(format!("Invalid category id: {}", raw))
        })?),
    };

    let books = state.services.catalog.list_books(selected_category).await?;
    let categories = state.services.catalog.list_categories().await?;

    Ok(Json(CatalogView {
        view: "book_list",
        books: books.into_iter().map(BookResponse::from).collect(),
        categories,
        selected_category,
    }))
}

/// Book detail
pub async fn book_detail(
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> AppResult<Json<BookView>> {
    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(BookView {
        view: "book_detail",
        book: book.into(),
    }))
}

/// Borrow a copy; on success continue to the history page
pub async fn borrow_book(
    State(state): State<AppState>,
    SessionUser(claims): SessionUser,
    Path(id): Path<i32>,
) -> Response {
    match state.services.borrows.borrow(claims.user_id, id).await {
        Ok(_) => Redirect::to(HISTORY_PATH).into_response(),
        Err(AppError::NoCopiesAvailable { .. }) => (
            StatusCode::CONFLICT,
            Json(ErrorView {
                view: "error",
                message: "No copies available.".to_string(),
            }),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Borrowing only happens on POST; a GET (e.g. following `next` after
/// login) goes back to the book page.
pub async fn borrow_redirect(_session: SessionUser, Path(id): Path<i32>) -> Redirect {
    Redirect::to(&format!("/books/{}/", id))
}

/// Return a borrowed copy. Every outcome lands on the history page,
/// including attempts on another user's borrow.
pub async fn return_borrow(
    State(state): State<AppState>,
    SessionUser(claims): SessionUser,
    Path(id): Path<i32>,
) -> AppResult<Redirect> {
    state.services.borrows.return_borrow(claims.user_id, id).await?;
    Ok(Redirect::to(HISTORY_PATH))
}

/// Returns only happen on POST; a GET lands on the history page.
pub async fn return_redirect(_session: SessionUser, Path(_id): Path<i32>) -> Redirect {
    Redirect::to(HISTORY_PATH)
}

/// The caller's borrowing history, newest first
pub async fn my_history(
    State(state): State<AppState>,
    SessionUser(claims): SessionUser,
) -> AppResult<Json<HistoryView>> {
    let borrows = state.services.borrows.history(claims.user_id).await?;
    Ok(Json(HistoryView {
        view: "my_history",
        username: claims.username().to_string(),
        borrows,
    }))
}
