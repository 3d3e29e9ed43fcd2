//! Book model and copy-count bookkeeping.
//!
//! `available_copies` is only ever changed through the methods on [`Book`],
//! which keep `0 <= available_copies <= total_copies`.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use crate::error::{AppError, AppResult};

/// URL prefix under which cover images are served
pub const MEDIA_URL: &str = "/media/";

/// Book row as stored in the database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Book {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub category_id: i32,
    pub total_copies: i32,
    pub available_copies: i32,
    pub cover_image: Option<String>,
}

impl Book {
    /// Copies currently lent out
    pub fn borrowed_copies(&self) -> i32 {
        self.total_copies - self.available_copies
    }

    pub fn can_borrow(&self) -> bool {
        self.available_copies > 0
    }

    /// Take one copy off the shelf.
    pub fn take_copy(&mut self) -> AppResult<()> {
        if !self.can_borrow() {
            return Err(AppError::NoCopiesAvailable { book_id: self.id });
        }
        self.available_copies -= 1;
        Ok(())
    }

    /// Put one copy back. Clamped to `total_copies` in case the total was
    /// lowered while the copy was out.
    pub fn restore_copy(&mut self) {
        self.available_copies = (self.available_copies + 1).min(self.total_copies);
    }

    /// Change the number of owned copies, shifting `available_copies` by the
    /// same delta.
    pub fn resize(&mut self, total_copies: i32) -> AppResult<()> {
        if total_copies < 0 {
            return Err(AppError::Validation(
                "total_copies must not be negative".to_string(),
            ));
        }
        if total_copies < self.borrowed_copies() {
            return Err(AppError::Validation(
                "total_copies cannot be less than the number of currently borrowed copies"
                    .to_string(),
            ));
        }

        let delta = total_copies - self.total_copies;
        self.total_copies = total_copies;
        self.available_copies = (self.available_copies + delta).max(0);
        Ok(())
    }
}

/// Book joined with its category name
#[derive(Debug, Clone, FromRow)]
pub struct BookDetails {
    pub id: i32,
    pub title: String,
    pub author: String,
    pub category_id: i32,
    pub category_name: String,
    pub total_copies: i32,
    pub available_copies: i32,
    pub cover_image: Option<String>,
}

impl BookDetails {
    pub fn from_parts(book: Book, category_name: String) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            category_id: book.category_id,
            category_name,
            total_copies: book.total_copies,
            available_copies: book.available_copies,
            cover_image: book.cover_image,
        }
    }
}

/// Book projection returned by pages and the JSON API
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BookResponse {
    pub id: i32,
    pub title: String,
    pub author: String,
    /// Category name
    pub category: String,
    pub category_id: i32,
    pub total_copies: i32,
    pub available_copies: i32,
    pub borrowed_copies: i32,
    pub can_borrow: bool,
    /// Cover image URL, if one was uploaded
    pub cover_url: Option<String>,
}

impl From<BookDetails> for BookResponse {
    fn from(book: BookDetails) -> Self {
        Self {
            id: book.id,
            title: book.title,
            author: book.author,
            category: book.category_name,
            category_id: book.category_id,
            total_copies: book.total_copies,
            available_copies: book.available_copies,
            borrowed_copies: book.total_copies - book.available_copies,
            can_borrow: book.available_copies > 0,
            cover_url: book
                .cover_image
                .map(|path| format!("{}{}", MEDIA_URL, path.trim_start_matches('/'))),
        }
    }
}

/// Validated insert payload
#[derive(Debug, Clone)]
pub struct NewBook {
    pub title: String,
    pub author: String,
    pub category_id: i32,
    pub total_copies: i32,
    pub cover_image: Option<String>,
}

/// Create book request
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "title is required (max 200 characters)"))]
    pub title: String,
    #[serde(default)]
    #[validate(length(min = 1, max = 200, message = "author is required (max 200 characters)"))]
    pub author: String,
    #[validate(required(message = "category_id is required"))]
    pub category_id: Option<i32>,
    /// Defaults to 1
    #[validate(range(min = 0, message = "total_copies must not be negative"))]
    pub total_copies: Option<i32>,
    #[validate(length(max = 255))]
    pub cover_image: Option<String>,
}

/// Partial update request; absent fields are left untouched
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, max = 200, message = "title must be 1 to 200 characters"))]
    pub title: Option<String>,
    #[validate(length(min = 1, max = 200, message = "author must be 1 to 200 characters"))]
    pub author: Option<String>,
    pub category_id: Option<i32>,
    #[validate(range(min = 0, message = "total_copies must not be negative"))]
    pub total_copies: Option<i32>,
    #[validate(length(max = 255))]
    pub cover_image: Option<String>,
}
