//! Repository layer: storage ports and their adapters.
//!
//! [`LibraryStore`] covers lock-free reads and the simple inserts; every
//! write that depends on a book's copy counters goes through a
//! [`UnitOfWork`], which follows a begin / lock / mutate / commit contract.
//! Dropping a unit of work without calling [`UnitOfWork::commit`] rolls it
//! back.

pub mod memory;
pub mod postgres;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::AppResult,
    models::{Book, BookDetails, Borrow, BorrowRecord, Category, NewBook, NewBorrow, User},
};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Shared handle to the configured store
pub type Repository = Arc<dyn LibraryStore>;

#[async_trait]
pub trait LibraryStore: Send + Sync {
    /// Check that the backing store answers.
    async fn ping(&self) -> AppResult<()>;

    /// All categories, by name.
    async fn categories_list(&self) -> AppResult<Vec<Category>>;

    async fn categories_get(&self, id: i32) -> AppResult<Option<Category>>;

    /// Insert a category; a duplicate name is a `Conflict`.
    async fn categories_create(&self, name: &str) -> AppResult<Category>;

    /// Delete a category; `NotFound` when absent, `Validation` while books
    /// still reference it.
    async fn categories_delete(&self, id: i32) -> AppResult<()>;

    /// Books ordered by title, optionally restricted to one category.
    async fn books_list(&self, category_id: Option<i32>) -> AppResult<Vec<BookDetails>>;

    async fn books_get(&self, id: i32) -> AppResult<Option<BookDetails>>;

    /// Insert a book with `available_copies = total_copies`.
    async fn books_create(&self, book: &NewBook) -> AppResult<Book>;

    /// A user's borrows, newest first.
    async fn borrows_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowRecord>>;

    /// Insert a user; a duplicate username is a `Conflict`.
    async fn users_create(&self, username: &str, password_hash: &str) -> AppResult<User>;

    async fn users_get_by_username(&self, username: &str) -> AppResult<Option<User>>;

    /// Open a unit of work.
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;
}

/// Atomic, row-locking unit of work.
#[async_trait]
pub trait UnitOfWork: Send {
    /// Lock a book row until commit or rollback.
    async fn lock_book(&mut self, id: i32) -> AppResult<Option<Book>>;

    /// Lock a borrow row until commit or rollback.
    async fn lock_borrow(&mut self, id: i32) -> AppResult<Option<Borrow>>;

    async fn get_category(&mut self, id: i32) -> AppResult<Option<Category>>;

    /// Write back every mutable column of a locked book.
    async fn update_book(&mut self, book: &Book) -> AppResult<()>;

    /// Delete a locked book; `Validation` while borrows reference it.
    async fn delete_book(&mut self, id: i32) -> AppResult<()>;

    async fn insert_borrow(&mut self, borrow: &NewBorrow) -> AppResult<Borrow>;

    async fn mark_returned(&mut self, borrow_id: i32, returned_at: DateTime<Utc>) -> AppResult<()>;

    async fn commit(self: Box<Self>) -> AppResult<()>;
}
