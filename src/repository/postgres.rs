//! PostgreSQL adapter for the storage ports

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};

use super::{LibraryStore, UnitOfWork};
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookDetails, Borrow, BorrowRecord, Category, NewBook, NewBorrow, User},
};

const BOOK_DETAILS_SELECT: &str = r#"
    SELECT b.id, b.title, b.author, b.category_id, c.name AS category_name,
           b.total_copies, b.available_copies, b.cover_image
    FROM books b
    JOIN categories c ON c.id = b.category_id
"#;

fn is_unique_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_unique_violation())
}

fn is_foreign_key_violation(e: &sqlx::Error) -> bool {
    matches!(e, sqlx::Error::Database(db) if db.is_foreign_key_violation())
}

#[derive(Clone)]
pub struct PgStore {
    pool: Pool<Postgres>,
}

impl PgStore {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl LibraryStore for PgStore {
    async fn ping(&self) -> AppResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    // =========================================================================
    // CATEGORIES
    // =========================================================================

    async fn categories_list(&self) -> AppResult<Vec<Category>> {
        let categories = sqlx::query_as::<_, Category>("SELECT id, name FROM categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(categories)
    }

    async fn categories_get(&self, id: i32) -> AppResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(category)
    }

    async fn categories_create(&self, name: &str) -> AppResult<Category> {
        sqlx::query_as::<_, Category>("INSERT INTO categories (name) VALUES ($1) RETURNING id, name")
            .bind(name)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    AppError::Conflict(format!("Category '{}' already exists", name))
                } else {
                    AppError::Database(e)
                }
            })
    }

    async fn categories_delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Validation("Cannot delete a category that still has books".to_string())
                } else {
                    AppError::Database(e)
                }
            })?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Category with id {} not found", id)));
        }
        Ok(())
    }

    // =========================================================================
    // BOOKS
    // =========================================================================

    async fn books_list(&self, category_id: Option<i32>) -> AppResult<Vec<BookDetails>> {
        let query = format!(
            "{} WHERE ($1::INTEGER IS NULL OR b.category_id = $1) ORDER BY b.title, b.id",
            BOOK_DETAILS_SELECT
        );
        let books = sqlx::query_as::<_, BookDetails>(&query)
            .bind(category_id)
            .fetch_all(&self.pool)
            .await?;
        Ok(books)
    }

    async fn books_get(&self, id: i32) -> AppResult<Option<BookDetails>> {
        let query = format!("{} WHERE b.id = $1", BOOK_DETAILS_SELECT);
        let book = sqlx::query_as::<_, BookDetails>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(book)
    }

    async fn books_create(&self, book: &NewBook) -> AppResult<Book> {
        sqlx::query_as::<_, Book>(
            r#"
            INSERT INTO books (title, author, category_id, total_copies, available_copies, cover_image)
            VALUES ($1, $2, $3, $4, $4, $5)
            RETURNING id, title, author, category_id, total_copies, available_copies, cover_image
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.category_id)
        .bind(book.total_copies)
        .bind(&book.cover_image)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_foreign_key_violation(&e) {
                AppError::NotFound("Category not found".to_string())
            } else {
                AppError::Database(e)
            }
        })
    }

    // =========================================================================
    // BORROWS
    // =========================================================================

    async fn borrows_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowRecord>> {
        let borrows = sqlx::query_as::<_, BorrowRecord>(
            r#"
            SELECT br.id, br.borrower_id, br.book_id, br.borrowed_at, br.due_date, br.returned_at,
                   b.title AS book_title, b.author AS book_author, c.name AS category_name
            FROM borrows br
            JOIN books b ON b.id = br.book_id
            JOIN categories c ON c.id = b.category_id
            WHERE br.borrower_id = $1
            ORDER BY br.borrowed_at DESC, br.id DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(borrows)
    }

    // =========================================================================
    // USERS
    // =========================================================================

    async fn users_create(&self, username: &str, password_hash: &str) -> AppResult<User> {
        sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, password_hash)
            VALUES ($1, $2)
            RETURNING id, username, password_hash, created_at
            "#,
        )
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                AppError::Conflict("A user with that username already exists".to_string())
            } else {
                AppError::Database(e)
            }
        })
    }

    async fn users_get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash, created_at FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }
}

/// Unit of work backed by a database transaction. Row locks are
/// `SELECT ... FOR UPDATE`; an uncommitted transaction rolls back on drop.
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn lock_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        let book = sqlx::query_as::<_, Book>(
            r#"
            SELECT id, title, author, category_id, total_copies, available_copies, cover_image
            FROM books
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(book)
    }

    async fn lock_borrow(&mut self, id: i32) -> AppResult<Option<Borrow>> {
        let borrow = sqlx::query_as::<_, Borrow>(
            r#"
            SELECT id, borrower_id, book_id, borrowed_at, due_date, returned_at
            FROM borrows
            WHERE id = $1
            FOR UPDATE
            "#,
        )
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(borrow)
    }

    async fn get_category(&mut self, id: i32) -> AppResult<Option<Category>> {
        let category = sqlx::query_as::<_, Category>("SELECT id, name FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?;
        Ok(category)
    }

    async fn update_book(&mut self, book: &Book) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE books
            SET title = $1, author = $2, category_id = $3,
                total_copies = $4, available_copies = $5, cover_image = $6
            WHERE id = $7
            "#,
        )
        .bind(&book.title)
        .bind(&book.author)
        .bind(book.category_id)
        .bind(book.total_copies)
        .bind(book.available_copies)
        .bind(&book.cover_image)
        .bind(book.id)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn delete_book(&mut self, id: i32) -> AppResult<()> {
        sqlx::query("DELETE FROM books WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(|e| {
                if is_foreign_key_violation(&e) {
                    AppError::Validation(
                        "Cannot delete book while borrow records reference it".to_string(),
                    )
                } else {
                    AppError::Database(e)
                }
            })?;
        Ok(())
    }

    async fn insert_borrow(&mut self, borrow: &NewBorrow) -> AppResult<Borrow> {
        let created = sqlx::query_as::<_, Borrow>(
            r#"
            INSERT INTO borrows (borrower_id, book_id, borrowed_at, due_date)
            VALUES ($1, $2, $3, $4)
            RETURNING id, borrower_id, book_id, borrowed_at, due_date, returned_at
            "#,
        )
        .bind(borrow.borrower_id)
        .bind(borrow.book_id)
        .bind(borrow.borrowed_at)
        .bind(borrow.due_date)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(created)
    }

    async fn mark_returned(&mut self, borrow_id: i32, returned_at: DateTime<Utc>) -> AppResult<()> {
        sqlx::query("UPDATE borrows SET returned_at = $1 WHERE id = $2 AND returned_at IS NULL")
            .bind(returned_at)
            .bind(borrow_id)
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        self.tx.commit().await?;
        Ok(())
    }
}
