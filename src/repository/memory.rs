//! In-process adapter for the storage ports.
//!
//! Selected with a `memory://` database URL and used by the test suites.
//! A unit of work holds the store mutex for its whole lifetime and edits a
//! private copy of the tables, which replaces the shared state on commit.
//! That serializes units of work, a coarser version of the row locks taken
//! by the PostgreSQL adapter.

use std::{collections::BTreeMap, sync::Arc};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{LibraryStore, UnitOfWork};
use crate::{
    error::{AppError, AppResult},
    models::{Book, BookDetails, Borrow, BorrowRecord, Category, NewBook, NewBorrow, User},
};

#[derive(Debug, Clone, Default)]
struct Tables {
    categories: BTreeMap<i32, Category>,
    books: BTreeMap<i32, Book>,
    borrows: BTreeMap<i32, Borrow>,
    users: BTreeMap<i32, User>,
    sequences: Sequences,
}

#[derive(Debug, Clone, Default)]
struct Sequences {
    category: i32,
    book: i32,
    borrow: i32,
    user: i32,
}

fn next(seq: &mut i32) -> i32 {
    *seq += 1;
    *seq
}

impl Tables {
    fn book_details(&self, book: &Book) -> AppResult<BookDetails> {
        let category = self.categories.get(&book.category_id).ok_or_else(|| {
            AppError::Internal(format!("Book {} references a missing category", book.id))
        })?;
        Ok(BookDetails::from_parts(book.clone(), category.name.clone()))
    }

    fn borrow_record(&self, borrow: &Borrow) -> AppResult<BorrowRecord> {
        let book = self.books.get(&borrow.book_id).ok_or_else(|| {
            AppError::Internal(format!("Borrow {} references a missing book", borrow.id))
        })?;
        let details = self.book_details(book)?;
        Ok(BorrowRecord {
            id: borrow.id,
            borrower_id: borrow.borrower_id,
            book_id: borrow.book_id,
            borrowed_at: borrow.borrowed_at,
            due_date: borrow.due_date,
            returned_at: borrow.returned_at,
            book_title: details.title,
            book_author: details.author,
            category_name: details.category_name,
        })
    }
}

#[derive(Clone, Default)]
pub struct MemoryStore {
    tables: Arc<Mutex<Tables>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LibraryStore for MemoryStore {
    async fn ping(&self) -> AppResult<()> {
        Ok(())
    }

    async fn categories_list(&self) -> AppResult<Vec<Category>> {
        let tables = self.tables.lock().await;
        let mut categories: Vec<Category> = tables.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn categories_get(&self, id: i32) -> AppResult<Option<Category>> {
        Ok(self.tables.lock().await.categories.get(&id).cloned())
    }

    async fn categories_create(&self, name: &str) -> AppResult<Category> {
        let mut tables = self.tables.lock().await;
        if tables.categories.values().any(|c| c.name == name) {
            return Err(AppError::Conflict(format!("Category '{}' already exists", name)));
        }
        let category = Category {
            id: next(&mut tables.sequences.category),
            name: name.to_string(),
        };
        tables.categories.insert(category.id, category.clone());
        Ok(category)
    }

    async fn categories_delete(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if !tables.categories.contains_key(&id) {
            return Err(AppError::NotFound(format!("Category with id {} not found", id)));
        }
        if tables.books.values().any(|b| b.category_id == id) {
            return Err(AppError::Validation(
                "Cannot delete a category that still has books".to_string(),
            ));
        }
        tables.categories.remove(&id);
        Ok(())
    }

    async fn books_list(&self, category_id: Option<i32>) -> AppResult<Vec<BookDetails>> {
        let tables = self.tables.lock().await;
        let mut books = tables
            .books
            .values()
            .filter(|b| category_id.map_or(true, |id| b.category_id == id))
            .map(|b| tables.book_details(b))
            .collect::<AppResult<Vec<_>>>()?;
        books.sort_by(|a, b| a.title.cmp(&b.title).then(a.id.cmp(&b.id)));
        Ok(books)
    }

    async fn books_get(&self, id: i32) -> AppResult<Option<BookDetails>> {
        let tables = self.tables.lock().await;
        tables.books.get(&id).map(|b| tables.book_details(b)).transpose()
    }

    async fn books_create(&self, book: &NewBook) -> AppResult<Book> {
        let mut tables = self.tables.lock().await;
        if !tables.categories.contains_key(&book.category_id) {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        let created = Book {
            id: next(&mut tables.sequences.book),
            title: book.title.clone(),
            author: book.author.clone(),
            category_id: book.category_id,
            total_copies: book.total_copies,
            available_copies: book.total_copies,
            cover_image: book.cover_image.clone(),
        };
        tables.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn borrows_for_user(&self, user_id: i32) -> AppResult<Vec<BorrowRecord>> {
        let tables = self.tables.lock().await;
        let mut records = tables
            .borrows
            .values()
            .filter(|b| b.borrower_id == user_id)
            .map(|b| tables.borrow_record(b))
            .collect::<AppResult<Vec<_>>>()?;
        records.sort_by(|a, b| b.borrowed_at.cmp(&a.borrowed_at).then(b.id.cmp(&a.id)));
        Ok(records)
    }

    async fn users_create(&self, username: &str, password_hash: &str) -> AppResult<User> {
        let mut tables = self.tables.lock().await;
        if tables.users.values().any(|u| u.username == username) {
            return Err(AppError::Conflict(
                "A user with that username already exists".to_string(),
            ));
        }
        let user = User {
            id: next(&mut tables.sequences.user),
            username: username.to_string(),
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn users_get_by_username(&self, username: &str) -> AppResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables.users.values().find(|u| u.username == username).cloned())
    }

    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let guard = Arc::clone(&self.tables).lock_owned().await;
        let working = (*guard).clone();
        Ok(Box::new(MemoryUnitOfWork { guard, working }))
    }
}

pub struct MemoryUnitOfWork {
    guard: OwnedMutexGuard<Tables>,
    working: Tables,
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn lock_book(&mut self, id: i32) -> AppResult<Option<Book>> {
        Ok(self.working.books.get(&id).cloned())
    }

    async fn lock_borrow(&mut self, id: i32) -> AppResult<Option<Borrow>> {
        Ok(self.working.borrows.get(&id).cloned())
    }

    async fn get_category(&mut self, id: i32) -> AppResult<Option<Category>> {
        Ok(self.working.categories.get(&id).cloned())
    }

    async fn update_book(&mut self, book: &Book) -> AppResult<()> {
        if !self.working.categories.contains_key(&book.category_id) {
            return Err(AppError::NotFound("Category not found".to_string()));
        }
        if book.available_copies < 0 || book.available_copies > book.total_copies {
            return Err(AppError::Internal(format!(
                "Book {} copy counters out of range ({}/{})",
                book.id, book.available_copies, book.total_copies
            )));
        }
        match self.working.books.get_mut(&book.id) {
            Some(row) => {
                *row = book.clone();
                Ok(())
            }
            None => Err(AppError::NotFound(format!("Book with id {} not found", book.id))),
        }
    }

    async fn delete_book(&mut self, id: i32) -> AppResult<()> {
        if self.working.borrows.values().any(|b| b.book_id == id) {
            return Err(AppError::Validation(
                "Cannot delete book while borrow records reference it".to_string(),
            ));
        }
        self.working.books.remove(&id);
        Ok(())
    }

    async fn insert_borrow(&mut self, borrow: &NewBorrow) -> AppResult<Borrow> {
        if !self.working.books.contains_key(&borrow.book_id) {
            return Err(AppError::NotFound(format!("Book with id {} not found", borrow.book_id)));
        }
        let created = Borrow {
            id: next(&mut self.working.sequences.borrow),
            borrower_id: borrow.borrower_id,
            book_id: borrow.book_id,
            borrowed_at: borrow.borrowed_at,
            due_date: borrow.due_date,
            returned_at: None,
        };
        self.working.borrows.insert(created.id, created.clone());
        Ok(created)
    }

    async fn mark_returned(&mut self, borrow_id: i32, returned_at: DateTime<Utc>) -> AppResult<()> {
        if let Some(borrow) = self.working.borrows.get_mut(&borrow_id) {
            if borrow.returned_at.is_none() {
                borrow.returned_at = Some(returned_at);
            }
        }
        Ok(())
    }

    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }
}
