//! Catalog management service

use validator::Validate;

use crate::{
    error::{AppError, AppResult},
    models::{
        book::{CreateBook, UpdateBook},
        category::CreateCategory,
        Book, BookDetails, Category, NewBook,
    },
    repository::Repository,
};

#[derive(Clone)]
pub struct CatalogService {
    repository: Repository,
}

impl CatalogService {
    pub fn new(repository: Repository) -> Self {
        Self { repository }
    }

    pub async fn ping(&self) -> AppResult<()> {
        self.repository.ping().await
    }

    /// List books by title, optionally within one category
    pub async fn list_books(&self, category_id: Option<i32>) -> AppResult<Vec<BookDetails>> {
        self.repository.books_list(category_id).await
    }

    /// Get book by ID
    pub async fn get_book(&self, id: i32) -> AppResult<BookDetails> {
        self.repository
            .books_get(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))
    }

    /// List categories by name
    pub async fn list_categories(&self) -> AppResult<Vec<Category>> {
        self.repository.categories_list().await
    }

    /// Create a new book; all copies start on the shelf
    pub async fn create_book(&self, request: CreateBook) -> AppResult<Book> {
        request.validate()?;

        let category_id = request.category_id.ok_or_else(|| {
            AppError::Validation(
                "Missing required fields: title, author and category_id must be provided".to_string(),
            )
        })?;

        if self.repository.categories_get(category_id).await?.is_none() {
            return Err(AppError::NotFound("Category not found".to_string()));
        }

        let book = self
            .repository
            .books_create(&NewBook {
                title: request.title,
                author: request.author,
                category_id,
                total_copies: request.total_copies.unwrap_or(1),
                cover_image: request.cover_image,
            })
            .await?;

        tracing::info!(book_id = book.id, title = %book.title, "Book created");
        Ok(book)
    }

    /// Apply a partial update under the book row lock
    pub async fn update_book(&self, id: i32, request: UpdateBook) -> AppResult<Book> {
        request.validate()?;

        let mut uow = self.repository.begin().await?;
        let mut book = uow
            .lock_book(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if let Some(title) = request.title {
            book.title = title;
        }
        if let Some(author) = request.author {
            book.author = author;
        }
        if let Some(category_id) = request.category_id {
            if uow.get_category(category_id).await?.is_none() {
                return Err(AppError::NotFound("Category not found".to_string()));
            }
            book.category_id = category_id;
        }
        if let Some(cover_image) = request.cover_image {
            book.cover_image = Some(cover_image).filter(|path| !path.is_empty());
        }
        if let Some(total_copies) = request.total_copies {
            book.resize(total_copies)?;
        }

        uow.update_book(&book).await?;
        uow.commit().await?;

        tracing::info!(
            book_id = book.id,
            total_copies = book.total_copies,
            available_copies = book.available_copies,
            "Book updated"
        );
        Ok(book)
    }

    /// Delete a book that has no copies out
    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        let mut uow = self.repository.begin().await?;
        let book = uow
            .lock_book(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Book not found".to_string()))?;

        if book.borrowed_copies() > 0 {
            return Err(AppError::Validation(
                "Cannot delete book while copies are borrowed".to_string(),
            ));
        }

        uow.delete_book(id).await?;
        uow.commit().await?;

        tracing::info!(book_id = id, "Book deleted");
        Ok(())
    }

    pub async fn create_category(&self, request: CreateCategory) -> AppResult<Category> {
        request.validate()?;
        let category = self.repository.categories_create(&request.name).await?;
        tracing::info!(category_id = category.id, name = %category.name, "Category created");
        Ok(category)
    }

    pub async fn delete_category(&self, id: i32) -> AppResult<()> {
        self.repository.categories_delete(id).await?;
        tracing::info!(category_id = id, "Category deleted");
        Ok(())
    }
}
