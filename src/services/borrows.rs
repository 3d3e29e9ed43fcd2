//! Borrow/return service.
//!
//! Both operations lock the book row before reading `available_copies`, so
//! concurrent borrowers of the last copy serialize and the loser sees zero
//! copies instead of driving the counter negative.

use chrono::{Duration, Utc};

use crate::{
    error::{AppError, AppResult},
    models::{Borrow, BorrowDetails, NewBorrow},
    repository::Repository,
};

/// Result of a return request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReturnOutcome {
    /// The copy went back on the shelf
    Returned(Borrow),
    /// `returned_at` was already set; nothing changed
    AlreadyReturned,
    /// The borrow belongs to another user; nothing changed
    NotOwner,
}

#[derive(Clone)]
pub struct BorrowService {
    repository: Repository,
    loan_period: Duration,
}

impl BorrowService {
    pub fn new(repository: Repository, loan_period: Duration) -> Self {
        Self {
            repository,
            loan_period,
        }
    }

    /// Lend one copy of a book to a user
    pub async fn borrow(&self, user_id: i32, book_id: i32) -> AppResult<Borrow> {
        let mut uow = self.repository.begin().await?;

        let mut book = uow
            .lock_book(book_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", book_id)))?;

        book.take_copy()?;

        let borrow = uow
            .insert_borrow(&NewBorrow::new(user_id, book.id, Utc::now(), self.loan_period))
            .await?;
        uow.update_book(&book).await?;
        uow.commit().await?;

        tracing::info!(
            user_id,
            book_id,
            borrow_id = borrow.id,
            available_copies = book.available_copies,
            "Book borrowed"
        );
        Ok(borrow)
    }

    /// Return a borrowed copy on behalf of its borrower
    pub async fn return_borrow(&self, user_id: i32, borrow_id: i32) -> AppResult<ReturnOutcome> {
        let mut uow = self.repository.begin().await?;

        let borrow = uow
            .lock_borrow(borrow_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Borrow with id {} not found", borrow_id)))?;

        if borrow.borrower_id != user_id {
            tracing::warn!(
                user_id,
                borrow_id,
                owner_id = borrow.borrower_id,
                "Ignoring return of a borrow owned by another user"
            );
            return Ok(ReturnOutcome::NotOwner);
        }

        if borrow.is_returned() {
            tracing::debug!(user_id, borrow_id, "Borrow already returned");
            return Ok(ReturnOutcome::AlreadyReturned);
        }

        let mut book = uow.lock_book(borrow.book_id).await?.ok_or_else(|| {
            AppError::Internal(format!("Borrow {} references a missing book", borrow.id))
        })?;

        let returned_at = Utc::now();
        uow.mark_returned(borrow.id, returned_at).await?;
        book.restore_copy();
        uow.update_book(&book).await?;
        uow.commit().await?;

        tracing::info!(
            user_id,
            borrow_id,
            book_id = book.id,
            available_copies = book.available_copies,
            "Book returned"
        );
        Ok(ReturnOutcome::Returned(Borrow {
            returned_at: Some(returned_at),
            ..borrow
        }))
    }

    /// A user's borrowing history, newest first
    pub async fn history(&self, user_id: i32) -> AppResult<Vec<BorrowDetails>> {
        let now = Utc::now();
        let records = self.repository.borrows_for_user(user_id).await?;
        Ok(records
            .into_iter()
            .map(|record| BorrowDetails::from_record(record, now))
            .collect())
    }
}
