//! Borrow (loan ledger) model and related types

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Ledger entry for one lending of one copy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow)]
pub struct Borrow {
    pub id: i32,
    pub borrower_id: i32,
    pub book_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
}

impl Borrow {
    pub fn is_returned(&self) -> bool {
        self.returned_at.is_some()
    }

    pub fn is_overdue_at(&self, now: DateTime<Utc>) -> bool {
        self.returned_at.is_none() && now > self.due_date
    }
}

/// Borrow about to be inserted
#[derive(Debug, Clone)]
pub struct NewBorrow {
    pub borrower_id: i32,
    pub book_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
}

impl NewBorrow {
    pub fn new(borrower_id: i32, book_id: i32, borrowed_at: DateTime<Utc>, loan_period: Duration) -> Self {
        Self {
            borrower_id,
            book_id,
            borrowed_at,
            due_date: borrowed_at + loan_period,
        }
    }
}

/// History row: a borrow joined with its book and category
#[derive(Debug, Clone, FromRow)]
pub struct BorrowRecord {
    pub id: i32,
    pub borrower_id: i32,
    pub book_id: i32,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub book_title: String,
    pub book_author: String,
    pub category_name: String,
}

/// Borrow with book details for display
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct BorrowDetails {
    pub id: i32,
    pub book_id: i32,
    pub book_title: String,
    pub book_author: String,
    /// Category name
    pub category: String,
    pub borrowed_at: DateTime<Utc>,
    pub due_date: DateTime<Utc>,
    pub returned_at: Option<DateTime<Utc>>,
    pub is_returned: bool,
    pub is_overdue: bool,
}

impl BorrowDetails {
    pub fn from_record(record: BorrowRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id,
            book_id: record.book_id,
            book_title: record.book_title,
            book_author: record.book_author,
            category: record.category_name,
            borrowed_at: record.borrowed_at,
            due_date: record.due_date,
            returned_at: record.returned_at,
            is_returned: record.returned_at.is_some(),
            is_overdue: record.returned_at.is_none() && now > record.due_date,
        }
    }
}
