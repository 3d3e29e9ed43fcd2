//! Data models for Bookshelf

pub mod book;
pub mod borrow;
pub mod category;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookDetails, BookResponse, NewBook};
pub use borrow::{Borrow, BorrowDetails, BorrowRecord, NewBorrow};
pub use category::Category;
pub use user::{User, UserClaims};
