//! Data models for Biblio

pub mod book;
pub mod id;
pub mod inventory;
pub mod loan;
pub mod student;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookStatus, CreateBook};
pub use id::RecordId;
pub use inventory::{StockDirection, StockMovement};
pub use loan::{Loan, LoanDetails, LoanState, LoanStatus};
pub use student::{Section, Student, StudentDetails, Subsection};
pub use user::{Role, UserClaims};
