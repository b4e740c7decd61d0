//! Loan model, lifecycle states and related types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::{
    book::Book,
    id::RecordId,
    inventory::{StockDirection, StockMovement},
    student::StudentDetails,
};
use crate::error::{AppError, AppResult};

// ---------------------------------------------------------------------------
// LoanState
// ---------------------------------------------------------------------------

/// Field-less lifecycle discriminant, used for filtering and counting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum LoanState {
    Pending,
    Confirmed,
    Rejected,
    Cancelled,
    Returned,
}

impl LoanState {
    pub const ALL: [LoanState; 5] = [
        LoanState::Pending,
        LoanState::Confirmed,
        LoanState::Rejected,
        LoanState::Cancelled,
        LoanState::Returned,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            LoanState::Pending => "pending",
            LoanState::Confirmed => "confirmed",
            LoanState::Rejected => "rejected",
            LoanState::Cancelled => "cancelled",
            LoanState::Returned => "returned",
        }
    }

    /// No transition leaves a terminal state
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            LoanState::Rejected | LoanState::Cancelled | LoanState::Returned
        )
    }
}

impl std::fmt::Display for LoanState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for LoanState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "pending" => Ok(LoanState::Pending),
            "confirmed" => Ok(LoanState::Confirmed),
            "rejected" => Ok(LoanState::Rejected),
            "cancelled" => Ok(LoanState::Cancelled),
            "returned" => Ok(LoanState::Returned),
            _ => Err(format!("Invalid loan status: {}", s)),
        }
    }
}

// ---------------------------------------------------------------------------
// LoanStatus
// ---------------------------------------------------------------------------

/// Lifecycle of a loan together with the data each state carries
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "lowercase")]
pub enum LoanStatus {
    Pending,
    Confirmed {
        return_date: Option<DateTime<Utc>>,
    },
    Rejected {
        reason: Option<String>,
    },
    Cancelled,
    Returned {
        return_date: Option<DateTime<Utc>>,
        returned_at: DateTime<Utc>,
    },
}

/// Requested change to a loan's lifecycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoanAction {
    Confirm { return_date: Option<DateTime<Utc>> },
    Reject { reason: Option<String> },
    Cancel,
    Return { at: DateTime<Utc> },
}

impl LoanAction {
    pub fn name(&self) -> &'static str {
        match self {
            LoanAction::Confirm { .. } => "confirm",
            LoanAction::Reject { .. } => "reject",
            LoanAction::Cancel => "cancel",
            LoanAction::Return { .. } => "return",
        }
    }

    /// Inventory effect of the action on the loaned book
    pub fn stock_direction(&self) -> Option<StockDirection> {
        match self {
            LoanAction::Confirm { .. } => Some(StockDirection::Debit),
            LoanAction::Return { .. } => Some(StockDirection::Credit),
            LoanAction::Reject { .. } | LoanAction::Cancel => None,
        }
    }
}

impl LoanStatus {
    pub fn state(&self) -> LoanState {
        match self {
            LoanStatus::Pending => LoanState::Pending,
            LoanStatus::Confirmed { .. } => LoanState::Confirmed,
            LoanStatus::Rejected { .. } => LoanState::Rejected,
            LoanStatus::Cancelled => LoanState::Cancelled,
            LoanStatus::Returned { .. } => LoanState::Returned,
        }
    }

    pub fn return_date(&self) -> Option<DateTime<Utc>> {
        match self {
            LoanStatus::Confirmed { return_date } | LoanStatus::Returned { return_date, .. } => {
                *return_date
            }
            _ => None,
        }
    }

    pub fn returned_at(&self) -> Option<DateTime<Utc>> {
        match self {
            LoanStatus::Returned { returned_at, .. } => Some(*returned_at),
            _ => None,
        }
    }

    pub fn rejection_reason(&self) -> Option<&str> {
        match self {
            LoanStatus::Rejected { reason } => reason.as_deref(),
            _ => None,
        }
    }

    /// Next status for `action`. Only Pending -> {Confirmed, Rejected,
    /// Cancelled} and Confirmed -> Returned are legal.
    pub fn apply(&self, action: LoanAction) -> AppResult<LoanStatus> {
        match (self, action) {
            (LoanStatus::Pending, LoanAction::Confirm { return_date }) => {
                Ok(LoanStatus::Confirmed { return_date })
            }
            (LoanStatus::Pending, LoanAction::Reject { reason }) => {
                Ok(LoanStatus::Rejected { reason })
            }
            (LoanStatus::Pending, LoanAction::Cancel) => Ok(LoanStatus::Cancelled),
            (LoanStatus::Confirmed { return_date }, LoanAction::Return { at }) => {
                Ok(LoanStatus::Returned {
                    return_date: *return_date,
                    returned_at: at,
                })
            }
            (status, action) => Err(AppError::InvalidTransition(format!(
                "Cannot {} a {} loan",
                action.name(),
                status.state()
            ))),
        }
    }

    /// Rebuild a status from its stored columns
    pub fn from_columns(
        state: LoanState,
        return_date: Option<DateTime<Utc>>,
        returned_at: Option<DateTime<Utc>>,
        rejection_reason: Option<String>,
    ) -> AppResult<Self> {
        Ok(match state {
            LoanState::Pending => LoanStatus::Pending,
            LoanState::Confirmed => LoanStatus::Confirmed { return_date },
            LoanState::Rejected => LoanStatus::Rejected {
                reason: rejection_reason,
            },
            LoanState::Cancelled => LoanStatus::Cancelled,
            LoanState::Returned => LoanStatus::Returned {
                return_date,
                returned_at: returned_at.ok_or_else(|| {
                    AppError::Internal("Returned loan without return timestamp".to_string())
                })?,
            },
        })
    }
}

// ---------------------------------------------------------------------------
// LoanFlags
// ---------------------------------------------------------------------------

/// Legacy boolean encoding of the lifecycle, kept in API payloads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct LoanFlags {
    pub is_confirmed: bool,
    pub is_returned: bool,
    pub is_rejected: bool,
    pub is_cancelled: bool,
}

impl From<LoanState> for LoanFlags {
    fn from(state: LoanState) -> Self {
        let (is_confirmed, is_returned, is_rejected, is_cancelled) = match state {
            LoanState::Pending => (false, false, false, false),
            LoanState::Confirmed => (true, false, false, false),
            LoanState::Rejected => (false, false, true, false),
            LoanState::Cancelled => (false, false, false, true),
            LoanState::Returned => (true, true, false, false),
        };
        Self {
            is_confirmed,
            is_returned,
            is_rejected,
            is_cancelled,
        }
    }
}

impl From<&LoanStatus> for LoanFlags {
    fn from(status: &LoanStatus) -> Self {
        status.state().into()
    }
}

impl LoanFlags {
    /// State encoded by the flags, `None` for combinations no loan can have
    pub fn state(&self) -> Option<LoanState> {
        match (
            self.is_confirmed,
            self.is_returned,
            self.is_rejected,
            self.is_cancelled,
        ) {
            (false, false, false, false) => Some(LoanState::Pending),
            (true, false, false, false) => Some(LoanState::Confirmed),
            (false, false, true, false) => Some(LoanState::Rejected),
            (false, false, false, true) => Some(LoanState::Cancelled),
            (true, true, false, false) => Some(LoanState::Returned),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Loan records
// ---------------------------------------------------------------------------

/// Stored loan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Loan {
    pub id: RecordId,
    pub book_id: RecordId,
    pub student_id: RecordId,
    pub quantity: i32,
    pub loan_date: DateTime<Utc>,
    pub expect_return_date: DateTime<Utc>,
    pub status: LoanStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Loan {
    pub fn from_new(new: NewLoan) -> Self {
        let now = Utc::now();
        Self {
            id: RecordId::new(),
            book_id: new.book_id,
            student_id: new.student_id,
            quantity: new.quantity,
            loan_date: new.loan_date,
            expect_return_date: new.expect_return_date,
            status: LoanStatus::Pending,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn state(&self) -> LoanState {
        self.status.state()
    }
}

/// Row shape of the `loans` table
#[derive(Debug, FromRow)]
pub struct LoanRow {
    pub id: RecordId,
    pub book_id: RecordId,
    pub student_id: RecordId,
    pub quantity: i32,
    pub loan_date: DateTime<Utc>,
    pub expect_return_date: DateTime<Utc>,
    pub status: String,
    pub return_date: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TryFrom<LoanRow> for Loan {
    type Error = AppError;

    fn try_from(row: LoanRow) -> Result<Self, Self::Error> {
        let state: LoanState = row.status.parse().map_err(AppError::Internal)?;
        Ok(Loan {
            id: row.id,
            book_id: row.book_id,
            student_id: row.student_id,
            quantity: row.quantity,
            loan_date: row.loan_date,
            expect_return_date: row.expect_return_date,
            status: LoanStatus::from_columns(
                state,
                row.return_date,
                row.returned_at,
                row.rejection_reason,
            )?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

/// Create loan request
#[derive(Debug, Default, Deserialize, Validate, ToSchema)]
pub struct CreateLoan {
    /// Book ID
    pub book: Option<String>,
    /// Student ID
    pub student: Option<String>,
    /// Number of copies requested
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: Option<i32>,
    pub loan_date: Option<DateTime<Utc>>,
    pub expect_return_date: Option<DateTime<Utc>>,
}

/// Validated create loan payload
#[derive(Debug, Clone, PartialEq)]
pub struct NewLoan {
    pub book_id: RecordId,
    pub student_id: RecordId,
    pub quantity: i32,
    pub loan_date: DateTime<Utc>,
    pub expect_return_date: DateTime<Utc>,
}

impl CreateLoan {
    /// Check required fields, then ranges, then identifier formats
    pub fn into_new_loan(self) -> AppResult<NewLoan> {
        let mut missing = Vec::new();
        if self.book.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("book");
        }
        if self.student.as_deref().map_or(true, |s| s.trim().is_empty()) {
            missing.push("student");
        }
        if self.quantity.is_none() {
            missing.push("quantity");
        }
        if self.loan_date.is_none() {
            missing.push("loan_date");
        }
        if self.expect_return_date.is_none() {
            missing.push("expect_return_date");
        }
        if !missing.is_empty() {
            return Err(AppError::Validation(format!(
                "Missing required fields: {}",
                missing.join(", ")
            )));
        }

        self.validate()?;

        match (
            self.book,
            self.student,
            self.quantity,
            self.loan_date,
            self.expect_return_date,
        ) {
            (Some(book), Some(student), Some(quantity), Some(loan_date), Some(expect_return_date)) => {
                Ok(NewLoan {
                    book_id: RecordId::parse(&book)?,
                    student_id: RecordId::parse(&student)?,
                    quantity,
                    loan_date,
                    expect_return_date,
                })
            }
            _ => Err(AppError::Validation("Missing required fields".to_string())),
        }
    }
}

/// Query filter over the loan collection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoanFilter {
    pub state: Option<LoanState>,
    pub student_id: Option<RecordId>,
}

impl LoanFilter {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn by_state(state: LoanState) -> Self {
        Self {
            state: Some(state),
            student_id: None,
        }
    }

    pub fn by_student(student_id: RecordId) -> Self {
        Self {
            state: None,
            student_id: Some(student_id),
        }
    }

    pub fn matches(&self, loan: &Loan) -> bool {
        self.state.map_or(true, |s| loan.state() == s)
            && self.student_id.map_or(true, |id| loan.student_id == id)
    }
}

/// Guarded lifecycle change, persisted atomically with its stock movement
#[derive(Debug, Clone, PartialEq)]
pub struct LoanChange {
    pub loan_id: RecordId,
    /// State the loan must still be in for the change to apply
    pub expected: LoanState,
    pub status: LoanStatus,
    pub movement: Option<StockMovement>,
}

// ---------------------------------------------------------------------------
// Views
// ---------------------------------------------------------------------------

/// Loan with book and student joined, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoanDetails {
    pub id: RecordId,
    pub book_id: RecordId,
    pub student_id: RecordId,
    pub quantity: i32,
    pub loan_date: DateTime<Utc>,
    pub expect_return_date: DateTime<Utc>,
    pub return_date: Option<DateTime<Utc>>,
    pub returned_at: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
    pub status: LoanState,
    pub is_confirmed: bool,
    pub is_returned: bool,
    pub is_rejected: bool,
    pub is_cancelled: bool,
    pub book: Option<Book>,
    pub student: Option<StudentDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LoanDetails {
    pub fn new(loan: Loan, book: Option<Book>, student: Option<StudentDetails>) -> Self {
        let flags = LoanFlags::from(&loan.status);
        Self {
            id: loan.id,
            book_id: loan.book_id,
            student_id: loan.student_id,
            quantity: loan.quantity,
            loan_date: loan.loan_date,
            expect_return_date: loan.expect_return_date,
            return_date: loan.status.return_date(),
            returned_at: loan.status.returned_at(),
            rejection_reason: loan.status.rejection_reason().map(str::to_string),
            status: loan.status.state(),
            is_confirmed: flags.is_confirmed,
            is_returned: flags.is_returned,
            is_rejected: flags.is_rejected,
            is_cancelled: flags.is_cancelled,
            book,
            student,
            created_at: loan.created_at,
            updated_at: loan.updated_at,
        }
    }

    pub fn flags(&self) -> LoanFlags {
        LoanFlags {
            is_confirmed: self.is_confirmed,
            is_returned: self.is_returned,
            is_rejected: self.is_rejected,
            is_cancelled: self.is_cancelled,
        }
    }
}

/// Loans partitioned into the five lifecycle buckets
#[derive(Debug, Default, Serialize, ToSchema)]
pub struct LoansByState {
    pub confirmed: Vec<LoanDetails>,
    pub pending: Vec<LoanDetails>,
    pub rejected: Vec<LoanDetails>,
    pub returned: Vec<LoanDetails>,
    pub cancelled: Vec<LoanDetails>,
}

impl LoansByState {
    pub fn partition(loans: Vec<LoanDetails>) -> Self {
        let mut result = Self::default();
        for loan in loans {
            match loan.status {
                LoanState::Pending => result.pending.push(loan),
                LoanState::Confirmed => result.confirmed.push(loan),
                LoanState::Rejected => result.rejected.push(loan),
                LoanState::Cancelled => result.cancelled.push(loan),
                LoanState::Returned => result.returned.push(loan),
            }
        }
        result
    }

    pub fn len(&self) -> usize {
        self.pending.len()
            + self.confirmed.len()
            + self.rejected.len()
            + self.cancelled.len()
            + self.returned.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_statuses() -> Vec<LoanStatus> {
        let now = Utc::now();
        vec![
            LoanStatus::Pending,
            LoanStatus::Confirmed { return_date: None },
            LoanStatus::Rejected {
                reason: Some("damaged".into()),
            },
            LoanStatus::Cancelled,
            LoanStatus::Returned {
                return_date: None,
                returned_at: now,
            },
        ]
    }

    fn all_actions() -> Vec<LoanAction> {
        vec![
            LoanAction::Confirm { return_date: None },
            LoanAction::Reject { reason: None },
            LoanAction::Cancel,
            LoanAction::Return { at: Utc::now() },
        ]
    }

    #[test]
    fn test_flags_encode_exactly_one_state() {
        for status in all_statuses() {
            let flags = LoanFlags::from(&status);
            assert_eq!(flags.state(), Some(status.state()));
        }
    }

    #[test]
    fn test_flag_table() {
        let returned = LoanFlags::from(LoanState::Returned);
        assert!(returned.is_confirmed && returned.is_returned);
        assert!(!returned.is_rejected && !returned.is_cancelled);

        let pending = LoanFlags::from(LoanState::Pending);
        assert_eq!(
            pending,
            LoanFlags {
                is_confirmed: false,
                is_returned: false,
                is_rejected: false,
                is_cancelled: false,
            }
        );
    }

    #[test]
    fn test_illegal_flag_combinations_decode_to_none() {
        let mut illegal = 0;
        for bits in 0u8..16 {
            let flags = LoanFlags {
                is_confirmed: bits & 1 != 0,
                is_returned: bits & 2 != 0,
                is_rejected: bits & 4 != 0,
                is_cancelled: bits & 8 != 0,
            };
            if flags.state().is_none() {
                illegal += 1;
            }
        }
        assert_eq!(illegal, 11);
    }

    #[test]
    fn test_pending_transitions() {
        let confirmed = LoanStatus::Pending
            .apply(LoanAction::Confirm { return_date: None })
            .unwrap();
        assert_eq!(confirmed.state(), LoanState::Confirmed);

        let rejected = LoanStatus::Pending
            .apply(LoanAction::Reject {
                reason: Some("no stock".into()),
            })
            .unwrap();
        assert_eq!(rejected.rejection_reason(), Some("no stock"));

        let cancelled = LoanStatus::Pending.apply(LoanAction::Cancel).unwrap();
        assert_eq!(cancelled, LoanStatus::Cancelled);

        assert!(matches!(
            LoanStatus::Pending.apply(LoanAction::Return { at: Utc::now() }),
            Err(AppError::InvalidTransition(_))
        ));
    }

    #[test]
    fn test_return_keeps_agreed_return_date() {
        let due = Utc::now();
        let at = Utc::now();
        let returned = LoanStatus::Confirmed {
            return_date: Some(due),
        }
        .apply(LoanAction::Return { at })
        .unwrap();

        assert_eq!(returned.return_date(), Some(due));
        assert_eq!(returned.returned_at(), Some(at));
    }

    #[test]
    fn test_reconfirm_is_rejected() {
        let confirmed = LoanStatus::Confirmed { return_date: None };
        let err = confirmed
            .apply(LoanAction::Confirm { return_date: None })
            .unwrap_err();
        assert!(matches!(err, AppError::InvalidTransition(_)));
    }

    #[test]
    fn test_terminal_states_accept_nothing() {
        for status in all_statuses()
            .into_iter()
            .filter(|s| s.state().is_terminal())
        {
            for action in all_actions() {
                assert!(
                    status.apply(action.clone()).is_err(),
                    "{:?} accepted {:?}",
                    status,
                    action
                );
            }
        }
    }

    #[test]
    fn test_create_loan_reports_missing_fields() {
        let err = CreateLoan {
            quantity: Some(1),
            ..Default::default()
        }
        .into_new_loan()
        .unwrap_err();

        match err {
            AppError::Validation(msg) => {
                assert!(msg.contains("book"));
                assert!(msg.contains("student"));
                assert!(msg.contains("loan_date"));
                assert!(!msg.contains("quantity"));
            }
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_create_loan_rejects_zero_quantity() {
        let request = CreateLoan {
            book: Some(RecordId::new().to_string()),
            student: Some(RecordId::new().to_string()),
            quantity: Some(0),
            loan_date: Some(Utc::now()),
            expect_return_date: Some(Utc::now()),
        };
        assert!(matches!(
            request.into_new_loan(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_create_loan_rejects_malformed_book_id() {
        let request = CreateLoan {
            book: Some("not-an-id".into()),
            student: Some(RecordId::new().to_string()),
            quantity: Some(2),
            loan_date: Some(Utc::now()),
            expect_return_date: Some(Utc::now()),
        };
        assert!(matches!(
            request.into_new_loan(),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_stored_returned_loan_requires_timestamp() {
        assert!(LoanStatus::from_columns(LoanState::Returned, None, None, None).is_err());
        assert_eq!(
            LoanStatus::from_columns(LoanState::Rejected, None, None, Some("late".into()))
                .unwrap()
                .rejection_reason(),
            Some("late")
        );
    }
}
