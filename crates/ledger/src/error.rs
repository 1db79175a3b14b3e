use domain::DomainError;
use thiserror::Error;

/// Errors that can occur when interacting with the ledger.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No account matched the lookup.
    #[error("Merchant account not found: {0}")]
    NotFound(String),

    /// An active account already holds the business email or connected account.
    #[error("Merchant account already exists: {0}")]
    AlreadyExists(String),

    /// The caller passed an argument the ledger cannot act on.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The account failed domain validation.
    #[error("Domain error: {0}")]
    Domain(#[from] DomainError),

    /// The ledger is temporarily unable to serve requests.
    #[error("Ledger unavailable: {0}")]
    Unavailable(String),

    /// A database error occurred.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A database migration error occurred.
    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),
}

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;
