//! Merchant account ledger.
//!
//! The ledger is the relational store owned by the onboarding service. It
//! exposes a narrow capability (`Ledger`) with two backends:
//! - `InMemoryLedger` for tests and local runs
//! - `PostgresLedger` backed by sqlx

pub mod error;
pub mod memory;
pub mod postgres;
pub mod store;

pub use error::{LedgerError, Result};
pub use memory::InMemoryLedger;
pub use postgres::PostgresLedger;
pub use store::Ledger;
