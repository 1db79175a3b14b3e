pub mod health;
pub mod merchants;
pub mod metrics;
