//! Accounting API query client.
//!
//! The query endpoint takes a SQL-like statement as a plain-text body and
//! answers with a `QueryResponse` object. [`QueryClient`] passes statements
//! through untouched apart from pagination clauses added by
//! [`QueryClient::query_all`]. Access tokens come from
//! [`CredentialManager`](crate::manager::CredentialManager).

pub mod client;
pub mod error;

pub use client::{DEFAULT_MINOR_VERSION, MAX_PAGE_SIZE, QueryClient, QueryPage};
pub use error::{ApiError, FaultError};
