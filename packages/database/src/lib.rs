#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Store connection, SQL dialect, schema, and CSV import for the crime
//! dashboard.
//!
//! Uses `switchy_database` for all database access. Aggregate queries are
//! raw SQL via `query_raw_params()`; the few places where Postgres and
//! `SQLite` disagree (month truncation, timestamp parameters) go through
//! [`db::Backend`].

pub mod db;
pub mod import;
pub mod progress;
pub mod schema;

pub use db::{Backend, CrimeStore};

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// Database query error.
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The store could not be reached or opened.
    #[error("Connection error: {message}")]
    Connection {
        /// Description of what went wrong.
        message: String,
    },

    /// CSV read error during import.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// I/O error (e.g., creating the `SQLite` file's directory).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
