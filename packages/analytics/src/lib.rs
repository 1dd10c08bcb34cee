#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Aggregate query layer for the crime dashboard.
//!
//! Each public function in [`queries`] turns a [`Filter`] into one
//! aggregate table over the `crimes` table. All filtered queries share the
//! same composition rule (see [`filter`]), validate the filter before
//! touching the store, and surface store failures instead of returning
//! empty tables.
//!
//! [`Filter`]: crime_dashboard_models::Filter

pub mod filter;
pub mod queries;

use crime_dashboard_models::FilterError;
use thiserror::Error;

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Database operation failed (store unreachable or query error).
    #[error("Database error: {0}")]
    Database(#[from] switchy_database::DatabaseError),

    /// The filter was rejected before any query was issued.
    #[error("Invalid filter: {0}")]
    InvalidFilter(#[from] FilterError),

    /// Data conversion error.
    #[error("Conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}
