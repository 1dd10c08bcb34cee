#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the crime dashboard server.
//!
//! Tables are sent in column form, the shape chart renderers consume
//! directly. These types are separate from the query result types so the
//! API contract can evolve independently.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use crime_dashboard_models::{
    CategoryColumns, DateRange, Filter, FilterError, HeatmapColumns, OffenseColumns, RenderState,
    SeriesSummary, parse_date, parse_districts,
};
use serde::{Deserialize, Serialize};

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

/// Query parameters shared by the aggregate endpoints.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardQueryParams {
    /// First included day (`YYYY-MM-DD`).
    pub from: Option<String>,
    /// Last included day (`YYYY-MM-DD`).
    pub to: Option<String>,
    /// Comma-separated district list. Absent or empty selects nothing.
    pub districts: Option<String>,
    /// Row limit for the top-categories endpoint.
    pub limit: Option<u32>,
}

impl DashboardQueryParams {
    /// Whether either end of the date range was left out.
    #[must_use]
    pub const fn needs_default_range(&self) -> bool {
        self.from.is_none() || self.to.is_none()
    }

    /// Selected districts.
    #[must_use]
    pub fn districts(&self) -> BTreeSet<String> {
        self.districts
            .as_deref()
            .map(parse_districts)
            .unwrap_or_default()
    }

    /// Builds the filter, taking any missing date bound from `fallback`.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if a date is malformed or the range is
    /// inverted.
    pub fn to_filter(&self, fallback: Option<DateRange>) -> Result<Filter, FilterError> {
        let missing = || FilterError::InvalidDate {
            value: String::new(),
        };

        let start = match (&self.from, fallback) {
            (Some(from), _) => parse_date(from)?,
            (None, Some(range)) => range.start,
            (None, None) => return Err(missing()),
        };
        let end = match (&self.to, fallback) {
            (Some(to), _) => parse_date(to)?,
            (None, Some(range)) => range.end,
            (None, None) => return Err(missing()),
        };

        Ok(Filter {
            date_range: DateRange::new(start, end)?,
            districts: self.districts(),
        })
    }
}

/// Widget options for `GET /api/options`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOptions {
    /// Months with data, as month-start dates.
    pub months: Vec<NaiveDate>,
    /// Districts with data.
    pub districts: Vec<String>,
    /// Range covering every month, if there is any data.
    pub default_range: Option<DateRange>,
}

/// Monthly series with its mean lines.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOffenses {
    /// Series columns.
    pub columns: OffenseColumns,
    /// Mean offenses and shootings per month.
    pub summary: SeriesSummary,
}

/// Top offense categories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiTopCategories {
    /// Category columns, descending by count.
    pub columns: CategoryColumns,
}

/// Day/hour heatmap.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHeatmap {
    /// Heatmap columns, Monday→Sunday then by hour.
    pub columns: HeatmapColumns,
}

/// All three tables for one filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDashboard {
    /// Filter the tables were computed for.
    pub filter: Filter,
    /// Monthly series.
    pub offenses: ApiOffenses,
    /// Top categories.
    pub top_categories: ApiTopCategories,
    /// Day/hour heatmap.
    pub heatmap: ApiHeatmap,
}

impl From<RenderState> for ApiDashboard {
    fn from(state: RenderState) -> Self {
        Self {
            offenses: ApiOffenses {
                columns: state.series.columns(),
                summary: state.summary,
            },
            top_categories: ApiTopCategories {
                columns: state.top_categories.columns(),
            },
            heatmap: ApiHeatmap {
                columns: state.heatmap.columns(),
            },
            filter: state.filter,
        }
    }
}
