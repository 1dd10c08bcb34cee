//! The filter composition rule shared by every filtered query.
//!
//! An incident matches when its `occurred_at` falls on one of the range's
//! calendar days and its `district` is in the selected set. The date test
//! is the half-open interval `[start 00:00, end + 1 day 00:00)`. An empty
//! district set compiles to `FALSE` so the query still runs (and can still
//! fail) but matches nothing.

use crime_dashboard_database::Backend;
use crime_dashboard_models::Filter;
use switchy_database::DatabaseValue;

/// Builds the WHERE fragments and parameters for `filter`.
///
/// Placeholders are numbered from `start_idx` and emitted in parameter
/// order. Returns
/// `(where_fragments, params, next_param_index)`.
#[must_use]
pub fn build_filter(
    backend: Backend,
    filter: &Filter,
    start_idx: u32,
) -> (Vec<String>, Vec<DatabaseValue>, u32) {
    let mut frags = Vec::new();
    let mut params: Vec<DatabaseValue> = Vec::new();
    let mut idx = start_idx;

    frags.push(format!("occurred_at >= {}", backend.placeholder(idx)));
    params.push(backend.timestamp(filter.date_range.lower_bound()));
    idx += 1;

    frags.push(format!("occurred_at < {}", backend.placeholder(idx)));
    params.push(backend.timestamp(filter.date_range.upper_bound_exclusive()));
    idx += 1;

    if filter.districts.is_empty() {
        frags.push("FALSE".to_string());
    } else {
        let mut placeholders = Vec::with_capacity(filter.districts.len());
        for district in &filter.districts {
            placeholders.push(backend.placeholder(idx));
            params.push(DatabaseValue::String(district.clone()));
            idx += 1;
        }
        frags.push(format!("district IN ({})", placeholders.join(", ")));
    }

    (frags, params, idx)
}

/// Joins fragments into a ` WHERE ...` clause, or nothing if empty.
#[must_use]
pub fn where_clause(frags: &[String]) -> String {
    if frags.is_empty() {
        String::new()
    } else {
        format!(" WHERE {}", frags.join(" AND "))
    }
}
