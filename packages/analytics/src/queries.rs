//! Aggregate queries over the `crimes` table.
//!
//! Every call performs one full aggregate on the store: no caching, no
//! retry, no pagination. Filtered queries validate the filter first and
//! apply [`build_filter`] unchanged.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use crime_dashboard_database::CrimeStore;
use crime_dashboard_models::{
    CategoryCount, Filter, Heatmap, HeatmapCell, MonthlyOffenses, OffenseSeries, TopCategories,
    Weekday,
};
use moosicbox_json_utils::database::ToValue as _;
use switchy_database::{DatabaseValue, Row};

use crate::AnalyticsError;
use crate::filter::{build_filter, where_clause};

fn conversion(column: &str, e: impl std::fmt::Display) -> AnalyticsError {
    AnalyticsError::Conversion {
        message: format!("Failed to read column '{column}': {e}"),
    }
}

fn count_column(row: &Row, column: &str) -> Result<u64, AnalyticsError> {
    let value: i64 = row.to_value(column).map_err(|e| conversion(column, e))?;
    u64::try_from(value).map_err(|e| conversion(column, e))
}

/// Reads a nullable sum, treating NULL as zero.
fn sum_column(row: &Row, column: &str) -> Result<u64, AnalyticsError> {
    let value: Option<i64> = row.to_value(column).map_err(|e| conversion(column, e))?;
    u64::try_from(value.unwrap_or(0)).map_err(|e| conversion(column, e))
}

fn month_column(row: &Row, column: &str) -> Result<NaiveDate, AnalyticsError> {
    let text: String = row.to_value(column).map_err(|e| conversion(column, e))?;
    NaiveDate::parse_from_str(&text, "%Y-%m-%d").map_err(|e| conversion(column, e))
}

/// Lists the distinct months present in the whole dataset, ascending.
///
/// Each timestamp is truncated to its month before deduplication, so the
/// result holds one first-of-month date per month with data.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the database query fails.
pub async fn list_available_months(store: &CrimeStore) -> Result<Vec<NaiveDate>, AnalyticsError> {
    let bucket = store.backend().month_bucket("occurred_at");
    let sql = format!(
        "SELECT DISTINCT {bucket} as year_month
         FROM crimes
         WHERE occurred_at IS NOT NULL
         ORDER BY year_month"
    );

    let rows = store.db().query_raw_params(&sql, &[]).await?;
    let months = rows
        .iter()
        .map(|row| month_column(row, "year_month"))
        .collect::<Result<Vec<_>, _>>()?;

    log::debug!("Found {} available month(s)", months.len());
    Ok(months)
}

/// Lists the distinct non-null districts in the whole dataset.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the database query fails.
pub async fn list_available_districts(
    store: &CrimeStore,
) -> Result<BTreeSet<String>, AnalyticsError> {
    let rows = store
        .db()
        .query_raw_params(
            "SELECT DISTINCT district FROM crimes WHERE district IS NOT NULL",
            &[],
        )
        .await?;

    let districts = rows
        .iter()
        .map(|row| {
            let district: String = row
                .to_value("district")
                .map_err(|e| conversion("district", e))?;
            Ok(district)
        })
        .collect::<Result<BTreeSet<_>, AnalyticsError>>()?;

    log::debug!("Found {} available district(s)", districts.len());
    Ok(districts)
}

/// Counts every incident in the store, ignoring any filter.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the database query fails.
pub async fn count_incidents(store: &CrimeStore) -> Result<u64, AnalyticsError> {
    let rows = store
        .db()
        .query_raw_params("SELECT COUNT(*) as total FROM crimes", &[])
        .await?;

    rows.first()
        .map_or(Ok(0), |row| count_column(row, "total"))
}

/// Monthly offense and shooting counts for the filter, ascending by month.
///
/// Months without a shooting report zero shootings.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidFilter`] before querying if the date
/// range is inverted, or [`AnalyticsError`] if the query fails.
pub async fn offense_series(
    store: &CrimeStore,
    filter: &Filter,
) -> Result<OffenseSeries, AnalyticsError> {
    filter.validate()?;

    let backend = store.backend();
    let (frags, params, _) = build_filter(backend, filter, 1);
    let wc = where_clause(&frags);
    let bucket = backend.month_bucket("occurred_at");

    let sql = format!(
        "SELECT {bucket} as year_month,
                COUNT(*) as num_offenses,
                SUM(shooting) as num_shootings
         FROM crimes
         {wc}
         GROUP BY year_month
         ORDER BY year_month"
    );

    let rows = store.db().query_raw_params(&sql, &params).await?;

    let rows = rows
        .iter()
        .map(|row| {
            Ok(MonthlyOffenses {
                year_month: month_column(row, "year_month")?,
                num_offenses: count_column(row, "num_offenses")?,
                num_shootings: sum_column(row, "num_shootings")?,
            })
        })
        .collect::<Result<Vec<_>, AnalyticsError>>()?;

    log::debug!(
        "offense_series({}, {} district(s)): {} month(s)",
        filter.date_range,
        filter.districts.len(),
        rows.len()
    );

    Ok(OffenseSeries { rows })
}

/// The `limit` most frequent offense categories for the filter.
///
/// Rows are ordered by count descending; equal counts are ordered by
/// category name.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidFilter`] before querying if the date
/// range is inverted, or [`AnalyticsError`] if the query fails.
pub async fn top_categories(
    store: &CrimeStore,
    filter: &Filter,
    limit: u32,
) -> Result<TopCategories, AnalyticsError> {
    filter.validate()?;

    let backend = store.backend();
    let (frags, mut params, next_idx) = build_filter(backend, filter, 1);
    let wc = where_clause(&frags);

    let sql = format!(
        "SELECT offense_code_group as code_group, COUNT(*) as counts
         FROM crimes
         {wc}
         GROUP BY offense_code_group
         ORDER BY counts DESC, code_group
         LIMIT {}",
        backend.placeholder(next_idx)
    );
    params.push(DatabaseValue::Int64(i64::from(limit)));

    let rows = store.db().query_raw_params(&sql, &params).await?;

    let rows = rows
        .iter()
        .map(|row| {
            Ok(CategoryCount {
                code_group: row
                    .to_value("code_group")
                    .map_err(|e| conversion("code_group", e))?,
                counts: count_column(row, "counts")?,
            })
        })
        .collect::<Result<Vec<_>, AnalyticsError>>()?;

    log::debug!(
        "top_categories({}, limit {limit}): {} row(s)",
        filter.date_range,
        rows.len()
    );

    Ok(TopCategories { rows })
}

/// Incident counts per (day-of-week, hour) pair for the filter.
///
/// Cells come back in grouping order, which is not meaningful; call
/// [`Heatmap::in_canonical_order`] before display.
///
/// # Errors
///
/// Returns [`AnalyticsError::InvalidFilter`] before querying if the date
/// range is inverted, [`AnalyticsError::Conversion`] if a stored
/// day-of-week label or hour is out of range, or [`AnalyticsError`] if the
/// query fails.
pub async fn heatmap(store: &CrimeStore, filter: &Filter) -> Result<Heatmap, AnalyticsError> {
    filter.validate()?;

    let (frags, params, _) = build_filter(store.backend(), filter, 1);
    let wc = where_clause(&frags);

    let sql = format!(
        "SELECT day_of_week, CAST(hour AS BIGINT) as hour, COUNT(*) as counts
         FROM crimes
         {wc}
         GROUP BY day_of_week, hour"
    );

    let rows = store.db().query_raw_params(&sql, &params).await?;

    let cells = rows
        .iter()
        .map(|row| {
            let day: String = row
                .to_value("day_of_week")
                .map_err(|e| conversion("day_of_week", e))?;
            let day_of_week = day
                .trim()
                .parse::<Weekday>()
                .map_err(|_| conversion("day_of_week", format!("unknown day {day:?}")))?;

            let hour: i64 = row.to_value("hour").map_err(|e| conversion("hour", e))?;
            let hour = u8::try_from(hour)
                .ok()
                .filter(|h| *h < 24)
                .ok_or_else(|| conversion("hour", format!("hour {hour} out of range")))?;

            Ok(HeatmapCell {
                day_of_week,
                hour,
                counts: count_column(row, "counts")?,
            })
        })
        .collect::<Result<Vec<_>, AnalyticsError>>()?;

    log::debug!("heatmap({}): {} cell(s)", filter.date_range, cells.len());

    Ok(Heatmap { cells })
}
