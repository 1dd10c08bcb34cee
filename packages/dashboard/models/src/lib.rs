#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filter, aggregate table, and render state types for the crime dashboard.
//!
//! A [`Filter`] (inclusive [`DateRange`] plus a district set) constrains
//! every aggregate query. Query results come back as row-oriented tables
//! ([`OffenseSeries`], [`TopCategories`], [`Heatmap`]) that can be turned
//! into column maps for chart renderers. A [`RenderState`] bundles one
//! complete set of tables for a single filter.

use std::collections::BTreeSet;

use chrono::{Datelike as _, NaiveDate, NaiveDateTime, NaiveTime};
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default number of rows returned by the top-categories query.
pub const DEFAULT_TOP_LIMIT: u32 = 10;

/// Errors raised while building or validating a [`Filter`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FilterError {
    /// The range starts after it ends.
    #[error("Invalid date range: start {start} is after end {end}")]
    InvertedDateRange {
        /// Requested start date.
        start: NaiveDate,
        /// Requested end date.
        end: NaiveDate,
    },

    /// A date string could not be parsed.
    #[error("Invalid date '{value}': expected format YYYY-MM-DD")]
    InvalidDate {
        /// The rejected input.
        value: String,
    },
}

/// Inclusive calendar date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DateRange {
    /// First included day.
    pub start: NaiveDate,
    /// Last included day.
    pub end: NaiveDate,
}

impl DateRange {
    /// Creates a validated date range.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvertedDateRange`] if `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self, FilterError> {
        let range = Self { start, end };
        range.validate()?;
        Ok(range)
    }

    /// Parses two `YYYY-MM-DD` strings into a validated range.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if either date is malformed or the range is
    /// inverted.
    pub fn parse(start: &str, end: &str) -> Result<Self, FilterError> {
        Self::new(parse_date(start)?, parse_date(end)?)
    }

    /// Checks the `start <= end` invariant.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::InvertedDateRange`] if `start > end`.
    pub fn validate(&self) -> Result<(), FilterError> {
        if self.start > self.end {
            return Err(FilterError::InvertedDateRange {
                start: self.start,
                end: self.end,
            });
        }
        Ok(())
    }

    /// Returns `true` if `date` falls within the range.
    #[must_use]
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }

    /// Midnight at the start of the first day.
    #[must_use]
    pub fn lower_bound(&self) -> NaiveDateTime {
        self.start.and_time(NaiveTime::MIN)
    }

    /// Midnight at the start of the day after the last day.
    ///
    /// Timestamps strictly below this value are inside the range, which
    /// keeps every incident of the final day regardless of sub-second
    /// precision.
    #[must_use]
    pub fn upper_bound_exclusive(&self) -> NaiveDateTime {
        self.end.succ_opt().map_or_else(
            || NaiveDateTime::MAX,
            |next| next.and_time(NaiveTime::MIN),
        )
    }

    /// Builds the range spanning the given month starts, from the first
    /// day of the earliest month through the last day of the latest.
    ///
    /// Returns `None` if `months` is empty.
    #[must_use]
    pub fn spanning_months(months: &[NaiveDate]) -> Option<Self> {
        let first = months.iter().min()?;
        let last = months.iter().max()?;
        Some(Self {
            start: month_start(*first),
            end: month_end(*last),
        })
    }
}

impl std::fmt::Display for DateRange {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} to {}", self.start, self.end)
    }
}

/// Parses a `YYYY-MM-DD` date string.
///
/// # Errors
///
/// Returns [`FilterError::InvalidDate`] if the string is malformed.
pub fn parse_date(s: &str) -> Result<NaiveDate, FilterError> {
    NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map_err(|_| FilterError::InvalidDate {
        value: s.to_string(),
    })
}

/// Returns the first day of `date`'s month.
#[must_use]
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Returns the last day of `date`'s month.
#[must_use]
pub fn month_end(date: NaiveDate) -> NaiveDate {
    let (year, month) = if date.month() == 12 {
        (date.year() + 1, 1)
    } else {
        (date.year(), date.month() + 1)
    };
    NaiveDate::from_ymd_opt(year, month, 1)
        .and_then(|next| next.pred_opt())
        .unwrap_or(date)
}

/// Splits a comma-separated district list into a set.
///
/// Blank entries are dropped, so `""` yields the empty set.
#[must_use]
pub fn parse_districts(s: &str) -> BTreeSet<String> {
    s.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(ToString::to_string)
        .collect()
}

/// The (date range, district set) pair constraining every aggregate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Filter {
    /// Inclusive date range.
    pub date_range: DateRange,
    /// Selected districts. Empty means no incidents match.
    pub districts: BTreeSet<String>,
}

impl Filter {
    /// Creates a filter from a date range and any iterable of districts.
    #[must_use]
    pub fn new<I, S>(date_range: DateRange, districts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            date_range,
            districts: districts.into_iter().map(Into::into).collect(),
        }
    }

    /// Checks the filter invariants.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError`] if the date range is inverted.
    pub fn validate(&self) -> Result<(), FilterError> {
        self.date_range.validate()
    }
}

/// Day of the week as stored in the `day_of_week` column.
///
/// Variant order is the canonical Monday→Sunday order, so sorting by this
/// type never falls back to lexical order.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[strum(ascii_case_insensitive)]
pub enum Weekday {
    /// Monday
    Monday,
    /// Tuesday
    Tuesday,
    /// Wednesday
    Wednesday,
    /// Thursday
    Thursday,
    /// Friday
    Friday,
    /// Saturday
    Saturday,
    /// Sunday
    Sunday,
}

impl Weekday {
    /// All days in canonical order.
    pub const ALL: [Self; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];
}

impl From<chrono::Weekday> for Weekday {
    fn from(value: chrono::Weekday) -> Self {
        match value {
            chrono::Weekday::Mon => Self::Monday,
            chrono::Weekday::Tue => Self::Tuesday,
            chrono::Weekday::Wed => Self::Wednesday,
            chrono::Weekday::Thu => Self::Thursday,
            chrono::Weekday::Fri => Self::Friday,
            chrono::Weekday::Sat => Self::Saturday,
            chrono::Weekday::Sun => Self::Sunday,
        }
    }
}

/// One month of the offense/shooting series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MonthlyOffenses {
    /// First day of the month.
    pub year_month: NaiveDate,
    /// Number of incidents in the month.
    pub num_offenses: u64,
    /// Number of incidents flagged as shootings. Zero, never absent.
    pub num_shootings: u64,
}

/// Mean monthly counts over a series or a selection of it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeriesSummary {
    /// Mean offenses per month.
    pub mean_offenses: f64,
    /// Mean shootings per month.
    pub mean_shootings: f64,
}

impl SeriesSummary {
    /// Averages the given rows. No rows gives a zero summary.
    #[must_use]
    pub fn from_rows<'a>(rows: impl IntoIterator<Item = &'a MonthlyOffenses>) -> Self {
        let (n, offenses, shootings) = rows
            .into_iter()
            .fold((0u64, 0u64, 0u64), |(n, o, s), row| {
                (n + 1, o + row.num_offenses, s + row.num_shootings)
            });

        if n == 0 {
            return Self::default();
        }

        #[allow(clippy::cast_precision_loss)]
        let (n, offenses, shootings) = (n as f64, offenses as f64, shootings as f64);

        Self {
            mean_offenses: offenses / n,
            mean_shootings: shootings / n,
        }
    }
}

/// Monthly offense/shooting series, ascending by month.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffenseSeries {
    /// One row per month present in the filtered data.
    pub rows: Vec<MonthlyOffenses>,
}

impl OffenseSeries {
    /// Returns `true` if no month matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Sum of `num_offenses` across all months.
    #[must_use]
    pub fn total_offenses(&self) -> u64 {
        self.rows.iter().map(|r| r.num_offenses).sum()
    }

    /// Sum of `num_shootings` across all months.
    #[must_use]
    pub fn total_shootings(&self) -> u64 {
        self.rows.iter().map(|r| r.num_shootings).sum()
    }

    /// Summary over every month.
    #[must_use]
    pub fn summary(&self) -> SeriesSummary {
        SeriesSummary::from_rows(&self.rows)
    }

    /// Summary over the rows at `indices` only.
    ///
    /// Out-of-range indices are skipped and duplicates count once. An
    /// empty selection falls back to [`Self::summary`].
    #[must_use]
    pub fn selection_summary(&self, indices: &[usize]) -> SeriesSummary {
        if indices.is_empty() {
            return self.summary();
        }
        let unique: BTreeSet<usize> = indices.iter().copied().collect();
        SeriesSummary::from_rows(unique.into_iter().filter_map(|i| self.rows.get(i)))
    }

    /// Column-oriented copy of the series.
    #[must_use]
    pub fn columns(&self) -> OffenseColumns {
        OffenseColumns {
            year_month: self.rows.iter().map(|r| r.year_month).collect(),
            num_offenses: self.rows.iter().map(|r| r.num_offenses).collect(),
            num_shootings: self.rows.iter().map(|r| r.num_shootings).collect(),
        }
    }
}

/// Column map of an [`OffenseSeries`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OffenseColumns {
    /// Month-start dates.
    pub year_month: Vec<NaiveDate>,
    /// Offense counts, aligned with `year_month`.
    pub num_offenses: Vec<u64>,
    /// Shooting counts, aligned with `year_month`.
    pub num_shootings: Vec<u64>,
}

/// Count of incidents in one offense category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryCount {
    /// Offense code group label.
    pub code_group: String,
    /// Number of incidents.
    pub counts: u64,
}

/// Most frequent offense categories, descending by count.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopCategories {
    /// At most `limit` rows.
    pub rows: Vec<CategoryCount>,
}

impl TopCategories {
    /// Returns `true` if no category matched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column-oriented copy of the table.
    #[must_use]
    pub fn columns(&self) -> CategoryColumns {
        CategoryColumns {
            code_group: self.rows.iter().map(|r| r.code_group.clone()).collect(),
            counts: self.rows.iter().map(|r| r.counts).collect(),
        }
    }
}

/// Column map of a [`TopCategories`] table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryColumns {
    /// Category labels.
    pub code_group: Vec<String>,
    /// Counts aligned with `code_group`.
    pub counts: Vec<u64>,
}

/// Incident count for one (day-of-week, hour) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapCell {
    /// Day of the week.
    pub day_of_week: Weekday,
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Number of incidents.
    pub counts: u64,
}

/// Day/hour incident counts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Heatmap {
    /// One cell per observed pair, in whatever order it was produced.
    pub cells: Vec<HeatmapCell>,
}

impl Heatmap {
    /// Returns `true` if no pair was observed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cells.is_empty()
    }

    /// Sorts cells Monday→Sunday, then by hour.
    #[must_use]
    pub fn in_canonical_order(mut self) -> Self {
        self.cells.sort_by_key(|c| (c.day_of_week, c.hour));
        self
    }

    /// Column-oriented copy of the cells.
    #[must_use]
    pub fn columns(&self) -> HeatmapColumns {
        HeatmapColumns {
            day_of_week: self.cells.iter().map(|c| c.day_of_week).collect(),
            hour: self.cells.iter().map(|c| c.hour).collect(),
            counts: self.cells.iter().map(|c| c.counts).collect(),
        }
    }
}

/// Column map of a [`Heatmap`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HeatmapColumns {
    /// Days of the week.
    pub day_of_week: Vec<Weekday>,
    /// Hours aligned with `day_of_week`.
    pub hour: Vec<u8>,
    /// Counts aligned with `day_of_week`.
    pub counts: Vec<u64>,
}

/// Everything a renderer needs for one filter.
///
/// A new value is built for every update; nothing inside is mutated after
/// construction apart from the selection summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderState {
    /// Filter the tables were computed for.
    pub filter: Filter,
    /// Monthly series.
    pub series: OffenseSeries,
    /// Mean lines for the series (whole series or current selection).
    pub summary: SeriesSummary,
    /// Top offense categories.
    pub top_categories: TopCategories,
    /// Day/hour heatmap in canonical order.
    pub heatmap: Heatmap,
    /// Indices of the selected series rows. Empty means no selection.
    pub selection: Vec<usize>,
}

impl RenderState {
    /// Builds a render state with no selection.
    #[must_use]
    pub fn new(
        filter: Filter,
        series: OffenseSeries,
        top_categories: TopCategories,
        heatmap: Heatmap,
    ) -> Self {
        let summary = series.summary();
        Self {
            filter,
            series,
            summary,
            top_categories,
            heatmap: heatmap.in_canonical_order(),
            selection: Vec::new(),
        }
    }

    /// Returns a copy with the summary recomputed over `selection`.
    #[must_use]
    pub fn with_selection(&self, selection: Vec<usize>) -> Self {
        Self {
            summary: self.series.selection_summary(&selection),
            selection,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn month(y: i32, m: u32, offenses: u64, shootings: u64) -> MonthlyOffenses {
        MonthlyOffenses {
            year_month: date(y, m, 1),
            num_offenses: offenses,
            num_shootings: shootings,
        }
    }

    #[test]
    fn date_range_rejects_inverted() {
        let err = DateRange::new(date(2020, 2, 1), date(2020, 1, 1)).unwrap_err();
        assert_eq!(
            err,
            FilterError::InvertedDateRange {
                start: date(2020, 2, 1),
                end: date(2020, 1, 1),
            }
        );
        assert!(DateRange::new(date(2020, 1, 1), date(2020, 1, 1)).is_ok());
    }

    #[test]
    fn date_range_parse_rejects_garbage() {
        assert!(matches!(
            DateRange::parse("2020-13-01", "2020-12-31"),
            Err(FilterError::InvalidDate { .. })
        ));
        let range = DateRange::parse(" 2020-01-01", "2020-01-31 ").unwrap();
        assert_eq!(range.end, date(2020, 1, 31));
    }

    #[test]
    fn date_range_bounds_cover_whole_end_day() {
        let range = DateRange::new(date(2020, 1, 1), date(2020, 1, 31)).unwrap();
        assert_eq!(range.lower_bound(), date(2020, 1, 1).and_time(NaiveTime::MIN));
        assert_eq!(
            range.upper_bound_exclusive(),
            date(2020, 2, 1).and_time(NaiveTime::MIN)
        );
        assert!(range.contains(date(2020, 1, 31)));
        assert!(!range.contains(date(2020, 2, 1)));
    }

    #[test]
    fn month_end_handles_leap_years_and_december() {
        assert_eq!(month_end(date(2020, 2, 10)), date(2020, 2, 29));
        assert_eq!(month_end(date(2019, 2, 1)), date(2019, 2, 28));
        assert_eq!(month_end(date(2019, 12, 5)), date(2019, 12, 31));
    }

    #[test]
    fn spanning_months_runs_to_end_of_last_month() {
        let range = DateRange::spanning_months(&[date(2019, 3, 1), date(2018, 6, 1)]).unwrap();
        assert_eq!(range.start, date(2018, 6, 1));
        assert_eq!(range.end, date(2019, 3, 31));
        assert!(DateRange::spanning_months(&[]).is_none());
    }

    #[test]
    fn parse_districts_drops_blanks() {
        assert!(parse_districts("").is_empty());
        let set = parse_districts(" B2, A1 ,,B2");
        assert_eq!(set.into_iter().collect::<Vec<_>>(), vec!["A1", "B2"]);
    }

    #[test]
    fn weekday_sorts_canonically_not_lexically() {
        let mut days = vec![Weekday::Sunday, Weekday::Friday, Weekday::Monday];
        days.sort();
        assert_eq!(days, vec![Weekday::Monday, Weekday::Friday, Weekday::Sunday]);
        assert_eq!("wednesday".parse::<Weekday>().unwrap(), Weekday::Wednesday);
        assert_eq!(Weekday::Thursday.to_string(), "Thursday");
        assert_eq!(Weekday::from(chrono::Weekday::Sat), Weekday::Saturday);
    }

    #[test]
    fn heatmap_canonical_order_sorts_by_day_then_hour() {
        let cell = |day_of_week, hour| HeatmapCell {
            day_of_week,
            hour,
            counts: 1,
        };
        let heatmap = Heatmap {
            cells: vec![
                cell(Weekday::Sunday, 1),
                cell(Weekday::Monday, 23),
                cell(Weekday::Friday, 0),
                cell(Weekday::Monday, 2),
            ],
        }
        .in_canonical_order();

        let order: Vec<_> = heatmap
            .cells
            .iter()
            .map(|c| (c.day_of_week, c.hour))
            .collect();
        assert_eq!(
            order,
            vec![
                (Weekday::Monday, 2),
                (Weekday::Monday, 23),
                (Weekday::Friday, 0),
                (Weekday::Sunday, 1),
            ]
        );
    }

    #[test]
    fn empty_series_summarizes_to_zero() {
        let summary = OffenseSeries::default().summary();
        assert!(summary.mean_offenses.abs() < f64::EPSILON);
        assert!(summary.mean_shootings.abs() < f64::EPSILON);
    }

    #[test]
    fn selection_summary_uses_only_selected_rows() {
        let series = OffenseSeries {
            rows: vec![month(2020, 1, 10, 0), month(2020, 2, 20, 2), month(2020, 3, 60, 4)],
        };

        let all = series.summary();
        assert!((all.mean_offenses - 30.0).abs() < f64::EPSILON);
        assert!((all.mean_shootings - 2.0).abs() < f64::EPSILON);

        let selected = series.selection_summary(&[1, 2, 2, 99]);
        assert!((selected.mean_offenses - 40.0).abs() < f64::EPSILON);
        assert!((selected.mean_shootings - 3.0).abs() < f64::EPSILON);

        assert_eq!(series.selection_summary(&[]), all);
    }

    #[test]
    fn columns_are_row_aligned() {
        let series = OffenseSeries {
            rows: vec![month(2020, 1, 3, 1), month(2020, 2, 5, 0)],
        };
        let cols = series.columns();
        assert_eq!(cols.year_month, vec![date(2020, 1, 1), date(2020, 2, 1)]);
        assert_eq!(cols.num_offenses, vec![3, 5]);
        assert_eq!(cols.num_shootings, vec![1, 0]);

        let json = serde_json::to_value(&cols).unwrap();
        assert_eq!(json["yearMonth"][1], "2020-02-01");
    }

    #[test]
    fn top_category_columns_keep_row_order() {
        let top = TopCategories {
            rows: vec![
                CategoryCount {
                    code_group: "Larceny".to_string(),
                    counts: 9,
                },
                CategoryCount {
                    code_group: "Vandalism".to_string(),
                    counts: 4,
                },
            ],
        };
        let columns = top.columns();
        assert_eq!(columns.code_group, vec!["Larceny", "Vandalism"]);
        assert_eq!(columns.counts, vec![9, 4]);
    }

    #[test]
    fn render_state_with_selection_keeps_tables() {
        let filter = Filter::new(
            DateRange::new(date(2020, 1, 1), date(2020, 3, 31)).unwrap(),
            ["A1"],
        );
        let series = OffenseSeries {
            rows: vec![month(2020, 1, 2, 0), month(2020, 2, 4, 2)],
        };
        let state = RenderState::new(
            filter,
            series,
            TopCategories::default(),
            Heatmap::default(),
        );
        assert!((state.summary.mean_offenses - 3.0).abs() < f64::EPSILON);

        let selected = state.with_selection(vec![1]);
        assert_eq!(selected.selection, vec![1]);
        assert!((selected.summary.mean_offenses - 4.0).abs() < f64::EPSILON);
        assert_eq!(selected.series, state.series);
    }
}
