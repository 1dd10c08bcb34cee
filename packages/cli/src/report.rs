//! Plain-text rendering of the dashboard tables.

use std::fmt::Write as _;

use crime_dashboard::DashboardError;
use crime_dashboard_analytics::{AnalyticsError, queries};
use crime_dashboard_database::CrimeStore;
use crime_dashboard_models::{DateRange, Filter, RenderState, Weekday, parse_date, parse_districts};

/// Builds the filter for `report`.
///
/// Missing dates default to the span of the whole dataset and missing
/// districts to every district, so a bare `report` covers everything.
///
/// # Errors
///
/// Returns [`DashboardError::NoData`] if a date is missing and the store is
/// empty, or [`DashboardError::Analytics`] if a date is malformed, the
/// range is inverted, or a listing query fails.
pub async fn resolve_filter(
    store: &CrimeStore,
    from: Option<&str>,
    to: Option<&str>,
    districts: Option<&str>,
) -> Result<Filter, DashboardError> {
    let districts = match districts {
        Some(list) => parse_districts(list),
        None => queries::list_available_districts(store).await?,
    };

    let date_range = if let (Some(from), Some(to)) = (from, to) {
        DateRange::parse(from, to).map_err(AnalyticsError::from)?
    } else {
        let months = queries::list_available_months(store).await?;
        let span = DateRange::spanning_months(&months).ok_or(DashboardError::NoData)?;
        let start = from
            .map_or(Ok(span.start), parse_date)
            .map_err(AnalyticsError::from)?;
        let end = to
            .map_or(Ok(span.end), parse_date)
            .map_err(AnalyticsError::from)?;
        DateRange::new(start, end).map_err(AnalyticsError::from)?
    };

    Ok(Filter {
        date_range,
        districts,
    })
}

/// Runs the three aggregates, with `limit` top categories.
///
/// # Errors
///
/// Returns [`AnalyticsError`] if the filter is invalid or a query fails.
pub async fn build(
    store: &CrimeStore,
    filter: &Filter,
    limit: u32,
) -> Result<RenderState, AnalyticsError> {
    let series = queries::offense_series(store, filter).await?;
    let top = queries::top_categories(store, filter, limit).await?;
    let heatmap = queries::heatmap(store, filter).await?;
    Ok(RenderState::new(filter.clone(), series, top, heatmap))
}

/// Formats a render state as text tables.
#[must_use]
pub fn format_state(state: &RenderState) -> String {
    let mut out = String::new();
    let filter = &state.filter;

    let districts = if filter.districts.is_empty() {
        "(none)".to_string()
    } else {
        filter
            .districts
            .iter()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    };
    let _ = writeln!(out, "Range:     {}", filter.date_range);
    let _ = writeln!(out, "Districts: {districts}");
    let _ = writeln!(out);

    let _ = writeln!(out, "Monthly offenses");
    if state.series.is_empty() {
        let _ = writeln!(out, "  (no incidents)");
    } else {
        let _ = writeln!(out, "  {:<3} {:<8} {:>9} {:>9}", "#", "month", "offenses", "shootings");
        for (i, row) in state.series.rows.iter().enumerate() {
            let marker = if state.selection.contains(&i) { '*' } else { ' ' };
            let _ = writeln!(
                out,
                "{marker} {i:<3} {:<8} {:>9} {:>9}",
                row.year_month.format("%Y-%m"),
                row.num_offenses,
                row.num_shootings
            );
        }
    }
    let scope = if state.selection.is_empty() {
        "all months"
    } else {
        "selected months"
    };
    let _ = writeln!(
        out,
        "  mean offenses {:.1}, mean shootings {:.2} ({scope})",
        state.summary.mean_offenses, state.summary.mean_shootings
    );
    let _ = writeln!(out);

    let _ = writeln!(out, "Top offense categories");
    if state.top_categories.is_empty() {
        let _ = writeln!(out, "  (no incidents)");
    }
    let width = state
        .top_categories
        .rows
        .iter()
        .map(|r| r.code_group.len())
        .max()
        .unwrap_or(0);
    for row in &state.top_categories.rows {
        let _ = writeln!(out, "  {:<width$} {:>8}", row.code_group, row.counts);
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Incidents by day and hour");
    if state.heatmap.is_empty() {
        let _ = writeln!(out, "  (no incidents)");
    } else {
        out.push_str(&format_heatmap(state));
    }

    out
}

/// A 7x24 grid, Monday first. Pairs with no incidents are shown as `.`.
fn format_heatmap(state: &RenderState) -> String {
    let mut grid = [[0u64; 24]; 7];
    for cell in &state.heatmap.cells {
        if let Some(pos) = Weekday::ALL.iter().position(|d| *d == cell.day_of_week) {
            grid[pos][usize::from(cell.hour % 24)] = cell.counts;
        }
    }

    let mut out = String::from("     ");
    for hour in 0..24 {
        let _ = write!(out, "{hour:>4}");
    }
    out.push('\n');

    for (day, counts) in Weekday::ALL.iter().zip(grid) {
        let _ = write!(out, "  {:<3}", &day.as_ref()[..3]);
        for count in counts {
            if count == 0 {
                out.push_str("   .");
            } else {
                let _ = write!(out, "{count:>4}");
            }
        }
        out.push('\n');
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use crime_dashboard_models::{
        CategoryCount, Heatmap, HeatmapCell, MonthlyOffenses, OffenseSeries, TopCategories,
    };

    use super::*;

    fn state() -> RenderState {
        let filter = Filter::new(
            DateRange::new(
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 2, 29).unwrap(),
            )
            .unwrap(),
            ["A"],
        );
        RenderState::new(
            filter,
            OffenseSeries {
                rows: vec![
                    MonthlyOffenses {
                        year_month: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                        num_offenses: 2,
                        num_shootings: 1,
                    },
                    MonthlyOffenses {
                        year_month: NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
                        num_offenses: 4,
                        num_shootings: 0,
                    },
                ],
            },
            TopCategories {
                rows: vec![CategoryCount {
                    code_group: "Larceny".to_string(),
                    counts: 6,
                }],
            },
            Heatmap {
                cells: vec![
                    HeatmapCell {
                        day_of_week: Weekday::Sunday,
                        hour: 10,
                        counts: 5,
                    },
                    HeatmapCell {
                        day_of_week: Weekday::Monday,
                        hour: 0,
                        counts: 1,
                    },
                ],
            },
        )
    }

    #[test]
    fn text_lists_every_table() {
        let text = format_state(&state());

        assert!(text.contains("Districts: A"));
        assert!(text.contains("2020-01"));
        assert!(text.contains("2020-02"));
        assert!(text.contains("mean offenses 3.0, mean shootings 0.50 (all months)"));
        assert!(text.contains("Larceny"));
    }

    #[test]
    fn heatmap_rows_start_on_monday() {
        let text = format_heatmap(&state());
        let rows: Vec<&str> = text.lines().skip(1).collect();

        assert_eq!(rows.len(), 7);
        assert!(rows[0].trim_start().starts_with("Mon"));
        assert!(rows[6].trim_start().starts_with("Sun"));
        // Monday 00:00 is the first cell.
        assert!(rows[0][5..9].trim() == "1");
        assert!(rows[6].ends_with("   .") && rows[6].contains("   5"));
    }

    #[test]
    fn selection_is_marked_and_summarized() {
        let text = format_state(&state().with_selection(vec![1]));

        assert!(text.contains("* 1"));
        assert!(text.contains("mean offenses 4.0, mean shootings 0.00 (selected months)"));
    }

    #[test]
    fn empty_tables_say_so() {
        let filter = Filter::new(state().filter.date_range, Vec::<String>::new());
        let text = format_state(&RenderState::new(
            filter,
            OffenseSeries::default(),
            TopCategories::default(),
            Heatmap::default(),
        ));

        assert!(text.contains("Districts: (none)"));
        assert_eq!(text.matches("(no incidents)").count(), 3);
    }

    async fn store(incidents: &[(&str, &str)]) -> (tempfile::TempDir, CrimeStore) {
        use chrono::{Datelike as _, NaiveDateTime, Timelike as _};
        use crime_dashboard_database::db::open_sqlite;
        use crime_dashboard_database::schema::{NewIncident, ensure_crimes_table, insert_incidents};

        let dir = tempfile::tempdir().unwrap();
        let store = open_sqlite(&dir.path().join("crimes.db")).unwrap();
        ensure_crimes_table(&store).await.unwrap();
        let incidents: Vec<NewIncident> = incidents
            .iter()
            .map(|(at, district)| {
                let occurred_at = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S").unwrap();
                NewIncident {
                    occurred_at,
                    district: Some((*district).to_string()),
                    offense_code_group: "Larceny".to_string(),
                    day_of_week: Weekday::from(occurred_at.weekday()),
                    hour: u8::try_from(occurred_at.hour()).unwrap(),
                    shooting: false,
                }
            })
            .collect();
        insert_incidents(&store, &incidents).await.unwrap();
        (dir, store)
    }

    #[tokio::test]
    async fn bare_report_covers_everything() {
        let (_dir, store) = store(&[("2019-11-03 12:00:00", "A"), ("2020-02-14 09:00:00", "B")]).await;

        let filter = resolve_filter(&store, None, None, None).await.unwrap();
        assert_eq!(
            filter.date_range,
            DateRange::parse("2019-11-01", "2020-02-29").unwrap()
        );
        assert_eq!(filter.districts.len(), 2);

        let state = build(&store, &filter, 10).await.unwrap();
        assert_eq!(state.series.total_offenses(), 2);
    }

    #[tokio::test]
    async fn one_missing_bound_is_filled_from_the_dataset() {
        let (_dir, store) = store(&[("2019-11-03 12:00:00", "A"), ("2020-02-14 09:00:00", "B")]).await;

        let filter = resolve_filter(&store, Some("2020-01-01"), None, Some("B"))
            .await
            .unwrap();
        assert_eq!(
            filter.date_range,
            DateRange::parse("2020-01-01", "2020-02-29").unwrap()
        );
        assert_eq!(filter.districts.into_iter().collect::<Vec<_>>(), vec!["B"]);
    }

    #[tokio::test]
    async fn empty_store_has_no_default_range() {
        let (_dir, store) = store(&[]).await;

        assert!(matches!(
            resolve_filter(&store, None, None, None).await,
            Err(DashboardError::NoData)
        ));
        assert!(
            resolve_filter(&store, Some("2020-01-01"), Some("2020-01-31"), None)
                .await
                .is_ok()
        );
    }
}
