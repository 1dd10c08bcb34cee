#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Filter state and event dispatch for the crime dashboard.
//!
//! A [`Dashboard`] owns the current [`Filter`] and the last
//! [`RenderState`]. UI layers feed it [`DashboardEvent`]s; each event is
//! folded into the filter and becomes a [`DashboardCommand`], and handling
//! the command produces a whole new render state.

pub mod events;

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::NaiveDate;
use crime_dashboard_analytics::{AnalyticsError, queries};
use crime_dashboard_database::CrimeStore;
use crime_dashboard_models::{DEFAULT_TOP_LIMIT, DateRange, Filter, RenderState};
use thiserror::Error;

pub use events::{DashboardCommand, DashboardEvent};

/// Errors that can occur while driving the dashboard.
#[derive(Debug, Error)]
pub enum DashboardError {
    /// A query failed or the filter was rejected.
    #[error(transparent)]
    Analytics(#[from] AnalyticsError),

    /// The store holds no incidents, so there is no initial date range.
    #[error("No incidents found in the store")]
    NoData,
}

/// Values offered by the filter widgets, computed once over the whole
/// dataset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DashboardOptions {
    /// Months with data, ascending, as month-start dates.
    pub months: Vec<NaiveDate>,
    /// Districts with data.
    pub districts: BTreeSet<String>,
}

impl DashboardOptions {
    /// Lists the available months and districts.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Analytics`] if either listing fails.
    pub async fn load(store: &CrimeStore) -> Result<Self, DashboardError> {
        Ok(Self {
            months: queries::list_available_months(store).await?,
            districts: queries::list_available_districts(store).await?,
        })
    }

    /// The filter the dashboard starts with: every month, every district.
    ///
    /// Returns `None` when there are no months.
    #[must_use]
    pub fn initial_filter(&self) -> Option<Filter> {
        let range = DateRange::spanning_months(&self.months)?;
        Some(Filter::new(range, self.districts.iter().cloned()))
    }
}

/// Runs the three aggregates for `filter` and bundles them.
///
/// This is the stateless form of [`DashboardCommand::Requery`].
///
/// # Errors
///
/// Returns [`DashboardError::Analytics`] if the filter is invalid or any
/// query fails. No partial state is returned.
pub async fn render(store: &CrimeStore, filter: &Filter) -> Result<RenderState, DashboardError> {
    let series = queries::offense_series(store, filter).await?;
    let top = queries::top_categories(store, filter, DEFAULT_TOP_LIMIT).await?;
    let heatmap = queries::heatmap(store, filter).await?;

    Ok(RenderState::new(filter.clone(), series, top, heatmap))
}

/// Interactive dashboard state.
pub struct Dashboard {
    store: Arc<CrimeStore>,
    options: DashboardOptions,
    filter: Filter,
    state: RenderState,
}

impl std::fmt::Debug for Dashboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dashboard")
            .field("filter", &self.filter)
            .field("months", &self.options.months.len())
            .field("districts", &self.options.districts.len())
            .finish_non_exhaustive()
    }
}

impl Dashboard {
    /// Loads the widget options and renders the initial filter.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::NoData`] if the store is empty, or
    /// [`DashboardError::Analytics`] if a query fails.
    pub async fn open(store: Arc<CrimeStore>) -> Result<Self, DashboardError> {
        let options = DashboardOptions::load(&store).await?;
        let filter = options.initial_filter().ok_or(DashboardError::NoData)?;

        log::info!(
            "Opening dashboard: {} month(s), {} district(s), range {}",
            options.months.len(),
            options.districts.len(),
            filter.date_range
        );

        let state = render(&store, &filter).await?;

        Ok(Self {
            store,
            options,
            filter,
            state,
        })
    }

    /// Widget options.
    #[must_use]
    pub const fn options(&self) -> &DashboardOptions {
        &self.options
    }

    /// The filter as edited so far. May be ahead of [`Self::state`] if
    /// the last requery failed.
    #[must_use]
    pub const fn filter(&self) -> &Filter {
        &self.filter
    }

    /// The most recent render state.
    #[must_use]
    pub const fn state(&self) -> &RenderState {
        &self.state
    }

    /// Folds `event` into the current filter and returns the command to
    /// run.
    pub fn command_for(&mut self, event: DashboardEvent) -> DashboardCommand {
        log::debug!("Dashboard event: {event:?}");
        events::apply(&mut self.filter, event)
    }

    /// Executes `command`, replacing the render state on success.
    ///
    /// On failure the previous render state is kept.
    ///
    /// # Errors
    ///
    /// Returns [`DashboardError::Analytics`] if the requery fails.
    pub async fn handle(
        &mut self,
        command: DashboardCommand,
    ) -> Result<&RenderState, DashboardError> {
        self.state = match command {
            DashboardCommand::Requery(filter) => render(&self.store, &filter).await?,
            DashboardCommand::Summarize(selection) => self.state.with_selection(selection),
        };
        Ok(&self.state)
    }

    /// [`Self::command_for`] followed by [`Self::handle`].
    ///
    /// # Errors
    ///
    /// See [`Self::handle`].
    pub async fn dispatch(
        &mut self,
        event: DashboardEvent,
    ) -> Result<&RenderState, DashboardError> {
        let command = self.command_for(event);
        self.handle(command).await
    }
}

#[cfg(test)]
mod tests {
    use chrono::{Datelike as _, NaiveDateTime, Timelike as _};
    use crime_dashboard_database::db::open_sqlite;
    use crime_dashboard_database::schema::{NewIncident, ensure_crimes_table, insert_incidents};
    use crime_dashboard_models::Weekday;
    use tempfile::TempDir;

    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn incident(at: &str, district: &str, group: &str, shooting: bool) -> NewIncident {
        let occurred_at = NaiveDateTime::parse_from_str(at, "%Y-%m-%d %H:%M:%S").unwrap();
        NewIncident {
            occurred_at,
            district: Some(district.to_string()),
            offense_code_group: group.to_string(),
            day_of_week: Weekday::from(occurred_at.weekday()),
            hour: u8::try_from(occurred_at.hour()).unwrap(),
            shooting,
        }
    }

    async fn fixture_store(incidents: &[NewIncident]) -> (TempDir, Arc<CrimeStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = open_sqlite(&dir.path().join("crimes.db")).unwrap();
        ensure_crimes_table(&store).await.unwrap();
        insert_incidents(&store, incidents).await.unwrap();
        (dir, Arc::new(store))
    }

    async fn fixture() -> (TempDir, Arc<CrimeStore>) {
        fixture_store(&[
            incident("2020-01-05 10:00:00", "A", "Larceny", true),
            incident("2020-01-31 23:30:00", "A", "Larceny", false),
            incident("2020-01-15 08:00:00", "B", "Vandalism", false),
            incident("2020-02-10 14:00:00", "A", "Larceny", false),
            incident("2020-02-11 14:00:00", "A", "Drug Violation", false),
            incident("2020-03-01 00:00:00", "B", "Vandalism", true),
        ])
        .await
    }

    #[tokio::test]
    async fn open_selects_everything() {
        let (_dir, store) = fixture().await;
        let dashboard = Dashboard::open(store).await.unwrap();

        assert_eq!(dashboard.filter().date_range.start, date(2020, 1, 1));
        assert_eq!(dashboard.filter().date_range.end, date(2020, 3, 31));
        assert_eq!(dashboard.filter().districts.len(), 2);

        let state = dashboard.state();
        assert_eq!(state.series.rows.len(), 3);
        assert_eq!(state.series.total_offenses(), 6);
        assert_eq!(state.top_categories.rows[0].code_group, "Larceny");
        assert!(state.selection.is_empty());
    }

    #[tokio::test]
    async fn open_on_empty_store_is_no_data() {
        let (_dir, store) = fixture_store(&[]).await;
        assert!(matches!(
            Dashboard::open(store).await,
            Err(DashboardError::NoData)
        ));
    }

    #[tokio::test]
    async fn district_change_replaces_every_table() {
        let (_dir, store) = fixture().await;
        let mut dashboard = Dashboard::open(store).await.unwrap();

        let state = dashboard
            .dispatch(DashboardEvent::DistrictsChanged(
                ["B".to_string()].into_iter().collect(),
            ))
            .await
            .unwrap();

        assert_eq!(state.series.rows.len(), 2);
        assert_eq!(state.series.total_shootings(), 1);
        assert_eq!(state.top_categories.rows.len(), 1);
        assert_eq!(state.top_categories.rows[0].code_group, "Vandalism");
        assert_eq!(state.heatmap.cells.len(), 2);
        assert_eq!(state.filter.date_range.end, date(2020, 3, 31));
    }

    #[tokio::test]
    async fn clearing_districts_renders_empty_tables() {
        let (_dir, store) = fixture().await;
        let mut dashboard = Dashboard::open(store).await.unwrap();

        let state = dashboard
            .dispatch(DashboardEvent::DistrictsChanged(BTreeSet::new()))
            .await
            .unwrap();

        assert!(state.series.is_empty());
        assert!(state.top_categories.is_empty());
        assert!(state.heatmap.is_empty());
    }

    #[tokio::test]
    async fn selection_summarizes_without_querying() {
        let (_dir, store) = fixture().await;
        let mut dashboard = Dashboard::open(Arc::clone(&store)).await.unwrap();

        // Any store access after this point fails.
        store.db().exec_raw("DROP TABLE crimes").await.unwrap();

        let state = dashboard
            .dispatch(DashboardEvent::SelectionChanged(vec![1, 2]))
            .await
            .unwrap();
        assert_eq!(state.selection, vec![1, 2]);
        assert!((state.summary.mean_offenses - 1.5).abs() < f64::EPSILON);
        assert!((state.summary.mean_shootings - 0.5).abs() < f64::EPSILON);

        let state = dashboard
            .dispatch(DashboardEvent::SelectionChanged(Vec::new()))
            .await
            .unwrap();
        assert!((state.summary.mean_offenses - 2.0).abs() < f64::EPSILON);

        assert!(matches!(
            dashboard.dispatch(DashboardEvent::Refresh).await,
            Err(DashboardError::Analytics(AnalyticsError::Database(_)))
        ));
    }

    #[tokio::test]
    async fn failed_requery_keeps_previous_state() {
        let (_dir, store) = fixture().await;
        let mut dashboard = Dashboard::open(store).await.unwrap();
        let before = dashboard.state().clone();

        let inverted = DateRange {
            start: date(2020, 3, 1),
            end: date(2020, 1, 1),
        };
        assert!(matches!(
            dashboard
                .dispatch(DashboardEvent::DateRangeChanged(inverted))
                .await,
            Err(DashboardError::Analytics(AnalyticsError::InvalidFilter(_)))
        ));
        assert_eq!(dashboard.state(), &before);
        assert_eq!(dashboard.filter().date_range, inverted);
    }

    #[tokio::test]
    async fn render_matches_dashboard_requery() {
        let (_dir, store) = fixture().await;
        let mut dashboard = Dashboard::open(Arc::clone(&store)).await.unwrap();
        let range = DateRange::new(date(2020, 2, 1), date(2020, 2, 29)).unwrap();

        let via_event = dashboard
            .dispatch(DashboardEvent::DateRangeChanged(range))
            .await
            .unwrap()
            .clone();
        let direct = render(&store, dashboard.filter()).await.unwrap();

        assert_eq!(via_event, direct);
        assert_eq!(direct.series.rows.len(), 1);
    }
}
