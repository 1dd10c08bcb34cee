//! Dashboard input events and the commands they resolve to.

use std::collections::BTreeSet;

use crime_dashboard_models::{DateRange, Filter};

/// A change made by the user in one of the filter widgets, or a chart
/// selection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardEvent {
    /// The date range slider moved.
    DateRangeChanged(DateRange),
    /// The district checklist changed. Carries the full new set.
    DistrictsChanged(BTreeSet<String>),
    /// Rows of the monthly series were selected on the line chart.
    SelectionChanged(Vec<usize>),
    /// Re-run every query for the current filter.
    Refresh,
}

/// Work to perform in response to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DashboardCommand {
    /// Re-run every aggregate for this complete filter.
    Requery(Filter),
    /// Recompute the series summary over the selected rows only.
    Summarize(Vec<usize>),
}

/// Folds `event` into `filter` and returns the resulting command.
///
/// Filter events replace exactly one component of the filter and always
/// produce a command carrying the whole updated filter.
pub fn apply(filter: &mut Filter, event: DashboardEvent) -> DashboardCommand {
    match event {
        DashboardEvent::DateRangeChanged(range) => {
            filter.date_range = range;
            DashboardCommand::Requery(filter.clone())
        }
        DashboardEvent::DistrictsChanged(districts) => {
            filter.districts = districts;
            DashboardCommand::Requery(filter.clone())
        }
        DashboardEvent::Refresh => DashboardCommand::Requery(filter.clone()),
        DashboardEvent::SelectionChanged(indices) => DashboardCommand::Summarize(indices),
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn filter() -> Filter {
        Filter::new(
            DateRange::new(
                NaiveDate::from_ymd_opt(2020, 1, 1).unwrap(),
                NaiveDate::from_ymd_opt(2020, 3, 31).unwrap(),
            )
            .unwrap(),
            ["A", "B"],
        )
    }

    #[test]
    fn district_change_keeps_date_range() {
        let mut f = filter();
        let command = apply(
            &mut f,
            DashboardEvent::DistrictsChanged(["C".to_string()].into_iter().collect()),
        );

        let DashboardCommand::Requery(sent) = command else {
            panic!("expected a requery");
        };
        assert_eq!(sent, f);
        assert_eq!(sent.date_range, filter().date_range);
        assert_eq!(sent.districts.len(), 1);
    }

    #[test]
    fn date_change_keeps_districts() {
        let mut f = filter();
        let range = DateRange::new(
            NaiveDate::from_ymd_opt(2020, 2, 1).unwrap(),
            NaiveDate::from_ymd_opt(2020, 2, 29).unwrap(),
        )
        .unwrap();
        let command = apply(&mut f, DashboardEvent::DateRangeChanged(range));

        assert_eq!(
            command,
            DashboardCommand::Requery(Filter {
                date_range: range,
                districts: filter().districts,
            })
        );
    }

    #[test]
    fn selection_only_summarizes() {
        let mut f = filter();
        let command = apply(&mut f, DashboardEvent::SelectionChanged(vec![0, 2]));

        assert_eq!(command, DashboardCommand::Summarize(vec![0, 2]));
        assert_eq!(f, filter());
    }

    #[test]
    fn refresh_requeries_current_filter() {
        let mut f = filter();
        assert_eq!(
            apply(&mut f, DashboardEvent::Refresh),
            DashboardCommand::Requery(filter())
        );
    }
}
