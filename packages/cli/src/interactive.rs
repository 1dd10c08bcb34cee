//! Interactive terminal dashboard.
//!
//! Each menu choice becomes a [`DashboardEvent`]; the resulting tables are
//! printed after every update.

use std::collections::BTreeSet;
use std::sync::Arc;

use crime_dashboard::{Dashboard, DashboardEvent};
use crime_dashboard_database::db;
use crime_dashboard_models::DateRange;
use dialoguer::{Input, MultiSelect, Select};

use crate::report::format_state;

/// Actions offered by the dashboard menu.
enum Action {
    DateRange,
    Districts,
    SelectMonths,
    Refresh,
    Quit,
}

impl Action {
    const ALL: &[Self] = &[
        Self::DateRange,
        Self::Districts,
        Self::SelectMonths,
        Self::Refresh,
        Self::Quit,
    ];

    #[must_use]
    const fn label(&self) -> &'static str {
        match self {
            Self::DateRange => "Change date range",
            Self::Districts => "Choose districts",
            Self::SelectMonths => "Select months for the mean lines",
            Self::Refresh => "Refresh",
            Self::Quit => "Quit",
        }
    }
}

/// Opens the store named by `DATABASE_URL` and runs the menu loop until
/// the user quits.
///
/// A failed update is reported and the previous tables stay on screen.
///
/// # Errors
///
/// Returns an error if the store cannot be opened, holds no incidents, or
/// a prompt fails.
pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let store = db::connect_from_env().await?;
    let mut dashboard = Dashboard::open(Arc::new(store)).await?;

    println!("Crime Dashboard");
    println!();
    println!("{}", format_state(dashboard.state()));

    let labels: Vec<&str> = Action::ALL.iter().map(Action::label).collect();

    loop {
        let idx = Select::new()
            .with_prompt("What would you like to do?")
            .items(&labels)
            .default(0)
            .interact()?;

        let event = match Action::ALL[idx] {
            Action::DateRange => match prompt_date_range(&dashboard)? {
                Some(range) => DashboardEvent::DateRangeChanged(range),
                None => continue,
            },
            Action::Districts => DashboardEvent::DistrictsChanged(prompt_districts(&dashboard)?),
            Action::SelectMonths => DashboardEvent::SelectionChanged(prompt_months(&dashboard)?),
            Action::Refresh => DashboardEvent::Refresh,
            Action::Quit => break,
        };

        match dashboard.dispatch(event).await {
            Ok(state) => println!("{}", format_state(state)),
            Err(e) => {
                log::error!("Dashboard update failed: {e}");
                println!("Update failed: {e}");
            }
        }
    }

    Ok(())
}

/// Asks for a new date range. Returns `None` (after saying why) if the
/// input is rejected.
fn prompt_date_range(dashboard: &Dashboard) -> Result<Option<DateRange>, dialoguer::Error> {
    let current = dashboard.filter().date_range;

    let start: String = Input::new()
        .with_prompt("Start date (YYYY-MM-DD)")
        .default(current.start.to_string())
        .interact_text()?;
    let end: String = Input::new()
        .with_prompt("End date (YYYY-MM-DD)")
        .default(current.end.to_string())
        .interact_text()?;

    match DateRange::parse(&start, &end) {
        Ok(range) => Ok(Some(range)),
        Err(e) => {
            println!("{e}");
            Ok(None)
        }
    }
}

fn prompt_districts(dashboard: &Dashboard) -> Result<BTreeSet<String>, dialoguer::Error> {
    let options: Vec<&String> = dashboard.options().districts.iter().collect();
    let checked: Vec<bool> = options
        .iter()
        .map(|d| dashboard.filter().districts.contains(*d))
        .collect();

    let chosen = MultiSelect::new()
        .with_prompt("Districts (space to toggle, enter to confirm)")
        .items(&options)
        .defaults(&checked)
        .interact()?;

    Ok(chosen.into_iter().map(|i| options[i].clone()).collect())
}

fn prompt_months(dashboard: &Dashboard) -> Result<Vec<usize>, dialoguer::Error> {
    let state = dashboard.state();
    if state.series.is_empty() {
        return Ok(Vec::new());
    }

    let labels: Vec<String> = state
        .series
        .rows
        .iter()
        .map(|r| format!("{} ({} offenses)", r.year_month.format("%Y-%m"), r.num_offenses))
        .collect();
    let checked: Vec<bool> = (0..labels.len())
        .map(|i| state.selection.contains(&i))
        .collect();

    MultiSelect::new()
        .with_prompt("Months (none selected means all)")
        .items(&labels)
        .defaults(&checked)
        .interact()
}
