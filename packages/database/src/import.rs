//! CSV import into the `crimes` table.
//!
//! Reads the Boston-style incident export (`OCCURRED_ON_DATE`,
//! `DISTRICT`, `OFFENSE_CODE_GROUP`, `DAY_OF_WEEK`, `HOUR`, `SHOOTING`)
//! and writes it in batches. Rows that cannot be interpreted are skipped
//! with a warning rather than aborting the whole file.

use std::io::Read;
use std::path::Path;
use std::sync::Arc;

use chrono::{DateTime, Datelike as _, NaiveDateTime, Timelike as _};
use crime_dashboard_models::Weekday;
use serde::Deserialize;

use crate::progress::ProgressCallback;
use crate::schema::{NewIncident, ensure_crimes_table, insert_incidents};
use crate::{CrimeStore, DbError};

/// Default number of rows buffered before each insert.
pub const DEFAULT_BATCH_SIZE: usize = 5_000;

/// Raw CSV record. Only the columns the dashboard aggregates are read.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CsvIncident {
    /// Occurrence timestamp text.
    #[serde(rename = "OCCURRED_ON_DATE")]
    pub occurred_on_date: String,
    /// District code, blank when unknown.
    #[serde(rename = "DISTRICT", default)]
    pub district: Option<String>,
    /// Offense category label.
    #[serde(rename = "OFFENSE_CODE_GROUP", default)]
    pub offense_code_group: Option<String>,
    /// Free-text offense description, used when the group is blank.
    #[serde(rename = "OFFENSE_DESCRIPTION", default)]
    pub offense_description: Option<String>,
    /// Day-of-week label.
    #[serde(rename = "DAY_OF_WEEK", default)]
    pub day_of_week: Option<String>,
    /// Hour of day.
    #[serde(rename = "HOUR", default)]
    pub hour: Option<String>,
    /// Shooting flag (`Y`, `1`, `true`, or blank).
    #[serde(rename = "SHOOTING", default)]
    pub shooting: Option<String>,
}

/// Outcome of an import run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    /// Rows written to the store.
    pub inserted: u64,
    /// Rows skipped because they could not be interpreted.
    pub skipped: u64,
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Parses the timestamp formats seen in the export: with or without
/// fractional seconds, with or without a UTC offset suffix.
fn parse_occurred_at(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();

    for fmt in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    // "+00" offsets are not accepted by %z, so pad them to "+0000".
    let padded = if s.len() > 3 && s.as_bytes()[s.len() - 3] == b'+' {
        format!("{s}00")
    } else {
        s.to_string()
    };
    for fmt in ["%Y-%m-%d %H:%M:%S%z", "%Y-%m-%d %H:%M:%S%.f%z"] {
        if let Ok(dt) = DateTime::parse_from_str(&padded, fmt) {
            return Some(dt.naive_local());
        }
    }

    None
}

fn parse_shooting(value: Option<&str>) -> bool {
    matches!(
        non_blank(value).map(str::to_ascii_lowercase).as_deref(),
        Some("y" | "yes" | "1" | "true")
    )
}

/// Converts one CSV record into an insertable incident.
///
/// Day of week and hour fall back to values derived from the timestamp
/// when the columns are blank or unreadable.
///
/// # Errors
///
/// Returns a description of the problem if the timestamp is unreadable or
/// the record has no offense label.
pub fn parse_record(record: &CsvIncident) -> Result<NewIncident, String> {
    let occurred_at = parse_occurred_at(&record.occurred_on_date)
        .ok_or_else(|| format!("unreadable OCCURRED_ON_DATE {:?}", record.occurred_on_date))?;

    let offense_code_group = non_blank(record.offense_code_group.as_deref())
        .or_else(|| non_blank(record.offense_description.as_deref()))
        .ok_or_else(|| "missing OFFENSE_CODE_GROUP".to_string())?
        .to_string();

    let day_of_week = non_blank(record.day_of_week.as_deref())
        .and_then(|d| d.parse::<Weekday>().ok())
        .unwrap_or_else(|| Weekday::from(occurred_at.weekday()));

    let hour = non_blank(record.hour.as_deref())
        .and_then(|h| h.parse::<u8>().ok())
        .filter(|h| *h < 24)
        .unwrap_or_else(|| u8::try_from(occurred_at.hour()).unwrap_or(0));

    Ok(NewIncident {
        occurred_at,
        district: non_blank(record.district.as_deref()).map(ToString::to_string),
        offense_code_group,
        day_of_week,
        hour,
        shooting: parse_shooting(record.shooting.as_deref()),
    })
}

/// Imports a CSV file into the `crimes` table, creating it if needed.
///
/// # Errors
///
/// Returns [`DbError`] if the file cannot be read or an insert fails.
pub async fn import_csv(
    store: &CrimeStore,
    path: &Path,
    batch_size: usize,
    progress: Arc<dyn ProgressCallback>,
) -> Result<ImportSummary, DbError> {
    log::info!("Importing {}", path.display());
    let file = std::fs::File::open(path)?;
    import_reader(store, file, batch_size, progress).await
}

/// Imports CSV data from any reader. See [`import_csv`].
///
/// # Errors
///
/// Returns [`DbError`] if the header cannot be read or an insert fails.
/// Individual rows that fail to decode are skipped.
pub async fn import_reader<R: Read + Send>(
    store: &CrimeStore,
    reader: R,
    batch_size: usize,
    progress: Arc<dyn ProgressCallback>,
) -> Result<ImportSummary, DbError> {
    ensure_crimes_table(store).await?;

    let batch_size = batch_size.max(1);
    let mut csv_reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    csv_reader.headers()?;
    let mut summary = ImportSummary::default();
    let mut batch: Vec<NewIncident> = Vec::with_capacity(batch_size);

    progress.set_message("Importing incidents".to_string());

    for (line, result) in csv_reader.deserialize::<CsvIncident>().enumerate() {
        // +2: one for the header, one for 1-based numbering.
        let row = line + 2;
        let record = match result {
            Ok(record) => record,
            Err(e) => {
                log::warn!("Skipping unreadable CSV row {row}: {e}");
                summary.skipped += 1;
                continue;
            }
        };
        match parse_record(&record) {
            Ok(incident) => batch.push(incident),
            Err(reason) => {
                log::warn!("Skipping CSV row {row}: {reason}");
                summary.skipped += 1;
            }
        }

        if batch.len() >= batch_size {
            let n = insert_incidents(store, &batch).await?;
            summary.inserted += n;
            progress.inc(n);
            batch.clear();
        }
    }

    if !batch.is_empty() {
        let n = insert_incidents(store, &batch).await?;
        summary.inserted += n;
        progress.inc(n);
    }

    progress.finish(format!(
        "Imported {} incident(s), skipped {}",
        summary.inserted, summary.skipped
    ));
    log::info!(
        "Import complete: {} inserted, {} skipped",
        summary.inserted,
        summary.skipped
    );

    Ok(summary)
}
