//! The `crimes` table: DDL and batched inserts.
//!
//! The dashboard itself only reads this table. Creation and inserts exist
//! for `import` and for test fixtures.

use std::fmt::Write as _;

use chrono::NaiveDateTime;
use crime_dashboard_models::Weekday;
use switchy_database::DatabaseValue;

use crate::{CrimeStore, DbError};

/// Rows per INSERT statement. Six parameters per row keeps each statement
/// well under both backends' bind-parameter limits.
pub const INSERT_CHUNK_SIZE: usize = 500;

/// One incident to be written to the `crimes` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIncident {
    /// When the incident occurred (local time, no zone).
    pub occurred_at: NaiveDateTime,
    /// Police district, if recorded.
    pub district: Option<String>,
    /// Offense code group label.
    pub offense_code_group: String,
    /// Day of the week the incident occurred on.
    pub day_of_week: Weekday,
    /// Hour of day, 0-23.
    pub hour: u8,
    /// Whether a shooting was involved.
    pub shooting: bool,
}

/// Creates the `crimes` table and its indexes if they don't already exist.
///
/// The DDL is shared by Postgres and `SQLite`.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub async fn ensure_crimes_table(store: &CrimeStore) -> Result<(), DbError> {
    let db = store.db();

    db.exec_raw(
        "CREATE TABLE IF NOT EXISTS crimes (
            occurred_at         TIMESTAMP NOT NULL,
            district            TEXT,
            offense_code_group  TEXT NOT NULL,
            day_of_week         TEXT NOT NULL,
            hour                INTEGER NOT NULL,
            shooting            INTEGER NOT NULL DEFAULT 0
        )",
    )
    .await?;

    db.exec_raw("CREATE INDEX IF NOT EXISTS idx_crimes_occurred_at ON crimes (occurred_at)")
        .await?;

    db.exec_raw("CREATE INDEX IF NOT EXISTS idx_crimes_district ON crimes (district)")
        .await?;

    Ok(())
}

/// Inserts incidents in chunks of [`INSERT_CHUNK_SIZE`].
///
/// Returns the number of rows written.
///
/// # Errors
///
/// Returns [`DbError`] if any INSERT fails. Chunks written before the
/// failure stay written.
pub async fn insert_incidents(
    store: &CrimeStore,
    incidents: &[NewIncident],
) -> Result<u64, DbError> {
    let backend = store.backend();
    let mut inserted = 0u64;

    for chunk in incidents.chunks(INSERT_CHUNK_SIZE) {
        let mut sql = String::from(
            "INSERT INTO crimes (
                occurred_at, district, offense_code_group, day_of_week, hour, shooting
            ) VALUES ",
        );
        let mut params: Vec<DatabaseValue> = Vec::with_capacity(chunk.len() * 6);

        let mut idx = 1u32;

        for (i, incident) in chunk.iter().enumerate() {
            if i > 0 {
                sql.push_str(", ");
            }
            let row: Vec<String> = (idx..idx + 6).map(|n| backend.placeholder(n)).collect();
            let _ = write!(sql, "({})", row.join(", "));
            idx += 6;

            params.push(backend.timestamp(incident.occurred_at));
            params.push(
                incident
                    .district
                    .as_ref()
                    .map_or(DatabaseValue::Null, |d| DatabaseValue::String(d.clone())),
            );
            params.push(DatabaseValue::String(incident.offense_code_group.clone()));
            params.push(DatabaseValue::String(incident.day_of_week.to_string()));
            params.push(DatabaseValue::Int32(i32::from(incident.hour)));
            params.push(DatabaseValue::Int32(i32::from(incident.shooting)));
        }

        inserted += store.db().exec_raw_params(&sql, &params).await?;
    }

    log::debug!("Inserted {inserted} incident(s)");
    Ok(inserted)
}
