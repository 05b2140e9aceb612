use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::ffi;

use crate::error::StoreError;

/// Fixed-width RFC 3339 so that text ordering in SQLite is chronological.
pub fn format_datetime(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn parse_datetime(value: &str, field: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("failed to parse {field}"))
}

/// Maps constraint violations raised by SQLite onto the store's error taxonomy.
///
/// `measure_id` is reported for foreign key failures; anything that is not a
/// constraint violation stays a backend error. A `StoreError` raised inside a
/// DB task is passed through untouched.
pub fn classify_error(err: anyhow::Error, measure_id: Option<i64>) -> StoreError {
    let err = match err.downcast::<StoreError>() {
        Ok(store_err) => return store_err,
        Err(other) => other,
    };

    let code = err
        .chain()
        .find_map(|cause| cause.downcast_ref::<rusqlite::Error>())
        .and_then(|sql_err| match sql_err {
            rusqlite::Error::SqliteFailure(failure, _) => Some(failure.extended_code),
            _ => None,
        });

    match code {
        Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => StoreError::ForeignKey {
            measure_id: measure_id.unwrap_or_default(),
        },
        Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY) | Some(ffi::SQLITE_CONSTRAINT_UNIQUE) => {
            StoreError::Conflict(format!("{err:#}"))
        }
        _ => StoreError::Backend(err),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn formatted_datetimes_sort_chronologically() {
        let early = Utc.with_ymd_and_hms(2021, 3, 1, 9, 0, 0).unwrap();
        let late = early + chrono::Duration::milliseconds(1500);

        let early_text = format_datetime(&early);
        let late_text = format_datetime(&late);

        assert_eq!(early_text, "2021-03-01T09:00:00.000Z");
        assert!(early_text < late_text);
        assert_eq!(parse_datetime(&late_text, "start_date").unwrap(), late);
    }

    #[test]
    fn non_sqlite_errors_stay_backend_errors() {
        let err = classify_error(anyhow::anyhow!("disk on fire"), Some(3));
        assert!(matches!(err, StoreError::Backend(_)));
    }
}
