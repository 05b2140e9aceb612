use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::{classify_error, format_datetime, parse_datetime},
    models::{Measure, NewMeasure, OnConflict, ToolKind},
};
use crate::error::StoreResult;

const MEASURE_COLUMNS: &str = "id, title, start_date";

pub(crate) fn row_to_measure(row: &Row) -> Result<Measure> {
    let start_date: String = row.get("start_date")?;

    Ok(Measure {
        id: row.get("id")?,
        title: row.get("title")?,
        start_date: parse_datetime(&start_date, "start_date")?,
    })
}

/// Inserts one measure row and returns its id.
///
/// When an explicit id replaces an existing measure, the old tool readings are
/// dropped with it; the replacement starts without a pairing.
pub(crate) fn insert_measure_row(
    conn: &Connection,
    record: &NewMeasure,
    on_conflict: OnConflict,
) -> Result<i64> {
    if let (Some(id), OnConflict::Replace) = (record.id, on_conflict) {
        for kind in ToolKind::ALL {
            conn.execute(
                &format!("DELETE FROM {} WHERE measure_id = ?1", kind.table()),
                params![id],
            )?;
        }
    }

    conn.execute(
        &format!(
            "{} INTO Measurements (id, title, start_date) VALUES (?1, ?2, ?3)",
            on_conflict.insert_verb()
        ),
        params![record.id, record.title, format_datetime(&record.start_date)],
    )?;

    Ok(conn.last_insert_rowid())
}

fn query_measures(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<Measure>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut measures = Vec::new();
    while let Some(row) = rows.next()? {
        measures.push(row_to_measure(row)?);
    }
    Ok(measures)
}

impl Database {
    /// Stores a measure on its own. Prefer `commit_measure`, which pairs it
    /// with a tool reading atomically.
    pub async fn insert_measure(
        &self,
        record: &NewMeasure,
        on_conflict: OnConflict,
    ) -> StoreResult<i64> {
        let record = record.clone();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            let id = insert_measure_row(&tx, &record, on_conflict)?;
            tx.commit()?;
            Ok(id)
        })
        .await
        .map_err(|err| classify_error(err, None))
    }

    /// All measures, oldest capture first.
    pub async fn get_all(&self) -> StoreResult<Vec<Measure>> {
        self.execute(|conn| {
            query_measures(
                conn,
                &format!(
                    "SELECT {MEASURE_COLUMNS} FROM Measurements
                     ORDER BY start_date ASC, id ASC"
                ),
                [],
            )
        })
        .await
        .map_err(|err| classify_error(err, None))
    }

    /// Measures whose title matches exactly, oldest capture first.
    pub async fn get_by_title(&self, title: &str) -> StoreResult<Vec<Measure>> {
        let title = title.to_string();
        self.execute(move |conn| {
            query_measures(
                conn,
                &format!(
                    "SELECT {MEASURE_COLUMNS} FROM Measurements
                     WHERE title = ?1
                     ORDER BY start_date ASC, id ASC"
                ),
                params![title],
            )
        })
        .await
        .map_err(|err| classify_error(err, None))
    }

    /// The most recently inserted measure, by store-assigned id.
    pub async fn get_latest(&self) -> StoreResult<Option<Measure>> {
        self.execute(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {MEASURE_COLUMNS} FROM Measurements ORDER BY id DESC LIMIT 1"
            ))?;

            let mut rows = stmt.query([])?;
            let measure = match rows.next()? {
                Some(row) => Some(row_to_measure(row)?),
                None => None,
            };
            Ok(measure)
        })
        .await
        .map_err(|err| classify_error(err, None))
    }

    pub async fn get_measure(&self, measure_id: i64) -> StoreResult<Option<Measure>> {
        self.execute(move |conn| {
            conn.query_row(
                &format!("SELECT {MEASURE_COLUMNS} FROM Measurements WHERE id = ?1"),
                params![measure_id],
                |row| Ok(row_to_measure(row)),
            )
            .optional()?
            .transpose()
        })
        .await
        .map_err(|err| classify_error(err, Some(measure_id)))
    }

    pub async fn count_measures(&self) -> StoreResult<u64> {
        self.execute(|conn| {
            let count: i64 =
                conn.query_row("SELECT COUNT(*) FROM Measurements", [], |row| row.get(0))?;
            Ok(count.max(0) as u64)
        })
        .await
        .map_err(|err| classify_error(err, None))
    }
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::error::StoreError;

    fn at(hour: u32) -> chrono::DateTime<Utc> {
        Utc.with_ymd_and_hms(2021, 5, 4, hour, 0, 0).unwrap()
    }

    #[tokio::test]
    async fn empty_store_returns_empty_results() {
        let db = Database::in_memory().unwrap();

        assert!(db.get_all().await.unwrap().is_empty());
        assert!(db.get_by_title("missing").await.unwrap().is_empty());
        assert!(db.get_latest().await.unwrap().is_none());
        assert_eq!(db.count_measures().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn get_all_orders_by_start_date() {
        let db = Database::in_memory().unwrap();
        for hour in [3, 1, 2] {
            db.insert_measure(&NewMeasure::new(format!("h{hour}"), at(hour)), OnConflict::Replace)
                .await
                .unwrap();
        }

        let hours: Vec<_> = db
            .get_all()
            .await
            .unwrap()
            .into_iter()
            .map(|measure| measure.start_date)
            .collect();
        assert_eq!(hours, vec![at(1), at(2), at(3)]);
    }

    #[tokio::test]
    async fn get_by_title_is_an_exact_match() {
        let db = Database::in_memory().unwrap();
        db.insert_measure(&NewMeasure::new("Kitchen", at(2)), OnConflict::Replace)
            .await
            .unwrap();
        db.insert_measure(&NewMeasure::new("Kitchen", at(1)), OnConflict::Replace)
            .await
            .unwrap();
        db.insert_measure(&NewMeasure::new("kitchen", at(0)), OnConflict::Replace)
            .await
            .unwrap();

        let found = db.get_by_title("Kitchen").await.unwrap();
        assert_eq!(found.len(), 2);
        assert!(found.iter().all(|m| m.title == "Kitchen"));
        assert_eq!(found[0].start_date, at(1));
    }

    #[tokio::test]
    async fn latest_follows_insertion_order_not_start_date() {
        let db = Database::in_memory().unwrap();
        let first = db
            .insert_measure(&NewMeasure::new("first", at(5)), OnConflict::Replace)
            .await
            .unwrap();
        let second = db
            .insert_measure(&NewMeasure::new("second", at(1)), OnConflict::Replace)
            .await
            .unwrap();

        assert!(second > first);
        let latest = db.get_latest().await.unwrap().unwrap();
        assert_eq!(latest.id, second);
        assert_eq!(latest.title, "second");
    }

    #[tokio::test]
    async fn explicit_id_conflicts_depend_on_strategy() {
        let db = Database::in_memory().unwrap();
        let id = db
            .insert_measure(&NewMeasure::new("original", at(1)), OnConflict::Replace)
            .await
            .unwrap();

        let err = db
            .insert_measure(&NewMeasure::new("clash", at(2)).with_id(id), OnConflict::Abort)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));

        let replaced = db
            .insert_measure(&NewMeasure::new("replacement", at(2)).with_id(id), OnConflict::Replace)
            .await
            .unwrap();
        assert_eq!(replaced, id);

        let stored = db.get_measure(id).await.unwrap().unwrap();
        assert_eq!(stored.title, "replacement");
        assert_eq!(db.count_measures().await.unwrap(), 1);
    }
}
