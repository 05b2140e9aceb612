use chrono::SubsecRound;
use log::info;
use rusqlite::{params, OptionalExtension};

use crate::db::{
    connection::Database,
    helpers::classify_error,
    models::{CompositeView, Measure, NewMeasure, OnConflict, ToolKind, ToolReading},
};
use crate::error::StoreResult;

use super::measurements::{insert_measure_row, row_to_measure};
use super::tool_readings::{find_reading, insert_reading_row, reading_columns, row_to_reading};

impl Database {
    /// Stores a measure together with its tool reading in one transaction.
    ///
    /// Either both rows exist afterwards or neither does.
    pub async fn commit_measure(
        &self,
        record: &NewMeasure,
        reading: &ToolReading,
    ) -> StoreResult<Measure> {
        let record = record.clone();
        let reading = *reading;
        let measure = self
            .execute(move |conn| {
                let tx = conn.transaction()?;
                let measure_id = insert_measure_row(&tx, &record, OnConflict::Replace)?;
                insert_reading_row(&tx, &reading, measure_id)?;
                tx.commit()?;

                Ok(Measure {
                    id: measure_id,
                    title: record.title,
                    start_date: record.start_date.trunc_subsecs(3),
                })
            })
            .await
            .map_err(|err| classify_error(err, None))?;

        info!(
            "Committed {} measure {} ('{}')",
            reading.kind(),
            measure.id,
            measure.title
        );
        Ok(measure)
    }

    /// Measures titled `title` joined with their `tool` readings, oldest first.
    ///
    /// Measures paired with a different tool are left out.
    pub async fn get_composite_by_title(
        &self,
        title: &str,
        tool: ToolKind,
    ) -> StoreResult<Vec<CompositeView>> {
        let title = title.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT m.id, m.title, m.start_date, {columns}
                 FROM Measurements m
                 JOIN {table} t ON t.measure_id = m.id
                 WHERE m.title = ?1
                 ORDER BY m.start_date ASC, m.id ASC",
                columns = qualified_columns(tool),
                table = tool.table(),
            ))?;

            let mut rows = stmt.query(params![title])?;
            let mut views = Vec::new();
            while let Some(row) = rows.next()? {
                views.push(CompositeView {
                    measure: row_to_measure(row)?,
                    reading: row_to_reading(tool, row)?,
                });
            }
            Ok(views)
        })
        .await
        .map_err(|err| classify_error(err, None))
    }

    /// The composite view of one measure, resolving its tool from the store.
    pub async fn get_composite(&self, measure_id: i64) -> StoreResult<Option<CompositeView>> {
        self.execute(move |conn| {
            let measure = conn
                .query_row(
                    "SELECT id, title, start_date FROM Measurements WHERE id = ?1",
                    params![measure_id],
                    |row| Ok(row_to_measure(row)),
                )
                .optional()?
                .transpose()?;
            let Some(measure) = measure else {
                return Ok(None);
            };

            Ok(find_reading(conn, measure_id)?.map(|reading| CompositeView { measure, reading }))
        })
        .await
        .map_err(|err| classify_error(err, Some(measure_id)))
    }
}

fn qualified_columns(tool: ToolKind) -> String {
    reading_columns(tool)
        .split(", ")
        .map(|column| format!("t.{column}"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};

    use super::*;
    use crate::error::StoreError;

    #[tokio::test]
    async fn composite_round_trip_preserves_every_field() {
        let db = Database::in_memory().unwrap();
        let date = Utc.with_ymd_and_hms(2021, 1, 15, 10, 30, 0).unwrap();

        db.commit_measure(
            &NewMeasure::new("T1", date),
            &ToolReading::Barometer { pressure: 1013.2 },
        )
        .await
        .unwrap();

        let views = db
            .get_composite_by_title("T1", ToolKind::Barometer)
            .await
            .unwrap();
        assert_eq!(views.len(), 1);
        assert_eq!(views[0].measure.title, "T1");
        assert_eq!(views[0].measure.start_date, date);
        assert_eq!(views[0].reading, ToolReading::Barometer { pressure: 1013.2 });
    }

    #[tokio::test]
    async fn composite_query_excludes_other_tools() {
        let db = Database::in_memory().unwrap();
        let now = Utc::now();

        db.commit_measure(&NewMeasure::new("shared", now), &ToolReading::Ruler { length: 3.0 })
            .await
            .unwrap();
        db.commit_measure(
            &NewMeasure::new("shared", now),
            &ToolReading::Magnetometer { x: 1.0, y: 2.0, z: 3.0 },
        )
        .await
        .unwrap();

        let rulers = db.get_composite_by_title("shared", ToolKind::Ruler).await.unwrap();
        let barometers = db
            .get_composite_by_title("shared", ToolKind::Barometer)
            .await
            .unwrap();

        assert_eq!(rulers.len(), 1);
        assert_eq!(rulers[0].reading, ToolReading::Ruler { length: 3.0 });
        assert!(barometers.is_empty());
    }

    #[tokio::test]
    async fn failed_reading_rolls_back_the_measure() {
        let db = Database::in_memory().unwrap();

        let err = db
            .commit_measure(
                &NewMeasure::new("faulty", Utc::now()),
                &ToolReading::Barometer { pressure: f64::NAN },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, StoreError::InvalidReading(_)));
        assert!(db.get_all().await.unwrap().is_empty());
        assert!(db.get_latest().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn composite_by_id_resolves_the_tool() {
        let db = Database::in_memory().unwrap();
        let measure = db
            .commit_measure(
                &NewMeasure::new("bench", Utc.with_ymd_and_hms(2021, 2, 1, 8, 0, 0).unwrap()),
                &ToolReading::Ruler { length: 120.5 },
            )
            .await
            .unwrap();

        let view = db.get_composite(measure.id).await.unwrap().unwrap();
        assert_eq!(view.measure, measure);
        assert_eq!(view.reading.kind(), ToolKind::Ruler);
        assert!(db.get_composite(measure.id + 100).await.unwrap().is_none());
    }
}
