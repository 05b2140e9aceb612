use anyhow::Result;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    connection::Database,
    helpers::classify_error,
    models::{ToolKind, ToolReading},
};
use crate::error::{StoreError, StoreResult};

pub(crate) fn reading_columns(kind: ToolKind) -> &'static str {
    match kind {
        ToolKind::Barometer => "pressure",
        ToolKind::Magnetometer => "x, y, z",
        ToolKind::Ruler => "length",
    }
}

pub(crate) fn row_to_reading(kind: ToolKind, row: &Row) -> Result<ToolReading> {
    let reading = match kind {
        ToolKind::Barometer => ToolReading::Barometer {
            pressure: row.get("pressure")?,
        },
        ToolKind::Magnetometer => ToolReading::Magnetometer {
            x: row.get("x")?,
            y: row.get("y")?,
            z: row.get("z")?,
        },
        ToolKind::Ruler => ToolReading::Ruler {
            length: row.get("length")?,
        },
    };
    Ok(reading)
}

/// Tool tables that already hold a reading for `measure_id`.
fn paired_tools(conn: &Connection, measure_id: i64) -> Result<Vec<ToolKind>> {
    let mut paired = Vec::new();
    for kind in ToolKind::ALL {
        let exists: bool = conn.query_row(
            &format!(
                "SELECT EXISTS(SELECT 1 FROM {} WHERE measure_id = ?1)",
                kind.table()
            ),
            params![measure_id],
            |row| row.get(0),
        )?;
        if exists {
            paired.push(kind);
        }
    }
    Ok(paired)
}

/// Inserts the tool reading of `measure_id`.
///
/// A measure is paired with exactly one reading; a second one, in any tool
/// table, is a conflict.
pub(crate) fn insert_reading_row(
    conn: &Connection,
    reading: &ToolReading,
    measure_id: i64,
) -> Result<()> {
    reading.validate().map_err(StoreError::InvalidReading)?;

    if let Some(existing) = paired_tools(conn, measure_id)?.first() {
        return Err(StoreError::Conflict(format!(
            "measure {measure_id} already has a {existing} reading"
        ))
        .into());
    }

    match *reading {
        ToolReading::Barometer { pressure } => conn.execute(
            "INSERT INTO Barometers (measure_id, pressure) VALUES (?1, ?2)",
            params![measure_id, pressure],
        )?,
        ToolReading::Magnetometer { x, y, z } => conn.execute(
            "INSERT INTO Magnetometers (measure_id, x, y, z) VALUES (?1, ?2, ?3, ?4)",
            params![measure_id, x, y, z],
        )?,
        ToolReading::Ruler { length } => conn.execute(
            "INSERT INTO Rulers (measure_id, length) VALUES (?1, ?2)",
            params![measure_id, length],
        )?,
    };

    Ok(())
}

/// Looks the reading of `measure_id` up in each tool table in turn.
pub(crate) fn find_reading(conn: &Connection, measure_id: i64) -> Result<Option<ToolReading>> {
    for kind in ToolKind::ALL {
        let reading = conn
            .query_row(
                &format!(
                    "SELECT {} FROM {} WHERE measure_id = ?1",
                    reading_columns(kind),
                    kind.table()
                ),
                params![measure_id],
                |row| Ok(row_to_reading(kind, row)),
            )
            .optional()?
            .transpose()?;
        if reading.is_some() {
            return Ok(reading);
        }
    }
    Ok(None)
}

impl Database {
    pub async fn insert_tool_reading(
        &self,
        reading: &ToolReading,
        measure_id: i64,
    ) -> StoreResult<()> {
        let reading = *reading;
        self.execute(move |conn| insert_reading_row(conn, &reading, measure_id))
            .await
            .map_err(|err| classify_error(err, Some(measure_id)))
    }

    /// The reading paired with `measure_id`, whichever tool produced it.
    pub async fn get_reading_for_measure(
        &self,
        measure_id: i64,
    ) -> StoreResult<Option<ToolReading>> {
        self.execute(move |conn| find_reading(conn, measure_id))
            .await
            .map_err(|err| classify_error(err, Some(measure_id)))
    }
}
