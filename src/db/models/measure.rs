//! Generic measure records.
//!
//! A `Measure` is the durable identity of one saved capture. Its tool-specific
//! payload lives in exactly one tool table, keyed by `measure_id`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::reading::ToolReading;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Measure {
    pub id: i64,
    pub title: String,
    pub start_date: DateTime<Utc>,
}

/// A measure that has not been stored yet.
///
/// `id` is normally `None` so the store assigns the next sequence value; an
/// explicit id is honoured and subject to the insert's conflict strategy.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewMeasure {
    pub id: Option<i64>,
    pub title: String,
    pub start_date: DateTime<Utc>,
}

impl NewMeasure {
    pub fn new(title: impl Into<String>, start_date: DateTime<Utc>) -> Self {
        Self {
            id: None,
            title: title.into(),
            start_date,
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }
}

/// What to do when an explicit measure id is already taken.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnConflict {
    #[default]
    Replace,
    Abort,
}

impl OnConflict {
    pub(crate) fn insert_verb(&self) -> &'static str {
        match self {
            OnConflict::Replace => "INSERT OR REPLACE",
            OnConflict::Abort => "INSERT",
        }
    }
}

/// Read-side join of a measure with its tool reading. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CompositeView {
    pub measure: Measure,
    pub reading: ToolReading,
}
