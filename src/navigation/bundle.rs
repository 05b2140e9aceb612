//! Session handoff between a capture tool and the finalize step.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::db::helpers::format_datetime;

/// Bundle key of the moment the reading was frozen, as RFC 3339 text.
pub const CAPTURED_AT_KEY: &str = "captured_at";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum BundleValue {
    Float(f64),
    Text(String),
}

/// Typed key/value payload carrying one completed capture.
///
/// Created by a tool on save and consumed once by the finalize step.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionBundle {
    id: Uuid,
    values: BTreeMap<String, BundleValue>,
}

impl SessionBundle {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            values: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn put_float(&mut self, key: impl Into<String>, value: f64) -> &mut Self {
        self.values.insert(key.into(), BundleValue::Float(value));
        self
    }

    pub fn put_text(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values
            .insert(key.into(), BundleValue::Text(value.into()));
        self
    }

    /// The float stored under `key`; `None` if absent or of another type.
    pub fn float(&self, key: &str) -> Option<f64> {
        match self.values.get(key) {
            Some(BundleValue::Float(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn text(&self, key: &str) -> Option<&str> {
        match self.values.get(key) {
            Some(BundleValue::Text(value)) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn set_captured_at(&mut self, at: DateTime<Utc>) -> &mut Self {
        self.put_text(CAPTURED_AT_KEY, format_datetime(&at))
    }

    /// `None` if the capture time is absent or unparsable.
    pub fn captured_at(&self) -> Option<DateTime<Utc>> {
        let text = self.text(CAPTURED_AT_KEY)?;
        DateTime::parse_from_rfc3339(text)
            .ok()
            .map(|at| at.with_timezone(&Utc))
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Default for SessionBundle {
    fn default() -> Self {
        Self::new()
    }
}

/// A named navigation action plus the bundle it carries.
#[derive(Debug, Clone, PartialEq)]
pub struct NavigationRequest {
    pub action: String,
    pub bundle: SessionBundle,
}

impl NavigationRequest {
    pub fn new(action: impl Into<String>, bundle: SessionBundle) -> Self {
        Self {
            action: action.into(),
            bundle,
        }
    }
}
