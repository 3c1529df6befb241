use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::utils::time::DateKey;

use super::entities::DayRecord;

/// Everything that lives in the store file. Written as `{ "dates": { "YYYY-MM-DD": {...} } }`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct StoreDocument {
    pub dates: BTreeMap<String, DayRecord>,
}

/// How the document on disk looked before it was loaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentShape {
    /// `{ "dates": {...} }`
    Current,
    /// `{ "tasks": { date: { hour: text } } }`, only hourly tasks were kept per date.
    LegacyTasks,
    /// Neither of the known shapes. Read as an empty store, and kept aside before it is
    /// overwritten.
    Unknown,
}

impl StoreDocument {
    /// Turns any parsed json into a document. Unknown keys and unusable days are dropped rather
    /// than failing, the store should always be usable.
    pub fn from_value(value: Value) -> (StoreDocument, DocumentShape) {
        let Value::Object(mut root) = value else {
            warn!("Store root is not an object");
            return (StoreDocument::default(), DocumentShape::Unknown);
        };

        match (root.remove("dates"), root.remove("tasks")) {
            (Some(dates @ Value::Object(_)), _) => {
                (Self::from_dates(dates), DocumentShape::Current)
            }
            (None, Some(tasks @ Value::Object(_))) => {
                info!("Migrating legacy tasks-only store");
                (Self::from_legacy_tasks(tasks), DocumentShape::LegacyTasks)
            }
            (dates, tasks) => {
                warn!("Store has no usable dates or tasks, starting empty: {dates:?} {tasks:?}");
                (StoreDocument::default(), DocumentShape::Unknown)
            }
        }
    }

    fn from_dates(dates: Value) -> StoreDocument {
        let dates = valid_entries(dates)
            .map(|(key, day)| (key, DayRecord::from_stored(day)))
            .collect();
        StoreDocument { dates }
    }

    fn from_legacy_tasks(tasks: Value) -> StoreDocument {
        let dates = valid_entries(tasks)
            .map(|(key, hours)| {
                let mut day = Map::new();
                day.insert("tasks".into(), hours);
                (key, DayRecord::from_stored(Value::Object(day)))
            })
            .collect();
        StoreDocument { dates }
    }

    pub fn get(&self, key: &DateKey) -> Option<&DayRecord> {
        self.dates.get(&key.to_string())
    }

    pub fn insert(&mut self, key: &DateKey, record: DayRecord) {
        self.dates.insert(key.to_string(), record);
    }
}

/// Entries of a date keyed object whose keys are canonical date keys.
fn valid_entries(value: Value) -> impl Iterator<Item = (String, Value)> {
    let entries = match value {
        Value::Object(entries) => entries,
        other => {
            warn!("Expected an object of dates, found {other}");
            Map::new()
        }
    };
    entries.into_iter().filter(|(key, _)| {
        let valid = key.parse::<DateKey>().is_ok();
        if !valid {
            warn!("Dropping stored entry with malformed key {key:?}");
        }
        valid
    })
}
