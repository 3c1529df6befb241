use std::collections::BTreeMap;

use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use tracing::warn;

use crate::error::{PlannerError, PlannerResult};

pub const FIRST_HOUR: u8 = 6;
pub const LAST_HOUR: u8 = 22;
pub const GOAL_COUNT: usize = 3;
pub const TODO_COUNT: usize = 8;
pub const WATER_GLASSES: usize = 8;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub text: String,
    pub completed: bool,
}

/// Everything the planner keeps for a single day. This is also the unit written to disk.
///
/// [Default] is the only place the empty shape of a day is defined. Every field is filled in
/// from it when a stored record lacks the field or holds something unusable, so callers never
/// see a partial record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    #[serde(default, deserialize_with = "lenient_tasks")]
    pub tasks: BTreeMap<u8, String>,
    #[serde(default, deserialize_with = "or_default")]
    pub goals: [String; GOAL_COUNT],
    #[serde(default, deserialize_with = "or_default")]
    pub todos: [Todo; TODO_COUNT],
    #[serde(default, deserialize_with = "or_default")]
    pub meals: String,
    #[serde(default, deserialize_with = "or_default")]
    pub water_intake: [bool; WATER_GLASSES],
    #[serde(default, deserialize_with = "or_default")]
    pub notes: String,
}

impl DayRecord {
    /// Builds a record out of whatever was stored for a day. Anything that isn't an object is
    /// treated as if the day was never written.
    pub fn from_stored(value: Value) -> DayRecord {
        if !value.is_object() {
            warn!("Stored day is not an object, using defaults: {value}");
            return DayRecord::default();
        }
        serde_json::from_value(value).unwrap_or_else(|e| {
            warn!("Failed to read stored day, using defaults: {e}");
            DayRecord::default()
        })
    }

    pub fn task(&self, hour: u8) -> &str {
        self.tasks.get(&hour).map(String::as_str).unwrap_or("")
    }

    /// Empty text removes the hour entirely, keeping the file free of blank entries.
    pub fn set_task(&mut self, hour: u8, text: impl Into<String>) -> PlannerResult<()> {
        check_hour(hour)?;
        let text = text.into();
        if text.is_empty() {
            self.tasks.remove(&hour);
        } else {
            self.tasks.insert(hour, text);
        }
        Ok(())
    }

    pub fn set_goal(&mut self, index: usize, text: impl Into<String>) -> PlannerResult<()> {
        *slot(&mut self.goals, "goal", index)? = text.into();
        Ok(())
    }

    pub fn set_todo_text(&mut self, index: usize, text: impl Into<String>) -> PlannerResult<()> {
        slot(&mut self.todos, "todo", index)?.text = text.into();
        Ok(())
    }

    pub fn set_todo_completed(&mut self, index: usize, completed: bool) -> PlannerResult<()> {
        slot(&mut self.todos, "todo", index)?.completed = completed;
        Ok(())
    }

    /// Returns new completion state.
    pub fn toggle_todo(&mut self, index: usize) -> PlannerResult<bool> {
        let todo = slot(&mut self.todos, "todo", index)?;
        todo.completed = !todo.completed;
        Ok(todo.completed)
    }

    /// Returns new state of the glass.
    pub fn toggle_water(&mut self, index: usize) -> PlannerResult<bool> {
        let glass = slot(&mut self.water_intake, "glass", index)?;
        *glass = !*glass;
        Ok(*glass)
    }

    pub fn water_count(&self) -> usize {
        self.water_intake.iter().filter(|v| **v).count()
    }

    pub fn completed_todos(&self) -> usize {
        self.todos.iter().filter(|v| v.completed).count()
    }

    pub fn set_meals(&mut self, text: impl Into<String>) {
        self.meals = text.into();
    }

    pub fn set_notes(&mut self, text: impl Into<String>) {
        self.notes = text.into();
    }

    pub fn is_empty(&self) -> bool {
        *self == DayRecord::default()
    }

    /// Checks what the types alone can't: `tasks` is open to any hour, but only hours of the
    /// planner's day survive a trip through the store.
    pub fn validate(&self) -> PlannerResult<()> {
        self.tasks.keys().try_for_each(|hour| check_hour(*hour))
    }
}

fn check_hour(hour: u8) -> PlannerResult<()> {
    if (FIRST_HOUR..=LAST_HOUR).contains(&hour) {
        return Ok(());
    }
    Err(PlannerError::OutOfRange {
        what: "hour",
        value: hour as usize,
        min: FIRST_HOUR as usize,
        max: LAST_HOUR as usize,
    })
}

fn slot<'a, T>(items: &'a mut [T], what: &'static str, index: usize) -> PlannerResult<&'a mut T> {
    let max = items.len() - 1;
    items.get_mut(index).ok_or(PlannerError::OutOfRange {
        what,
        value: index,
        min: 0,
        max,
    })
}

/// Falls back to the field's default instead of failing the whole record.
fn or_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned + Default,
{
    let value = Value::deserialize(deserializer)?;
    Ok(serde_json::from_value(value.clone()).unwrap_or_else(|e| {
        warn!("Replacing malformed field {value} with default: {e}");
        T::default()
    }))
}

/// Tasks are kept entry by entry, so one bad hour doesn't wipe out the rest of the day.
fn lenient_tasks<'de, D>(deserializer: D) -> Result<BTreeMap<u8, String>, D::Error>
where
    D: Deserializer<'de>,
{
    let Value::Object(entries) = Value::deserialize(deserializer)? else {
        warn!("Tasks are not an object, using no tasks");
        return Ok(BTreeMap::new());
    };

    let mut tasks = BTreeMap::new();
    for (hour, text) in entries {
        match (hour.parse::<u8>(), text) {
            (Ok(h), Value::String(text)) if (FIRST_HOUR..=LAST_HOUR).contains(&h) => {
                tasks.insert(h, text);
            }
            (_, text) => warn!("Dropping task {hour:?} => {text}"),
        }
    }
    Ok(tasks)
}
