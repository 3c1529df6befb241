use crate::{
    error::{PlannerError, PlannerResult},
    storage::entities::{DayRecord, GOAL_COUNT, TODO_COUNT, WATER_GLASSES},
};

/// A single change a user can make to a day. Goals, todos and glasses are numbered from 1 the
/// way they are shown.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Task { hour: u8, text: String },
    Goal { number: usize, text: String },
    TodoText { number: usize, text: String },
    /// `None` flips the current state.
    TodoDone { number: usize, done: Option<bool> },
    Water { number: usize },
    Meals(String),
    Notes(String),
}

impl Edit {
    pub fn apply(&self, day: &mut DayRecord) -> PlannerResult<()> {
        match self {
            Edit::Task { hour, text } => day.set_task(*hour, text.as_str()),
            Edit::Goal { number, text } => {
                day.set_goal(position("goal", *number, GOAL_COUNT)?, text.as_str())
            }
            Edit::TodoText { number, text } => {
                day.set_todo_text(position("todo", *number, TODO_COUNT)?, text.as_str())
            }
            Edit::TodoDone { number, done } => {
                let index = position("todo", *number, TODO_COUNT)?;
                match done {
                    Some(done) => day.set_todo_completed(index, *done),
                    None => day.toggle_todo(index).map(|_| ()),
                }
            }
            Edit::Water { number } => day
                .toggle_water(position("glass", *number, WATER_GLASSES)?)
                .map(|_| ()),
            Edit::Meals(text) => {
                day.set_meals(text.as_str());
                Ok(())
            }
            Edit::Notes(text) => {
                day.set_notes(text.as_str());
                Ok(())
            }
        }
    }
}

/// Applies edits in order, stopping at the first one that doesn't fit.
pub fn apply_all(edits: &[Edit], day: &mut DayRecord) -> PlannerResult<()> {
    // Validate on a copy first so a bad edit never leaves a half-applied day behind.
    let mut draft = day.clone();
    for edit in edits {
        edit.apply(&mut draft)?;
    }
    *day = draft;
    Ok(())
}

fn position(what: &'static str, number: usize, count: usize) -> PlannerResult<usize> {
    if (1..=count).contains(&number) {
        Ok(number - 1)
    } else {
        Err(PlannerError::OutOfRange {
            what,
            value: number,
            min: 1,
            max: count,
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::{error::PlannerError, storage::entities::DayRecord};

    use super::{apply_all, Edit};

    #[test]
    fn test_numbers_start_at_one() {
        let mut day = DayRecord::default();
        Edit::Goal { number: 1, text: "first".into() }.apply(&mut day).unwrap();
        Edit::Water { number: 8 }.apply(&mut day).unwrap();
        assert_eq!(day.goals[0], "first");
        assert!(day.water_intake[7]);

        assert!(matches!(
            Edit::Goal { number: 0, text: "zero".into() }.apply(&mut day),
            Err(PlannerError::OutOfRange { what: "goal", value: 0, min: 1, max: 3 })
        ));
        assert!(Edit::Water { number: 9 }.apply(&mut day).is_err());
    }

    #[test]
    fn test_todo_done_states() {
        let mut day = DayRecord::default();
        Edit::TodoDone { number: 2, done: None }.apply(&mut day).unwrap();
        assert!(day.todos[1].completed);
        Edit::TodoDone { number: 2, done: Some(true) }.apply(&mut day).unwrap();
        assert!(day.todos[1].completed);
        Edit::TodoDone { number: 2, done: None }.apply(&mut day).unwrap();
        assert!(!day.todos[1].completed);
    }

    #[test]
    fn test_apply_all_is_all_or_nothing() {
        let mut day = DayRecord::default();
        let edits = [
            Edit::TodoText { number: 1, text: "laundry".into() },
            Edit::Task { hour: 30, text: "nope".into() },
        ];
        assert!(apply_all(&edits, &mut day).is_err());
        assert!(day.is_empty());

        apply_all(&edits[..1], &mut day).unwrap();
        assert_eq!(day.todos[0].text, "laundry");
    }
}
