use std::io::{self, Write};

use ansi_term::{Colour, Style};

use crate::{
    storage::entities::{DayRecord, FIRST_HOUR, LAST_HOUR},
    utils::time::DateKey,
};

pub struct RenderOptions {
    /// Hour to highlight, only set when the day being shown is today.
    pub current_hour: Option<u8>,
    /// The last edit of the day isn't in the store yet.
    pub unsaved: bool,
    pub colored: bool,
}

/// Text view of a whole day, laid out the same way every time so days are easy to compare.
pub fn render_day(
    out: &mut impl Write,
    key: DateKey,
    day: &DayRecord,
    options: &RenderOptions,
) -> io::Result<()> {
    let style = |style: Style| if options.colored { style } else { Style::new() };
    let heading = style(Style::new().bold());

    write!(out, "{}", heading.paint(format!("{key} ({})", key.date().format("%A"))))?;
    if options.unsaved {
        write!(out, " {}", style(Colour::Red.normal()).paint("[unsaved]"))?;
    }
    writeln!(out)?;

    writeln!(out, "{}", heading.paint("Hours"))?;
    for hour in FIRST_HOUR..=LAST_HOUR {
        let line = format!("{hour:02}:00  {}", day.task(hour));
        if options.current_hour == Some(hour) {
            writeln!(out, "> {}", style(Colour::Black.on(Colour::Yellow)).paint(line))?;
        } else {
            writeln!(out, "  {line}")?;
        }
    }

    writeln!(out, "{}", heading.paint("Goals"))?;
    for (i, goal) in day.goals.iter().enumerate() {
        writeln!(out, "  {}. {goal}", i + 1)?;
    }

    writeln!(out, "{}", heading.paint("Todos"))?;
    for (i, todo) in day.todos.iter().enumerate() {
        let mark = if todo.completed { "x" } else { " " };
        writeln!(out, "  [{mark}] {}. {}", i + 1, todo.text)?;
    }

    let glasses = day
        .water_intake
        .iter()
        .map(|v| if *v { "#" } else { "." })
        .collect::<String>();
    writeln!(out, "{} {}", heading.paint("Meals:"), day.meals)?;
    writeln!(
        out,
        "{} {glasses} {}/{}",
        heading.paint("Water:"),
        day.water_count(),
        day.water_intake.len()
    )?;
    writeln!(out, "{} {}", heading.paint("Notes:"), day.notes)
}

/// One line overview used by `summary`.
pub fn summarize_day(key: DateKey, day: &DayRecord) -> String {
    let hours = (LAST_HOUR - FIRST_HOUR + 1) as usize;
    let goals = day.goals.iter().filter(|v| !v.is_empty()).count();
    format!(
        "{key}\thours {}/{hours}\tgoals {goals}/{}\ttodos {}/{}\twater {}/{}",
        day.tasks.len(),
        day.goals.len(),
        day.completed_todos(),
        day.todos.len(),
        day.water_count(),
        day.water_intake.len(),
    )
}
