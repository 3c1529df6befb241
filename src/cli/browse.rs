use std::{io::Write, str::FromStr};

use anyhow::{anyhow, bail, Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{info, warn};

use crate::{
    cache::DayCache,
    utils::{clock::Clock, time::DateKey},
};

use super::{edit::Edit, parse_date, show_day};

/// Commands understood by the interactive planner.
#[derive(Debug, Clone, PartialEq, Eq)]
enum BrowseCommand {
    Next,
    Previous,
    Today,
    Go(String),
    Edit(Edit),
    Save,
    Help,
    Quit,
}

const HELP: &str = "\
n | p | today | go <date>      move between days
task <hour> <text>            set the task for an hour (empty text clears it)
goal <1-3> <text>             set a goal
todo <1-8> <text>             set a todo
done <1-8>                    tick or untick a todo
water <1-8>                   toggle a glass of water
meals <text> | notes <text>   set meals or notes
save                          retry saving days that failed to save
q                             quit";

impl FromStr for BrowseCommand {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (command, rest) = s.split_once(char::is_whitespace).unwrap_or((s, ""));
        let rest = rest.trim();
        let number = |rest: &str| -> Result<(usize, String)> {
            let (number, text) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            let number = number
                .parse()
                .with_context(|| format!("{command} expects a number, got {number:?}"))?;
            Ok((number, text.trim().to_string()))
        };

        let parsed = match command {
            "n" | "next" => BrowseCommand::Next,
            "p" | "prev" => BrowseCommand::Previous,
            "today" => BrowseCommand::Today,
            "go" if !rest.is_empty() => BrowseCommand::Go(rest.to_string()),
            "task" => {
                let (hour, text) = number(rest)?;
                let hour = u8::try_from(hour).map_err(|_| anyhow!("No such hour {hour}"))?;
                BrowseCommand::Edit(Edit::Task { hour, text })
            }
            "goal" => {
                let (number, text) = number(rest)?;
                BrowseCommand::Edit(Edit::Goal { number, text })
            }
            "todo" => {
                let (number, text) = number(rest)?;
                BrowseCommand::Edit(Edit::TodoText { number, text })
            }
            "done" => BrowseCommand::Edit(Edit::TodoDone {
                number: number(rest)?.0,
                done: None,
            }),
            "water" => BrowseCommand::Edit(Edit::Water {
                number: number(rest)?.0,
            }),
            "meals" => BrowseCommand::Edit(Edit::Meals(rest.to_string())),
            "notes" => BrowseCommand::Edit(Edit::Notes(rest.to_string())),
            "save" => BrowseCommand::Save,
            "help" | "?" => BrowseCommand::Help,
            "q" | "quit" | "exit" => BrowseCommand::Quit,
            _ => bail!("Unknown command {s:?}, type help for a list"),
        };
        Ok(parsed)
    }
}

/// Interactive planner. Shows a day, applies edits as they are typed, and moves between days
/// while the neighbouring days are loaded in the background.
pub async fn browse(
    cache: &DayCache,
    clock: &dyn Clock,
    start: DateKey,
    input: impl AsyncBufRead + Unpin,
    output: &mut impl Write,
    colored: bool,
) -> Result<()> {
    let mut current = start;
    show_day(cache, clock, current, output, colored).await?;

    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let command = match line.parse::<BrowseCommand>() {
            Ok(v) => v,
            Err(e) => {
                writeln!(output, "{e}")?;
                continue;
            }
        };

        let target = match command {
            BrowseCommand::Quit => break,
            BrowseCommand::Help => {
                writeln!(output, "{HELP}")?;
                continue;
            }
            BrowseCommand::Save => {
                match cache.flush().await {
                    Ok(()) => writeln!(output, "Everything is saved")?,
                    Err(e) => writeln!(output, "Still not saved: {e}")?,
                }
                continue;
            }
            BrowseCommand::Next => current.next(),
            BrowseCommand::Previous => current.previous(),
            BrowseCommand::Today => DateKey::today(clock),
            BrowseCommand::Go(date) => match parse_date(&date, clock) {
                Ok(v) => Some(v),
                Err(e) => {
                    writeln!(output, "{e}")?;
                    continue;
                }
            },
            BrowseCommand::Edit(edit) => {
                if let Err(e) = cache.update(&current, |day| edit.apply(day)).await {
                    writeln!(output, "{e}")?;
                }
                Some(current)
            }
        };

        match target {
            Some(v) => current = v,
            None => writeln!(output, "No days beyond {current}")?,
        }
        show_day(cache, clock, current, output, colored).await?;
    }

    if let Err(e) = cache.flush().await {
        warn!("Leaving with unsaved days {:?}: {e}", cache.unsaved().await);
        writeln!(output, "Some edits couldn't be saved: {e}")?;
    }
    info!("Leaving planner on {current}");
    Ok(())
}
