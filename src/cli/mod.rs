pub mod browse;
pub mod edit;
pub mod render;

use std::{
    io::{IsTerminal, Write},
    path::PathBuf,
    sync::Arc,
};

use anyhow::{anyhow, Context, Result};
use chrono::Timelike;
use chrono_english::{parse_date_string, Dialect};
use clap::{CommandFactory, Parser, Subcommand};
use edit::{apply_all, Edit};
use futures::{stream, StreamExt};
use render::{render_day, summarize_day, RenderOptions};
use tokio::io::BufReader;
use tracing::{error, level_filters::LevelFilter};

use crate::{
    boundary::service::spawn_store_service,
    cache::DayCache,
    storage::record_storage::JsonFileStorage,
    utils::{
        clock::{Clock, DefaultClock},
        dir::create_application_default_path,
        logging::{enable_logging, CLI_PREFIX},
        time::DateKey,
    },
};

#[derive(Parser, Debug)]
#[command(name = "Hourplan", version, long_about = None)]
#[command(about = "Daily and hourly planner", long_about = None)]
struct Args {
    #[command(subcommand)]
    commands: Commands,
    #[arg(
        long,
        global = true,
        help = "Application directory. By default uses $XDG_DATA_HOME or $HOME/.local/share"
    )]
    dir: Option<PathBuf>,
    #[arg(
        long,
        short,
        global = true,
        help = "Day to work with. Examples are \"2024-03-10\", \"yesterday\", \"friday\", \"15/03/2025\". Defaults to today"
    )]
    date: Option<String>,
    #[arg(long, global = true, help = "Print logs to the console")]
    log: bool,
    #[arg(long = "log-filter", global = true, help = "Log level, overrides RUST_LOG")]
    log_filter: Option<LevelFilter>,
}

#[derive(Subcommand, Debug)]
#[command(version, about, long_about = None)]
enum Commands {
    #[command(about = "Show the whole day")]
    Show {},
    #[command(about = "Open an interactive planner starting at the day")]
    Browse {},
    #[command(about = "Set the task for an hour between 6 and 22. Empty text clears it")]
    Task { hour: u8, text: Vec<String> },
    #[command(about = "Set one of the 3 goals")]
    Goal { number: usize, text: Vec<String> },
    #[command(about = "Change one of the 8 todos. Without options the todo is ticked or unticked")]
    Todo {
        number: usize,
        #[arg(long, help = "New text for the todo")]
        text: Option<String>,
        #[arg(long, conflicts_with = "undone", help = "Mark as completed")]
        done: bool,
        #[arg(long, help = "Mark as not completed")]
        undone: bool,
    },
    #[command(about = "Toggle one of the 8 glasses of water")]
    Water { number: usize },
    #[command(about = "Set meals of the day")]
    Meals { text: Vec<String> },
    #[command(about = "Set notes of the day")]
    Notes { text: Vec<String> },
    #[command(about = "One line per day between two dates, both inclusive")]
    Summary {
        #[arg(long, short)]
        start: String,
        #[arg(long, short)]
        end: String,
    },
}

impl Commands {
    fn edits(&self) -> Vec<Edit> {
        match self {
            Commands::Task { hour, text } => vec![Edit::Task {
                hour: *hour,
                text: text.join(" "),
            }],
            Commands::Goal { number, text } => vec![Edit::Goal {
                number: *number,
                text: text.join(" "),
            }],
            Commands::Todo {
                number,
                text,
                done,
                undone,
            } => {
                let mut edits = vec![];
                if let Some(text) = text {
                    edits.push(Edit::TodoText {
                        number: *number,
                        text: text.clone(),
                    });
                }
                let state = match (*done, *undone) {
                    (true, _) => Some(Some(true)),
                    (_, true) => Some(Some(false)),
                    _ if text.is_none() => Some(None),
                    _ => None,
                };
                if let Some(done) = state {
                    edits.push(Edit::TodoDone {
                        number: *number,
                        done,
                    });
                }
                edits
            }
            Commands::Water { number } => vec![Edit::Water { number: *number }],
            Commands::Meals { text } => vec![Edit::Meals(text.join(" "))],
            Commands::Notes { text } => vec![Edit::Notes(text.join(" "))],
            Commands::Show {} | Commands::Browse {} | Commands::Summary { .. } => vec![],
        }
    }
}

const SUMMARY_LIMIT: usize = 366;

pub async fn run_cli() -> Result<()> {
    let args = Args::parse();

    let app_dir = args.dir.map_or_else(create_application_default_path, Ok)?;
    let logging_level = args
        .log_filter
        .or_else(|| args.log.then_some(LevelFilter::TRACE));
    enable_logging(CLI_PREFIX, &app_dir, logging_level, args.log)?;

    let storage = JsonFileStorage::new(app_dir)?;
    let (client, service) = spawn_store_service(storage);
    let cache = DayCache::new(Arc::new(client));
    let clock = DefaultClock;

    let date = match args.date.as_deref() {
        Some(v) => parse_date(v, &clock).map_err(|e| validation_error(e.to_string()))?,
        None => DateKey::today(&clock).context("Today is outside of supported dates")?,
    };

    let mut stdout = std::io::stdout().lock();
    let colored = std::io::stdout().is_terminal();

    let result = match &args.commands {
        Commands::Show {} => show_day(&cache, &clock, date, &mut stdout, colored).await,
        Commands::Browse {} => {
            let input = BufReader::new(tokio::io::stdin());
            browse::browse(&cache, &clock, date, input, &mut stdout, colored).await
        }
        Commands::Summary { start, end } => {
            let start = parse_date(start, &clock).map_err(|e| validation_error(e.to_string()))?;
            let end = parse_date(end, &clock).map_err(|e| validation_error(e.to_string()))?;
            print_summary(&cache, start, end, &mut stdout).await
        }
        command => {
            let edits = command.edits();
            match cache.update(&date, |day| apply_all(&edits, day)).await {
                Ok(()) => show_day(&cache, &clock, date, &mut stdout, colored).await,
                Err(e) => Err(e.into()),
            }
        }
    };

    // The service stops once every handle, including ones held by background prefetches, is gone.
    drop(cache);
    if let Err(e) = service.await {
        error!("Store service failed {e:?}");
    }
    result
}

fn validation_error(message: String) -> anyhow::Error {
    Args::command()
        .error(clap::error::ErrorKind::ValueValidation, message)
        .into()
}

/// Accepts canonical `YYYY-MM-DD` keys, or anything chrono-english understands relative to the
/// clock ("yesterday", "next friday", "15/03/2025").
pub fn parse_date(input: &str, clock: &dyn Clock) -> Result<DateKey> {
    if let Ok(key) = input.parse::<DateKey>() {
        return Ok(key);
    }
    let parsed = parse_date_string(input, clock.now(), Dialect::Uk)
        .map_err(|e| anyhow!("Failed to validate date {input:?}: {e}"))?;
    DateKey::from_instant(&parsed)
        .with_context(|| format!("{input:?} is outside of supported dates"))
}

/// Prints the day and starts loading its neighbours, which are the most likely days to be shown
/// next.
pub async fn show_day(
    cache: &DayCache,
    clock: &dyn Clock,
    key: DateKey,
    output: &mut impl Write,
    colored: bool,
) -> Result<()> {
    let day = cache.fetch(&key).await?;
    let _ = cache.prefetch(&key);

    let now = clock.now();
    let current_hour = (DateKey::from_instant(&now) == Some(key)).then(|| now.hour() as u8);
    let options = RenderOptions {
        current_hour,
        unsaved: cache.unsaved().await.contains(&key),
        colored,
    };
    render_day(output, key, &day, &options)?;
    output.flush()?;
    Ok(())
}

/// Prints one line per day. Days are loaded a few at a time through the cache.
pub async fn print_summary(
    cache: &DayCache,
    start: DateKey,
    end: DateKey,
    output: &mut impl Write,
) -> Result<()> {
    let days = start.days_until(end).take(SUMMARY_LIMIT + 1).collect::<Vec<_>>();
    if days.len() > SUMMARY_LIMIT {
        return Err(validation_error(format!(
            "Summary is limited to {SUMMARY_LIMIT} days"
        )));
    }

    let mut loaded = stream::iter(days)
        .map(|day| async move { (day, cache.fetch(&day).await) })
        .buffered(4);

    while let Some((day, record)) = loaded.next().await {
        match record {
            Ok(record) => writeln!(output, "{}", summarize_day(day, &record))?,
            Err(e) => {
                error!("Failed to load {day} {e}");
                writeln!(output, "{day}\tunavailable")?;
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use anyhow::Result;
    use chrono::{DateTime, FixedOffset, TimeZone};
    use clap::Parser;
    use tempfile::tempdir;

    use crate::{
        boundary::service::spawn_store_service, cache::DayCache,
        storage::record_storage::JsonFileStorage, utils::clock::Clock,
    };

    use super::{edit::Edit, parse_date, print_summary, Args, Commands};

    struct TestClock;

    impl Clock for TestClock {
        fn now(&self) -> DateTime<FixedOffset> {
            FixedOffset::west_opt(5 * 3600)
                .unwrap()
                .with_ymd_and_hms(2024, 3, 10, 23, 0, 0)
                .unwrap()
        }
    }

    #[test]
    fn test_parse_date() -> Result<()> {
        assert_eq!(parse_date("2024-03-01", &TestClock)?.to_string(), "2024-03-01");
        // 23:00 at -05:00 is already the 11th in UTC, the local day must win.
        assert_eq!(parse_date("yesterday", &TestClock)?.to_string(), "2024-03-09");
        assert_eq!(parse_date("2 days ago", &TestClock)?.to_string(), "2024-03-08");
        assert!(parse_date("not a date at all", &TestClock).is_err());
        Ok(())
    }

    #[test]
    fn test_todo_command_edits() {
        let parse = |args: &[&str]| {
            Args::try_parse_from(["hourplan"].iter().chain(args)).unwrap().commands
        };

        assert_eq!(
            parse(&["todo", "2"]).edits(),
            vec![Edit::TodoDone { number: 2, done: None }]
        );
        assert_eq!(
            parse(&["todo", "2", "--text", "mail"]).edits(),
            vec![Edit::TodoText { number: 2, text: "mail".into() }]
        );
        assert_eq!(
            parse(&["todo", "2", "--text", "mail", "--done"]).edits(),
            vec![
                Edit::TodoText { number: 2, text: "mail".into() },
                Edit::TodoDone { number: 2, done: Some(true) }
            ]
        );
        assert_eq!(
            parse(&["--date", "2024-03-10", "task", "9", "daily", "standup"]).edits(),
            vec![Edit::Task { hour: 9, text: "daily standup".into() }]
        );
        assert!(matches!(parse(&["show"]), Commands::Show {}));
        assert!(Args::try_parse_from(["hourplan", "todo", "1", "--done", "--undone"]).is_err());
    }

    #[tokio::test]
    async fn test_summary() -> Result<()> {
        let dir = tempdir()?;
        let (client, _) = spawn_store_service(JsonFileStorage::new(dir.path().to_owned())?);
        let cache = DayCache::new(Arc::new(client));
        cache
            .update(&"2024-02-29".parse()?, |day| day.set_task(8, "leap"))
            .await?;

        let mut output = Vec::new();
        print_summary(&cache, "2024-02-28".parse()?, "2024-03-01".parse()?, &mut output).await?;
        let output = String::from_utf8(output)?;

        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("2024-02-28\thours 0/17"));
        assert!(lines[1].starts_with("2024-02-29\thours 1/17"));
        assert!(lines[2].starts_with("2024-03-01"));

        let mut output = Vec::new();
        assert!(
            print_summary(&cache, "2020-01-01".parse()?, "2024-01-01".parse()?, &mut output)
                .await
                .is_err()
        );
        Ok(())
    }
}
