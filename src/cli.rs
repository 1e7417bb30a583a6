use anyhow::anyhow;
use clap::{ArgAction, Args, Parser, Subcommand};
use descaos::{Priority, Recurrence};
use std::io::IsTerminal;
use std::path::PathBuf;
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "descaos", version, about = "Daily to-do list with recurring tasks")]
pub struct Cli {
    /// Directory holding stored tasks (overrides the config file)
    #[arg(long, global = true)]
    pub data: Option<PathBuf>,
    /// Path to a config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
    /// More log output (repeatable)
    #[arg(short = 'v', long = "verbose", action = ArgAction::Count, global = true)]
    pub verbose: u8,
    /// Less log output (repeatable)
    #[arg(short = 'q', long = "quiet", action = ArgAction::Count, global = true)]
    pub quiet: u8,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Args, Debug, Default)]
pub struct RecurrenceArgs {
    /// Days the task recurs on, e.g. mon,wed,fri
    #[arg(long, conflicts_with_all = ["daily", "weekdays"])]
    pub on: Option<Recurrence>,
    /// Recur every day
    #[arg(long, conflicts_with = "weekdays")]
    pub daily: bool,
    /// Recur Monday to Friday
    #[arg(long)]
    pub weekdays: bool,
}

impl RecurrenceArgs {
    pub fn resolve(&self) -> Option<Recurrence> {
        if self.daily {
            Some(Recurrence::daily())
        } else if self.weekdays {
            Some(Recurrence::weekdays())
        } else {
            self.on
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Add a new task
    Add {
        /// Task text
        text: String,
        /// Category (defaults to the configured default category)
        #[arg(long, short = 'c')]
        category: Option<String>,
        #[command(flatten)]
        recurrence: RecurrenceArgs,
        /// high, medium or low
        #[arg(long, short = 'p')]
        priority: Option<Priority>,
        /// Reminder in YYYY.MM.DD@hh:mm format (local time)
        #[arg(long)]
        remind: Option<String>,
    },
    /// List tasks
    List {
        /// Only show this category
        #[arg(long, short = 'c')]
        category: Option<String>,
    },
    /// Toggle a task between done and open
    Done {
        /// Task id (or unique prefix)
        task_id: String,
    },
    /// Edit an existing task
    Edit {
        /// Task id (or unique prefix)
        task_id: String,
        /// New text
        #[arg(long)]
        text: Option<String>,
        /// New category
        #[arg(long, short = 'c')]
        category: Option<String>,
        #[command(flatten)]
        recurrence: RecurrenceArgs,
        /// Stop recurring
        #[arg(long, conflicts_with_all = ["on", "daily", "weekdays"])]
        once: bool,
        /// New priority
        #[arg(long, short = 'p')]
        priority: Option<Priority>,
        /// Set reminder (YYYY.MM.DD@hh:mm)
        #[arg(long, conflicts_with = "clear_remind")]
        remind: Option<String>,
        /// Clear reminder
        #[arg(long)]
        clear_remind: bool,
    },
    /// Remove a task
    Rm {
        /// Task id (or unique prefix)
        task_id: String,
    },
    /// Remove every task
    Clear {
        /// Confirm deleting all tasks
        #[arg(long)]
        yes: bool,
    },
    /// Sort open tasks first, then by priority
    Sort,
    /// Move a task to a position in the list (0 is the top)
    Move {
        /// Task id (or unique prefix)
        task_id: String,
        /// Destination position
        position: usize,
    },
    /// Reopen recurring tasks due today
    Reset,
    /// Show the one task to work on now
    Focus {
        /// Only consider this category
        #[arg(long, short = 'c')]
        category: Option<String>,
        /// Skip this many tasks
        #[arg(long, default_value_t = 0)]
        skip: usize,
    },
    /// List categories
    Categories,
    /// Show fired and upcoming reminders
    Reminders,
}

pub fn init_tracing(verbose: u8, quiet: u8, configured: &str) -> anyhow::Result<()> {
    let level = if quiet >= 2 {
        "error"
    } else if quiet == 1 {
        "warn"
    } else if verbose >= 3 {
        "trace"
    } else if verbose == 2 {
        "debug"
    } else if verbose == 1 {
        "info"
    } else {
        configured
    };

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .map_err(|e| anyhow!("invalid RUST_LOG / log filter: {e}"))?;

    let init_result = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .with_ansi(std::io::stderr().is_terminal())
        .try_init();

    if let Err(err) = init_result {
        debug!(error = %err, "tracing subscriber already set, continuing");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_add_with_recurrence_and_priority() {
        let cli = Cli::parse_from([
            "descaos", "add", "Standup", "-c", "Work", "--on", "mon,wed", "-p", "high",
        ]);
        match cli.command {
            Some(Command::Add {
                text,
                category,
                recurrence,
                priority,
                remind,
            }) => {
                assert_eq!(text, "Standup");
                assert_eq!(category.as_deref(), Some("Work"));
                assert_eq!(
                    recurrence.resolve(),
                    Some(Recurrence::from_days([1, 3]).unwrap())
                );
                assert_eq!(priority, Some(Priority::High));
                assert_eq!(remind, None);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn daily_and_weekdays_conflict() {
        assert!(Cli::try_parse_from(["descaos", "add", "x", "--daily", "--weekdays"]).is_err());
        assert!(Cli::try_parse_from(["descaos", "add", "x", "-p", "urgent"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommands() {
        let cli = Cli::parse_from(["descaos", "list", "--data", "/tmp/x", "-vv"]);
        assert_eq!(cli.data, Some(PathBuf::from("/tmp/x")));
        assert_eq!(cli.verbose, 2);
    }
}
