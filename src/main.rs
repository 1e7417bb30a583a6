mod cli;
mod commands;

use anyhow::Result;
use clap::Parser;
use descaos::config::Config;

fn main() -> Result<()> {
    let args = cli::Cli::parse();
    let config = Config::load(args.config.as_deref())?;
    cli::init_tracing(args.verbose, args.quiet, &config.log_level)?;
    let session = commands::Session::new(config, args.data)?;
    let command = args
        .command
        .unwrap_or(cli::Command::List { category: None });
    match command {
        cli::Command::Add {
            text,
            category,
            recurrence,
            priority,
            remind,
        } => commands::add(
            &session,
            text,
            category,
            recurrence.resolve(),
            priority,
            remind,
        ),
        cli::Command::List { category } => commands::list(&session, category),
        cli::Command::Done { task_id } => commands::done(&session, task_id),
        cli::Command::Edit {
            task_id,
            text,
            category,
            recurrence,
            once,
            priority,
            remind,
            clear_remind,
        } => commands::edit(
            &session,
            task_id,
            text,
            category,
            recurrence.resolve(),
            once,
            priority,
            remind,
            clear_remind,
        ),
        cli::Command::Rm { task_id } => commands::remove(&session, task_id),
        cli::Command::Clear { yes } => commands::clear(&session, yes),
        cli::Command::Sort => commands::sort(&session),
        cli::Command::Move { task_id, position } => {
            commands::move_task(&session, task_id, position)
        }
        cli::Command::Reset => commands::reset(&session),
        cli::Command::Focus { category, skip } => commands::focus(&session, category, skip),
        cli::Command::Categories => commands::categories(&session),
        cli::Command::Reminders => commands::reminders(&session),
    }
}
