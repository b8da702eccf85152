//! tinydav CLI entry point.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use tinydav_caldav::CalDavClient;
use tinydav_core::{TracingConfig, init_tracing};

use tinydav_cli::cli::{Cli, Command};
use tinydav_cli::commands;
use tinydav_cli::error::CliResult;

fn main() -> ExitCode {
    let cli = Cli::parse();

    let tracing = if cli.debug {
        TracingConfig::cli_debug()
    } else {
        TracingConfig::default()
    };
    if let Err(e) = init_tracing(tracing) {
        eprintln!("warning: {}", e);
    }

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

fn run(cli: Cli) -> CliResult<()> {
    let mut client = CalDavClient::new(cli.caldav_config()?)?;
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let result = match cli.command {
        Command::Test => commands::test(&client, &mut out),
        Command::Calendars { json } => commands::calendars(&client, json, &mut out),
        Command::Events {
            calendar,
            from,
            to,
            json,
        } => {
            let range =
                commands::resolve_range(from.as_deref(), to.as_deref(), chrono::Utc::now())?;
            commands::events(&client, calendar.as_deref(), &range, json, &mut out)
        }
        Command::Find { name, json } => commands::find(&client, &name, json, &mut out),
        Command::GetEvent { path, json } => commands::get_event(&client, &path, json, &mut out),
    };

    out.flush()?;
    client.deinit();
    result
}
