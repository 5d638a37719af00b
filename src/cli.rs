//! CLI argument parsing and command handling.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use chrono::{DateTime, Local, NaiveDateTime, TimeZone, Utc};
use clap::{Args, Parser, Subcommand};

use qtimer::types::{Project, Ticket, TicketId, TimerEdit, TimerFilter, TimerId, TimerRow, TimerSelector};
use qtimer::{Core, Error};

use crate::ui::helpers::{clamp_name, format_duration};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

#[derive(Parser)]
#[command(
    name = "qtimer",
    version,
    about = "qTimer - A terminal time tracker with a synced ticket cache"
)]
pub struct Cli {
    /// Config file to use instead of the default one.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Mirror log output to stderr.
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Create a timer and start it.
    Start {
        name: String,
        #[arg(short = 't', long = "ticket")]
        ticket: Option<TicketId>,
    },
    /// Start an idle timer again.
    Restart { id: TimerId },
    /// Stop a timer by id.
    Stop { id: TimerId },
    /// Stop every running timer whose name contains NAME.
    End { name: String },
    /// Change a timer's start, end or ticket.
    Edit {
        id: TimerId,
        /// New start, as "YYYY-MM-DD HH:MM" local time.
        #[arg(short = 's', long = "start")]
        start: Option<String>,
        /// New end, as "YYYY-MM-DD HH:MM" local time.
        #[arg(short = 'e', long = "end")]
        end: Option<String>,
        #[arg(short = 't', long = "ticket", conflicts_with = "unassign")]
        ticket: Option<TicketId>,
        /// Remove the ticket association.
        #[arg(long)]
        unassign: bool,
    },
    Delete { id: TimerId },
    /// Post idle timers to the external source.
    Post {
        #[arg(short = 'i', long = "id")]
        id: Option<TimerId>,
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
        #[arg(short = 'p', long = "project")]
        project: Option<String>,
        #[arg(short = 't', long = "ticket")]
        ticket: Option<String>,
    },
    /// List running timers.
    Show,
    Find {
        #[command(subcommand)]
        target: FindCommand,
    },
    /// Reload projects and tickets from the external source.
    Refresh,
}

#[derive(Subcommand, Debug)]
pub enum FindCommand {
    Timers(TimerArgs),
    Tickets {
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
        #[arg(short = 'p', long = "project")]
        project: Option<String>,
    },
    Projects {
        #[arg(short = 'n', long = "name")]
        name: Option<String>,
    },
}

#[derive(Args, Debug)]
pub struct TimerArgs {
    #[arg(short = 'i', long = "id")]
    id: Option<TimerId>,
    #[arg(short = 'n', long = "name")]
    name: Option<String>,
    #[arg(short = 't', long = "ticket")]
    ticket: Option<String>,
    #[arg(short = 'p', long = "project")]
    project: Option<String>,
    #[arg(long, conflicts_with = "inactive")]
    active: bool,
    #[arg(long)]
    inactive: bool,
    /// Substring of the status: active, idle or posted.
    #[arg(short = 's', long = "status")]
    status: Option<String>,
}

impl From<TimerArgs> for TimerFilter {
    fn from(args: TimerArgs) -> Self {
        TimerFilter {
            id: args.id,
            name: args.name,
            ticket: args.ticket,
            project: args.project,
            active: args.active,
            inactive: args.inactive,
            with_ticket: false,
            status: args.status,
        }
    }
}

/// Execute a CLI command against the opened core.
pub fn run(command: Command, core: &Core) -> Result<()> {
    let timers = core.timers();
    match command {
        Command::Start { name, ticket } => {
            let timer = timers.start(&name, ticket)?;
            println!("Started timer {} '{}'", timer.id, timer.name);
        }
        Command::Restart { id } => {
            timers.restart(id)?;
            println!("Restarted timer {id}");
        }
        Command::Stop { id } => {
            report_stopped(timers.stop(&TimerSelector::Id(id))?);
        }
        Command::End { name } => {
            report_stopped(timers.stop(&TimerSelector::Name(name))?);
        }
        Command::Edit {
            id,
            start,
            end,
            ticket,
            unassign,
        } => {
            let edit = TimerEdit {
                start: parse_optional_time(start.as_deref())?,
                end: parse_optional_time(end.as_deref())?,
                ticket: if unassign { Some(None) } else { ticket.map(Some) },
            };
            if edit.is_empty() {
                println!("Nothing to change.");
                return Ok(());
            }
            let timer = timers.edit(id, &edit)?;
            println!("Updated timer {} '{}'", timer.id, timer.name);
        }
        Command::Delete { id } => {
            timers.delete(id)?;
            println!("Deleted timer {id}");
        }
        Command::Post {
            id,
            name,
            project,
            ticket,
        } => {
            let filter = TimerFilter {
                id,
                name,
                project,
                ticket,
                ..Default::default()
            };
            let report = timers.post(&filter, core.source_opt())?;
            for id in &report.succeeded {
                println!("Posted timer {id}");
            }
            for (id, reason) in &report.failed {
                println!("Timer {id} not posted: {reason}");
            }
            if report.succeeded.is_empty() && report.failed.is_empty() {
                println!("No timers to post.");
            }
        }
        Command::Show => {
            let filter = TimerFilter {
                active: true,
                ..Default::default()
            };
            let rows = timers.find(&filter)?.collect::<qtimer::Result<Vec<_>>>()?;
            print_timers(&rows);
        }
        Command::Find { target } => {
            refresh_if_stale(core);
            match target {
                FindCommand::Timers(args) => {
                    let rows = timers
                        .find(&args.into())?
                        .collect::<qtimer::Result<Vec<_>>>()?;
                    print_timers(&rows);
                }
                FindCommand::Tickets { name, project } => {
                    let tickets = timers.find_tickets(name.as_deref(), project.as_deref())?;
                    let projects = timers.find_projects(None)?;
                    print_tickets(&tickets, &projects);
                }
                FindCommand::Projects { name } => {
                    print_projects(&timers.find_projects(name.as_deref())?);
                }
            }
        }
        Command::Refresh => {
            let summary = core.sync_engine().sync()?;
            println!(
                "Synced {} projects and {} tickets",
                summary.projects, summary.tickets
            );
            if summary.detached_timers > 0 {
                println!(
                    "{} timers lost their ticket because it no longer exists",
                    summary.detached_timers
                );
            }
        }
    }
    Ok(())
}

fn report_stopped(closed: usize) {
    if closed == 0 {
        println!("No running timer matched.");
    } else {
        println!("Stopped {closed} timer(s)");
    }
}

/// Refreshes the remote cache when it is stale. Listing works from the
/// cached copy when there is no source or the source is unreachable.
fn refresh_if_stale(core: &Core) {
    match core.sync_engine().sync_conditionally() {
        Ok(_) => {}
        Err(Error::Configuration(reason)) => {
            tracing::debug!(%reason, "skipping sync");
        }
        Err(err) => {
            tracing::warn!("sync before listing failed: {err}");
            eprintln!("Warning: {err}; showing cached data");
        }
    }
}

fn parse_optional_time(value: Option<&str>) -> Result<Option<DateTime<Utc>>> {
    value.map(parse_local_time).transpose()
}

fn parse_local_time(value: &str) -> Result<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), TIME_FORMAT)
        .with_context(|| format!("'{value}' is not a time like 2024-05-01 09:30"))?;
    match Local.from_local_datetime(&naive).single() {
        Some(local) => Ok(local.with_timezone(&Utc)),
        None => bail!("'{value}' is ambiguous or does not exist in the local timezone"),
    }
}

fn terminal_width() -> usize {
    crossterm::terminal::size()
        .map(|(width, _)| usize::from(width))
        .unwrap_or(100)
}

fn print_timers(rows: &[TimerRow]) {
    if rows.is_empty() {
        println!("No timers found.");
        return;
    }
    // id, start, duration, status and separators
    let fixed = 6 + 17 + 9 + 7 + 8;
    let flexible = terminal_width().saturating_sub(fixed).max(20);
    let name_width = flexible / 2;
    let ticket_width = flexible - name_width;

    println!(
        "{:>5} {} {} {:<16} {:>8} {:<6}",
        "ID",
        clamp_name("NAME", name_width),
        clamp_name("TICKET", ticket_width),
        "START",
        "DURATION",
        "STATUS"
    );
    for row in rows {
        let ticket = row
            .ticket
            .as_ref()
            .map(|ticket| format!("#{} {}", ticket.ticket_id, ticket.name))
            .unwrap_or_default();
        let start = row
            .start
            .map(|start| start.with_timezone(&Local).format(TIME_FORMAT).to_string())
            .unwrap_or_default();
        println!(
            "{:>5} {} {} {:<16} {:>8} {:<6}",
            row.id,
            clamp_name(&row.name, name_width),
            clamp_name(&ticket, ticket_width),
            start,
            format_duration(row.duration),
            row.status.as_str()
        );
    }
}

fn print_tickets(tickets: &[Ticket], projects: &[Project]) {
    if tickets.is_empty() {
        println!("No tickets found.");
        return;
    }
    let name_width = terminal_width().saturating_sub(40).max(20);
    println!("{:>8} {:>6} {} PROJECT", "ID", "NUMBER", clamp_name("NAME", name_width));
    for ticket in tickets {
        let project = projects
            .iter()
            .find(|project| project.id == ticket.project_id)
            .map(|project| project.name.as_str())
            .unwrap_or("?");
        println!(
            "{:>8} {:>6} {} {}",
            ticket.id,
            ticket.ticket_id,
            clamp_name(&ticket.name, name_width),
            project
        );
    }
}

fn print_projects(projects: &[Project]) {
    if projects.is_empty() {
        println!("No projects found.");
        return;
    }
    println!("{:>8} NAME", "ID");
    for project in projects {
        println!("{:>8} {}", project.id, project.name);
    }
}
