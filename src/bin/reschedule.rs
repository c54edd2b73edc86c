use std::time::Duration;

use anyhow::{Context, bail};
use chrono::{NaiveDate, Utc};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use care_booking::schedule::{
    MoveOutcome, ScheduleBoard, WeekGrid, http_backend::HttpScheduleBackend, week_start_of,
};

#[derive(Parser)]
#[command(about = "Inspect and move appointments on the care schedule")]
struct Cli {
    #[arg(long, env = "CARE_API_URL", default_value = "http://127.0.0.1:8080")]
    base_url: String,
    #[arg(long, default_value_t = 10)]
    timeout_secs: u64,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the week containing the given day (default: today).
    Week {
        #[arg(long)]
        start: Option<NaiveDate>,
    },
    /// Move an appointment to a day and hour (0 for all day).
    Move {
        id: Uuid,
        #[arg(long)]
        day: NaiveDate,
        #[arg(long)]
        hour: u32,
    },
}

fn print_grid(grid: &WeekGrid) {
    for day in &grid.days {
        println!("{}", day.date.format("%A %d/%m/%Y"));
        for row in day.rows.iter().filter(|r| !r.appointments.is_empty()) {
            for a in &row.appointments {
                println!(
                    "  {:>16}  {}  [{} / {}]  {}",
                    row.label,
                    a.patient_name,
                    a.urgency.as_str(),
                    a.status.as_str(),
                    a.id
                );
            }
        }
    }
    for a in &grid.off_grid {
        println!(
            "off grid: {} at {} ({})",
            a.patient_name,
            a.scheduled_time_label.as_deref().unwrap_or("-"),
            a.id
        );
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("warn".parse()?))
        .init();

    let cli = Cli::parse();
    let backend = HttpScheduleBackend::new(&cli.base_url, Duration::from_secs(cli.timeout_secs))?;
    let mut board = ScheduleBoard::new(backend);
    board
        .resync()
        .await
        .with_context(|| format!("loading appointments from {}", cli.base_url))?;

    match cli.command {
        Commands::Week { start } => {
            let week_start = week_start_of(start.unwrap_or_else(|| Utc::now().date_naive()));
            print_grid(&WeekGrid::build(week_start, board.appointments()));
        }
        Commands::Move { id, day, hour } => {
            let week_start = week_start_of(day);
            let grid = WeekGrid::build(week_start, board.appointments());
            let day_index = (day - week_start).num_days() as usize;

            let Some(outcome) = grid.drop_on(&mut board, id, day_index, hour).await else {
                bail!("hour {hour} is not a slot of the schedule (use 0 or 5 to 20)");
            };

            match outcome {
                MoveOutcome::Committed(req) => {
                    println!("moved {} to {} {}", req.id, req.target.day, req.time_label);
                }
                MoveOutcome::Ignored(reason) => {
                    println!("nothing to do ({reason:?})");
                }
                MoveOutcome::RolledBack {
                    message, resynced, ..
                } => {
                    if !resynced {
                        eprintln!("warning: could not reload the schedule after the failure");
                    }
                    bail!("move failed: {message}");
                }
            }
        }
    }
    Ok(())
}
