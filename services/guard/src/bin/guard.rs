//! services/guard/src/bin/guard.rs

use std::path::PathBuf;
use std::sync::Arc;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use guard_lib::{
    adapters::{capture, TerminalFeedback},
    app::{commands, run_scan_session, AppContext, SessionEnd},
    config::Config,
    error::GuardError,
};
use patrol_core::domain::DEFAULT_PAGE_LIMIT;
use patrol_core::{FilterOptions, RecordQuery};
use serde::Serialize;
use tokio::io::BufReader;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "guard", version, about = "Patrol checkpoint scanner for security guards")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Sign in and remember the guard on this device
    Login {
        #[arg(short, long)]
        username: String,
        #[arg(short, long, env = "GUARD_PASSWORD")]
        password: String,
    },
    /// Forget the guard and the current patrol progress
    Logout,
    /// Show the signed-in guard
    Whoami,
    /// Check connectivity and server health
    Status,
    /// Scan patrol points; each input line is one decoded QR code
    Scan,
    /// Show the points scanned in the current patrol
    Progress,
    /// Start a new patrol
    Reset,
    /// List patrol records
    Logs {
        #[command(flatten)]
        filter: FilterArgs,
        #[arg(long, default_value_t = 1)]
        page: u32,
        #[arg(long, default_value_t = DEFAULT_PAGE_LIMIT)]
        limit: u32,
    },
    /// Build the patrol report (JSON); defaults to the last seven days
    Report {
        #[command(flatten)]
        filter: FilterArgs,
    },
    /// Download the image attached to a record
    Image {
        image_id: String,
        #[arg(short, long)]
        out: PathBuf,
    },
}

#[derive(clap::Args)]
struct FilterArgs {
    #[arg(long)]
    point: Option<String>,
    #[arg(long)]
    guard: Option<String>,
    /// First day, YYYY-MM-DD
    #[arg(long)]
    from: Option<NaiveDate>,
    /// Last day, YYYY-MM-DD
    #[arg(long)]
    to: Option<NaiveDate>,
    /// Only records with (true) or without (false) notes
    #[arg(long)]
    notes: Option<bool>,
}

impl FilterArgs {
    fn into_filter(self) -> FilterOptions {
        let (start_date, end_date) = commands::day_bounds(self.from, self.to);
        FilterOptions {
            point: self.point,
            guard_name: self.guard,
            start_date,
            end_date,
            has_notes: self.notes,
        }
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<(), GuardError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), GuardError> {
    let cli = Cli::parse();

    // --- 1. Load Configuration & Set Up Logging ---
    let config = Arc::new(Config::from_env()?);
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.to_string()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
    info!("Configuration loaded.");

    // --- 2. Initialize Adapters ---
    let ctx = AppContext::build(config, Arc::new(TerminalFeedback::stdout())).await?;

    // --- 3. Dispatch ---
    match cli.command {
        Command::Login { username, password } => {
            let user = commands::login(&ctx, &username, &password).await?;
            println!("Signed in as {}", user.guard_name.trim());
        }
        Command::Logout => {
            commands::logout(&ctx).await?;
            println!("Signed out");
        }
        Command::Whoami => print_json(&commands::whoami(&ctx).await?)?,
        Command::Status => print_json(&commands::status(&ctx).await)?,
        Command::Scan => {
            let handles = ctx.start_background().await;
            let codes = capture::line_source(BufReader::new(tokio::io::stdin()));
            let end = run_scan_session(&ctx, codes).await;
            ctx.stop_background(handles).await;
            if end? == SessionEnd::SignedOut {
                return Err(GuardError::NotSignedIn);
            }
        }
        Command::Progress => {
            let points: Vec<String> = commands::progress(&ctx)
                .await?
                .iter()
                .map(|p| p.to_string())
                .collect();
            println!(
                "{}/{} points: {}",
                points.len(),
                patrol_core::TOTAL_PATROL_POINTS,
                points.join(", ")
            );
        }
        Command::Reset => commands::reset(&ctx).await?,
        Command::Logs {
            filter,
            page,
            limit,
        } => {
            let query = RecordQuery::new(page, limit, filter.into_filter());
            let page = commands::logs(&ctx, &query).await?;
            print_json(&page)?;
        }
        Command::Report { filter } => {
            print_json(&commands::report(&ctx, filter.into_filter()).await?)?;
        }
        Command::Image { image_id, out } => {
            let written = commands::image(&ctx, &image_id, &out).await?;
            println!("Saved {} bytes to {}", written, out.display());
        }
    }

    Ok(())
}
