//!  Railgo Booking Agent
//!
//!  Copyright (C) 2026  Railgo Contributors
//!
//!  This program is free software: you can redistribute it and/or modify
//!  it under the terms of the GNU Affero General Public License as published by
//!  the Free Software Foundation, either version 3 of the License, or
//!  (at your option) any later version.
//!
//!  This program is distributed in the hope that it will be useful,
//!  but WITHOUT ANY WARRANTY; without even the implied warranty of
//!  MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
//!  GNU Affero General Public License for more details.
//!
//!  You should have received a copy of the GNU Affero General Public License
//!  along with this program.  If not, see <http://www.gnu.org/licenses/>.

//! CLI for watching and booking rail seats.

use std::io::{self, BufRead, Write};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Parser, ValueEnum};
use railgo_booking_agent::{
    BookingWatcher, KorailClient, NoticeSink, Operator, Passenger, PassengerCategory, Preferences,
    RailBackend, RailError, SearchFilter, SearchQuery, SeatPreference, SrtClient, Station,
    StationCode, StationDirectory, TrainKey, WatchOutcome, WatchPlan,
};

/// CLI arguments
#[derive(Parser, Debug)]
#[command(name = "railgo-book")]
#[command(author, version, about, long_about = None)]
struct CliArgs {
    /// Rail backend: srt, korail
    #[arg(short, long, default_value = "srt")]
    backend: BackendChoice,

    /// Departure station name (as listed in the station directory)
    #[arg(short, long)]
    from: Option<String>,

    /// Arrival station name
    #[arg(short, long)]
    to: Option<String>,

    /// Departure date (YYYYMMDD or YYYY-MM-DD; default today)
    #[arg(short, long)]
    date: Option<String>,

    /// Earliest departure time (HH, HHMM or HHMMSS; default now)
    #[arg(short = 'T', long)]
    time: Option<String>,

    /// Number of adult passengers
    #[arg(short, long, default_value = "1")]
    adults: u32,

    /// Number of child passengers
    #[arg(long, default_value = "0")]
    children: u32,

    /// Number of senior passengers
    #[arg(long, default_value = "0")]
    seniors: u32,

    /// Seat policy: general_first, general_only, special_first, special_only
    #[arg(short, long, default_value = "general_first")]
    seat: String,

    /// Include sold-out runs in the search output
    #[arg(long, default_value = "false")]
    include_no_seat: bool,

    /// Include runs with an open standby lane
    #[arg(long, default_value = "false")]
    include_standby: bool,

    /// Keep polling until one of the chosen trains is reserved
    #[arg(short, long, default_value = "false")]
    watch: bool,

    /// Train numbers to watch (comma-separated; default: all results)
    #[arg(long)]
    trains: Option<String>,

    /// Preferences file (JSON)
    #[arg(short, long)]
    prefs: Option<String>,

    /// Verbose output
    #[arg(short, long, default_value = "false")]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum BackendChoice {
    Srt,
    Korail,
}

/// Configure logging based on verbosity level
fn setup_logging(verbose: bool) {
    let level = if verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::INFO
    };
    tracing_subscriber::fmt().with_max_level(level).init();
}

/// Parse a seat policy string to SeatPreference
fn parse_seat(s: &str) -> Result<SeatPreference> {
    match s.to_lowercase().as_str() {
        "general_first" | "gf" => Ok(SeatPreference::GeneralFirst),
        "general_only" | "go" => Ok(SeatPreference::GeneralOnly),
        "special_first" | "sf" => Ok(SeatPreference::SpecialFirst),
        "special_only" | "so" => Ok(SeatPreference::SpecialOnly),
        _ => bail!(
            "Invalid seat policy: {}. Use: general_first, general_only, special_first, special_only",
            s
        ),
    }
}

/// Normalize a date argument to YYYYMMDD
fn parse_date(s: &str) -> Result<String> {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.len() != 8 {
        bail!("Invalid date: {}. Use YYYYMMDD or YYYY-MM-DD", s);
    }
    Ok(digits)
}

/// Normalize a time argument to HHMMSS
fn parse_time(s: &str) -> Result<String> {
    let digits: String = s.chars().filter(|c| c.is_ascii_digit()).collect();
    match digits.len() {
        2 => Ok(format!("{digits}0000")),
        4 => Ok(format!("{digits}00")),
        6 => Ok(digits),
        _ => bail!("Invalid time: {}. Use HH, HHMM or HHMMSS", s),
    }
}

/// Stations the SRT backend serves, for running without a preferences file.
fn builtin_stations() -> Vec<(&'static str, &'static str)> {
    vec![
        ("수서", "0551"),
        ("동탄", "0552"),
        ("평택지제", "0553"),
        ("천안아산", "0502"),
        ("오송", "0297"),
        ("대전", "0010"),
        ("김천(구미)", "0507"),
        ("서대구", "0506"),
        ("동대구", "0015"),
        ("경주", "0508"),
        ("울산(통도사)", "0509"),
        ("부산", "0020"),
        ("공주", "0514"),
        ("익산", "0030"),
        ("정읍", "0033"),
        ("광주송정", "0036"),
        ("나주", "0037"),
        ("목포", "0041"),
        ("포항", "0515"),
        ("진주", "0063"),
        ("마산", "0059"),
        ("창원중앙", "0512"),
    ]
}

fn build_directory(prefs: &Preferences) -> Result<StationDirectory> {
    let mut stations: Vec<Station> = prefs.stations.clone();
    for (name, code) in builtin_stations() {
        if !stations.iter().any(|s| s.name == name) {
            stations.push(Station::new(name, StationCode::new(code)?));
        }
    }
    Ok(StationDirectory::new(stations))
}

struct TerminalNotice;

impl NoticeSink for TerminalNotice {
    fn notice(&self, message: &str) {
        println!("{message}");
    }
}

struct StdinOperator;

impl Operator for StdinOperator {
    fn confirm_continue(&self, error: &RailError) -> bool {
        print!("{error}\nkeep polling? [Y/n] ");
        let _ = io::stdout().flush();
        let mut line = String::new();
        if io::stdin().lock().read_line(&mut line).is_err() {
            return false;
        }
        !line.trim().eq_ignore_ascii_case("n")
    }
}

fn credentials() -> Result<(String, String)> {
    let id = std::env::var("RAILGO_ID")
        .context("RAILGO_ID is not set (membership number, email, or phone)")?;
    let pw = std::env::var("RAILGO_PASSWORD").context("RAILGO_PASSWORD is not set")?;
    Ok((id, pw))
}

async fn run<B: RailBackend>(backend: &mut B, args: &CliArgs, query: SearchQuery) -> Result<()> {
    let (id, pw) = credentials()?;
    let session = backend.login(&id, &pw).await?;
    println!(
        "logged in as {} (membership {})",
        session.name, session.membership_number
    );

    let preference = parse_seat(&args.seat)?;
    let schedules = match backend.search(&query).await {
        Ok(schedules) => schedules,
        // An empty window is normal when a watch is about to start.
        Err(RailError::NoResults) if args.watch => Vec::new(),
        Err(error) => return Err(error.into()),
    };
    for schedule in &schedules {
        println!("{schedule}");
    }

    if !args.watch {
        return Ok(());
    }

    let chosen: Vec<TrainKey> = match &args.trains {
        Some(list) => {
            let wanted: Vec<&str> = list.split(',').map(str::trim).collect();
            schedules
                .iter()
                .filter(|s| wanted.contains(&s.train_number.as_str()))
                .map(|s| s.key())
                .collect()
        }
        None => Vec::new(),
    };

    let notice = TerminalNotice;
    let operator = StdinOperator;
    let plan = WatchPlan {
        query,
        chosen,
        preference,
    };
    let outcome = BookingWatcher::new(backend, &notice, &operator)
        .with_relogin(id, pw)
        .watch(&plan)
        .await?;

    match outcome {
        WatchOutcome::Reserved(reservation) => {
            println!("\nreserved!\n{reservation}");
            for ticket in &reservation.tickets {
                println!("  {ticket}");
            }
        }
        WatchOutcome::Aborted => println!("watch aborted"),
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();
    setup_logging(args.verbose);

    let prefs = match &args.prefs {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading preferences {path}"))?;
            Preferences::from_json(&text)?
        }
        None => Preferences::default(),
    };
    let directory = build_directory(&prefs)?;

    let from = args
        .from
        .clone()
        .or_else(|| prefs.departure.clone())
        .context("no departure station (use --from or the preferences file)")?;
    let to = args
        .to
        .clone()
        .or_else(|| prefs.arrival.clone())
        .context("no arrival station (use --to or the preferences file)")?;
    if from == to {
        bail!("departure and arrival stations are the same");
    }

    let departure = directory
        .find_by_name(&from)
        .with_context(|| format!("unknown station {from:?}"))?
        .clone();
    let arrival = directory
        .find_by_name(&to)
        .with_context(|| format!("unknown station {to:?}"))?
        .clone();

    let mut passengers: Vec<Passenger> = Vec::new();
    if args.adults > 0 {
        passengers.push(Passenger::adult(args.adults));
    }
    if args.children > 0 {
        passengers.push(Passenger::new(PassengerCategory::Child, args.children));
    }
    if args.seniors > 0 {
        passengers.push(Passenger::new(PassengerCategory::Senior, args.seniors));
    }
    if passengers.is_empty() {
        passengers = prefs.passengers();
    }

    let query = SearchQuery {
        departure,
        arrival,
        date: args
            .date
            .as_deref()
            .or(prefs.date.as_deref())
            .map(parse_date)
            .transpose()?,
        time: args
            .time
            .as_deref()
            .or(prefs.time.as_deref())
            .map(parse_time)
            .transpose()?,
        passengers,
        filter: SearchFilter {
            include_no_seat: args.include_no_seat || args.watch,
            include_standby: args.include_standby || prefs.include_standby,
        },
    };

    let notice = Arc::new(TerminalNotice);
    match args.backend {
        BackendChoice::Srt => {
            let mut client = SrtClient::new(directory)?.with_notice(notice);
            run(&mut client, &args, query).await
        }
        BackendChoice::Korail => {
            let mut client = KorailClient::new()?.with_notice(notice);
            run(&mut client, &args, query).await
        }
    }
}
