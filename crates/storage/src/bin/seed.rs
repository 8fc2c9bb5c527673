use std::fmt;

use chrono::{DateTime, Duration, Utc};
use fit_core::model::{ExerciseId, Workout, WorkoutId, WorkoutSessionSummary};
use storage::repository::Storage;

#[derive(Debug, Clone)]
struct Args {
    db_url: String,
    workout_id: WorkoutId,
    workout_name: String,
    exercises: Vec<ExerciseId>,
    sessions: u32,
    now: Option<DateTime<Utc>>,
}

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidWorkoutId { raw: String },
    InvalidSessions { raw: String },
    InvalidDbUrl { raw: String },
    InvalidNow { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidWorkoutId { raw } => write!(f, "invalid --workout-id value: {raw}"),
            ArgsError::InvalidSessions { raw } => write!(f, "invalid --sessions value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidNow { raw } => {
                write!(f, "invalid --now value (expected RFC3339): {raw}")
            }
        }
    }
}

impl std::error::Error for ArgsError {}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_exercises(raw: &str) -> Vec<ExerciseId> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ExerciseId::new)
        .collect()
}

impl Args {
    fn parse() -> Result<Self, ArgsError> {
        let mut db_url =
            std::env::var("FIT_DB_URL").unwrap_or_else(|_| "sqlite:fit.sqlite3?mode=rwc".into());
        let mut workout_id = std::env::var("FIT_WORKOUT_ID")
            .ok()
            .and_then(|value| value.parse::<WorkoutId>().ok())
            .unwrap_or_else(|| WorkoutId::new("full-body"));
        let mut workout_name =
            std::env::var("FIT_WORKOUT_NAME").unwrap_or_else(|_| "Full body".into());
        let mut exercises = parse_exercises(
            &std::env::var("FIT_EXERCISES").unwrap_or_else(|_| "squat,push-up,row,plank".into()),
        );
        let mut sessions = std::env::var("FIT_SESSIONS")
            .ok()
            .and_then(|value| value.parse::<u32>().ok())
            .unwrap_or(3);
        let mut now: Option<DateTime<Utc>> = None;

        let mut args = std::env::args().skip(1);
        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = value;
                }
                "--workout-id" => {
                    let value = require_value(&mut args, "--workout-id")?;
                    workout_id = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidWorkoutId { raw: value.clone() })?;
                }
                "--workout-name" => {
                    workout_name = require_value(&mut args, "--workout-name")?;
                }
                "--exercises" => {
                    let value = require_value(&mut args, "--exercises")?;
                    exercises = parse_exercises(&value);
                }
                "--sessions" => {
                    let value = require_value(&mut args, "--sessions")?;
                    sessions = value
                        .parse::<u32>()
                        .map_err(|_| ArgsError::InvalidSessions { raw: value.clone() })?;
                }
                "--now" => {
                    let value = require_value(&mut args, "--now")?;
                    let parsed = DateTime::parse_from_rfc3339(&value)
                        .map_err(|_| ArgsError::InvalidNow { raw: value.clone() })?
                        .with_timezone(&Utc);
                    now = Some(parsed);
                }
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            workout_id,
            workout_name,
            exercises,
            sessions,
            now,
        })
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p storage --bin seed -- [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>         SQLite URL (default: sqlite:fit.sqlite3?mode=rwc)");
    eprintln!("  --workout-id <id>         Workout id to upsert (default: full-body)");
    eprintln!("  --workout-name <name>     Workout name (default: Full body)");
    eprintln!("  --exercises <a,b,c>       Ordered exercise ids (default: squat,push-up,row,plank)");
    eprintln!("  --sessions <n>            Number of recorded sessions to append (default: 3)");
    eprintln!("  --now <rfc3339>           Fixed current time for deterministic seeding");
    eprintln!("  -h, --help                Show this help");
    eprintln!();
    eprintln!("Environment (same as flags):");
    eprintln!(
        "  FIT_DB_URL, FIT_WORKOUT_ID, FIT_WORKOUT_NAME, FIT_EXERCISES, FIT_SESSIONS"
    );
}

/// Sessions to append, newest first. A workout without exercises gets none.
fn plan_sessions(workout: &Workout, count: u32) -> Result<Vec<WorkoutSessionSummary>, fit_core::Error> {
    let total = workout.total_exercises();
    if total == 0 {
        return Ok(Vec::new());
    }
    let mut summaries = Vec::new();
    for i in 0..count {
        let completed = total - (usize::try_from(i).unwrap_or(0) % total);
        let duration = 600 + u64::from(i) * 45;
        summaries.push(WorkoutSessionSummary::from_counts(
            Some(workout.id().clone()),
            duration,
            completed,
            total,
        )?);
    }
    Ok(summaries)
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse().map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let storage = Storage::sqlite(&args.db_url).await?;
    let now = args.now.unwrap_or_else(Utc::now);

    let created_at = match storage.workouts.get_workout(&args.workout_id).await? {
        Some(existing) => existing.created_at(),
        None => now,
    };
    let workout = Workout::new(
        args.workout_id.clone(),
        args.workout_name.clone(),
        args.exercises.clone(),
        created_at,
    )
    .map_err(fit_core::Error::from)?;
    storage.workouts.upsert_workout(&workout).await?;

    let total = workout.total_exercises();
    let mut recorded = 0_u32;
    for (days_ago, summary) in (0_i64..).step_by(2).zip(plan_sessions(&workout, args.sessions)?) {
        let recorded_at = now - Duration::days(days_ago);
        storage.sessions.record_session(&summary, recorded_at).await?;
        recorded += 1;
    }

    println!(
        "Seeded workout {} ({} exercises) with {} sessions into {}",
        workout.id(),
        total,
        recorded,
        args.db_url
    );

    Ok(())
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
