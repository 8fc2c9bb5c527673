use std::fmt;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use fit_core::model::{ExerciseId, NavigationIntent, WorkoutId};
use services::sessions::format_duration;
use services::{
    AppServices, Clock, FinishOutcome, GuardOutcome, NavigationError, Navigator, SessionError,
    TimerToggle, UnloadDecision, WorkoutSession,
};
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    UnknownArg(String),
    InvalidWorkoutId { raw: String },
    InvalidDbUrl { raw: String },
    InvalidLimit { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidWorkoutId { raw } => write!(f, "invalid --workout-id value: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLimit { raw } => write!(f, "invalid --limit value: {raw}"),
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

struct Args {
    db_url: String,
    state_dir: PathBuf,
    workout_id: Option<WorkoutId>,
    limit: u32,
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- run     [--db <sqlite_url>] [--state-dir <dir>] [--workout-id <id>]");
    eprintln!("  cargo run -p app -- history [--db <sqlite_url>] [--workout-id <id>] [--limit <n>]");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://fit.sqlite3");
    eprintln!("  --state-dir .fit-state");
    eprintln!("  --workout-id <first workout in storage>");
    eprintln!("  --limit 20");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  FIT_DB_URL, FIT_STATE_DIR, FIT_WORKOUT_ID");
    eprintln!("  FIT_API_BASE_URL, FIT_API_TOKEN  # record sessions remotely");
    eprintln!("  RUST_LOG");
}

fn print_session_help() {
    println!("Commands:");
    println!("  start | stop        start the timer, or finish the session");
    println!("  toggle <exercise>   mark or unmark an exercise");
    println!("  go <target>         navigate, e.g. `go /` or `go /exercises/E1?workoutId=W1`");
    println!("  back | forward      history navigation");
    println!("  confirm | cancel    answer a leave prompt");
    println!("  status              show the session");
    println!("  quit                leave the app");
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Run,
    History,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "run" => Some(Self::Run),
            "history" => Some(Self::History),
            _ => None,
        }
    }
}

impl Args {
    fn parse(cmd: Command, args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("FIT_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://fit.sqlite3".into(), normalize_sqlite_url);
        let mut state_dir = std::env::var("FIT_STATE_DIR")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map_or_else(|| PathBuf::from(".fit-state"), PathBuf::from);
        let mut workout_id = std::env::var("FIT_WORKOUT_ID")
            .ok()
            .and_then(|value| value.parse::<WorkoutId>().ok());
        let mut limit = 20;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--state-dir" if cmd == Command::Run => {
                    state_dir = PathBuf::from(require_value(args, "--state-dir")?);
                }
                "--workout-id" => {
                    let value = require_value(args, "--workout-id")?;
                    let parsed = value
                        .parse::<WorkoutId>()
                        .map_err(|_| ArgsError::InvalidWorkoutId { raw: value.clone() })?;
                    workout_id = Some(parsed);
                }
                "--limit" if cmd == Command::History => {
                    let value = require_value(args, "--limit")?;
                    limit = value
                        .parse()
                        .map_err(|_| ArgsError::InvalidLimit { raw: value.clone() })?;
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
            state_dir,
            workout_id,
            limit,
        })
    }
}

fn normalize_sqlite_url(raw: String) -> String {
    if raw == "sqlite::memory:" || raw.starts_with("sqlite://") {
        return raw;
    }

    let trimmed = raw.trim().to_string();
    let path_str = trimmed
        .strip_prefix("sqlite:")
        .unwrap_or(trimmed.as_str())
        .to_string();
    let path = std::path::Path::new(&path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join(path)
    };
    format!("sqlite://{}", absolute.display())
}

fn prepare_sqlite_file(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    if db_url == "sqlite::memory:" {
        return Ok(());
    }

    let path = db_url
        .strip_prefix("sqlite://")
        .ok_or_else(|| ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        })?;
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }

    let path = std::path::Path::new(path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    if !path.exists() {
        std::fs::OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(false)
            .open(path)?;
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("app=info,services=info,storage=info,warn"));

    // stdout belongs to the session prompt.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();
}

/// Navigator for the terminal front end: keeps a location history and prints moves.
struct ConsoleNavigator {
    location: Mutex<Location>,
}

struct Location {
    history: Vec<String>,
    cursor: usize,
}

impl ConsoleNavigator {
    fn new(start: String) -> Self {
        Self {
            location: Mutex::new(Location {
                history: vec![start],
                cursor: 0,
            }),
        }
    }

    fn current(&self) -> String {
        self.location
            .lock()
            .ok()
            .and_then(|loc| loc.history.get(loc.cursor).cloned())
            .unwrap_or_else(|| "/".into())
    }
}

impl Navigator for ConsoleNavigator {
    fn dispatch(&self, intent: &NavigationIntent) -> Result<(), NavigationError> {
        let failed = |reason: &str| NavigationError::Failed {
            intent: intent.to_string(),
            reason: reason.into(),
        };
        let mut loc = self.location.lock().map_err(|_| failed("history poisoned"))?;

        match intent {
            NavigationIntent::Push(target) => {
                let keep = loc.cursor + 1;
                loc.history.truncate(keep);
                loc.history.push(target.clone());
                loc.cursor = loc.history.len() - 1;
            }
            NavigationIntent::Replace(target) => {
                let cursor = loc.cursor;
                if let Some(entry) = loc.history.get_mut(cursor) {
                    entry.clone_from(target);
                }
            }
            NavigationIntent::Back => {
                if loc.cursor == 0 {
                    return Err(failed("no earlier page"));
                }
                loc.cursor -= 1;
            }
            NavigationIntent::Forward => {
                if loc.cursor + 1 >= loc.history.len() {
                    return Err(failed("no later page"));
                }
                loc.cursor += 1;
            }
        }

        println!("-> {}", loc.history[loc.cursor]);
        Ok(())
    }
}

fn print_outcome(outcome: &FinishOutcome) {
    match outcome {
        FinishOutcome::NotActive => println!("no active session"),
        FinishOutcome::Recorded { summary, record } => println!(
            "session #{}: {} with {}/{} exercises",
            record.id,
            format_duration(summary.duration_seconds()),
            summary.exercises_completed(),
            summary.total_exercises()
        ),
        FinishOutcome::Skipped { reason } => println!("session finished, not recorded ({reason})"),
        FinishOutcome::RecordFailed { .. } => {}
    }
    if let Some(message) = outcome.user_message() {
        println!("{message}");
    }
}

fn print_status(session: &WorkoutSession) {
    let view = session.view();
    println!(
        "{} | {} | {}/{} done{}",
        if view.is_active { "active" } else { "idle" },
        format_duration(view.elapsed_seconds),
        view.completed_exercise_ids.len(),
        session.total_exercises(),
        if view.confirmation_pending {
            " | leave? (confirm/cancel)"
        } else {
            ""
        }
    );
    for exercise in session.exercises() {
        let mark = if view.completed_exercise_ids.contains(exercise) { "x" } else { " " };
        println!("  [{mark}] {exercise}");
    }
}

fn report_navigation(outcome: GuardOutcome, session: &WorkoutSession) {
    if outcome == GuardOutcome::Intercepted {
        if let Some(intent) = session.pending_navigation() {
            println!("A workout is in progress. Leave ({intent}) and finish it? (confirm/cancel)");
        }
    }
}

async fn run_session(
    app: &AppServices,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<(), Box<dyn std::error::Error>> {
    let workout = app.workout();
    let navigator = Arc::new(ConsoleNavigator::new(format!("/workouts/{}", workout.id())));
    let mut session = app.open_session(navigator.clone())?;

    println!("{} ({})", workout.name(), workout.id());
    if session.is_active() {
        println!("resumed the session in progress");
    }
    print_status(&session);
    print_session_help();

    while let Some(line) = lines.next_line().await? {
        let mut words = line.split_whitespace();
        let Some(command) = words.next() else {
            continue;
        };
        let rest = words.collect::<Vec<_>>().join(" ");

        let result: Result<(), SessionError> = async {
            match command {
                "start" if session.is_active() => println!("session already running"),
                "stop" if !session.is_active() => println!("no active session"),
                "start" | "stop" => match session.toggle_timer().await? {
                    TimerToggle::Started => println!("timer started"),
                    TimerToggle::Finished(outcome) => print_outcome(&outcome),
                },
                "toggle" | "done" if rest.is_empty() => println!("usage: toggle <exercise>"),
                "toggle" | "done" => {
                    let exercise = ExerciseId::new(rest.as_str());
                    match session.toggle_exercise(&exercise)? {
                        Some(true) => println!("{exercise} done"),
                        Some(false) => println!("{exercise} not done"),
                        None => println!("start the session first"),
                    }
                }
                "go" if rest.is_empty() => println!("usage: go <target>"),
                "go" => {
                    let outcome = session.navigate(NavigationIntent::push(rest.as_str()))?;
                    report_navigation(outcome, &session);
                }
                "back" => report_navigation(session.navigate(NavigationIntent::Back)?, &session),
                "forward" => {
                    report_navigation(session.navigate(NavigationIntent::Forward)?, &session);
                }
                "confirm" => match session.confirm_leave().await? {
                    Some(outcome) => print_outcome(&outcome),
                    None => println!("nothing to confirm"),
                },
                "cancel" => {
                    if session.cancel_leave() {
                        println!("staying on {}", navigator.current());
                    } else {
                        println!("nothing to cancel");
                    }
                }
                "status" => print_status(&session),
                "help" => print_session_help(),
                "quit" | "exit" => {}
                other => println!("unknown command: {other} (try `help`)"),
            }
            Ok(())
        }
        .await;

        match result {
            Ok(()) => {}
            Err(SessionError::NavigationAfterFinish { outcome, source }) => {
                print_outcome(&outcome);
                println!("navigation failed: {source}");
            }
            Err(err) => println!("error: {err}"),
        }

        if matches!(command, "quit" | "exit") && confirm_unload(&session, lines).await? {
            break;
        }
    }

    Ok(())
}

async fn confirm_unload(
    session: &WorkoutSession,
    lines: &mut Lines<BufReader<Stdin>>,
) -> Result<bool, Box<dyn std::error::Error>> {
    if session.before_unload() == UnloadDecision::Allow {
        return Ok(true);
    }
    println!("Leave site? A workout is in progress. [y/N]");
    let answer = lines.next_line().await?.unwrap_or_default();
    Ok(matches!(answer.trim(), "y" | "Y" | "yes"))
}

async fn show_history(app: &AppServices, limit: u32) -> Result<(), Box<dyn std::error::Error>> {
    let workout = app.workout();
    let items = app.history().recent_sessions(workout.id(), limit).await?;
    println!("{} ({}): {} session(s)", workout.name(), workout.id(), items.len());
    for item in items {
        println!(
            "  #{:<4} {}  {:>8}  {}/{} ({:.0}%)",
            item.id,
            item.recorded_at.format("%Y-%m-%d %H:%M"),
            item.duration_label,
            item.exercises_completed,
            item.total_exercises,
            item.completion_ratio * 100.0
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv: Vec<String> = std::env::args().skip(1).collect();

    let cmd = match argv.first().map(String::as_str) {
        None => Command::Run,
        Some("--help" | "-h") => {
            print_usage();
            return Ok(());
        }
        Some(first) if first.starts_with("--") => Command::Run,
        Some(first) => Command::from_arg(first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    if !argv.is_empty() && !argv[0].starts_with("--") {
        argv.remove(0);
    }

    let mut iter = argv.into_iter();
    let parsed = Args::parse(cmd, &mut iter).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    init_tracing();

    // Open + migrate SQLite at startup. Keep this in the binary glue so core/services stay pure.
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(
        &parsed.db_url,
        &parsed.state_dir,
        Clock::system(),
        parsed.workout_id,
    )
    .await?;
    if app.created_default() {
        tracing::info!(workout_id = %app.workout().id(), "no workouts found; using a starter workout");
    }

    match cmd {
        Command::Run => {
            let mut lines = BufReader::new(tokio::io::stdin()).lines();
            run_session(&app, &mut lines).await
        }
        Command::History => show_history(&app, parsed.limit).await,
    }
}

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        // At this layer (binary glue), printing once is fine.
        eprintln!("{err}");
        std::process::exit(2);
    }
}
