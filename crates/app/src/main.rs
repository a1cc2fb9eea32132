use std::fmt;

use learn_core::model::{ChoiceId, ModuleId, TopicKey, UserId};
use learn_core::practice::PhaseKind;
use services::{AppServices, Clock, LedgerWrite, PracticeOrchestrator, PracticeSnapshot};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::{EnvFilter, fmt as log_fmt, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingSetting { flag: &'static str, env: &'static str },
    UnknownArg(String),
    InvalidUserId { raw: String },
    InvalidTopic { raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingSetting { flag, env } => write!(f, "{flag} (or {env}) is required"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidUserId { raw } => {
                write!(f, "invalid --user / LEARN_USER_ID value: {raw}")
            }
            ArgsError::InvalidTopic { raw } => write!(f, "invalid module or section: {raw:?}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
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

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Practice,
    Progress,
}

impl Command {
    fn from_arg(arg: &str) -> Option<Self> {
        match arg {
            "practice" => Some(Self::Practice),
            "progress" => Some(Self::Progress),
            _ => None,
        }
    }
}

struct Args {
    db_url: String,
    user_id: UserId,
    module: Option<String>,
    section: Option<String>,
}

impl Args {
    fn parse(args: &mut impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LEARN_DB_URL")
            .ok()
            .map_or_else(|| normalize_sqlite_url("sqlite://dev.sqlite3".into()), normalize_sqlite_url);
        let mut user_id = user_id_or_default(std::env::var("LEARN_USER_ID").ok())?;
        let mut module = std::env::var("LEARN_MODULE").ok();
        let mut section = std::env::var("LEARN_SECTION").ok();

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--user" => {
                    let value = require_value(args, "--user")?;
                    user_id = user_id_or_default(Some(value))?;
                }
                "--module" => module = Some(require_value(args, "--module")?),
                "--section" => section = Some(require_value(args, "--section")?),
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        Ok(Self {
            db_url,
            user_id,
            module,
            section,
        })
    }

    fn module_id(&self) -> Result<ModuleId, ArgsError> {
        let raw = self.module.clone().ok_or(ArgsError::MissingSetting {
            flag: "--module",
            env: "LEARN_MODULE",
        })?;
        ModuleId::new(raw.clone()).map_err(|_| ArgsError::InvalidTopic { raw })
    }

    fn topic(&self) -> Result<TopicKey, ArgsError> {
        let module = self.module.as_deref().ok_or(ArgsError::MissingSetting {
            flag: "--module",
            env: "LEARN_MODULE",
        })?;
        let section = self.section.as_deref().ok_or(ArgsError::MissingSetting {
            flag: "--section",
            env: "LEARN_SECTION",
        })?;
        TopicKey::parse(module, section).map_err(|_| ArgsError::InvalidTopic {
            raw: format!("{module}/{section}"),
        })
    }
}

/// User 1 when unset; a set but malformed id is an error, never a fallback.
fn user_id_or_default(raw: Option<String>) -> Result<UserId, ArgsError> {
    match raw {
        Some(raw) => raw.parse().map_err(|_| ArgsError::InvalidUserId { raw }),
        None => Ok(UserId::new(1)),
    }
}

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- practice [--db <sqlite_url>] [--user <id>] --module <id> --section <name>");
    eprintln!("  cargo run -p app -- progress [--db <sqlite_url>] [--user <id>] --module <id>");
    eprintln!();
    eprintln!("Defaults:");
    eprintln!("  --db sqlite://dev.sqlite3");
    eprintln!("  --user 1");
    eprintln!();
    eprintln!("Practice commands: <choice id>, check, next, restart, retry, save, quit");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_DB_URL, LEARN_USER_ID, LEARN_MODULE, LEARN_SECTION, RUST_LOG");
}

/// Absolute `sqlite://` URL that creates the file on first use.
fn normalize_sqlite_url(raw: String) -> String {
    if raw.starts_with("sqlite::memory:") || raw.contains("mode=memory") {
        return raw;
    }

    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("sqlite://")
        .or_else(|| trimmed.strip_prefix("sqlite:"))
        .unwrap_or(trimmed);
    let (path_str, query) = without_scheme
        .split_once('?')
        .map_or((without_scheme, None), |(path, query)| (path, Some(query)));
    let path = std::path::Path::new(path_str);
    let absolute = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .unwrap_or_else(|_| std::path::PathBuf::from("."))
            .join(path)
    };
    let query = match query {
        Some(query) if query.contains("mode=") => query.to_string(),
        Some(query) if !query.is_empty() => format!("{query}&mode=rwc"),
        _ => "mode=rwc".to_string(),
    };
    format!("sqlite://{}?{query}", absolute.display())
}

fn prepare_sqlite_dir(db_url: &str) -> Result<(), Box<dyn std::error::Error>> {
    let Some(path) = db_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let path = path.split('?').next().unwrap_or(path);
    if path.is_empty() {
        return Err(ArgsError::InvalidDbUrl {
            raw: db_url.to_string(),
        }
        .into());
    }
    if let Some(parent) = std::path::Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stderr_layer = log_fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(stderr_layer)
        .init();
}

//
// ─── RENDERING ─────────────────────────────────────────────────────────────────
//

fn render(snapshot: &PracticeSnapshot) {
    match snapshot.phase {
        PhaseKind::Idle => println!("No practice session running."),
        PhaseKind::Unanswered | PhaseKind::Answered => render_question(snapshot),
        PhaseKind::Complete => render_complete(snapshot),
    }
}

fn render_question(snapshot: &PracticeSnapshot) {
    let Some(question) = &snapshot.question else {
        return;
    };
    let index = snapshot.current_index.unwrap_or(0);
    println!();
    println!(
        "[{}/{}] {}",
        index + 1,
        snapshot.progress.total,
        question.prompt
    );
    for choice in &question.choices {
        let marker = if snapshot.selected_choice.as_ref() == Some(&choice.id) {
            '>'
        } else {
            ' '
        };
        println!(" {marker} {}) {}", choice.id, choice.text);
    }

    if let Some(feedback) = &snapshot.feedback {
        if feedback.answer.is_correct() {
            println!("Correct.");
        } else {
            println!("Incorrect. The answer is {}.", feedback.correct_choice_id);
        }
        if !feedback.explanation.is_empty() {
            println!("{}", feedback.explanation);
        }
        println!("Type `next` to continue.");
    } else if snapshot.selected_choice.is_some() {
        println!("Type `check` to submit, or pick another choice.");
    }
}

fn render_complete(snapshot: &PracticeSnapshot) {
    println!();
    if let (Some(topic), Some(score)) = (&snapshot.topic, &snapshot.score) {
        println!(
            "Finished {topic}: {}/{} correct ({}%).",
            score.correct(),
            score.out_of(),
            score.percent()
        );
    }
    match &snapshot.ledger {
        LedgerWrite::Recorded { record } => println!(
            "Best {}/{} over {} attempt(s).",
            record.best_score(),
            record.best_out_of(),
            record.attempt_count()
        ),
        LedgerWrite::Failed { reason, .. } => {
            println!("Your result could not be saved ({reason}). Type `save` to try again.");
        }
        LedgerWrite::Pending { .. } => {
            println!("Your result has not been saved yet. Type `save` to try again.");
        }
        LedgerWrite::NotRequired => {}
    }
    println!("Type `restart`, `retry` or `quit`.");
}

//
// ─── COMMANDS ──────────────────────────────────────────────────────────────────
//

async fn run_practice(
    mut practice: PracticeOrchestrator,
    topic: TopicKey,
) -> Result<(), Box<dyn std::error::Error>> {
    if !practice.has_questions_for_section(&topic).await? {
        println!("No practice questions for {topic}.");
        return Ok(());
    }
    if let Some(best) = practice.best_score(&topic).await? {
        println!("Best so far: {}/{}", best.score, best.out_of);
    }

    render(&practice.start_session(topic).await?);

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let input = line.trim();
        let outcome = match input {
            "" => continue,
            "quit" | "q" => {
                practice.exit();
                break;
            }
            "check" => practice.check_answer(),
            "next" => practice.advance().await,
            "restart" => practice.restart(),
            "retry" => practice.retry().await,
            "save" => practice.retry_record().await,
            choice => practice.select_choice(ChoiceId::new(choice)),
        };
        match outcome {
            Ok(snapshot) => render(&snapshot),
            Err(err) => println!("! {err}"),
        }
    }
    Ok(())
}

async fn run_progress(
    services: &AppServices,
    module_id: &ModuleId,
) -> Result<(), Box<dyn std::error::Error>> {
    let records = services
        .ledger()
        .module_progress(services.user_id(), module_id)
        .await?;
    if records.is_empty() {
        println!("No attempts recorded for {module_id}.");
        return Ok(());
    }
    for record in records {
        println!(
            "{:<32} best {}/{}  last {}/{}  attempts {}",
            record.topic().section().as_str(),
            record.best_score(),
            record.best_out_of(),
            record.last_score(),
            record.last_out_of(),
            record.attempt_count()
        );
    }
    Ok(())
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let mut argv = std::env::args().skip(1);

    let cmd = match argv.next() {
        None => {
            print_usage();
            return Ok(());
        }
        Some(first) if first == "--help" || first == "-h" => {
            print_usage();
            return Ok(());
        }
        Some(first) => Command::from_arg(&first).ok_or_else(|| {
            eprintln!("unknown subcommand: {first}");
            print_usage();
            std::io::Error::new(std::io::ErrorKind::InvalidInput, "unknown subcommand")
        })?,
    };

    let parsed = Args::parse(&mut argv).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    tracing::debug!(db = %parsed.db_url, user = %parsed.user_id, command = ?cmd, "starting");
    prepare_sqlite_dir(&parsed.db_url)?;
    let services =
        AppServices::new_sqlite(&parsed.db_url, Clock::default_clock(), parsed.user_id).await?;

    match cmd {
        Command::Practice => {
            let topic = parsed.topic()?;
            run_practice(services.practice(), topic).await
        }
        Command::Progress => {
            let module_id = parsed.module_id()?;
            run_progress(&services, &module_id).await
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
