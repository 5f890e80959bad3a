use std::fmt;
use std::path::PathBuf;

use learn_core::exercise::{ExerciseSession, ExerciseStep};
use learn_core::model::LessonId;
use learn_core::progression::ModuleStatus;
use learn_core::quiz::{QuizMode, QuizStep};
use services::{AppServices, Clock, EngineConfig};
use storage::JsonCurriculum;
use storage::repository::ProgressKey;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};
use tracing_subscriber::EnvFilter;

#[derive(Debug)]
enum ArgsError {
    MissingValue { flag: &'static str },
    MissingLesson { command: &'static str },
    UnknownArg(String),
    InvalidDbUrl { raw: String },
    InvalidLessonId { raw: String },
    InvalidLearner { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingLesson { command } => write!(f, "{command} requires a lesson id"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
            ArgsError::InvalidLessonId { raw } => write!(f, "invalid lesson id: {raw:?}"),
            ArgsError::InvalidLearner { raw } => write!(f, "invalid --learner value: {raw:?}"),
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

fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  cargo run -p app -- status              [options]");
    eprintln!("  cargo run -p app -- next                [options]");
    eprintln!("  cargo run -p app -- complete <lesson>   [options]");
    eprintln!("  cargo run -p app -- quiz <lesson>       [--test] [options]");
    eprintln!("  cargo run -p app -- exercise <lesson>   [options]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  --db <sqlite_url>        default sqlite:learn.sqlite3");
    eprintln!("  --curriculum <path>      default curriculum.json");
    eprintln!("  --learner <key>          default local");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  LEARN_DB_URL, LEARN_CURRICULUM, LEARN_LEARNER, RUST_LOG");
    eprintln!("  LEARN_AI_API_KEY, LEARN_AI_BASE_URL, LEARN_AI_MODEL");
    eprintln!("  LEARN_QUIZ_PASS_PERCENT, LEARN_QUIZ_MAX_ATTEMPTS, LEARN_EXERCISE_MAX_ATTEMPTS");
    eprintln!("  LEARN_HINT_DISMISS_MS, LEARN_EVALUATOR_TIMEOUT_SECS");
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Command {
    Status,
    Next,
    Complete(LessonId),
    Quiz { lesson: LessonId, mode: QuizMode },
    Exercise(LessonId),
}

struct Args {
    command: Command,
    db_url: String,
    curriculum: PathBuf,
    learner: ProgressKey,
}

impl Args {
    fn parse(mut args: impl Iterator<Item = String>) -> Result<Self, ArgsError> {
        let mut db_url = std::env::var("LEARN_DB_URL")
            .ok()
            .map_or_else(|| "sqlite://learn.sqlite3".into(), normalize_sqlite_url);
        let mut curriculum = std::env::var("LEARN_CURRICULUM")
            .map_or_else(|_| PathBuf::from("curriculum.json"), PathBuf::from);
        let mut learner = std::env::var("LEARN_LEARNER").unwrap_or_else(|_| "local".into());

        let mut verb: Option<String> = None;
        let mut lesson: Option<String> = None;
        let mut mode = QuizMode::Study;

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--curriculum" => curriculum = require_value(&mut args, "--curriculum")?.into(),
                "--learner" => learner = require_value(&mut args, "--learner")?,
                "--test" => mode = QuizMode::Test,
                "--help" | "-h" => {
                    print_usage();
                    std::process::exit(0);
                }
                flag if flag.starts_with("--") => return Err(ArgsError::UnknownArg(arg)),
                _ if verb.is_none() => verb = Some(arg),
                _ if lesson.is_none() => lesson = Some(arg),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let lesson_id = |command: &'static str| {
            let raw = lesson.clone().ok_or(ArgsError::MissingLesson { command })?;
            LessonId::new(raw.clone()).map_err(|_| ArgsError::InvalidLessonId { raw })
        };
        let command = match verb.as_deref() {
            None | Some("status") => Command::Status,
            Some("next") => Command::Next,
            Some("complete") => Command::Complete(lesson_id("complete")?),
            Some("quiz") => Command::Quiz {
                lesson: lesson_id("quiz")?,
                mode,
            },
            Some("exercise") => Command::Exercise(lesson_id("exercise")?),
            Some(other) => return Err(ArgsError::UnknownArg(other.to_string())),
        };
        let learner = ProgressKey::new(learner.clone())
            .map_err(|_| ArgsError::InvalidLearner { raw: learner })?;

        Ok(Self {
            command,
            db_url,
            curriculum,
            learner,
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
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

type Input = Lines<BufReader<Stdin>>;

fn stdin_lines() -> Input {
    BufReader::new(tokio::io::stdin()).lines()
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse(std::env::args().skip(1)).map_err(|e| {
        eprintln!("{e}");
        print_usage();
        e
    })?;

    let config = EngineConfig::from_env()?;
    prepare_sqlite_file(&args.db_url)?;
    let content = JsonCurriculum::new(args.curriculum.clone());
    let app = AppServices::new_sqlite(
        &args.db_url,
        &content,
        args.learner.clone(),
        config,
        Clock::default(),
    )
    .await?;

    match args.command {
        Command::Status => print_status(&app),
        Command::Next => match app.progression().next_lesson() {
            Some(lesson) => println!(
                "{} ({:?}, ~{} min): {}",
                lesson.id,
                lesson.kind(),
                lesson.estimated_minutes,
                lesson.title
            ),
            None => println!("Nothing left to do."),
        },
        Command::Complete(lesson) => {
            let progression = app.progression();
            progression.open_lesson(&lesson)?;
            if progression.mark_complete(&lesson).await? {
                println!("Marked {lesson} complete.");
            } else {
                println!("{lesson} was already complete.");
            }
            progression.close_lesson();
        }
        Command::Quiz { lesson, mode } => run_quiz(&app, &lesson, mode).await?,
        Command::Exercise(lesson) => run_exercise(&app, &lesson).await?,
    }
    Ok(())
}

fn print_status(app: &AppServices) {
    let progression = app.progression();
    for module in progression.overview() {
        let marker = match module.status {
            ModuleStatus::Completed => "done",
            ModuleStatus::Current => "open",
            ModuleStatus::Locked => "locked",
        };
        println!(
            "[{marker:>6}] {} {}/{}  {}",
            module.id, module.completed_lessons, module.total_lessons, module.title
        );
    }
    let progress = progression.progress();
    println!(
        "{}/{} lessons, {}%",
        progress.completed_lessons, progress.total_lessons, progress.percent
    );
}

async fn run_quiz(
    app: &AppServices,
    lesson: &LessonId,
    mode: QuizMode,
) -> Result<(), Box<dyn std::error::Error>> {
    let quizzes = app.quizzes();
    let mut session = quizzes.start(lesson, mode).await?;
    let mut input = stdin_lines();

    while let Some(question) = session.current_question().cloned() {
        println!("\n{}", question.prompt);
        for (n, option) in question.options.iter().enumerate() {
            println!("  {}. {option}", n + 1);
        }

        loop {
            let Some(line) = input.next_line().await? else {
                return Ok(());
            };
            let choice = line
                .trim()
                .parse::<usize>()
                .ok()
                .and_then(|n| question.options.get(n.wrapping_sub(1)))
                .cloned()
                .unwrap_or_else(|| line.trim().to_string());

            match quizzes.select(&mut session, choice) {
                Ok(QuizStep::Answered { is_correct }) => {
                    println!("{}", if is_correct { "Correct!" } else { "Incorrect." });
                    break;
                }
                Ok(QuizStep::Locked { message, .. }) => {
                    println!("{message}");
                    break;
                }
                Ok(QuizStep::Retry { hint }) => {
                    println!("{}", hint.message);
                    tokio::time::sleep(quizzes.hint_delay()).await;
                    quizzes.dismiss_hint(&mut session)?;
                }
                Ok(_) => {}
                Err(err) => println!("{err}"),
            }
        }

        quizzes.advance(&mut session).await?;
    }

    if let Some(result) = session.result() {
        if result.total == 0 {
            println!("This quiz has no questions.");
        }
        println!(
            "\nScore: {}/{} ({}%) {}",
            result.score,
            result.total,
            result.percent,
            if result.passed { "passed" } else { "not passed" }
        );
    }

    if let Some(items) = quizzes.review(&session) {
        for item in items {
            let mark = if item.is_correct { "+" } else { "-" };
            println!("{mark} {} -> {}", item.prompt, item.correct_answer);
            if let Some(explanation) = item.explanation {
                println!("    {explanation}");
            }
        }
    }
    app.progression().close_lesson();
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum RevealChoice {
    Reset,
    Accept,
    /// Ask the tutor; `None` sends the opening question.
    Tutor(Option<String>),
    Nothing,
}

impl RevealChoice {
    fn parse(line: &str) -> Self {
        match line.trim() {
            "" => RevealChoice::Nothing,
            "r" | "reset" => RevealChoice::Reset,
            "a" | "accept" => RevealChoice::Accept,
            "t" | "tutor" => RevealChoice::Tutor(None),
            question => RevealChoice::Tutor(Some(question.to_string())),
        }
    }
}

enum RevealExit {
    Reset,
    Finished,
    Quit,
}

async fn run_exercise(
    app: &AppServices,
    lesson: &LessonId,
) -> Result<(), Box<dyn std::error::Error>> {
    let exercises = app.exercises();
    let mut session = exercises.start(lesson)?;
    if !exercises.is_configured() {
        println!("Exercise evaluation is not configured; set LEARN_AI_API_KEY.");
        return Ok(());
    }

    println!("Goal: {}", session.goal());
    println!("Enter one submission per line.");
    let mut input = stdin_lines();

    while !session.is_finished() {
        let Some(line) = input.next_line().await? else {
            break;
        };
        session.edit_draft(line);
        match exercises.submit(&mut session).await {
            Ok(ExerciseStep::Resolved { feedback }) => {
                println!("{feedback}");
                exercises.finish(&mut session).await?;
            }
            Ok(ExerciseStep::Retry { attempt, feedback }) => {
                println!("Attempt {attempt}/{}: {feedback}", session.max_attempts());
            }
            Ok(ExerciseStep::Revealed { feedback }) => {
                println!("{feedback}\n");
                if let Some(guidance) = session.guidance() {
                    for step in guidance.approach {
                        println!("  - {step}");
                    }
                    println!("{}", guidance.hint);
                }
                match reveal_exits(app, &mut session, &mut input).await? {
                    RevealExit::Reset => {
                        println!("\nGoal: {}", session.goal());
                    }
                    RevealExit::Finished => {}
                    RevealExit::Quit => break,
                }
            }
            Ok(_) => {}
            Err(err) => println!("{err}"),
        }
    }

    if session.is_finished() {
        println!("Lesson {lesson} complete.");
    }
    app.progression().close_lesson();
    Ok(())
}

/// Offer the three ways out of a revealed exercise until the learner picks
/// one that leaves the reveal.
async fn reveal_exits(
    app: &AppServices,
    session: &mut ExerciseSession,
    input: &mut Input,
) -> Result<RevealExit, Box<dyn std::error::Error>> {
    let exercises = app.exercises();
    loop {
        println!("\n[r] start over  [a] accept and move on  [t] or a question: ask the tutor");
        let Some(line) = input.next_line().await? else {
            return Ok(RevealExit::Quit);
        };
        match RevealChoice::parse(&line) {
            RevealChoice::Reset => {
                exercises.reset(session);
                return Ok(RevealExit::Reset);
            }
            RevealChoice::Accept => {
                exercises.finish(session).await?;
                return Ok(RevealExit::Finished);
            }
            RevealChoice::Tutor(query) => {
                match exercises.escalate(session, query.as_deref()).await {
                    Ok(reply) => println!("\nTutor: {reply}"),
                    Err(err) => println!("{err}"),
                }
            }
            RevealChoice::Nothing => {}
        }
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(err) = run().await {
        tracing::error!(error = %err, "command failed");
        eprintln!("{err}");
        std::process::exit(2);
    }
}
