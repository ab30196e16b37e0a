use std::io::{BufRead, Write};

use exam_core::model::{ExamSession, User, UserRole};
use services::{AppServices, Clock, ExamRequest, PracticeConfig};
use tracing_subscriber::EnvFilter;

mod args;

use args::{Args, ArgsError, Command, print_usage};

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let argv: Vec<String> = std::env::args().skip(1).collect();
    if matches!(argv.first().map(String::as_str), Some("--help" | "-h") | None) {
        print_usage();
        return Ok(());
    }

    let config = PracticeConfig::from_env()?;
    let parsed = match Args::parse(argv, |key| std::env::var(key).ok(), config) {
        Ok(parsed) => parsed,
        Err(err) => {
            print_usage();
            return Err(err.into());
        }
    };

    tracing::debug!(db = %parsed.db_url, "opening database");
    prepare_sqlite_file(&parsed.db_url)?;
    let app = AppServices::new_sqlite(&parsed.db_url, Clock::system(), parsed.config).await?;

    match parsed.command {
        Command::Courses => {
            let courses = app.courses().list_courses().await?;
            if courses.is_empty() {
                println!("no courses yet; create one with `exam add-course --title <title>`");
            }
            for course in courses {
                match course.description() {
                    Some(desc) => println!("{:>4}  {}  ({desc})", course.id(), course.title()),
                    None => println!("{:>4}  {}", course.id(), course.title()),
                }
            }
        }
        Command::AddCourse { title, description } => {
            let id = app.courses().create_course(title, description).await?;
            println!("created course {id}");
        }
        Command::Import {
            course_id,
            source,
            file,
        } => {
            let json = std::fs::read_to_string(&file)?;
            let report = app.import().import_json(course_id, source, &json).await?;
            println!("imported {} question(s) into {source}", report.created);
            for error in &report.errors {
                eprintln!("  {error}");
            }
        }
        Command::Themes { course_id, source } => {
            let practice = app.practice();
            let size = practice.pool_size(course_id, source).await?;
            println!("{size} question(s) in {source}");
            for theme in practice.themes(course_id, source).await? {
                println!("  {theme}");
            }
        }
        Command::Practice {
            course_id,
            source,
            mode,
            theme,
            user_id,
            name,
        } => {
            if let (Some(id), Some(name)) = (user_id, name) {
                app.courses()
                    .save_user(&User::new(id, Some(name), UserRole::Student))
                    .await?;
            }

            let mut request = ExamRequest::new(course_id, source).with_mode(mode);
            request.theme = theme;
            request.user_id = user_id;

            let practice = app.practice();
            let mut exam = practice.start_exam(&request).await?;
            if exam.is_empty() {
                println!("no questions match this selection");
                return Ok(());
            }

            take_exam(&mut exam, std::io::stdin().lock(), std::io::stdout().lock())?;

            let score = exam.score();
            println!();
            println!(
                "grade {} / 20  ({} of {} fully correct){}",
                score.grade,
                score.correct_count,
                exam.total_questions(),
                if score.passed() { "  passed" } else { "" }
            );

            match user_id {
                Some(user_id) => {
                    let outcome = practice.finish_exam(&exam, user_id).await?;
                    println!("saved as result {}", outcome.result_id);
                }
                None => println!("not saved: pass --user or set EXAM_USER_ID to keep history"),
            }
        }
        Command::Stats {
            user_id,
            course_id,
            source,
        } => {
            let stats = app.stats().user_stats(user_id, course_id, source).await?;
            println!("exams:            {}", stats.total_exams);
            println!(
                "passed / failed:  {} / {}  ({}%)",
                stats.passed_exams, stats.failed_exams, stats.pass_rate
            );
            println!("average grade:    {:.1}", stats.average_grade);
            println!(
                "answers:          {} correct of {}",
                stats.total_correct_answers, stats.total_questions_answered
            );
            println!(
                "questions seen:   {} of {}",
                stats.unique_questions_seen, stats.total_questions_in_pool
            );
            for point in &stats.score_evolution {
                println!(
                    "  {}  {:>4.1}  {}",
                    point.date.format("%Y-%m-%d %H:%M"),
                    point.grade,
                    point.source
                );
            }
        }
        Command::Leaderboard {
            course_id,
            source,
            limit,
        } => {
            let board = app.stats().leaderboard(course_id, source, limit).await?;
            for (rank, entry) in board.iter().enumerate() {
                println!(
                    "{:>3}. {:<24} {:>4.1}  {:>3} exams  {:>3}% passed",
                    rank + 1,
                    entry.user_name,
                    entry.average_grade,
                    entry.total_exams,
                    entry.pass_rate
                );
            }
        }
    }

    Ok(())
}

/// Walk through the exam on the terminal.
///
/// Each line of `input` is an answer number (1-based); a blank line skips the
/// question. Input ending early leaves the remaining questions unanswered.
fn take_exam(
    exam: &mut ExamSession,
    mut input: impl BufRead,
    mut out: impl Write,
) -> std::io::Result<()> {
    let questions = exam.questions().to_vec();
    for (i, question) in questions.iter().enumerate() {
        writeln!(out)?;
        writeln!(out, "{}/{}. {}", i + 1, questions.len(), question.text())?;
        for (j, answer) in question.answers().iter().enumerate() {
            writeln!(out, "   {}) {}", j + 1, answer.text)?;
        }

        loop {
            write!(out, "> ")?;
            out.flush()?;
            let mut line = String::new();
            if input.read_line(&mut line)? == 0 {
                return Ok(());
            }
            let line = line.trim();
            if line.is_empty() {
                break;
            }
            let index = line.parse::<usize>().ok().and_then(|n| n.checked_sub(1));
            if let Some(index) = index {
                if exam.answer(question.id(), index).is_ok() {
                    break;
                }
            }
            writeln!(out, "enter 1-{} or leave blank to skip", question.answers().len())?;
        }
    }
    Ok(())
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

const DEFAULT_LOG_FILTER: &str = "app=info,services=info,storage=info";

/// `RUST_LOG` when it is set and valid, otherwise info for this workspace's crates.
fn log_filter(env: Option<&str>) -> EnvFilter {
    env.filter(|spec| !spec.trim().is_empty())
        .and_then(|spec| EnvFilter::try_new(spec).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}

#[tokio::main]
async fn main() {
    let filter = log_filter(std::env::var("RUST_LOG").ok().as_deref());
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run().await {
        eprintln!("{err}");
        std::process::exit(2);
    }
}
