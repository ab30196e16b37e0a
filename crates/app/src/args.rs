use std::fmt;
use std::path::PathBuf;

use exam_core::StudyMode;
use exam_core::model::{CourseId, Source, UserId};
use services::{DEFAULT_LEADERBOARD_LIMIT, PracticeConfig};

pub const DEFAULT_DB_URL: &str = "sqlite://exam.sqlite3";

#[derive(Debug, PartialEq, Eq)]
pub enum ArgsError {
    MissingCommand,
    UnknownCommand(String),
    MissingValue { flag: &'static str },
    MissingFlag { command: &'static str, flag: &'static str },
    UnknownArg(String),
    InvalidValue { flag: &'static str, raw: String },
    InvalidDbUrl { raw: String },
}

impl fmt::Display for ArgsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ArgsError::MissingCommand => write!(f, "missing subcommand"),
            ArgsError::UnknownCommand(cmd) => write!(f, "unknown subcommand: {cmd}"),
            ArgsError::MissingValue { flag } => write!(f, "{flag} requires a value"),
            ArgsError::MissingFlag { command, flag } => write!(f, "{command} requires {flag}"),
            ArgsError::UnknownArg(arg) => write!(f, "unknown argument: {arg}"),
            ArgsError::InvalidValue { flag, raw } => write!(f, "invalid {flag} value: {raw}"),
            ArgsError::InvalidDbUrl { raw } => write!(f, "invalid --db value: {raw}"),
        }
    }
}

impl std::error::Error for ArgsError {}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Courses,
    AddCourse {
        title: String,
        description: Option<String>,
    },
    Import {
        course_id: CourseId,
        source: Source,
        file: PathBuf,
    },
    Themes {
        course_id: CourseId,
        source: Source,
    },
    Practice {
        course_id: CourseId,
        source: Source,
        mode: StudyMode,
        theme: Option<String>,
        user_id: Option<UserId>,
        name: Option<String>,
    },
    Stats {
        user_id: UserId,
        course_id: CourseId,
        source: Option<Source>,
    },
    Leaderboard {
        course_id: Option<CourseId>,
        source: Option<Source>,
        limit: usize,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub db_url: String,
    pub config: PracticeConfig,
    pub command: Command,
}

pub fn print_usage() {
    eprintln!("Usage:");
    eprintln!("  exam courses");
    eprintln!("  exam add-course --title <title> [--description <text>]");
    eprintln!("  exam import --course <id> --source <previous|ai|kahoots> --file <path.json>");
    eprintln!("  exam themes --course <id> --source <source>");
    eprintln!("  exam practice --course <id> --source <source> [--mode <all|unseen|wrong|theme>]");
    eprintln!("                [--theme <name>] [--user <id>] [--name <display name>]");
    eprintln!("  exam stats --user <id> --course <id> [--source <source>]");
    eprintln!("  exam leaderboard [--course <id>] [--source <source>] [--limit <n>]");
    eprintln!();
    eprintln!("Options for every command:");
    eprintln!("  --db <sqlite_url>   default {DEFAULT_DB_URL}");
    eprintln!("  --count <n>         questions per exam, default 15");
    eprintln!("  --seed <n>          fixed shuffle seed");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  EXAM_DB_URL, EXAM_QUESTION_COUNT, EXAM_SEED, EXAM_USER_ID, RUST_LOG");
}

fn require_value(
    args: &mut impl Iterator<Item = String>,
    flag: &'static str,
) -> Result<String, ArgsError> {
    args.next().ok_or(ArgsError::MissingValue { flag })
}

fn parse_value<T: std::str::FromStr>(flag: &'static str, raw: String) -> Result<T, ArgsError> {
    raw.parse().map_err(|_| ArgsError::InvalidValue { flag, raw })
}

/// Flag values collected before the subcommand decides which are required.
#[derive(Default)]
struct Flags {
    title: Option<String>,
    description: Option<String>,
    course: Option<CourseId>,
    source: Option<Source>,
    file: Option<PathBuf>,
    mode: Option<StudyMode>,
    theme: Option<String>,
    user: Option<UserId>,
    name: Option<String>,
    limit: Option<usize>,
}

fn required<T>(value: Option<T>, command: &'static str, flag: &'static str) -> Result<T, ArgsError> {
    value.ok_or(ArgsError::MissingFlag { command, flag })
}

impl Args {
    /// Parse CLI arguments on top of environment defaults.
    ///
    /// `env` resolves variables, so tests can supply their own.
    pub fn parse(
        argv: impl IntoIterator<Item = String>,
        env: impl Fn(&str) -> Option<String>,
        config: PracticeConfig,
    ) -> Result<Self, ArgsError> {
        let mut args = argv.into_iter();
        let name = args.next().ok_or(ArgsError::MissingCommand)?;

        let mut db_url = env("EXAM_DB_URL").map_or_else(|| DEFAULT_DB_URL.into(), normalize_sqlite_url);
        let mut config = config;
        let mut flags = Flags {
            user: env("EXAM_USER_ID")
                .and_then(|v| v.trim().parse::<u64>().ok())
                .map(UserId::new),
            ..Flags::default()
        };

        while let Some(arg) = args.next() {
            match arg.as_str() {
                "--db" => {
                    let value = require_value(&mut args, "--db")?;
                    if value.trim().is_empty() {
                        return Err(ArgsError::InvalidDbUrl { raw: value });
                    }
                    db_url = normalize_sqlite_url(value);
                }
                "--count" => {
                    config.question_count = parse_value("--count", require_value(&mut args, "--count")?)?;
                }
                "--seed" => {
                    config.seed = Some(parse_value("--seed", require_value(&mut args, "--seed")?)?);
                }
                "--title" => flags.title = Some(require_value(&mut args, "--title")?),
                "--description" => flags.description = Some(require_value(&mut args, "--description")?),
                "--course" => flags.course = Some(parse_value("--course", require_value(&mut args, "--course")?)?),
                "--source" => flags.source = Some(parse_value("--source", require_value(&mut args, "--source")?)?),
                "--file" => flags.file = Some(PathBuf::from(require_value(&mut args, "--file")?)),
                "--mode" => flags.mode = Some(parse_value("--mode", require_value(&mut args, "--mode")?)?),
                "--theme" => flags.theme = Some(require_value(&mut args, "--theme")?),
                "--user" => flags.user = Some(parse_value("--user", require_value(&mut args, "--user")?)?),
                "--name" => flags.name = Some(require_value(&mut args, "--name")?),
                "--limit" => flags.limit = Some(parse_value("--limit", require_value(&mut args, "--limit")?)?),
                _ => return Err(ArgsError::UnknownArg(arg)),
            }
        }

        let command = match name.as_str() {
            "courses" => Command::Courses,
            "add-course" => Command::AddCourse {
                title: required(flags.title, "add-course", "--title")?,
                description: flags.description,
            },
            "import" => Command::Import {
                course_id: required(flags.course, "import", "--course")?,
                source: required(flags.source, "import", "--source")?,
                file: required(flags.file, "import", "--file")?,
            },
            "themes" => Command::Themes {
                course_id: required(flags.course, "themes", "--course")?,
                source: required(flags.source, "themes", "--source")?,
            },
            "practice" => Command::Practice {
                course_id: required(flags.course, "practice", "--course")?,
                source: required(flags.source, "practice", "--source")?,
                mode: match (flags.mode, &flags.theme) {
                    (Some(mode), _) => mode,
                    (None, Some(_)) => StudyMode::Theme,
                    (None, None) => StudyMode::All,
                },
                theme: flags.theme,
                user_id: flags.user,
                name: flags.name,
            },
            "stats" => Command::Stats {
                user_id: required(flags.user, "stats", "--user")?,
                course_id: required(flags.course, "stats", "--course")?,
                source: flags.source,
            },
            "leaderboard" => Command::Leaderboard {
                course_id: flags.course,
                source: flags.source,
                limit: flags.limit.unwrap_or(DEFAULT_LEADERBOARD_LIMIT),
            },
            _ => return Err(ArgsError::UnknownCommand(name)),
        };

        Ok(Self {
            db_url,
            config,
            command,
        })
    }
}

pub fn normalize_sqlite_url(raw: String) -> String {
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
