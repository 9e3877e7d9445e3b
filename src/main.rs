//! Purpose: `paramlite` CLI entry point.
//! Role: Binary crate root; parses args, binds parameters, runs each target.
//! Invariants: Stdout carries only result rows; diagnostics go to stderr.
//! Invariants: Non-interactive errors are emitted as JSON on stderr.
//! Invariants: Process exit code is derived from `core::error::to_exit_code`.
//! Invariants: Parameters bind in command-line encounter order across flag kinds.
#![allow(clippy::result_large_err)]
use std::error::Error as StdError;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{
    ArgAction, ArgMatches, CommandFactory, FromArgMatches, Parser, ValueEnum, ValueHint,
    error::ErrorKind as ClapErrorKind,
};
use serde_json::{Map, Value, json};
use tracing_subscriber::EnvFilter;

use paramlite::core::error::{Error, ErrorKind, to_exit_code};
use paramlite::core::escape;
use paramlite::core::exec::QueryExecutor;
use paramlite::core::params::{self, Param, ParamList};
use paramlite::core::settings::{OpenMode, Settings};

#[derive(Copy, Clone, Debug)]
struct RunOutcome {
    exit_code: i32,
}

impl RunOutcome {
    fn ok() -> Self {
        Self { exit_code: 0 }
    }

    fn with_code(exit_code: i32) -> Self {
        Self { exit_code }
    }
}

fn main() {
    init_tracing();
    let exit_code = match run() {
        Ok(outcome) => outcome.exit_code,
        Err((err, color_mode)) => {
            emit_error(&err, color_mode);
            to_exit_code(err.kind())
        }
    };
    std::process::exit(exit_code);
}

fn run() -> Result<RunOutcome, (Error, ColorMode)> {
    let matches = match Cli::command().try_get_matches_from(std::env::args_os()) {
        Ok(matches) => matches,
        Err(err) => match err.kind() {
            ClapErrorKind::DisplayHelp | ClapErrorKind::DisplayVersion => {
                err.print().map_err(|io_err| {
                    (
                        Error::new(ErrorKind::Io)
                            .with_message("failed to write help")
                            .with_source(io_err),
                        ColorMode::Auto,
                    )
                })?;
                return Ok(RunOutcome::with_code(0));
            }
            _ => {
                let message = clap_error_summary(&err);
                let hint = clap_error_hint(&err);
                return Err((
                    Error::new(ErrorKind::Usage)
                        .with_message(message)
                        .with_hint(hint),
                    ColorMode::Auto,
                ));
            }
        },
    };
    let cli = Cli::from_arg_matches(&matches).map_err(|err| {
        (
            Error::new(ErrorKind::Internal)
                .with_message("argument decoding failed")
                .with_source(err),
            ColorMode::Auto,
        )
    })?;
    let color_mode = cli.color;

    let param_list = collect_params(&matches).map_err(|err| (err, color_mode))?;
    let settings = build_settings(&cli);
    let query = read_query().map_err(|err| (err, color_mode))?;

    let executor = QueryExecutor::new(&query, &param_list, &settings);
    let stdout = io::stdout();
    let mut out = io::BufWriter::new(stdout.lock());
    for path in &cli.databases {
        if let Err(err) = executor.run_target(path, &mut out) {
            if matches!(err.kind(), ErrorKind::Mismatch | ErrorKind::Io) {
                return Err((err, color_mode));
            }
            emit_error(&err, color_mode);
        }
    }
    Ok(RunOutcome::ok())
}

#[derive(Parser)]
#[command(
    name = "paramlite",
    version,
    about = "Run one SQL query from standard input against SQLite database files",
    help_template = r#"{about-with-newline}
{before-help}USAGE
  {usage}

ARGUMENTS
{positionals}

OPTIONS
{options}

{after-help}
"#,
    long_about = None,
    before_help = r#"The query is read from standard input; result rows stream to standard output.

Mental model:
  - `-d`/`-f`/`-t`/`-n` each append one typed parameter, in the order given
  - parameters bind to `?` placeholders left to right
  - every DATABASE runs the same query with the same parameters
"#,
    after_help = r#"EXAMPLES
  $ echo 'SELECT name FROM users WHERE id = ?' | paramlite -d 42 app.db
  $ echo 'INSERT INTO logs VALUES (?, ?)' | paramlite -w -t boot -n app.db
  $ echo 'SELECT * FROM t' | paramlite -F ';' -R '\r\n' -N '' app.db backup.db

NOTES
  - Databases open read-only unless -w or -c is given
  - Separator and stand-in operands decode backslash escapes
  - A placeholder/parameter count mismatch stops the whole run"#
)]
struct Cli {
    #[arg(
        short = 'r',
        action = ArgAction::SetTrue,
        overrides_with_all = ["read_only", "read_write", "create"],
        help = "Open databases read-only (default)"
    )]
    read_only: bool,
    #[arg(
        short = 'w',
        action = ArgAction::SetTrue,
        overrides_with_all = ["read_only", "read_write", "create"],
        help = "Open databases read-write"
    )]
    read_write: bool,
    #[arg(
        short = 'c',
        action = ArgAction::SetTrue,
        overrides_with_all = ["read_only", "read_write", "create"],
        help = "Open databases read-write, creating missing files"
    )]
    create: bool,
    #[arg(
        short = 'F',
        value_name = "SEP",
        help = "Output field separator, escapes decoded (default \"\\t\")"
    )]
    field_sep: Option<String>,
    #[arg(
        short = 'R',
        value_name = "SEP",
        help = "Output record separator, escapes decoded (default \"\\n\")"
    )]
    record_sep: Option<String>,
    #[arg(
        short = 'N',
        value_name = "TEXT",
        help = "Stand-in printed for NULL columns, escapes decoded (default \"[NULL]\")"
    )]
    null_stand_in: Option<String>,
    #[arg(
        short = 'B',
        value_name = "TEXT",
        help = "Stand-in printed for BLOB columns (default: escape-encoded bytes)"
    )]
    blob_stand_in: Option<String>,
    #[arg(
        short = 'n',
        action = ArgAction::Append,
        num_args = 0..=1,
        require_equals = true,
        default_missing_value = "",
        value_name = "",
        help = "Bind a NULL parameter at this position"
    )]
    null_params: Vec<String>,
    #[arg(
        short = 'd',
        action = ArgAction::Append,
        value_name = "NUM",
        allow_hyphen_values = true,
        help = "Bind a 64-bit integer parameter (decimal, octal, or hex)"
    )]
    int_params: Vec<String>,
    #[arg(
        short = 'f',
        action = ArgAction::Append,
        value_name = "NUM",
        allow_hyphen_values = true,
        help = "Bind a floating point parameter"
    )]
    real_params: Vec<String>,
    #[arg(
        short = 't',
        action = ArgAction::Append,
        value_name = "STR",
        allow_hyphen_values = true,
        help = "Bind a text parameter, stored verbatim"
    )]
    text_params: Vec<String>,
    #[arg(
        long,
        default_value = "auto",
        value_enum,
        help = "Colorize stderr diagnostics: auto|always|never"
    )]
    color: ColorMode,
    #[arg(
        value_name = "DATABASE",
        required = true,
        value_hint = ValueHint::FilePath,
        help = "SQLite database files to run the query against"
    )]
    databases: Vec<PathBuf>,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ColorMode {
    Auto,
    Always,
    Never,
}

impl ColorMode {
    fn use_color(self, is_tty: bool) -> bool {
        match self {
            ColorMode::Auto => is_tty,
            ColorMode::Always => true,
            ColorMode::Never => false,
        }
    }
}

#[derive(Copy, Clone, Debug)]
enum ParamKind {
    Null,
    Integer,
    Real,
    Text,
}

/// Merge the four parameter flags back into command-line encounter order.
///
/// Clap groups values per flag; the argv indices recover the interleaving so
/// `-d 1 -t x -n` binds positions 1, 2, 3 in that order.
fn collect_params(matches: &ArgMatches) -> Result<ParamList, Error> {
    let mut entries: Vec<(usize, ParamKind, String)> = Vec::new();
    gather_flag(matches, "null_params", ParamKind::Null, &mut entries);
    gather_flag(matches, "int_params", ParamKind::Integer, &mut entries);
    gather_flag(matches, "real_params", ParamKind::Real, &mut entries);
    gather_flag(matches, "text_params", ParamKind::Text, &mut entries);
    entries.sort_by_key(|(index, _, _)| *index);

    let mut list = ParamList::new();
    for (_, kind, raw) in entries {
        match kind {
            ParamKind::Null => list.push(Param::Null),
            ParamKind::Integer => {
                let value = params::parse_integer(&raw).map_err(|err| err.with_flag("-d"))?;
                list.push(Param::Integer(value));
            }
            ParamKind::Real => {
                let value = params::parse_real(&raw).map_err(|err| err.with_flag("-f"))?;
                list.push(Param::Real(value));
            }
            ParamKind::Text => list.push(Param::Text(raw)),
        }
    }
    Ok(list)
}

fn gather_flag(
    matches: &ArgMatches,
    id: &str,
    kind: ParamKind,
    entries: &mut Vec<(usize, ParamKind, String)>,
) {
    let Some(indices) = matches.indices_of(id) else {
        return;
    };
    let Some(values) = matches.get_many::<String>(id) else {
        return;
    };
    for (index, value) in indices.zip(values) {
        entries.push((index, kind, value.clone()));
    }
}

fn build_settings(cli: &Cli) -> Settings {
    // overrides_with_all leaves at most one mode flag set; absence means -r.
    let open_mode = match (cli.read_only, cli.read_write, cli.create) {
        (_, _, true) => OpenMode::ReadWriteCreate,
        (_, true, _) => OpenMode::ReadWrite,
        _ => OpenMode::ReadOnly,
    };
    let mut settings = Settings {
        open_mode,
        ..Settings::default()
    };
    if let Some(sep) = &cli.field_sep {
        settings.field_sep = escape::decode(sep.as_bytes());
    }
    if let Some(sep) = &cli.record_sep {
        settings.record_sep = escape::decode(sep.as_bytes());
    }
    if let Some(text) = &cli.null_stand_in {
        settings.null_stand_in = escape::decode(text.as_bytes());
    }
    if let Some(text) = &cli.blob_stand_in {
        settings.blob_stand_in = Some(escape::decode(text.as_bytes()));
    }
    settings
}

// The whole query is slurped before any target opens.
fn read_query() -> Result<String, Error> {
    let mut query = String::new();
    io::stdin().read_to_string(&mut query).map_err(|source| {
        Error::new(ErrorKind::Io)
            .with_message("cannot read query from standard input")
            .with_source(source)
    })?;
    Ok(query)
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

#[derive(Copy, Clone, Debug)]
enum AnsiColor {
    Red,
    Yellow,
}

fn colorize_label(label: &str, enabled: bool, color: AnsiColor) -> String {
    if !enabled {
        return label.to_string();
    }
    let code = match color {
        AnsiColor::Red => "31",
        AnsiColor::Yellow => "33",
    };
    format!("\u{1b}[{code}m{label}\u{1b}[0m")
}

fn emit_error(err: &Error, color_mode: ColorMode) {
    let is_tty = io::stderr().is_terminal();
    if is_tty {
        eprintln!("{}", error_text(err, color_mode.use_color(is_tty)));
        return;
    }

    let value = error_json(err);
    let json = serde_json::to_string(&value).unwrap_or_else(|_| {
        "{\"error\":{\"kind\":\"Internal\",\"message\":\"json encode failed\"}}".to_string()
    });
    eprintln!("{json}");
}

fn error_message(err: &Error) -> String {
    if let Some(message) = err.message() {
        return message.to_string();
    }
    match err.kind() {
        ErrorKind::Internal => "internal error".to_string(),
        ErrorKind::Usage => "usage error".to_string(),
        ErrorKind::Parse => "invalid parameter".to_string(),
        ErrorKind::Range => "parameter out of range".to_string(),
        ErrorKind::Mismatch => "parameter count mismatch".to_string(),
        ErrorKind::Open => "cannot open database".to_string(),
        ErrorKind::Compile => "cannot compile query".to_string(),
        ErrorKind::Bind => "cannot bind parameter".to_string(),
        ErrorKind::Exec => "query execution failed".to_string(),
        ErrorKind::Io => "i/o error".to_string(),
    }
}

fn error_causes(err: &Error) -> Vec<String> {
    let mut causes = Vec::new();
    let mut cur = err.source();
    while let Some(source) = cur {
        causes.push(source.to_string());
        cur = source.source();
    }
    causes
}

fn error_json(err: &Error) -> Value {
    let mut inner = Map::new();
    inner.insert("kind".to_string(), json!(format!("{:?}", err.kind())));
    inner.insert("message".to_string(), json!(error_message(err)));
    if let Some(hint) = err.hint() {
        inner.insert("hint".to_string(), json!(hint));
    }
    if let Some(flag) = err.flag() {
        inner.insert("flag".to_string(), json!(flag));
    }
    if let Some(value) = err.value() {
        inner.insert("value".to_string(), json!(value));
    }
    if let Some(path) = err.path() {
        inner.insert("path".to_string(), json!(path.display().to_string()));
    }
    if let Some(position) = err.position() {
        inner.insert("position".to_string(), json!(position));
    }
    let causes = error_causes(err);
    if !causes.is_empty() {
        inner.insert("causes".to_string(), json!(causes));
    }

    let mut outer = Map::new();
    outer.insert("error".to_string(), Value::Object(inner));
    Value::Object(outer)
}

fn error_text(err: &Error, use_color: bool) -> String {
    let mut lines = Vec::new();
    lines.push(format!(
        "{} {}",
        colorize_label("error:", use_color, AnsiColor::Red),
        error_message(err)
    ));

    if let Some(hint) = err.hint() {
        lines.push(format!(
            "{} {hint}",
            colorize_label("hint:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(flag) = err.flag() {
        lines.push(format!(
            "{} {flag}",
            colorize_label("flag:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(value) = err.value() {
        lines.push(format!(
            "{} {value}",
            colorize_label("value:", use_color, AnsiColor::Yellow)
        ));
    }
    if let Some(path) = err.path() {
        lines.push(format!(
            "{} {}",
            colorize_label("path:", use_color, AnsiColor::Yellow),
            path.display()
        ));
    }
    if let Some(position) = err.position() {
        lines.push(format!(
            "{} {position}",
            colorize_label("position:", use_color, AnsiColor::Yellow)
        ));
    }

    let causes = error_causes(err);
    if let Some(cause) = causes.first() {
        lines.push(format!(
            "{} {cause}",
            colorize_label("caused by:", use_color, AnsiColor::Yellow)
        ));
    }

    lines.join("\n")
}

fn clap_error_summary(err: &clap::Error) -> String {
    for line in err.to_string().lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        if let Some(rest) = trimmed.strip_prefix("error:") {
            return rest.trim().to_string();
        }
        return trimmed.to_string();
    }
    "invalid arguments".to_string()
}

fn clap_error_hint(err: &clap::Error) -> String {
    let rendered = err.to_string();
    if rendered.contains("required arguments were not provided") {
        return "Provide at least one DATABASE path. Try `paramlite --help`.".to_string();
    }
    "Try `paramlite --help`.".to_string()
}

#[cfg(test)]
mod tests {
    use super::{
        Cli, ColorMode, build_settings, clap_error_hint, clap_error_summary, collect_params,
        error_json, error_text,
    };
    use clap::{CommandFactory, FromArgMatches};
    use paramlite::core::error::{Error, ErrorKind};
    use paramlite::core::params::Param;
    use paramlite::core::settings::OpenMode;

    fn parse(args: &[&str]) -> (Cli, clap::ArgMatches) {
        let matches = Cli::command()
            .try_get_matches_from(args)
            .expect("arguments should parse");
        let cli = Cli::from_arg_matches(&matches).expect("arguments should decode");
        (cli, matches)
    }

    #[test]
    fn parameters_merge_in_argv_order() {
        let (_, matches) = parse(&[
            "paramlite", "-d", "1", "-t", "x", "-n", "-f", "2.5", "-d", "0x10", "data.db",
        ]);
        let list = collect_params(&matches).unwrap();
        let rendered = list.iter().map(Param::render).collect::<Vec<_>>();
        assert_eq!(rendered, ["1", "x", "NULL", "2.500000", "16"]);
    }

    #[test]
    fn malformed_integer_reports_flag_and_value() {
        let (_, matches) = parse(&["paramlite", "-d", "12x", "data.db"]);
        let err = collect_params(&matches).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Parse);
        assert_eq!(err.flag(), Some("-d"));
        assert_eq!(err.value(), Some("12x"));
    }

    #[test]
    fn out_of_range_integer_is_a_range_error() {
        let (_, matches) = parse(&["paramlite", "-d", "9223372036854775808", "data.db"]);
        let err = collect_params(&matches).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Range);
    }

    #[test]
    fn open_mode_flags_are_last_wins() {
        let (cli, _) = parse(&["paramlite", "-c", "-r", "data.db"]);
        assert_eq!(build_settings(&cli).open_mode, OpenMode::ReadOnly);
        let (cli, _) = parse(&["paramlite", "-r", "-w", "data.db"]);
        assert_eq!(build_settings(&cli).open_mode, OpenMode::ReadWrite);
        let (cli, _) = parse(&["paramlite", "-w", "-c", "data.db"]);
        assert_eq!(build_settings(&cli).open_mode, OpenMode::ReadWriteCreate);
        let (cli, _) = parse(&["paramlite", "data.db"]);
        assert_eq!(build_settings(&cli).open_mode, OpenMode::ReadOnly);
    }

    #[test]
    fn separator_operands_are_escape_decoded() {
        let (cli, _) = parse(&[
            "paramlite", "-F", r"\t|", "-R", r"\r\n", "-N", r"\0", "-B", "<blob>", "data.db",
        ]);
        let settings = build_settings(&cli);
        assert_eq!(settings.field_sep.as_slice(), b"\t|");
        assert_eq!(settings.record_sep.as_slice(), b"\r\n");
        assert_eq!(settings.null_stand_in.as_slice(), b"\0");
        assert_eq!(
            settings.blob_stand_in.as_ref().map(|b| b.as_slice()),
            Some(b"<blob>".as_slice())
        );
    }

    #[test]
    fn negative_numeric_operands_parse() {
        let (_, matches) = parse(&["paramlite", "-d", "-42", "-f", "-1.5", "data.db"]);
        let list = collect_params(&matches).unwrap();
        let rendered = list.iter().map(Param::render).collect::<Vec<_>>();
        assert_eq!(rendered, ["-42", "-1.500000"]);
    }

    #[test]
    fn missing_database_is_rejected() {
        let err = Cli::command()
            .try_get_matches_from(["paramlite", "-d", "1"])
            .unwrap_err();
        assert!(err.to_string().contains("required arguments were not provided"));
        assert!(clap_error_hint(&err).contains("DATABASE"));
    }

    #[test]
    fn clap_error_summary_strips_prefix() {
        let err = Cli::command()
            .try_get_matches_from(["paramlite", "--bogus"])
            .unwrap_err();
        let summary = clap_error_summary(&err);
        assert!(!summary.starts_with("error:"));
        assert!(!summary.is_empty());
    }

    #[test]
    fn error_text_respects_color_flag() {
        let err = Error::new(ErrorKind::Open)
            .with_message("cannot open database")
            .with_path("data.db");
        let plain = error_text(&err, false);
        assert!(plain.starts_with("error: cannot open database"));
        assert!(plain.contains("path: data.db"));
        assert!(!plain.contains("\u{1b}["));
        let colored = error_text(&err, true);
        assert!(colored.contains("\u{1b}[31merror:\u{1b}[0m"));
    }

    #[test]
    fn error_json_carries_context_fields() {
        let err = Error::new(ErrorKind::Parse)
            .with_message("not a valid integer")
            .with_flag("-d")
            .with_value("12x");
        let value = error_json(&err);
        assert_eq!(value["error"]["kind"], "Parse");
        assert_eq!(value["error"]["message"], "not a valid integer");
        assert_eq!(value["error"]["flag"], "-d");
        assert_eq!(value["error"]["value"], "12x");
    }

    #[test]
    fn color_mode_auto_tracks_tty() {
        assert!(ColorMode::Auto.use_color(true));
        assert!(!ColorMode::Auto.use_color(false));
        assert!(ColorMode::Always.use_color(false));
        assert!(!ColorMode::Never.use_color(true));
    }
}
