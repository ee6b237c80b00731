use std::collections::BTreeMap;
use std::env;
use std::ffi::OsString;
#[cfg(unix)]
use std::os::unix::process::CommandExt;
use std::path::PathBuf;
use std::process::{self, Command};

use clap::{Args, Parser, Subcommand};
use envline::{EnvLoader, ParseMode, TargetEnv};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "dotenv", version)]
#[command(about = "Run commands with variables loaded from dotenv files", long_about = None)]
struct Cli {
    /// Print loader diagnostics to stderr.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Load dotenv files and execute a command.
    Run(RunArgs),
    /// Report malformed lines in dotenv files.
    Check(CheckArgs),
}

#[derive(Debug, Args)]
struct FileArgs {
    /// Dotenv file path(s). Repeat or pass comma-separated paths.
    #[arg(
        short,
        long = "file",
        value_name = "PATHS",
        value_delimiter = ',',
        value_parser = parse_file_path,
        default_value = ".env"
    )]
    files: Vec<PathBuf>,
}

#[derive(Debug, Args)]
struct RunArgs {
    #[command(flatten)]
    files: FileArgs,

    /// Ignore missing dotenv files.
    #[arg(short, long, visible_alias = "ignore-missing")]
    ignore: bool,

    /// Override existing environment variables.
    #[arg(short = 'o', long = "override", visible_alias = "overload")]
    override_existing: bool,

    /// Fail on the first malformed line instead of skipping it.
    #[arg(long)]
    strict: bool,

    /// Command to execute, followed by its arguments.
    #[arg(
        value_name = "COMMAND",
        required = true,
        trailing_var_arg = true,
        allow_hyphen_values = true
    )]
    command: Vec<OsString>,
}

#[derive(Debug, Args)]
struct CheckArgs {
    #[command(flatten)]
    files: FileArgs,
}

fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    process::exit(run(cli));
}

/// Filter used when `RUST_LOG` is unset or invalid.
fn default_filter(verbose: bool) -> &'static str {
    if verbose {
        "envline=debug,dotenv=debug"
    } else {
        "warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();
}

fn run(cli: Cli) -> i32 {
    let result = match cli.command {
        Commands::Run(args) => execute_run(args),
        Commands::Check(args) => execute_check(args),
    };
    match result {
        Ok(code) => code,
        Err(err) => {
            eprintln!("dotenv: {err}");
            1
        }
    }
}

fn parse_file_path(raw: &str) -> Result<PathBuf, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("file path must not be empty".to_owned());
    }
    Ok(PathBuf::from(trimmed))
}

fn execute_run(args: RunArgs) -> Result<i32, String> {
    let parse_mode = if args.strict {
        ParseMode::Strict
    } else {
        ParseMode::Lenient
    };
    let inherited: BTreeMap<String, String> = env::vars_os()
        .map(|(key, value)| {
            (
                key.to_string_lossy().into_owned(),
                value.to_string_lossy().into_owned(),
            )
        })
        .collect();

    let mut loader = EnvLoader::new()
        .paths(&args.files.files)
        .required(!args.ignore)
        .override_existing(args.override_existing)
        .parse_mode(parse_mode)
        .target(TargetEnv::from_memory(inherited.clone()));
    let report = loader.load().map_err(|err| err.to_string())?;
    tracing::debug!(
        loaded = report.loaded,
        skipped_existing = report.skipped_existing,
        skipped_invalid = report.skipped_invalid,
        "environment prepared"
    );

    let Some((program, program_args)) = args.command.split_first() else {
        return Err("missing command after `run`".to_owned());
    };
    let mut command = Command::new(program);
    command.args(program_args);

    let prepared = loader.into_target().into_memory().unwrap_or_default();
    command.envs(changed_vars(&inherited, prepared));

    execute_command(command, program)
}

/// Variables whose value differs from the inherited environment. Inherited
/// variables are left to the child as-is, which keeps non UTF-8 values intact.
fn changed_vars(
    inherited: &BTreeMap<String, String>,
    prepared: BTreeMap<String, String>,
) -> Vec<(String, String)> {
    prepared
        .into_iter()
        .filter(|(key, value)| inherited.get(key) != Some(value))
        .collect()
}

fn execute_check(args: CheckArgs) -> Result<i32, String> {
    let mut malformed = 0usize;
    let mut unreadable = 0usize;
    for path in &args.files.files {
        let errors = match EnvLoader::new().path(path).check() {
            Ok(errors) => errors,
            Err(err) => {
                eprintln!("dotenv: {}: {err}", path.display());
                unreadable += 1;
                continue;
            }
        };
        for err in &errors {
            println!("{err}");
        }
        malformed += errors.len();
    }

    tracing::debug!(malformed, unreadable, "check finished");
    Ok(if malformed == 0 && unreadable == 0 { 0 } else { 1 })
}

#[cfg(unix)]
fn execute_command(mut command: Command, program: &OsString) -> Result<i32, String> {
    let err = command.exec();
    Err(format!(
        "failed to execute `{}`: {err}",
        program.to_string_lossy()
    ))
}

#[cfg(not(unix))]
fn execute_command(mut command: Command, program: &OsString) -> Result<i32, String> {
    let status = command
        .status()
        .map_err(|err| format!("failed to execute `{}`: {err}", program.to_string_lossy()))?;
    Ok(status.code().unwrap_or(1))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_run(args: &[&str]) -> RunArgs {
        let cli = Cli::try_parse_from(["dotenv", "run"].iter().chain(args))
            .expect("parse should succeed");
        match cli.command {
            Commands::Run(run) => run,
            other => panic!("expected run, got {other:?}"),
        }
    }

    #[test]
    fn parse_run_uses_defaults() {
        let args = parse_run(&["printenv", "FOO"]);

        assert_eq!(args.files.files, vec![PathBuf::from(".env")]);
        assert!(!args.ignore);
        assert!(!args.override_existing);
        assert!(!args.strict);
        assert_eq!(
            args.command,
            vec![OsString::from("printenv"), OsString::from("FOO")]
        );
    }

    #[test]
    fn parse_run_supports_repeated_and_comma_separated_files() {
        let args = parse_run(&[
            "-f",
            ".env.local,.env",
            "--file",
            "custom.env",
            "--",
            "printenv",
            "FOO",
        ]);

        assert_eq!(
            args.files.files,
            vec![
                PathBuf::from(".env.local"),
                PathBuf::from(".env"),
                PathBuf::from("custom.env"),
            ]
        );
    }

    #[test]
    fn parse_run_passes_hyphenated_command_arguments_through() {
        let args = parse_run(&["-o", "--", "ls", "-la", "--color"]);

        assert!(args.override_existing);
        assert_eq!(
            args.command,
            vec![
                OsString::from("ls"),
                OsString::from("-la"),
                OsString::from("--color"),
            ]
        );
    }

    #[test]
    fn parse_run_accepts_aliases() {
        let args = parse_run(&["--ignore-missing", "--overload", "env"]);
        assert!(args.ignore);
        assert!(args.override_existing);
    }

    #[test]
    fn parse_run_requires_command() {
        let err = Cli::try_parse_from(["dotenv", "run", "-f", "a.env"])
            .expect_err("parse should fail");
        assert_eq!(
            err.kind(),
            clap::error::ErrorKind::MissingRequiredArgument
        );
    }

    #[test]
    fn parse_run_rejects_empty_file_path() {
        let err = Cli::try_parse_from(["dotenv", "run", "-f", " ", "printenv"])
            .expect_err("parse should fail");
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);
    }

    #[test]
    fn parse_check_accepts_files() {
        let cli = Cli::try_parse_from(["dotenv", "-v", "check", "-f", "a.env,b.env"])
            .expect("parse should succeed");
        assert!(cli.verbose);
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        assert_eq!(
            args.files.files,
            vec![PathBuf::from("a.env"), PathBuf::from("b.env")]
        );
    }

    #[test]
    fn verbose_only_raises_the_fallback_filter() {
        assert_eq!(default_filter(false), "warn");
        assert_eq!(default_filter(true), "envline=debug,dotenv=debug");
    }

    #[test]
    fn changed_vars_skips_inherited_values() {
        let inherited = BTreeMap::from([
            ("KEEP".to_owned(), "same".to_owned()),
            ("REPLACED".to_owned(), "old".to_owned()),
        ]);
        let prepared = BTreeMap::from([
            ("ADDED".to_owned(), "1".to_owned()),
            ("KEEP".to_owned(), "same".to_owned()),
            ("REPLACED".to_owned(), "new".to_owned()),
        ]);

        assert_eq!(
            changed_vars(&inherited, prepared),
            vec![
                ("ADDED".to_owned(), "1".to_owned()),
                ("REPLACED".to_owned(), "new".to_owned()),
            ]
        );
    }

    #[test]
    fn cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
