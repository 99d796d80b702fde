//! CLI argument definitions for selfup.

use std::io::{self, IsTerminal};
use std::path::PathBuf;

use clap::{ColorChoice, Parser, Subcommand, ValueEnum};
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colorchoice_clap::Color;
use selfup_updater::DEFAULT_REPOSITORY;
use selfup_updater::config::DEFAULT_API_BASE_URL;
use tracing::level_filters::LevelFilter;

use crate::logging::{LogConfig, LogFormat};

#[derive(Parser)]
#[command(
    name = "selfup",
    version,
    about = "selfup - a command-line tool that keeps itself up to date",
    long_about = "A command-line tool that keeps itself up to date.\n\n\
                  Run `selfup self-update` to replace this executable with the\n\
                  newest release published on GitHub."
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,

    /// Adjust log verbosity (-v for info, -vv for debug, -q for errors only).
    #[command(flatten)]
    pub verbosity: Verbosity<WarnLevel>,

    /// Control ANSI color output (auto, always, never).
    #[command(flatten)]
    pub color: Color,

    /// Explicit log level (overrides -v/-q flags).
    #[arg(long = "log-level", value_enum, global = true)]
    pub log_level: Option<LogLevelArg>,

    /// Log output format (pretty for human, json for machine parsing).
    #[arg(
        long = "log-format",
        value_enum,
        default_value = "pretty",
        global = true
    )]
    pub log_format: LogFormatArg,

    /// Write logs to a file instead of stderr.
    #[arg(long = "log-file", value_name = "PATH", global = true)]
    pub log_file: Option<PathBuf>,
}

impl Cli {
    /// Build logging configuration from CLI flags with consistent precedence.
    ///
    /// `--log-level` beats `-v`/`-q`, and either one disables `RUST_LOG`.
    /// Log files get timestamps. Module paths are shown from debug level on.
    #[must_use]
    pub fn log_config(&self) -> LogConfig {
        let level_filter = match self.log_level {
            Some(LogLevelArg::Error) => LevelFilter::ERROR,
            Some(LogLevelArg::Warn) => LevelFilter::WARN,
            Some(LogLevelArg::Info) => LevelFilter::INFO,
            Some(LogLevelArg::Debug) => LevelFilter::DEBUG,
            Some(LogLevelArg::Trace) => LevelFilter::TRACE,
            None => self.verbosity.tracing_level_filter(),
        };
        let format = match self.log_format {
            LogFormatArg::Pretty => LogFormat::Pretty,
            LogFormatArg::Compact => LogFormat::Compact,
            LogFormatArg::Json => LogFormat::Json,
        };
        let with_ansi = match self.color.color {
            ColorChoice::Always => true,
            ColorChoice::Never => false,
            ColorChoice::Auto => self.log_file.is_none() && io::stderr().is_terminal(),
        };

        let mut config = LogConfig::default()
            .with_level(level_filter)
            .with_format(format)
            .with_ansi(with_ansi)
            .with_timestamps(self.log_file.is_some())
            .with_target(level_filter >= LevelFilter::DEBUG)
            .with_log_file(self.log_file.clone());
        config.use_env_filter = !(self.verbosity.is_present() || self.log_level.is_some());
        config
    }
}

#[derive(Subcommand)]
pub enum CliCommand {
    /// Replace this executable with the newest release.
    #[command(name = "self-update", visible_alias = "selfupdate")]
    SelfUpdate(SelfUpdateArgs),

    /// Print the running version and where it is installed.
    Version,
}

#[derive(Parser)]
pub struct SelfUpdateArgs {
    /// Only install stable releases (the default).
    #[arg(long = "stable")]
    pub stable: bool,

    /// Also install alpha, beta, rc and dev releases.
    ///
    /// Takes precedence over --stable when both are given.
    #[arg(long = "preview")]
    pub preview: bool,

    /// Base URL of the GitHub-compatible release API.
    #[arg(
        long = "api-url",
        env = "SELFUP_API_URL",
        default_value = DEFAULT_API_BASE_URL,
        hide = true
    )]
    pub api_url: String,

    /// Repository that publishes releases, as `owner/name`.
    #[arg(
        long = "repository",
        env = "SELFUP_REPOSITORY",
        default_value = DEFAULT_REPOSITORY,
        hide = true
    )]
    pub repository: String,
}

/// CLI log level choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogLevelArg {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

/// CLI log format choices.
#[derive(Clone, Copy, ValueEnum)]
pub enum LogFormatArg {
    Pretty,
    Compact,
    Json,
}
