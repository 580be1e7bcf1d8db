//! coverset CLI
//!
//! Command-line interface for crawling album cover art into a resumable
//! local dataset.

mod cli_types;
mod error;
mod spinner;

mod commands {
    pub(crate) mod config;
    pub(crate) mod crawl;
    pub(crate) mod status;
}

use std::io::Write;

use clap::Parser;
use log::LevelFilter;
use owo_colors::OwoColorize;
use owo_colors::Stream::Stdout;

use cli_types::{Cli, Commands, ConfigAction};
use error::CliError;

fn main() {
    let cli = Cli::parse();
    init_logging(cli.quiet, cli.verbose);

    let result = match cli.command {
        Commands::Crawl {
            genres,
            output,
            limit,
            restart,
            no_log,
        } => commands::crawl::run_crawl(genres, output, limit, restart, no_log, cli.quiet),
        Commands::Status { output, all } => commands::status::run_status(output, all),
        Commands::Config { action } => match action {
            ConfigAction::Show => commands::config::run_config_show(),
            ConfigAction::Test => commands::config::run_config_test(cli.quiet),
            ConfigAction::Path => commands::config::run_config_path(),
            ConfigAction::SetOutput { dir } => commands::config::run_config_set_output(dir),
        },
    };

    if let Err(e) = result {
        report_error(&e);
        std::process::exit(e.exit_code());
    }
}

/// Install the logger. `--quiet` keeps warnings and errors, `--verbose` adds
/// debug output from the coverset crates with timestamps. `RUST_LOG`
/// overrides both.
fn init_logging(quiet: bool, verbose: bool) {
    let level = if quiet {
        LevelFilter::Warn
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    let mut builder = env_logger::Builder::new();
    builder
        .filter_level(level.min(LevelFilter::Info))
        .filter_module("coverset", level)
        .target(env_logger::Target::Stdout);

    if verbose {
        builder.format(|buf, record| {
            writeln!(
                buf,
                "{} {:<5} {}",
                buf.timestamp_millis(),
                record.level(),
                record.args()
            )
        });
    } else {
        builder.format(|buf, record| writeln!(buf, "{}", record.args()));
    }

    builder.parse_default_env();
    builder.init();
}

fn report_error(e: &CliError) {
    log::error!(
        "{} {}",
        "\u{2718}".if_supports_color(Stdout, |t| t.red()),
        e,
    );
    if let CliError::Crawl(_) = e {
        log::error!(
            "{}",
            "The last checkpoint is intact; rerun the same command to resume."
                .if_supports_color(Stdout, |t| t.dimmed()),
        );
    }
}
