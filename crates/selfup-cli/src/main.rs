//! selfup CLI.

use clap::Parser;
use tracing::{debug, info_span};

use selfup_cli::cli::{Cli, CliCommand};
use selfup_cli::commands::{Command, SelfUpdateCommand, VersionCommand, error_hints};
use selfup_cli::logging::init_logging;

fn main() {
    let cli = Cli::parse();
    cli.color.write_global();
    if let Err(error) = init_logging(&cli.log_config()) {
        eprintln!("error: failed to initialize logging: {error}");
        std::process::exit(1);
    }

    let command: Box<dyn Command> = match &cli.command {
        CliCommand::SelfUpdate(args) => Box::new(SelfUpdateCommand::from_args(args)),
        CliCommand::Version => Box::new(VersionCommand),
    };
    let exit_code = {
        let _span = info_span!("command", name = command.name()).entered();
        debug!("{}", command.about());
        match command.execute() {
            Ok(code) => code,
            Err(error) => {
                eprintln!("error: {error:#}");
                for hint in error_hints(&error) {
                    eprintln!("hint: {hint}");
                }
                1
            }
        }
    };
    std::process::exit(exit_code);
}
