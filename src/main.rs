//! Resbake - command-line tool for baking game resource packs

use std::process::ExitCode;

use resbake::cli;

fn main() -> ExitCode {
    cli::run()
}
