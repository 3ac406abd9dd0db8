//! Sitepipe - static-site asset pipeline with dev server and live reload

use std::process::ExitCode;

use sitepipe::cli;

fn main() -> ExitCode {
    cli::run()
}
