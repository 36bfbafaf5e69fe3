use std::process::ExitCode;

use media_vault::cli;
use media_vault::output as out;

mod app;
mod logging;
mod prompt;

fn main() -> ExitCode {
    let args = cli::parse();
    let auto = args.auto;
    match app::run(args) {
        Ok(code) => code,
        Err(e) => {
            out::print_error(&format!("{e:#}"));
            if !auto {
                prompt::wait_for_enter("Press Enter to exit...");
            }
            ExitCode::FAILURE
        }
    }
}
