use std::process::ExitCode;

fn main() -> ExitCode {
    skillmatch_cli::run()
}
