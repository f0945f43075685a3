use std::process::ExitCode;

fn main() -> ExitCode {
    crewbot_cli::run()
}
