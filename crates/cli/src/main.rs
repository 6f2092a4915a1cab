use std::process::ExitCode;

fn main() -> ExitCode {
    enrollment_cli::run()
}
