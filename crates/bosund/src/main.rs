use std::process::ExitCode;

fn main() -> ExitCode {
    match bosund::run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!(error = %error, "bosund terminated");
            ExitCode::FAILURE
        }
    }
}
