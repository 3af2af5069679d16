use std::io::{self, Write};
use std::process::ExitCode;

fn main() -> ExitCode {
    match tidewire::run_server() {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            // Telemetry may not be installed when launch fails early.
            let _ = writeln!(io::stderr(), "tidewired: {error}");
            ExitCode::FAILURE
        }
    }
}
