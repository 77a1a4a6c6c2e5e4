//! Binary entrypoint that launches the Sentinel agent.

use std::process::ExitCode;

use sentinel_agent::start_sentinel;

/// Start the HTTP shell around the chat session and service directory.
fn main() -> ExitCode {
    start_sentinel::run()
}
