//! Sentinel server binary.
//! Run with: cargo run --bin sentinel-server

use std::process::ExitCode;

use sentinel_agent::start_sentinel;

fn main() -> ExitCode {
    start_sentinel::run()
}
