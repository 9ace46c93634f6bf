//! Standalone worker process.

use std::process::ExitCode;

fn main() -> ExitCode {
    plotbox_sandbox::worker_main()
}
