// Output formatting helpers for CLI commands

use std::time::Duration;

/// Print a status message: "  Status message"
pub fn status(action: &str, message: &str) {
    eprintln!("\x1b[1;36m{:>12}\x1b[0m {}", action, message);
}

/// Print a success message with checkmark
pub fn success(message: &str) {
    eprintln!("\x1b[1;32m  \u{2713}\x1b[0m {}", message);
}

/// Print a failure message with X
pub fn failure(message: &str) {
    eprintln!("\x1b[1;31m  \u{2717}\x1b[0m {}", message);
}

/// Print a check/pass item
pub fn check(message: &str) {
    eprintln!("\x1b[32m  \u{2713}\x1b[0m {}", message);
}

pub fn warning(message: &str) {
    eprintln!("\x1b[33m  !\x1b[0m {}", message);
}

pub fn error(message: &str) {
    eprintln!("\x1b[1;31merror:\x1b[0m {}", message);
}

pub fn info(message: &str) {
    eprintln!("\x1b[36m  i\x1b[0m {}", message);
}

/// Print a dim/muted message
pub fn dim(message: &str) {
    eprintln!("\x1b[2m{}\x1b[0m", message);
}

/// Print a dim green line, used under a finished dataset
pub fn dim_success(message: &str) {
    eprintln!("\x1b[32m{}\x1b[0m", message);
}

/// Print a level header in execution plans
pub fn level_header(level: usize, datasets: usize) {
    eprintln!("\x1b[1;34m  Level {}\x1b[0m ({} datasets)", level, datasets);
}

/// Print a header line
pub fn header(message: &str) {
    eprintln!("\x1b[1m==> {}\x1b[0m", message);
}

/// Seconds with two decimals, e.g. "0.25s"
pub fn seconds(duration: Duration) -> String {
    format!("{:.2}s", duration.as_secs_f64())
}
