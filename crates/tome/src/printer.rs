//! Minimal stdout/stderr output helpers; log output goes through `tracing`,
//! command results go through these.

use std::io::Write;

pub(crate) fn stdout(line: &str) {
    let mut out = std::io::stdout().lock();
    let _ = writeln!(out, "{line}");
}

pub(crate) fn error(message: &str) {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "error: {message}");
}

pub(crate) fn warning(message: &str) {
    let mut err = std::io::stderr().lock();
    let _ = writeln!(err, "warning: {message}");
}

pub(crate) fn json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(rendered) => stdout(&rendered),
        Err(err) => error(&format!("failed to render JSON output: {err}")),
    }
}
