//! Log subscriber setup for the `ncio` binary.

use crate::support::io::FileOption;
use std::io;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt::writer::BoxMakeWriter;

/// Build the writer for a `--logto` value.
pub fn make_writer(logto: &FileOption) -> io::Result<BoxMakeWriter> {
    Ok(match logto {
        FileOption::Stdout => BoxMakeWriter::new(io::stdout),
        FileOption::Stderr => BoxMakeWriter::new(io::stderr),
        other => BoxMakeWriter::new(Mutex::new(other.open_append()?)),
    })
}

/// Directive used when `RUST_LOG` is unset.
pub fn default_directive(debug: bool) -> &'static str {
    if debug { "ncio=debug" } else { "ncio=info" }
}

pub fn init(logto: &FileOption, debug: bool) -> io::Result<()> {
    let writer = make_writer(logto)?;
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive(debug)));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(matches!(logto, FileOption::Stderr | FileOption::Stdout))
        .try_init()
        .map_err(|e| io::Error::other(e.to_string()))
}
