//! Batch-ingest progress reporting.
//!
//! Progress is emitted on **stderr** so stdout remains parseable for
//! scripts. The human reporter stays quiet when stderr is not a terminal.

use std::io::Write;

/// A single progress event during a batch ingest.
#[derive(Clone, Debug)]
pub enum IngestProgressEvent<'a> {
    /// File `n` of `total` is being processed.
    Ingesting {
        n: u64,
        total: u64,
        source: &'a str,
    },
}

/// Reports ingest progress. Implementations write to stderr.
pub trait IngestProgressReporter {
    fn report(&self, event: IngestProgressEvent);
}

/// Human-friendly progress on stderr: "ingest  3 / 12  report.pdf".
pub struct StderrProgress;

impl IngestProgressReporter for StderrProgress {
    fn report(&self, event: IngestProgressEvent) {
        if !atty::is(atty::Stream::Stderr) {
            return;
        }

        let IngestProgressEvent::Ingesting { n, total, source } = event;
        let line = format!(
            "ingest  {} / {}  {}\n",
            format_number(n),
            format_number(total),
            source
        );
        let _ = std::io::stderr().write_all(line.as_bytes());
    }
}

/// Discards all events; used by the reconciliation loop and tests.
pub struct SilentProgress;

impl IngestProgressReporter for SilentProgress {
    fn report(&self, _event: IngestProgressEvent) {}
}

/// Format a number with thousands separators: 1234567 → "1,234,567".
fn format_number(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_number_inserts_separators() {
        assert_eq!(format_number(0), "0");
        assert_eq!(format_number(999), "999");
        assert_eq!(format_number(1000), "1,000");
        assert_eq!(format_number(1234567), "1,234,567");
    }
}
