//! Signal-trace import
//!
//! Loads `(time, level)` sample pairs from the CSV exports that Saleae
//! Logic, PulseView/sigrok, and most oscilloscopes produce. The export
//! format itself is an external concern; this reader just tolerates the
//! common shapes: an optional header row, extra columns, and the odd
//! unparsable line.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use tracing::debug;

use super::{Sample, SignalError};

/// Load samples from a CSV file, taking time and level from the given
/// zero-based column indexes.
pub fn load_csv_samples<P: AsRef<Path>>(
    path: P,
    time_col: usize,
    level_col: usize,
) -> Result<Vec<Sample>, SignalError> {
    let file = File::open(path)?;
    parse_csv_samples(BufReader::new(file), time_col, level_col)
}

/// Parse CSV sample rows from any reader.
///
/// Rows that don't parse (header rows, comments, glitched lines) are
/// skipped; an input with no parsable rows at all is an error.
pub fn parse_csv_samples<R: BufRead>(
    reader: R,
    time_col: usize,
    level_col: usize,
) -> Result<Vec<Sample>, SignalError> {
    let mut samples = Vec::new();
    let mut skipped = 0usize;

    for line in reader.lines() {
        let line = line?;
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let columns: Vec<&str> = trimmed.split(',').collect();
        let parsed = columns
            .get(time_col)
            .and_then(|t| t.trim().parse::<f64>().ok())
            .zip(
                columns
                    .get(level_col)
                    .and_then(|v| v.trim().parse::<f64>().ok()),
            );

        match parsed {
            Some((timestamp, level)) => samples.push(Sample::new(timestamp, level)),
            None => skipped += 1,
        }
    }

    if samples.is_empty() {
        return Err(SignalError::NoSamples);
    }
    if skipped > 0 {
        debug!(skipped, kept = samples.len(), "csv rows skipped");
    }
    Ok(samples)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_with_header() {
        let csv = "Time [s], Channel 0\n0.0, 0.1\n0.001, 3.2\n0.002, 0.0\n";
        let samples = parse_csv_samples(csv.as_bytes(), 0, 1).unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1], Sample::new(0.001, 3.2));
    }

    #[test]
    fn test_column_selection() {
        let csv = "0,9.9,0.5\n1,9.9,1.5\n";
        let samples = parse_csv_samples(csv.as_bytes(), 0, 2).unwrap();
        assert_eq!(samples[0].level, 0.5);
        assert_eq!(samples[1].level, 1.5);
    }

    #[test]
    fn test_all_garbage_is_an_error() {
        let csv = "a,b\nc,d\n";
        assert!(matches!(
            parse_csv_samples(csv.as_bytes(), 0, 1),
            Err(SignalError::NoSamples)
        ));
    }
}
