//! Raw sample log reader and writer.
//!
//! The monitor driver emits one sample per line as two whitespace-delimited
//! columns, the timestamp carrying a trailing `s`:
//!
//! ```text
//! 0.000s 0.183201
//! 0.200s 0.179554
//! ```
//!
//! Logs from interrupted runs are tolerated: if the first line does not parse
//! (header or a line cut mid-write when the file was rotated), it is skipped and the
//! parse is retried; a truncated final line is dropped with a warning. Any other
//! malformed line is an error.

use crate::error::{BenchError, BenchResult};
use crate::window::RawSample;
use std::fmt::Write as _;
use std::path::Path;
use tracing::warn;

fn parse_line(line: &str) -> Result<RawSample, String> {
    let mut columns = line.split_whitespace();
    let timestamp = columns.next().ok_or("empty line")?;
    let current = columns.next().ok_or("missing current column")?;
    if columns.next().is_some() {
        return Err("unexpected extra column".into());
    }
    let timestamp = timestamp.strip_suffix('s').unwrap_or(timestamp);
    let timestamp_sec = timestamp
        .parse::<f64>()
        .map_err(|e| format!("bad timestamp '{timestamp}': {e}"))?;
    let current_amps = current
        .parse::<f64>()
        .map_err(|e| format!("bad current '{current}': {e}"))?;
    Ok(RawSample::new(timestamp_sec, current_amps))
}

/// `truncated_tail` allows the last line to be dropped; it is off only when the
/// last line is also the first line of the log.
fn parse_lines(lines: &[(usize, &str)], truncated_tail: bool) -> BenchResult<Vec<RawSample>> {
    let mut samples = Vec::with_capacity(lines.len());
    for (index, (line_no, line)) in lines.iter().enumerate() {
        match parse_line(line) {
            Ok(sample) => samples.push(sample),
            Err(reason) if truncated_tail && index + 1 == lines.len() => {
                warn!(line = line_no, %reason, "dropping truncated final sample");
            }
            Err(reason) => {
                return Err(BenchError::SampleLog {
                    line: *line_no,
                    reason,
                })
            }
        }
    }
    Ok(samples)
}

/// Parse a raw sample log held in memory.
pub fn parse(text: &str) -> BenchResult<Vec<RawSample>> {
    let lines: Vec<(usize, &str)> = text
        .lines()
        .enumerate()
        .map(|(i, line)| (i + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty())
        .collect();

    match parse_lines(&lines, lines.len() > 1) {
        Ok(samples) => Ok(samples),
        Err(BenchError::SampleLog { line, reason }) if lines.first().map(|(n, _)| *n) == Some(line) => {
            warn!(line, %reason, "first line unparsable, retrying without it");
            parse_lines(&lines[1..], true)
        }
        Err(err) => Err(err),
    }
}

/// Read and parse a raw sample log file.
pub fn read_file(path: impl AsRef<Path>) -> BenchResult<Vec<RawSample>> {
    let text = std::fs::read_to_string(path)?;
    parse(&text)
}

/// Render samples in the raw log format.
pub fn write_samples(samples: &[RawSample]) -> String {
    let mut out = String::with_capacity(samples.len() * 20);
    for sample in samples {
        // writing into a String cannot fail
        let _ = writeln!(out, "{:.6}s {:.6}", sample.timestamp_sec, sample.current_amps);
    }
    out
}

/// Write samples to `path` in the raw log format.
pub fn write_file(path: impl AsRef<Path>, samples: &[RawSample]) -> BenchResult<()> {
    std::fs::write(path, write_samples(samples))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_suffixed_timestamps() {
        let samples = parse("0.0s 1.64\n1.0s 2.98\n  2.0s   1.72  \n").unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[1], RawSample::new(1.0, 2.98));
    }

    #[test]
    fn accepts_timestamps_without_suffix() {
        let samples = parse("0.5 0.1\n").unwrap();
        assert_eq!(samples, vec![RawSample::new(0.5, 0.1)]);
    }

    #[test]
    fn skips_unparsable_first_line() {
        let samples = parse("time current\n0.0s 1.0\n1.0s 2.0\n").unwrap();
        assert_eq!(samples.len(), 2);

        let samples = parse("31s\n0.0s 1.0\n").unwrap();
        assert_eq!(samples, vec![RawSample::new(0.0, 1.0)]);
    }

    #[test]
    fn drops_truncated_last_line() {
        let samples = parse("0.0s 1.0\n1.0s 2.0\n2.0s 0.").unwrap();
        assert_eq!(samples.len(), 3);

        let samples = parse("0.0s 1.0\n1.0s 2.0\n2.0").unwrap();
        assert_eq!(samples.len(), 2);
    }

    #[test]
    fn header_with_truncated_sample_is_empty() {
        let samples = parse("ts current\n0.5").unwrap();
        assert!(samples.is_empty());
    }

    #[test]
    fn rejects_garbage_in_the_middle() {
        let err = parse("0.0s 1.0\nnot a sample\n2.0s 2.0\n").unwrap_err();
        assert!(matches!(err, BenchError::SampleLog { line: 2, .. }));
    }

    #[test]
    fn writer_output_parses_back() {
        let samples = vec![RawSample::new(0.0, 0.25), RawSample::new(0.2, 0.5)];
        let text = write_samples(&samples);
        assert!(text.starts_with("0.000000s 0.250000"));
        assert_eq!(parse(&text).unwrap(), samples);
    }

    #[test]
    fn file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("raw.txt");
        let samples = vec![RawSample::new(1.0, 0.75)];
        write_file(&path, &samples).unwrap();
        assert_eq!(read_file(&path).unwrap(), samples);
    }
}
