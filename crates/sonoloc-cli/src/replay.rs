//! Reading recorded sample streams.
//!
//! Two layouts are supported:
//!
//! - **interleaved**: one ASCII sample per line, channels round-robin, as the
//!   recorder prints them over serial. Capture can be gated on a trigger
//!   level so only the samples around the event are kept.
//! - **columns**: one row per sample instant, one comma- or
//!   whitespace-separated column per channel.

use std::io::BufRead;

use anyhow::{bail, Context, Result};

/// Trigger gating for interleaved capture.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerConfig {
    /// A sample strictly above this level fires the trigger
    pub level: f64,
    /// Samples kept after the triggering sample
    pub post_trigger: usize,
}

impl Default for TriggerConfig {
    fn default() -> Self {
        Self {
            level: 1.75,
            post_trigger: 50,
        }
    }
}

/// Samples read from an interleaved stream.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Capture {
    /// Accepted samples in stream order
    pub samples: Vec<f64>,
    /// Index into `samples` of the triggering sample
    pub trigger_index: Option<usize>,
    /// Non-empty lines that did not parse as a number
    pub skipped_lines: usize,
}

fn parse_sample(line: &str) -> Option<f64> {
    line.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Reads one sample per line.
///
/// With a trigger, reading stops once `post_trigger` samples have followed
/// the first sample above the trigger level; without one, the whole stream is
/// read. Blank lines are ignored and garbled lines counted and skipped.
///
/// # Errors
///
/// Returns an error if the underlying reader fails.
pub fn read_interleaved<R: BufRead>(reader: R, trigger: Option<&TriggerConfig>) -> Result<Capture> {
    let mut capture = Capture::default();
    let mut remaining: Option<usize> = None;

    for (lineno, line) in reader.lines().enumerate() {
        if remaining == Some(0) {
            break;
        }
        let line = line.with_context(|| format!("failed to read line {}", lineno + 1))?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let Some(value) = parse_sample(line) else {
            tracing::debug!(line = lineno + 1, "skipping unparsable sample");
            capture.skipped_lines += 1;
            continue;
        };

        capture.samples.push(value);
        if let Some(left) = remaining.as_mut() {
            *left -= 1;
        } else if let Some(cfg) = trigger.filter(|cfg| value > cfg.level) {
            capture.trigger_index = Some(capture.samples.len() - 1);
            remaining = Some(cfg.post_trigger);
        }
    }

    Ok(capture)
}

/// Reads one row per sample instant and returns one vector per channel.
///
/// Blank lines and lines starting with `#` are ignored, as is a non-numeric
/// header before the first data row.
///
/// # Errors
///
/// Returns an error if a data row has a different column count than the
/// first, holds a non-numeric value, or if no data rows are found.
pub fn read_columns<R: BufRead>(reader: R) -> Result<Vec<Vec<f64>>> {
    let mut channels: Vec<Vec<f64>> = Vec::new();

    for (lineno, line) in reader.lines().enumerate() {
        let line = line.with_context(|| format!("failed to read line {}", lineno + 1))?;
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|f| !f.is_empty())
            .collect();
        let parsed: Option<Vec<f64>> = fields.iter().map(|f| parse_sample(f)).collect();

        let Some(row) = parsed else {
            if channels.is_empty() {
                // header
                continue;
            }
            bail!("line {}: non-numeric value in '{line}'", lineno + 1);
        };

        if channels.is_empty() {
            channels = vec![Vec::new(); row.len()];
        } else if row.len() != channels.len() {
            bail!(
                "line {}: expected {} columns, found {}",
                lineno + 1,
                channels.len(),
                row.len()
            );
        }
        for (channel, value) in channels.iter_mut().zip(row) {
            channel.push(value);
        }
    }

    if channels.is_empty() {
        bail!("no data rows found");
    }
    Ok(channels)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_trigger_keeps_post_trigger_samples() {
        let input = "0.1\n0.2\n1.9\n0.3\n0.4\n0.5\n0.6\n";
        let trigger = TriggerConfig {
            level: 1.75,
            post_trigger: 2,
        };
        let capture = read_interleaved(Cursor::new(input), Some(&trigger)).unwrap();
        assert_eq!(capture.samples, vec![0.1, 0.2, 1.9, 0.3, 0.4]);
        assert_eq!(capture.trigger_index, Some(2));
    }

    #[test]
    fn test_level_itself_does_not_trigger() {
        let input = "1.75\n1.0\n";
        let capture =
            read_interleaved(Cursor::new(input), Some(&TriggerConfig::default())).unwrap();
        assert_eq!(capture.trigger_index, None);
        assert_eq!(capture.samples.len(), 2);
    }

    #[test]
    fn test_garbled_and_blank_lines_skipped() {
        let input = "0.5\n\n1.2.3\nnan\nabc\n0.7\n";
        let capture = read_interleaved(Cursor::new(input), None).unwrap();
        assert_eq!(capture.samples, vec![0.5, 0.7]);
        assert_eq!(capture.skipped_lines, 3);
    }

    #[test]
    fn test_garbled_lines_do_not_count_after_trigger() {
        let input = "2.0\nxx\n0.1\n0.2\n0.3\n";
        let trigger = TriggerConfig {
            level: 1.75,
            post_trigger: 2,
        };
        let capture = read_interleaved(Cursor::new(input), Some(&trigger)).unwrap();
        assert_eq!(capture.samples, vec![2.0, 0.1, 0.2]);
    }

    #[test]
    fn test_columns_with_header() {
        let input = "# lab run 3\nmic0,mic1,mic2,mic3\n0,1,2,3\n0.5, 1.5, 2.5, 3.5\n";
        let channels = read_columns(Cursor::new(input)).unwrap();
        assert_eq!(channels.len(), 4);
        assert_eq!(channels[2], vec![2.0, 2.5]);
    }

    #[test]
    fn test_columns_whitespace_separated() {
        let channels = read_columns(Cursor::new("1 2\n3\t4\n")).unwrap();
        assert_eq!(channels, vec![vec![1.0, 3.0], vec![2.0, 4.0]]);
    }

    #[test]
    fn test_columns_ragged_row_rejected() {
        let err = read_columns(Cursor::new("1,2,3\n4,5\n")).unwrap_err();
        assert!(err.to_string().contains("expected 3 columns"));
    }

    #[test]
    fn test_columns_empty_rejected() {
        assert!(read_columns(Cursor::new("# nothing\n")).is_err());
    }
}
