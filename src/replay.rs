//! Offline replay of captured report traces
//!
//! A trace is a JSON-lines file: one raw report payload per line, in the
//! order the printer sent them. Blank lines are skipped.

use bambukit_communication::{Device, Report};
use std::io::BufRead;
use tracing::{debug, warn};

/// Counters collected while replaying a trace
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    /// Reports that decoded and were merged
    pub applied: usize,
    /// Lines that failed to decode
    pub rejected: usize,
    /// AMS indices discovered during the replay, in discovery order
    pub discovered_ams: Vec<u8>,
}

/// Merge every report in `reader` into `device`
///
/// Undecodable lines are logged and counted, never fatal. Only read errors
/// from the underlying reader abort the replay.
pub fn replay_trace(device: &mut Device, reader: impl BufRead) -> std::io::Result<ReplaySummary> {
    let mut summary = ReplaySummary::default();

    // Split on raw bytes: a line that is not UTF-8 is a bad report, not a read error
    for (number, line) in reader.split(b'\n').enumerate() {
        let line = line?;
        if line.trim_ascii().is_empty() {
            continue;
        }

        match Report::from_slice(&line) {
            Ok(report) => {
                for fragment in report.fragments() {
                    let update = device.update(fragment);
                    summary.discovered_ams.extend(update.discovered_ams);
                }
                summary.applied += 1;
            }
            Err(e) => {
                warn!("Skipping trace line {}: {}", number + 1, e);
                summary.rejected += 1;
            }
        }
    }

    debug!(
        "Replayed {} reports ({} rejected)",
        summary.applied, summary.rejected
    );
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;
    use bambukit_core::{DeviceType, GcodeState};
    use std::io::Cursor;

    #[test]
    fn test_replay_skips_bad_lines() {
        let trace = concat!(
            "{\"print\": {\"gcode_state\": \"RUNNING\", \"mc_percent\": 5}}\n",
            "\n",
            "garbage\n",
            "{\"print\": {\"mc_percent\": 6}}\n",
        );
        let mut device = Device::new(DeviceType::X1C, "s");
        let summary = replay_trace(&mut device, Cursor::new(trace)).unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(device.info().gcode_state(), GcodeState::Running);
        assert_eq!(device.info().print_percentage(), 6);
    }

    #[test]
    fn test_replay_survives_invalid_utf8() {
        let mut trace = Vec::new();
        trace.extend_from_slice(b"{\"print\": {\"gcode_state\": \"RUNNING\"}}\n");
        trace.extend_from_slice(b"\xff\xfe garbage\n");
        trace.extend_from_slice(b"{\"print\": {\"gcode_state\": \"IDLE\"}}\r\n");

        let mut device = Device::new(DeviceType::X1C, "s");
        let summary = replay_trace(&mut device, Cursor::new(trace)).unwrap();

        assert_eq!(summary.applied, 2);
        assert_eq!(summary.rejected, 1);
        assert_eq!(device.info().gcode_state(), GcodeState::Idle);
    }
}
