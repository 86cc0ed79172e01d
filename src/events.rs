//! events.rs — append-only trigger event log, marker encoding, CSV export.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// One dispatched (or would-be-dispatched) stimulus. Records are appended and
/// never mutated or removed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerEvent {
    pub index: u64,
    pub time_s: f64,
    pub phase_rad: f32,
    pub freq_hz: f32,
    /// False when the stimulus output was unavailable and the engine logged a
    /// "would trigger" action instead.
    pub dispatched: bool,
}

#[derive(Debug, Default)]
pub struct EventLog {
    events: Vec<TriggerEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn append(&mut self, event: TriggerEvent) {
        debug_assert!(
            self.events
                .last()
                .is_none_or(|prev| event.time_s >= prev.time_s),
            "event timestamps must be non-decreasing"
        );
        self.events.push(event);
    }

    pub fn events(&self) -> &[TriggerEvent] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Ordered (timestamp, phase, frequency) tuples for offline analysis.
    pub fn as_tuples(&self) -> Vec<(f64, f32, f32)> {
        self.events
            .iter()
            .map(|e| (e.time_s, e.phase_rad, e.freq_hz))
            .collect()
    }

    pub fn write_csv<W: Write>(&self, out: &mut W) -> io::Result<()> {
        writeln!(out, "index,time_s,phase_rad,freq_hz,dispatched")?;
        for e in &self.events {
            writeln!(
                out,
                "{},{:.6},{:.6},{:.4},{}",
                e.index, e.time_s, e.phase_rad, e.freq_hz, e.dispatched
            )?;
        }
        Ok(())
    }

    pub fn export_csv(&self, path: &Path) -> io::Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        self.write_csv(&mut w)?;
        w.flush()
    }
}

/// String marker for the outbound event channel, one per trigger. Follows the
/// snake_case underscore-joined convention of the companion experiment
/// markers (`stim_3_square_red_target`).
pub fn trigger_marker(index: u64, phase_rad: f32, freq_hz: f32, elapsed_s: f64) -> String {
    format!("trigger_{index}_phase_{phase_rad:.3}_freq_{freq_hz:.2}_t_{elapsed_s:.3}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(index: u64, time_s: f64) -> TriggerEvent {
        TriggerEvent {
            index,
            time_s,
            phase_rad: -0.4,
            freq_hz: 10.01,
            dispatched: true,
        }
    }

    #[test]
    fn tuples_preserve_append_order() {
        let mut log = EventLog::new();
        log.append(event(0, 1.0));
        log.append(event(1, 4.5));
        log.append(event(2, 8.0));
        let tuples = log.as_tuples();
        assert_eq!(tuples.len(), 3);
        assert!(tuples.windows(2).all(|w| w[1].0 > w[0].0));
    }

    #[test]
    fn csv_has_header_and_one_row_per_event() {
        let mut log = EventLog::new();
        log.append(event(0, 1.0));
        log.append(TriggerEvent {
            dispatched: false,
            ..event(1, 4.5)
        });
        let mut buf = Vec::new();
        log.write_csv(&mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 3);
        assert_eq!(lines[0], "index,time_s,phase_rad,freq_hz,dispatched");
        assert!(lines[1].starts_with("0,1.000000,"));
        assert!(lines[2].ends_with(",false"));
    }

    #[test]
    fn marker_encodes_phase_freq_and_elapsed_time() {
        let m = trigger_marker(3, -0.412, 10.01, 12.4083);
        assert_eq!(m, "trigger_3_phase_-0.412_freq_10.01_t_12.408");
    }
}
