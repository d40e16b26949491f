use crate::stats::RunningStats;
use std::time::Duration;
use tokio::sync::broadcast;
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};
use viewer_core::Sample;

/// Extract event timestamps (seconds) from the first CSV column.
///
/// A leading BOM is tolerated; blank rows are skipped, unparsable or
/// negative ones are skipped with a warning.
pub fn parse_timestamps(raw: &str) -> Vec<f64> {
    let raw = raw.strip_prefix('\u{feff}').unwrap_or(raw);

    raw.lines()
        .enumerate()
        .filter_map(|(i, row)| {
            let cell = row.split(',').next().unwrap_or("").trim();
            if cell.is_empty() {
                return None;
            }
            match cell.parse::<f64>() {
                Ok(t) if t.is_finite() && t >= 0.0 => Some(t),
                _ => {
                    warn!("Skipping row {}: bad timestamp '{cell}'", i + 1);
                    None
                }
            }
        })
        .collect()
}

/// Turns successive event timestamps into [`Sample`]s.
///
/// Every timestamp consumes a message number; the first one only seeds the
/// clock, so the first sample carries `msg_num == 2`.
#[derive(Debug, Default)]
pub struct Replay {
    stats:   RunningStats,
    last:    Option<f64>,
    msg_num: u64,
}

impl Replay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, timestamp: f64) -> Option<Sample> {
        if self.last.is_some_and(|last| timestamp < last) {
            warn!("Timestamp {timestamp} goes backwards; skipped");
            return None;
        }

        self.msg_num += 1;
        let last = self.last.replace(timestamp)?;

        let delta = timestamp - last;
        self.stats.push(delta);

        Some(Sample {
            msg_num: self.msg_num,
            delta:   round3(delta),
            count:   self.stats.count(),
            mean:    round3(self.stats.mean()),
            std_dev: round3(self.stats.std_dev()),
        })
    }
}

fn round3(v: f64) -> f64 {
    (v * 1000.0).round() / 1000.0
}

/// Spawn a task that replays `timestamps` in real time and broadcasts each
/// sample as a JSON text frame.
pub fn spawn(timestamps: Vec<f64>, tx: broadcast::Sender<String>) {
    tokio::spawn(async move {
        let start = Instant::now();
        let mut replay = Replay::new();

        for t in timestamps {
            let Ok(offset) = Duration::try_from_secs_f64(t) else {
                warn!("Timestamp {t} out of range; stopping replay");
                break;
            };
            time::sleep_until(start + offset).await;

            let Some(sample) = replay.feed(t) else {
                continue;
            };
            let frame = match serde_json::to_string(&sample) {
                Ok(frame) => frame,
                Err(e) => {
                    warn!("Cannot encode sample {}: {e}", sample.msg_num);
                    continue;
                }
            };
            if tx.send(frame).is_err() {
                debug!("No clients; sample {} dropped", sample.msg_num);
            }
        }

        info!("Replay finished");
    });
}
