use crate::sample::Sample;
use std::fmt;

/// Number of cells in the gauge bar.
pub const BAR_WIDTH: usize = 100;
/// Cells per second of `delta`; 100 cells at 50/s spans the 0–2000 ms scale.
pub const CELLS_PER_SECOND: f64 = 50.0;

const EMPTY_CELL: char = '-';
const MARKER_CELL: char = '|';

/// A rendered [`Sample`]: the fixed-width bar plus the full display line.
#[derive(Debug, Clone, PartialEq)]
pub struct GaugeLine {
    pub sample: Sample,
    /// Index of the `|` marker inside the bar, always `< BAR_WIDTH`.
    pub position: usize,
    pub bar: String,
    pub text: String,
}

impl GaugeLine {
    /// Render `sample`.  Pure: identical samples produce identical lines.
    ///
    /// Fields are printed from their parsed values with `Display`, not from
    /// the frame's text, so a producer's `"1.000"` shows as `d:+1` and
    /// `"2.500"` as `m:+2.5`.
    pub fn render(sample: Sample) -> Self {
        let position = marker_position(sample.delta);
        let bar = bar(position);
        let text = format!(
            "num:+{} d:+{} n:+{:02} m:+{} o:+{} 0ms [{}] 2000ms",
            sample.msg_num, sample.delta, sample.count, sample.mean, sample.std_dev, bar,
        );
        Self { sample, position, bar, text }
    }

    pub fn into_text(self) -> String {
        self.text
    }
}

impl fmt::Display for GaugeLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

/// `floor(delta * 50)`, pinned to the last cell when it runs off the bar.
pub fn marker_position(delta: f64) -> usize {
    let raw = (delta * CELLS_PER_SECOND).floor();
    if raw <= 0.0 {
        // also catches NaN
        return 0;
    }
    // `as` saturates, so huge deltas land on the last cell too.
    (raw as usize).min(BAR_WIDTH - 1)
}

fn bar(position: usize) -> String {
    (0..BAR_WIDTH)
        .map(|i| if i == position { MARKER_CELL } else { EMPTY_CELL })
        .collect()
}
