//! Advisory progress estimation for pending generations.
//!
//! The external engine reports no intermediate progress, so watching
//! clients display a heuristic that advances once per tick and slows
//! down in bands. The estimate never reaches 100 on its own; only an
//! authoritative `completed` status settles it there. Nothing here is
//! persisted or fed back into the record's status.
//!
//! Values are tracked in hundredths of a percent so the schedule is exact.

use crate::generation::GenerationView;

/// Hundredths of a percent representing 100%.
pub const COMPLETE_HUNDREDTHS: u32 = 10_000;

/// Hard ceiling the estimate freezes at (98%).
pub const CEILING_HUNDREDTHS: u32 = 9_800;

/// `(upper bound, step)` bands in hundredths of a percent: +0.3 below 30,
/// +0.1 below 60, +0.05 below 90, +0.01 below 98.
const BANDS: [(u32, u32); 4] = [(3_000, 30), (6_000, 10), (9_000, 5), (CEILING_HUNDREDTHS, 1)];

/// Phase labels shown while a generation is pending, in display order.
pub const PHASE_LABELS: [&str; 11] = [
    "Analyzing your product...",
    "Crafting the perfect script...",
    "Generating AI visuals...",
    "Synthesizing voiceover...",
    "Adding music and sound effects...",
    "Fine-tuning audio sync...",
    "Polishing visual transitions...",
    "Enhancing color grading...",
    "Optimizing for 4K output...",
    "Encoding high-quality stream...",
    "Finalizing your masterpiece...",
];

/// Estimated progress after `ticks` ticks, in hundredths of a percent.
///
/// Pure function of elapsed ticks; monotonic and capped at
/// [`CEILING_HUNDREDTHS`].
pub fn estimate_hundredths(ticks: u64) -> u32 {
    let mut value: u32 = 0;
    let mut remaining = ticks;

    for (upper, step) in BANDS {
        if remaining == 0 {
            break;
        }
        if value >= upper {
            continue;
        }
        let ticks_in_band = u64::from((upper - value).div_ceil(step));
        let used = remaining.min(ticks_in_band);
        // `used <= ticks_in_band` keeps this within u32.
        value = (value + used as u32 * step).min(upper);
        remaining -= used;
    }

    value
}

/// Phase label for a progress value, rounding down and clamping to the
/// last entry.
pub fn phase_label(hundredths: u32) -> &'static str {
    let index = (u64::from(hundredths) * PHASE_LABELS.len() as u64
        / u64::from(COMPLETE_HUNDREDTHS)) as usize;
    PHASE_LABELS[index.min(PHASE_LABELS.len() - 1)]
}

/// Render elapsed seconds as `m:ss`.
pub fn format_elapsed(secs: u64) -> String {
    format!("{}:{:02}", secs / 60, secs % 60)
}

/// One displayable progress reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressSnapshot {
    /// Displayed percentage, 0.0 to 100.0.
    pub percent: f64,
    pub phase: &'static str,
    pub elapsed_secs: u64,
}

/// Per-session estimator state.
///
/// Advances on [`tick`](Self::tick) while the authoritative view is
/// pending. Once [`settle`](Self::settle) is called with a terminal view
/// it stops advancing for good.
#[derive(Debug, Clone, Default)]
pub struct ProgressEstimator {
    ticks: u64,
    settled: Option<u32>,
}

impl ProgressEstimator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance one tick unless settled. Returns the new snapshot.
    pub fn tick(&mut self) -> ProgressSnapshot {
        if self.settled.is_none() {
            self.ticks += 1;
        }
        self.snapshot()
    }

    /// Defer to the authoritative view.
    ///
    /// `Completed` pins the display to exactly 100; `Failed` freezes the
    /// current estimate. `Pending` is ignored.
    pub fn settle(&mut self, view: &GenerationView) {
        if self.settled.is_some() {
            return;
        }
        match view {
            GenerationView::Completed { .. } => self.settled = Some(COMPLETE_HUNDREDTHS),
            GenerationView::Failed { .. } => self.settled = Some(self.estimate()),
            GenerationView::Pending => {}
        }
    }

    pub fn is_settled(&self) -> bool {
        self.settled.is_some()
    }

    /// Displayed value in hundredths of a percent.
    pub fn hundredths(&self) -> u32 {
        self.settled.unwrap_or_else(|| self.estimate())
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        let hundredths = self.hundredths();
        ProgressSnapshot {
            percent: f64::from(hundredths) / 100.0,
            phase: phase_label(hundredths),
            elapsed_secs: self.ticks,
        }
    }

    fn estimate(&self) -> u32 {
        estimate_hundredths(self.ticks)
    }
}
