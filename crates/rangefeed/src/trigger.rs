#![forbid(unsafe_code)]

use tracing::trace;

/// Decision produced by a playhead progress check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerAction {
    /// Fetch the segment at `index`; more remain after it.
    Fetch { index: u64 },
    /// Fetch the final segment at `index`. The trigger detaches after
    /// issuing this.
    FetchTerminal { index: u64 },
}

/// Playhead-driven fetch policy.
///
/// Segment 0 is fetched eagerly at session start; this trigger schedules
/// the rest. The cursor names the next segment to request, and segment
/// `i` is requested once the playhead crosses 80% of segment `i - 1`'s
/// nominal duration. The cursor advances when the fetch is issued, not
/// when it completes, so a single time sample never schedules the same
/// segment twice.
#[derive(Debug)]
pub struct ProgressTrigger {
    total_segments: u64,
    cursor: u64,
    detached: bool,
}

impl ProgressTrigger {
    /// A session with a single segment needs no trigger; it starts
    /// detached.
    pub fn new(total_segments: u64, cursor: u64) -> Self {
        Self {
            total_segments,
            cursor,
            detached: cursor >= total_segments,
        }
    }

    /// Evaluate a playhead sample against the fetch threshold.
    ///
    /// Returns at most one action per call. Quiet while the duration is
    /// unknown (NaN or non-positive), which hosts report until media
    /// metadata has been parsed.
    pub fn poll(&mut self, current_time: f64, duration: f64) -> Option<TriggerAction> {
        if self.detached {
            return None;
        }
        if !duration.is_finite() || duration <= 0.0 {
            return None;
        }

        let segment_duration = duration / self.total_segments as f64;
        let threshold =
            segment_duration * self.cursor.saturating_sub(1) as f64 + 0.8 * segment_duration;
        if current_time < threshold {
            return None;
        }

        let index = self.cursor;
        trace!(
            segment = index,
            current_time,
            threshold,
            "playhead crossed fetch threshold"
        );
        if index + 1 == self.total_segments {
            self.detached = true;
            Some(TriggerAction::FetchTerminal { index })
        } else {
            self.cursor += 1;
            Some(TriggerAction::Fetch { index })
        }
    }

    /// True once the terminal segment has been scheduled (or was never
    /// needed).
    pub fn is_detached(&self) -> bool {
        self.detached
    }

    /// Next segment index this trigger will schedule.
    pub fn cursor(&self) -> u64 {
        self.cursor
    }
}
