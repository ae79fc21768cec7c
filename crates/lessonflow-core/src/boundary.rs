//! Segment end resolution for a sentence under the active playback policy.

use crate::policy::PlaybackPolicy;
use crate::transcript::Transcript;

/// Trimmed off a segment in stop-at-end modes so the next sentence's lead-in
/// is not heard.
pub const LEAD_OUT_CUTOFF: f64 = 0.5;
pub const MIN_SEGMENT_DURATION: f64 = 0.2;
/// Used when a trimmed segment has neither a derived end nor a successor.
pub const UNANCHORED_SEGMENT: f64 = 0.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SegmentShape {
    /// Boundaries meet end to end for uninterrupted playback.
    Gapless,
    /// Boundaries pulled in by the lead-out cutoff.
    Trimmed,
}

pub fn resolve_end(transcript: &Transcript, index: usize, policy: &PlaybackPolicy) -> f64 {
    resolve_end_with_shape(transcript, index, policy.segment_shape())
}

/// Always returns a value `>= start` for a valid index; `0.0` otherwise.
pub fn resolve_end_with_shape(transcript: &Transcript, index: usize, shape: SegmentShape) -> f64 {
    let Some(record) = transcript.get(index) else {
        return 0.0;
    };
    match shape {
        SegmentShape::Gapless => transcript.effective_end(index).unwrap_or(record.start),
        SegmentShape::Trimmed => {
            let next_start = transcript.next_start(index);
            let base = if record.has_authoritative_end() {
                record.end
            } else {
                next_start.unwrap_or(0.0)
            };
            let mut end = if base > 0.0 {
                (record.start + MIN_SEGMENT_DURATION).max(base - LEAD_OUT_CUTOFF)
            } else {
                record.start + UNANCHORED_SEGMENT
            };
            if let Some(next_start) = next_start {
                end = end.min(next_start);
            }
            end.max(record.start)
        }
    }
}
