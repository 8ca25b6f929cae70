use crate::types::{CompletionEvent, PlaybackSnapshot};

/// Slack for position/duration jitter near the end of a track.
pub const END_TOLERANCE_MS: u64 = 1000;

/// Completion state of the track occurrence currently on the player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionRecord {
    pub track_id: String,
    pub has_fired: bool,
}

/// Derives "track finished" events from snapshots.
///
/// A track counts as finished when it sits paused within [`END_TOLERANCE_MS`]
/// of its end. Each occurrence of a track fires at most once; the record is
/// only replaced when another track shows up or [`reset`](Self::reset) is called.
#[derive(Debug, Default)]
pub struct CompletionDetector {
    record: Option<CompletionRecord>,
}

impl CompletionDetector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_snapshot(&mut self, snapshot: &PlaybackSnapshot) -> Option<CompletionEvent> {
        let same_track = self
            .record
            .as_ref()
            .is_some_and(|record| record.track_id == snapshot.track_id);
        if !same_track {
            self.record = Some(CompletionRecord {
                track_id: snapshot.track_id.clone(),
                has_fired: false,
            });
        }
        let record = self.record.as_mut()?;

        if record.has_fired || !is_at_end(snapshot) {
            return None;
        }

        record.has_fired = true;
        tracing::debug!(
            track_id = %snapshot.track_id,
            position_ms = snapshot.position_ms,
            duration_ms = snapshot.duration_ms,
            "track completed"
        );
        Some(CompletionEvent {
            track_id: snapshot.track_id.clone(),
        })
    }

    /// Drops the current record, e.g. on disconnect.
    pub fn reset(&mut self) {
        self.record = None;
    }

    pub fn record(&self) -> Option<&CompletionRecord> {
        self.record.as_ref()
    }
}

fn is_at_end(snapshot: &PlaybackSnapshot) -> bool {
    snapshot.duration_ms > 0
        && !snapshot.is_playing
        && snapshot.position_ms >= snapshot.duration_ms.saturating_sub(END_TOLERANCE_MS)
}
