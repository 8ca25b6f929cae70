use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;

use crate::{
    error::Result,
    management::ListenCache,
    types::{CompletionEvent, SharedTrack},
    utils,
};

/// The listen-recording service's single write call.
#[async_trait]
pub trait ListenWriter: Send + Sync {
    async fn record_listen(&self, share_id: &str) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordOutcome {
    Recorded { share_id: String },
    AlreadyListened { share_id: String },
    /// The track was not started from a share this UI knows about.
    Unmatched,
    Failed { share_id: String, error: String },
}

/// Turns completions into listen records for the matching share.
pub struct AutoListenRecorder {
    writer: Arc<dyn ListenWriter>,
    now_playing: Option<SharedTrack>,
    displayed: Vec<SharedTrack>,
}

impl AutoListenRecorder {
    pub fn new(writer: Arc<dyn ListenWriter>) -> Self {
        Self {
            writer,
            now_playing: None,
            displayed: Vec::new(),
        }
    }

    /// The share the user started through this UI, if any.
    pub fn set_now_playing(&mut self, share: Option<SharedTrack>) {
        self.now_playing = share;
    }

    /// Shares currently on screen, used when the track was started elsewhere.
    pub fn set_displayed_shares(&mut self, shares: Vec<SharedTrack>) {
        self.displayed = shares;
    }

    pub fn resolve(&self, track_id: &str) -> Option<&SharedTrack> {
        let matches = |share: &&SharedTrack| {
            utils::track_id_from_reference(&share.track_ref).as_deref() == Some(track_id)
        };

        self.now_playing
            .as_ref()
            .filter(matches)
            .or_else(|| self.displayed.iter().find(matches))
    }

    /// Records a listen for the share behind `event`, at most once per share.
    ///
    /// Failures are logged and reported in the outcome, never retried. The share
    /// is only kept in `known` when the write went through, so marking it as
    /// listened by hand stays possible.
    pub async fn on_completion(
        &self,
        event: &CompletionEvent,
        known: &mut ListenCache,
    ) -> RecordOutcome {
        let Some(share) = self.resolve(&event.track_id) else {
            tracing::debug!(track_id = %event.track_id, "completed track matches no share");
            return RecordOutcome::Unmatched;
        };
        let share_id = share.share_id.clone();

        if !known.add(share_id.clone()) {
            return RecordOutcome::AlreadyListened { share_id };
        }

        match self.writer.record_listen(&share_id).await {
            Ok(()) => {
                tracing::info!(share_id = %share_id, user_id = known.user_id(), "listen recorded");
                RecordOutcome::Recorded { share_id }
            }
            Err(e) => {
                known.remove(&share_id);
                tracing::warn!(share_id = %share_id, error = %e, "failed to record listen");
                RecordOutcome::Failed {
                    share_id,
                    error: e.to_string(),
                }
            }
        }
    }
}

/// Completion callback for a bridge: each completion is recorded on its own
/// task so the bridge's event loop never waits on the listen write.
///
/// A persistent `known` cache is written back after every recorded listen. A
/// failed write of the cache is logged and left for the next recorded listen.
///
/// Must be invoked from within a Tokio runtime.
pub fn completion_handler(
    recorder: Arc<Mutex<AutoListenRecorder>>,
    known: Arc<Mutex<ListenCache>>,
) -> impl FnMut(CompletionEvent) + Send + 'static {
    move |event| {
        let recorder = Arc::clone(&recorder);
        let known = Arc::clone(&known);
        tokio::spawn(async move {
            let recorder = recorder.lock().await;
            let mut known = known.lock().await;
            let outcome = recorder.on_completion(&event, &mut known).await;

            if matches!(outcome, RecordOutcome::Recorded { .. }) && known.is_persistent() {
                if let Err(e) = known.persist().await {
                    tracing::warn!(user_id = known.user_id(), error = %e, "failed to persist listen cache");
                }
            }
        });
    }
}
