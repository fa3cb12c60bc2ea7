//! Screen share session
//!
//! Display capture is acquired independently of the camera session. The host
//! (or the user, through OS/browser chrome) may end the share at any time; a
//! watcher task on the video track turns that into an
//! [`ScreenShareEvent::Ended`] with [`EndReason::External`].

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::error::{KlipError, Result};
use crate::host::{ActiveStream, CaptureHost, DisplayConstraints, TrackRef, TrackState};
use crate::types::Handle;

/// Why a share ended
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// [`ScreenShareSession::stop`] was called
    Stopped,
    /// Terminated out-of-band by the host or user
    External,
}

/// Screen share lifecycle notification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScreenShareEvent {
    Started(Handle),
    Ended { handle: Handle, reason: EndReason },
}

struct ActiveShare {
    stream: ActiveStream,
    watcher: JoinHandle<()>,
}

struct ShareInner {
    host: Arc<dyn CaptureHost>,
    constraints: DisplayConstraints,
    active: Mutex<Option<ActiveShare>>,
    events: broadcast::Sender<ScreenShareEvent>,
    epoch: AtomicU64,
}

impl ShareInner {
    /// Called by the watcher when the shared track ends on its own
    fn ended_externally(&self, handle: Handle) {
        let mut active = self.active.lock();
        if active.as_ref().map(|a| a.stream.handle()) != Some(handle) {
            return;
        }
        if let Some(share) = active.take() {
            share.stream.stop();
        }
        drop(active);

        info!("Screen share {} ended externally", handle);
        let _ = self.events.send(ScreenShareEvent::Ended {
            handle,
            reason: EndReason::External,
        });
    }
}

/// Owns the display capture stream
#[derive(Clone)]
pub struct ScreenShareSession {
    inner: Arc<ShareInner>,
}

impl ScreenShareSession {
    /// Create an idle session
    pub fn new(host: Arc<dyn CaptureHost>, constraints: DisplayConstraints) -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            inner: Arc::new(ShareInner {
                host,
                constraints,
                active: Mutex::new(None),
                events,
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Show the host share picker and start sharing
    ///
    /// Fails with `UserCancelled` when the picker is dismissed and with
    /// `SessionAlreadyRunning` while a share is active.
    pub async fn start(&self) -> Result<ActiveStream> {
        if self.is_active() {
            return Err(KlipError::SessionAlreadyRunning);
        }

        let epoch = self.inner.epoch.fetch_add(1, Ordering::SeqCst) + 1;
        let stream = self
            .inner
            .host
            .request_display_media(&self.inner.constraints)
            .await?;

        let mut active = self.inner.active.lock();
        if self.inner.epoch.load(Ordering::SeqCst) != epoch || active.is_some() {
            debug!("Discarding stale display grant {}", stream.handle());
            stream.stop();
            return Err(KlipError::Superseded);
        }

        let Some(video) = stream.video_track().cloned() else {
            stream.stop();
            return Err(KlipError::host("display capture returned no video track"));
        };

        let handle = stream.handle();
        let watcher = tokio::spawn(watch_for_end(
            Arc::downgrade(&self.inner),
            handle,
            video.watch_state(),
        ));
        *active = Some(ActiveShare {
            stream: stream.clone(),
            watcher,
        });
        drop(active);

        info!(
            "Screen share started: {} ({}, audio: {})",
            handle,
            video.label(),
            stream.audio_track().is_some()
        );
        let _ = self.inner.events.send(ScreenShareEvent::Started(handle));
        Ok(stream)
    }

    /// Stop sharing
    ///
    /// Returns whether a share was running; calling it again is a no-op.
    pub fn stop(&self) -> bool {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
        let Some(share) = self.inner.active.lock().take() else {
            return false;
        };

        // The watcher goes first so our own stop is not reported as external.
        share.watcher.abort();
        share.stream.stop();

        let handle = share.stream.handle();
        info!("Screen share stopped: {}", handle);
        let _ = self.inner.events.send(ScreenShareEvent::Ended {
            handle,
            reason: EndReason::Stopped,
        });
        true
    }

    /// Whether a share is running
    pub fn is_active(&self) -> bool {
        self.inner.active.lock().is_some()
    }

    /// Current share stream
    pub fn active_stream(&self) -> Option<ActiveStream> {
        self.inner.active.lock().as_ref().map(|a| a.stream.clone())
    }

    /// Current shared video track
    pub fn video_track(&self) -> Option<TrackRef> {
        self.inner
            .active
            .lock()
            .as_ref()
            .and_then(|a| a.stream.video_track().cloned())
    }

    /// Subscribe to lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ScreenShareEvent> {
        self.inner.events.subscribe()
    }
}

impl std::fmt::Debug for ScreenShareSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScreenShareSession")
            .field("active", &self.active_stream().map(|s| s.handle()))
            .finish_non_exhaustive()
    }
}

async fn watch_for_end(
    session: Weak<ShareInner>,
    handle: Handle,
    mut state: watch::Receiver<TrackState>,
) {
    loop {
        if *state.borrow_and_update() == TrackState::Ended {
            break;
        }
        if state.changed().await.is_err() {
            warn!("Track state channel for {} closed, treating as ended", handle);
            break;
        }
    }

    if let Some(inner) = session.upgrade() {
        inner.ended_externally(handle);
    }
}
