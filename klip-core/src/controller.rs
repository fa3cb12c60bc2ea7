//! Session controller
//!
//! Single source of truth for the presentation layer. Every command goes
//! through here; the published [`SessionSnapshot`] is always rebuilt from the
//! components after the hardware call returns, so a failed call can never
//! leave a flag optimistically set.
//!
//! ```text
//!                 ┌────────────────────┐
//!  commands ─────▶│ SessionController  │──▶ watch<SessionSnapshot>
//!                 │                    │──▶ broadcast<SessionEvent>
//!                 └─────────┬──────────┘
//!      ┌──────────┬─────────┼────────────┬──────────────┐
//!      ▼          ▼         ▼            ▼              ▼
//!  Inventory  Capture   LevelMeter  Compositor   ScreenShare
//! ```

use parking_lot::Mutex;
use serde::Serialize;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, trace, warn};

use crate::audio::AudioLevelMeter;
use crate::capture::CaptureSession;
use crate::config::{CaptureConfig, StudioConfig};
use crate::devices::{ChangeSubscription, DeviceInventory, DeviceList};
use crate::effects::{
    CompositorState, EffectSelection, EffectsCompositor, RenderOutcome, Surface, TemplateCache,
    VideoAdjustments,
};
use crate::error::{KlipError, Result};
use crate::host::CaptureHost;
use crate::prefs::{PreferenceStore, Preferences};
use crate::screen::{EndReason, ScreenShareEvent, ScreenShareSession};
use crate::types::{DeviceKind, DeviceSelection, VideoFrame};

/// Read-only state for the presentation layer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionSnapshot {
    pub camera_enabled: bool,
    pub microphone_enabled: bool,
    pub sharing: bool,
    pub effect: EffectSelection,
    pub devices: DeviceSelection,
    /// Last enumerated devices
    pub available: DeviceList,
    /// Microphone level in [0, 100]
    pub audio_level: f32,
    pub preview_visible: bool,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            camera_enabled: false,
            microphone_enabled: false,
            sharing: false,
            effect: EffectSelection::None,
            devices: DeviceSelection::default(),
            available: DeviceList::default(),
            audio_level: 0.0,
            preview_visible: true,
        }
    }
}

/// Asynchronous notifications
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// Host device set changed; carries the fresh list
    DevicesChanged(DeviceList),
    /// Screen share was ended outside the application
    ScreenShareEnded,
    /// A command or background refresh failed
    Error { operation: String, message: String },
}

/// Result of one frame tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FrameTick {
    pub render: RenderOutcome,
    pub audio_level: f32,
}

struct Surfaces {
    primary: Surface,
    preview: Surface,
}

struct ControllerInner {
    config: StudioConfig,
    inventory: DeviceInventory,
    capture: CaptureSession,
    share: ScreenShareSession,
    meter: Mutex<AudioLevelMeter>,
    compositor: Mutex<EffectsCompositor>,
    surfaces: Mutex<Surfaces>,
    preview_visible: AtomicBool,
    store: Option<PreferenceStore>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    events: broadcast::Sender<SessionEvent>,
    device_subscription: Mutex<Option<ChangeSubscription>>,
    share_listener: Mutex<Option<JoinHandle<()>>>,
    frame_loop: Mutex<Option<JoinHandle<()>>>,
    ended: AtomicBool,
}

impl ControllerInner {
    fn build_snapshot(&self) -> SessionSnapshot {
        let capture = self.capture.state();
        SessionSnapshot {
            camera_enabled: capture.camera_enabled,
            microphone_enabled: capture.microphone_enabled,
            sharing: self.share.is_active(),
            effect: self.compositor.lock().effect(),
            devices: capture.selection,
            available: self.inventory.cached(),
            audio_level: self.meter.lock().level(),
            preview_visible: self.preview_visible.load(Ordering::SeqCst),
        }
    }

    fn publish(&self) {
        let snapshot = self.build_snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    fn report(&self, operation: &str, err: &KlipError) {
        match err.user_hint() {
            Some(hint) => warn!("{} failed: {} ({})", operation, err, hint),
            None => warn!("{} failed: {}", operation, err),
        }
        let _ = self.events.send(SessionEvent::Error {
            operation: operation.to_string(),
            message: err.to_string(),
        });
    }

    fn tick(&self) -> FrameTick {
        let audio_level = self.meter.lock().tick();

        let render = match self.capture.video_track() {
            Some(track) if track.is_enabled() => {
                // Frames are shared, so a concurrent device switch cannot tear
                // down the frame this tick is drawing.
                let frame = track.latest_frame();
                let mut compositor = self.compositor.lock();
                let mut surfaces = self.surfaces.lock();
                let Surfaces { primary, preview } = &mut *surfaces;
                if self.preview_visible.load(Ordering::SeqCst) {
                    compositor.render(frame.as_deref(), &mut [primary, preview])
                } else {
                    compositor.render(frame.as_deref(), &mut [primary])
                }
            }
            _ => RenderOutcome::Idle,
        };

        trace!("Tick: {:?}, level {:.1}", render, audio_level);
        self.publish();
        FrameTick {
            render,
            audio_level,
        }
    }

    async fn devices_changed(&self) {
        match self.inventory.refresh().await {
            Ok(list) => {
                info!("Device set changed ({} devices)", list.len());
                let _ = self.events.send(SessionEvent::DevicesChanged(list));
                self.publish();
            }
            Err(e) => self.report("refresh_devices", &e),
        }
    }
}

/// Composes device inventory, capture, metering, effects and screen share
#[derive(Clone)]
pub struct SessionController {
    inner: Arc<ControllerInner>,
}

impl SessionController {
    /// Create a controller over a host
    pub fn new(host: Arc<dyn CaptureHost>, config: StudioConfig) -> Result<Self> {
        config.validate_strict()?;
        for warning in config.capture.validate() {
            warn!("{}", warning);
        }

        let render = &config.render;
        let surfaces = Surfaces {
            primary: Surface::new(render.primary_size.0, render.primary_size.1),
            preview: Surface::new(render.preview_size.0, render.preview_size.1),
        };
        let (snapshot_tx, _) = watch::channel(SessionSnapshot::default());
        let (events, _) = broadcast::channel(64);

        Ok(Self {
            inner: Arc::new(ControllerInner {
                inventory: DeviceInventory::new(host.clone()),
                capture: CaptureSession::new(host.clone()),
                share: ScreenShareSession::new(host, config.display),
                meter: Mutex::new(AudioLevelMeter::new()),
                compositor: Mutex::new(EffectsCompositor::new(config.render.clone())),
                surfaces: Mutex::new(surfaces),
                preview_visible: AtomicBool::new(true),
                store: None,
                snapshot_tx,
                events,
                device_subscription: Mutex::new(None),
                share_listener: Mutex::new(None),
                frame_loop: Mutex::new(None),
                ended: AtomicBool::new(false),
                config,
            }),
        })
    }

    /// Persist selections to `store` (read at start, written at end)
    ///
    /// Must be called before the controller is cloned or started.
    pub fn with_preferences(mut self, store: PreferenceStore) -> Self {
        match Arc::get_mut(&mut self.inner) {
            Some(inner) => inner.store = Some(store),
            None => warn!("Controller already shared, preferences not attached"),
        }
        self
    }

    async fn load_preferences(&self) -> Preferences {
        let Some(store) = &self.inner.store else {
            return Preferences {
                camera_enabled: self.inner.config.capture.camera_enabled,
                microphone_enabled: self.inner.config.capture.microphone_enabled,
                ..Default::default()
            };
        };
        match store.load().await {
            Ok(prefs) => prefs,
            Err(e) => {
                self.inner.report("load_preferences", &e);
                Preferences::default()
            }
        }
    }

    /// Capture request for this start
    ///
    /// Explicitly configured device ids always win. Saved ids are only used
    /// when the host still lists them; otherwise the host default is taken.
    async fn capture_config(&self, prefs: &Preferences) -> CaptureConfig {
        let mut capture = self
            .inner
            .config
            .capture
            .clone()
            .with_enabled(prefs.camera_enabled, prefs.microphone_enabled);

        let saved = &prefs.devices;
        if saved.camera_id.is_none() && saved.microphone_id.is_none() {
            return capture;
        }
        let known = match self.inner.inventory.list().await {
            Ok(devices) => DeviceList::from_descriptors(devices),
            Err(e) => {
                debug!("Cannot verify saved devices yet: {}", e);
                return capture;
            }
        };
        if capture.camera_id.is_none() {
            capture.camera_id = saved
                .camera_id
                .clone()
                .filter(|id| known.contains(DeviceKind::Camera, id));
        }
        if capture.microphone_id.is_none() {
            capture.microphone_id = saved
                .microphone_id
                .clone()
                .filter(|id| known.contains(DeviceKind::MicrophoneIn, id));
        }
        capture
    }

    /// Start the session
    ///
    /// Loads preferences and background templates, acquires camera and
    /// microphone, enumerates devices and starts listening for hot-plug and
    /// out-of-band share termination. On a capture failure camera and mic
    /// stay off and the error is returned.
    pub async fn start(&self) -> Result<SessionSnapshot> {
        let inner = &self.inner;
        if inner.ended.load(Ordering::SeqCst) {
            return Err(KlipError::NoActiveSession);
        }
        if inner.capture.is_active() {
            let err = KlipError::SessionAlreadyRunning;
            inner.report("start", &err);
            return Err(err);
        }
        self.ensure_share_listener();

        let prefs = self.load_preferences().await;
        let capture_config = self.capture_config(&prefs).await;

        let templates_loaded = inner.compositor.lock().templates_loaded();
        let load_templates = async {
            if templates_loaded {
                None
            } else {
                Some(TemplateCache::load(inner.config.templates.clone()).await)
            }
        };
        let (templates, started) =
            tokio::join!(load_templates, inner.capture.start(&capture_config));

        // Templates and the saved effect are applied only once capture succeeded.
        let stream = match started {
            Ok(stream) => stream,
            Err(e) => {
                inner.report("start", &e);
                inner.publish();
                return Err(e);
            }
        };

        {
            let mut compositor = inner.compositor.lock();
            if let Some(templates) = templates {
                compositor.install_templates(Arc::new(templates));
            }
            if let Err(e) = compositor.set_effect(&prefs.effect) {
                warn!("Saved effect '{}' unavailable: {}", prefs.effect, e);
                let _ = compositor.set_effect(&EffectSelection::None);
            }
        }

        if let Some(audio) = stream.audio_track() {
            inner.meter.lock().attach(audio.clone())?;
        }

        match inner.inventory.refresh().await {
            Ok(list) => {
                let selected_speaker = prefs
                    .devices
                    .speaker_id
                    .as_deref()
                    .filter(|id| list.contains(DeviceKind::SpeakerOut, id))
                    .or_else(|| list.first(DeviceKind::SpeakerOut).map(|d| d.id.as_str()));
                if let Some(id) = selected_speaker {
                    if let Err(e) = inner.capture.switch_device(DeviceKind::SpeakerOut, id).await {
                        inner.report("select_speaker", &e);
                    }
                }
            }
            Err(e) => inner.report("refresh_devices", &e),
        }

        let weak = Arc::downgrade(inner);
        let subscription = inner.inventory.on_change(move || {
            if let Some(inner) = weak.upgrade() {
                tokio::spawn(async move { inner.devices_changed().await });
            }
        });
        *inner.device_subscription.lock() = Some(subscription);

        inner.publish();
        let snapshot = self.snapshot();
        info!(
            "Session started (camera: {}, microphone: {}, effect: {})",
            snapshot.camera_enabled, snapshot.microphone_enabled, snapshot.effect
        );
        Ok(snapshot)
    }

    fn ensure_share_listener(&self) {
        let mut slot = self.inner.share_listener.lock();
        if slot.is_some() {
            return;
        }
        let mut rx = self.inner.share.subscribe();
        let weak = Arc::downgrade(&self.inner);
        *slot = Some(tokio::spawn(async move {
            loop {
                let event = rx.recv().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                match event {
                    Ok(ScreenShareEvent::Ended {
                        reason: EndReason::External,
                        ..
                    }) => {
                        let _ = inner.events.send(SessionEvent::ScreenShareEnded);
                        inner.publish();
                    }
                    Ok(_) | Err(RecvError::Lagged(_)) => inner.publish(),
                    Err(RecvError::Closed) => break,
                }
            }
        }));
    }

    fn finish<T>(&self, operation: &str, result: Result<T>) -> Result<T> {
        if let Err(e) = &result {
            self.inner.report(operation, e);
        }
        self.inner.publish();
        result
    }

    /// Turn the camera on or off without releasing it
    pub fn set_camera_enabled(&self, enabled: bool) -> Result<()> {
        let result = self.inner.capture.set_camera_enabled(enabled);
        self.finish("set_camera_enabled", result)
    }

    /// Flip the camera; returns the new state
    pub fn toggle_camera(&self) -> Result<bool> {
        let enabled = !self.inner.capture.state().camera_enabled;
        self.set_camera_enabled(enabled).map(|_| enabled)
    }

    /// Mute or unmute the microphone without releasing it
    pub fn set_microphone_enabled(&self, enabled: bool) -> Result<()> {
        let result = self.inner.capture.set_microphone_enabled(enabled);
        self.finish("set_microphone_enabled", result)
    }

    /// Flip the microphone; returns the new state
    pub fn toggle_microphone(&self) -> Result<bool> {
        let enabled = !self.inner.capture.state().microphone_enabled;
        self.set_microphone_enabled(enabled).map(|_| enabled)
    }

    /// Rebind camera, microphone or speaker to another device
    ///
    /// On failure the previous device stays active and selected.
    pub async fn switch_device(&self, kind: DeviceKind, device_id: &str) -> Result<()> {
        let inner = &self.inner;
        let mut result = inner.capture.switch_device(kind, device_id).await;
        if result.is_ok() && kind == DeviceKind::MicrophoneIn {
            if let Some(audio) = inner.capture.audio_track() {
                result = inner.meter.lock().attach(audio);
            }
        }
        self.finish("switch_device", result)
    }

    /// Select the preview effect
    pub fn set_effect(&self, selection: EffectSelection) -> Result<()> {
        let result = self.inner.compositor.lock().set_effect(&selection);
        self.finish("set_effect", result)
    }

    /// Start sharing the screen
    ///
    /// Returns `Ok(false)` when the user dismissed the share picker.
    pub async fn start_screen_share(&self) -> Result<bool> {
        self.ensure_share_listener();
        match self.inner.share.start().await {
            Ok(_) => {
                self.inner.publish();
                Ok(true)
            }
            Err(e) if e.is_silent() => {
                debug!("Screen share picker dismissed");
                self.inner.publish();
                Ok(false)
            }
            Err(e) => self.finish("start_screen_share", Err(e)),
        }
    }

    /// Stop sharing; returns whether a share was running
    pub fn stop_screen_share(&self) -> bool {
        let stopped = self.inner.share.stop();
        self.inner.publish();
        stopped
    }

    /// Start or stop sharing; returns whether sharing afterwards
    pub async fn toggle_screen_share(&self) -> Result<bool> {
        if self.inner.share.is_active() {
            self.stop_screen_share();
            Ok(false)
        } else {
            self.start_screen_share().await
        }
    }

    /// Show or hide the secondary preview surface
    pub fn set_preview_visible(&self, visible: bool) {
        self.inner.preview_visible.store(visible, Ordering::SeqCst);
        self.inner.publish();
    }

    /// Set brightness/contrast adjustments
    ///
    /// Adjustments are not part of the snapshot; subscribers are only
    /// notified if something else changed meanwhile.
    pub fn set_adjustments(&self, adjustments: VideoAdjustments) {
        self.inner.compositor.lock().set_adjustments(adjustments);
        self.inner.publish();
    }

    /// Current brightness/contrast adjustments
    pub fn adjustments(&self) -> VideoAdjustments {
        self.inner.compositor.lock().adjustments()
    }

    /// Run one frame: sample the microphone level and composite the camera
    pub fn tick(&self) -> FrameTick {
        self.inner.tick()
    }

    /// Drive [`tick`](Self::tick) at `render.fps` on a background task
    ///
    /// Missed ticks are skipped, not burst. The loop ends with the session.
    pub fn spawn_frame_loop(&self) {
        let mut slot = self.inner.frame_loop.lock();
        if slot.as_ref().is_some_and(|task| !task.is_finished()) {
            return;
        }

        let period = self.inner.config.render.frame_interval();
        let weak: Weak<ControllerInner> = Arc::downgrade(&self.inner);
        debug!("Frame loop every {:?}", period);
        *slot = Some(tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                let Some(inner) = weak.upgrade() else {
                    break;
                };
                if inner.ended.load(Ordering::SeqCst) {
                    break;
                }
                inner.tick();
            }
        }));
    }

    /// End the session: stop everything and save preferences once
    pub async fn end(&self) -> Result<()> {
        let inner = &self.inner;
        if inner.ended.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        if let Some(task) = inner.frame_loop.lock().take() {
            task.abort();
        }
        drop(inner.device_subscription.lock().take());

        let capture = inner.capture.state();
        let prefs = Preferences {
            effect: inner.compositor.lock().effect(),
            devices: capture.selection,
            camera_enabled: capture.camera_enabled,
            microphone_enabled: capture.microphone_enabled,
        };

        inner.share.stop();
        inner.capture.stop();
        inner.meter.lock().detach();
        inner.compositor.lock().reset();
        inner.publish();
        info!("Session ended");

        let Some(store) = &inner.store else {
            return Ok(());
        };
        let result = store.save(&prefs).await;
        if let Err(e) = &result {
            inner.report("save_preferences", e);
        }
        result
    }

    /// Current state, rebuilt from the components
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.build_snapshot()
    }

    /// Watch published snapshots
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Subscribe to session events
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.inner.events.subscribe()
    }

    /// Compositor render state
    pub fn compositor_state(&self) -> CompositorState {
        self.inner.compositor.lock().state().clone()
    }

    /// Whether background templates have been loaded
    pub fn templates_loaded(&self) -> bool {
        self.inner.compositor.lock().templates_loaded()
    }

    /// Copy of the primary output surface
    pub fn primary_frame(&self) -> VideoFrame {
        self.inner.surfaces.lock().primary.snapshot()
    }

    /// Copy of the preview output surface
    pub fn preview_frame(&self) -> VideoFrame {
        self.inner.surfaces.lock().preview.snapshot()
    }

    /// Underlying capture session
    pub fn capture(&self) -> &CaptureSession {
        &self.inner.capture
    }

    /// Underlying screen share session
    pub fn screen_share(&self) -> &ScreenShareSession {
        &self.inner.share
    }

    /// Underlying device inventory
    pub fn inventory(&self) -> &DeviceInventory {
        &self.inner.inventory
    }
}

impl std::fmt::Debug for SessionController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionController")
            .field("snapshot", &self.snapshot())
            .field("ended", &self.inner.ended.load(Ordering::SeqCst))
            .finish_non_exhaustive()
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        if let Some(task) = self.frame_loop.get_mut().take() {
            task.abort();
        }
        if let Some(task) = self.share_listener.get_mut().take() {
            task.abort();
        }
        self.share.stop();
        self.capture.stop();
    }
}
