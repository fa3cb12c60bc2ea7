//! Mock infrastructure for testing
//!
//! A scriptable capture host: device lists, permission denial, share-picker
//! cancellation, hot-plug, held acquisitions and out-of-band track end.

#![allow(dead_code)]

use async_trait::async_trait;
use klip_core::host::{
    ActiveStream, CaptureHost, DisplayConstraints, MediaConstraints, MediaTrack, TrackRef,
    TrackState,
};
use klip_core::types::{DeviceDescriptor, DeviceKind, Handle, TrackKind, VideoFrame};
use klip_core::{KlipError, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch, Semaphore};

/// Install a test subscriber once; honours `RUST_LOG`
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Create a test frame with solid color (RGBA)
pub fn solid_frame(width: u32, height: u32, color: [u8; 4]) -> VideoFrame {
    VideoFrame::solid(width, height, color)
}

/// Create a test frame with a gradient pattern
pub fn gradient_frame(width: u32, height: u32) -> VideoFrame {
    let mut data = Vec::with_capacity((width * height * 4) as usize);
    for y in 0..height {
        for x in 0..width {
            let r = ((x as f32 / width as f32) * 255.0) as u8;
            let g = ((y as f32 / height as f32) * 255.0) as u8;
            let b = (((x + y) as f32 / (width + height) as f32) * 255.0) as u8;
            data.extend_from_slice(&[r, g, b, 255]);
        }
    }
    VideoFrame::new(width, height, data)
}

/// Alternating black/white pixels
pub fn checkerboard_frame(size: u32) -> VideoFrame {
    let mut data = Vec::with_capacity((size * size * 4) as usize);
    for y in 0..size {
        for x in 0..size {
            let v = if (x + y) % 2 == 0 { 255 } else { 0 };
            data.extend_from_slice(&[v, v, v, 255]);
        }
    }
    VideoFrame::new(size, size, data)
}

/// One analysis window of a sine wave centred on an FFT bin
pub fn sine_samples(bin: usize, len: usize, amplitude: f32) -> Vec<f32> {
    (0..len)
        .map(|i| {
            amplitude * (2.0 * std::f32::consts::PI * bin as f32 * i as f32 / len as f32).sin()
        })
        .collect()
}

/// Default device set: two cameras, two microphones, two speakers
pub fn default_devices() -> Vec<DeviceDescriptor> {
    vec![
        DeviceDescriptor::new("cam-1", DeviceKind::Camera, "Front Camera"),
        DeviceDescriptor::new("cam-2", DeviceKind::Camera, "USB Camera"),
        DeviceDescriptor::new("mic-1", DeviceKind::MicrophoneIn, "Built-in Microphone"),
        DeviceDescriptor::new("mic-2", DeviceKind::MicrophoneIn, "Headset Microphone"),
        DeviceDescriptor::new("spk-1", DeviceKind::SpeakerOut, "Speakers"),
        DeviceDescriptor::new("spk-2", DeviceKind::SpeakerOut, "Headphones"),
    ]
}

/// Mock host track
#[derive(Debug)]
pub struct MockTrack {
    handle: Handle,
    kind: TrackKind,
    device_id: String,
    label: String,
    enabled: AtomicBool,
    stopped: AtomicBool,
    state_tx: watch::Sender<TrackState>,
    frame: Mutex<Option<Arc<VideoFrame>>>,
    samples: Mutex<Vec<f32>>,
}

impl MockTrack {
    pub fn new(kind: TrackKind, device_id: &str, label: &str) -> Arc<Self> {
        let (state_tx, _) = watch::channel(TrackState::Live);
        Arc::new(Self {
            handle: Handle::new(),
            kind,
            device_id: device_id.to_string(),
            label: label.to_string(),
            enabled: AtomicBool::new(true),
            stopped: AtomicBool::new(false),
            state_tx,
            frame: Mutex::new(None),
            samples: Mutex::new(Vec::new()),
        })
    }

    /// Replace the frame returned by `latest_frame`
    pub fn set_frame(&self, frame: VideoFrame) {
        *self.frame.lock() = Some(Arc::new(frame));
    }

    /// Replace the samples returned by `read_samples`
    pub fn set_samples(&self, samples: Vec<f32>) {
        *self.samples.lock() = samples;
    }

    /// Simulate the host/user ending the track outside the app
    pub fn end_externally(&self) {
        self.state_tx.send_replace(TrackState::Ended);
    }

    /// Whether the app called `stop()`
    pub fn was_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    pub fn is_live(&self) -> bool {
        *self.state_tx.borrow() == TrackState::Live
    }
}

impl MediaTrack for MockTrack {
    fn handle(&self) -> Handle {
        self.handle
    }

    fn kind(&self) -> TrackKind {
        self.kind
    }

    fn device_id(&self) -> &str {
        &self.device_id
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::SeqCst)
    }

    fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    fn ready_state(&self) -> TrackState {
        *self.state_tx.borrow()
    }

    fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.state_tx.send_replace(TrackState::Ended);
    }

    fn watch_state(&self) -> watch::Receiver<TrackState> {
        self.state_tx.subscribe()
    }

    fn latest_frame(&self) -> Option<Arc<VideoFrame>> {
        self.frame.lock().clone()
    }

    fn read_samples(&self, out: &mut [f32]) -> usize {
        if !self.is_enabled() || !self.is_live() {
            out.fill(0.0);
            return out.len();
        }
        let samples = self.samples.lock();
        let n = samples.len().min(out.len());
        out[..n].copy_from_slice(&samples[..n]);
        n
    }
}

/// Scriptable capture host
pub struct MockHost {
    devices: Mutex<Vec<DeviceDescriptor>>,
    permission_denied: AtomicBool,
    cancel_share: AtomicBool,
    duplicate_grants: AtomicBool,
    gate: Mutex<Option<Arc<Semaphore>>>,
    display_gate: Mutex<Option<Arc<Semaphore>>>,
    tracks: Mutex<Vec<Arc<MockTrack>>>,
    display_tracks: Mutex<Vec<Arc<MockTrack>>>,
    camera_frame: Mutex<VideoFrame>,
    mic_samples: Mutex<Vec<f32>>,
    user_media_calls: AtomicUsize,
    display_calls: AtomicUsize,
    device_tx: broadcast::Sender<()>,
}

impl MockHost {
    pub fn new() -> Arc<Self> {
        Self::with_devices(default_devices())
    }

    pub fn with_devices(devices: Vec<DeviceDescriptor>) -> Arc<Self> {
        let (device_tx, _) = broadcast::channel(4);
        Arc::new(Self {
            devices: Mutex::new(devices),
            permission_denied: AtomicBool::new(false),
            cancel_share: AtomicBool::new(false),
            duplicate_grants: AtomicBool::new(false),
            gate: Mutex::new(None),
            display_gate: Mutex::new(None),
            tracks: Mutex::new(Vec::new()),
            display_tracks: Mutex::new(Vec::new()),
            camera_frame: Mutex::new(solid_frame(64, 48, [90, 120, 150, 255])),
            mic_samples: Mutex::new(sine_samples(16, 256, 0.8)),
            user_media_calls: AtomicUsize::new(0),
            display_calls: AtomicUsize::new(0),
            device_tx,
        })
    }

    /// Coerce into the trait object the library takes
    pub fn as_host(self: &Arc<Self>) -> Arc<dyn CaptureHost> {
        self.clone()
    }

    pub fn deny_permission(&self, denied: bool) {
        self.permission_denied.store(denied, Ordering::SeqCst);
    }

    pub fn cancel_share_picker(&self, cancel: bool) {
        self.cancel_share.store(cancel, Ordering::SeqCst);
    }

    /// Grant two tracks per requested kind
    pub fn duplicate_grants(&self, duplicate: bool) {
        self.duplicate_grants.store(duplicate, Ordering::SeqCst);
    }

    /// Hold every camera/mic acquisition until [`release`](Self::release)
    pub fn hold_acquisitions(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Let held acquisitions complete
    pub fn release(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Keep the share picker open until [`release_share_picker`](Self::release_share_picker)
    pub fn hold_share_picker(&self) {
        *self.display_gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    pub fn release_share_picker(&self) {
        if let Some(gate) = self.display_gate.lock().take() {
            gate.add_permits(Semaphore::MAX_PERMITS / 2);
        }
    }

    /// Frame given to camera tracks created from now on
    pub fn set_camera_frame(&self, frame: VideoFrame) {
        *self.camera_frame.lock() = frame;
    }

    /// Samples given to microphone tracks created from now on
    pub fn set_mic_samples(&self, samples: Vec<f32>) {
        *self.mic_samples.lock() = samples;
    }

    /// Add a device and fire a change notification
    pub fn plug(&self, device: DeviceDescriptor) {
        self.devices.lock().push(device);
        let _ = self.device_tx.send(());
    }

    /// Remove a device and fire a change notification
    pub fn unplug(&self, id: &str) {
        self.devices.lock().retain(|d| d.id != id);
        let _ = self.device_tx.send(());
    }

    pub fn user_media_calls(&self) -> usize {
        self.user_media_calls.load(Ordering::SeqCst)
    }

    pub fn display_calls(&self) -> usize {
        self.display_calls.load(Ordering::SeqCst)
    }

    /// Every camera/mic track ever granted
    pub fn tracks(&self) -> Vec<Arc<MockTrack>> {
        self.tracks.lock().clone()
    }

    /// Camera/mic tracks of a kind that are still live
    pub fn live_tracks(&self, kind: TrackKind) -> Vec<Arc<MockTrack>> {
        self.tracks
            .lock()
            .iter()
            .filter(|t| t.kind() == kind && t.is_live())
            .cloned()
            .collect()
    }

    /// Most recently granted camera/mic track of a kind
    pub fn last_track(&self, kind: TrackKind) -> Option<Arc<MockTrack>> {
        self.tracks
            .lock()
            .iter()
            .rev()
            .find(|t| t.kind() == kind)
            .cloned()
    }

    /// Most recently granted display video track
    pub fn last_display_track(&self) -> Option<Arc<MockTrack>> {
        self.display_tracks
            .lock()
            .iter()
            .rev()
            .find(|t| t.kind() == TrackKind::Video)
            .cloned()
    }

    fn resolve(&self, kind: DeviceKind, id: Option<&str>) -> Result<DeviceDescriptor> {
        let devices = self.devices.lock();
        let found = match id {
            Some(id) => devices.iter().find(|d| d.kind == kind && d.id == id),
            None => devices.iter().find(|d| d.kind == kind),
        };
        found
            .cloned()
            .ok_or_else(|| KlipError::device_unavailable(kind, id.unwrap_or("default")))
    }
}

#[async_trait]
impl CaptureHost for MockHost {
    async fn enumerate_devices(&self) -> Result<Vec<DeviceDescriptor>> {
        if self.permission_denied.load(Ordering::SeqCst) {
            return Err(KlipError::permission("enumeration requires capture access"));
        }
        Ok(self.devices.lock().clone())
    }

    async fn request_user_media(&self, constraints: &MediaConstraints) -> Result<ActiveStream> {
        self.user_media_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if self.permission_denied.load(Ordering::SeqCst) {
            return Err(KlipError::permission("camera and microphone access denied"));
        }

        // Resolve everything before allocating so a failure holds nothing
        let camera = match &constraints.video {
            Some(video) => Some(self.resolve(DeviceKind::Camera, video.device_id.as_deref())?),
            None => None,
        };
        let microphone = match &constraints.audio {
            Some(audio) => {
                Some(self.resolve(DeviceKind::MicrophoneIn, audio.device_id.as_deref())?)
            }
            None => None,
        };

        let copies = if self.duplicate_grants.load(Ordering::SeqCst) { 2 } else { 1 };
        let mut granted: Vec<Arc<MockTrack>> = Vec::new();
        for _ in 0..copies {
            if let Some(device) = &camera {
                let track = MockTrack::new(TrackKind::Video, &device.id, &device.label);
                track.set_frame(self.camera_frame.lock().clone());
                granted.push(track);
            }
            if let Some(device) = &microphone {
                let track = MockTrack::new(TrackKind::Audio, &device.id, &device.label);
                track.set_samples(self.mic_samples.lock().clone());
                granted.push(track);
            }
        }

        self.tracks.lock().extend(granted.iter().cloned());
        let refs: Vec<TrackRef> = granted.into_iter().map(|t| t as TrackRef).collect();
        Ok(ActiveStream::new(refs))
    }

    async fn request_display_media(&self, constraints: &DisplayConstraints) -> Result<ActiveStream> {
        self.display_calls.fetch_add(1, Ordering::SeqCst);
        let gate = self.display_gate.lock().clone();
        if let Some(gate) = gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if self.cancel_share.load(Ordering::SeqCst) {
            return Err(KlipError::UserCancelled);
        }

        let mut granted = vec![MockTrack::new(TrackKind::Video, "screen:0", "Entire Screen")];
        granted[0].set_frame(solid_frame(32, 18, [10, 10, 10, 255]));
        if constraints.audio {
            granted.push(MockTrack::new(TrackKind::Audio, "screen:0", "System Audio"));
        }

        self.display_tracks.lock().extend(granted.iter().cloned());
        let refs: Vec<TrackRef> = granted.into_iter().map(|t| t as TrackRef).collect();
        Ok(ActiveStream::new(refs))
    }

    fn device_changes(&self) -> broadcast::Receiver<()> {
        self.device_tx.subscribe()
    }
}

/// Wait until `check` passes, polling briefly; panics after one second
pub async fn eventually(mut check: impl FnMut() -> bool) {
    for _ in 0..100 {
        if check() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached within 1s");
}
