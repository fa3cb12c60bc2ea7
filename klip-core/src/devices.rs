//! Device enumeration and hot-plug tracking

use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace};

use crate::error::Result;
use crate::host::CaptureHost;
use crate::types::{DeviceDescriptor, DeviceKind};

/// Enumerated devices grouped by kind
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DeviceList {
    pub cameras: Vec<DeviceDescriptor>,
    pub microphones: Vec<DeviceDescriptor>,
    pub speakers: Vec<DeviceDescriptor>,
}

impl DeviceList {
    /// Group a flat host listing, preserving host order within each kind
    pub fn from_descriptors(devices: impl IntoIterator<Item = DeviceDescriptor>) -> Self {
        let mut list = Self::default();
        for device in devices {
            match device.kind {
                DeviceKind::Camera => list.cameras.push(device),
                DeviceKind::MicrophoneIn => list.microphones.push(device),
                DeviceKind::SpeakerOut => list.speakers.push(device),
            }
        }
        list
    }

    /// Devices of one kind
    pub fn of_kind(&self, kind: DeviceKind) -> &[DeviceDescriptor] {
        match kind {
            DeviceKind::Camera => &self.cameras,
            DeviceKind::MicrophoneIn => &self.microphones,
            DeviceKind::SpeakerOut => &self.speakers,
        }
    }

    /// First device of a kind, the default pick
    pub fn first(&self, kind: DeviceKind) -> Option<&DeviceDescriptor> {
        self.of_kind(kind).first()
    }

    /// Whether a device id of the given kind is present
    pub fn contains(&self, kind: DeviceKind, id: &str) -> bool {
        self.of_kind(kind).iter().any(|d| d.id == id)
    }

    /// Every device
    pub fn all(&self) -> impl Iterator<Item = &DeviceDescriptor> {
        self.cameras
            .iter()
            .chain(&self.microphones)
            .chain(&self.speakers)
    }

    /// Total number of devices
    pub fn len(&self) -> usize {
        self.cameras.len() + self.microphones.len() + self.speakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Handle for a device-change listener; the listener stops when this is dropped
#[derive(Debug)]
pub struct ChangeSubscription {
    task: JoinHandle<()>,
}

impl ChangeSubscription {
    /// Stop listening
    pub fn cancel(self) {
        self.task.abort();
    }

    /// Whether the listener is still running
    pub fn is_active(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Lists capture hardware and reports hot-plug changes
pub struct DeviceInventory {
    host: Arc<dyn CaptureHost>,
    cached: RwLock<DeviceList>,
}

impl DeviceInventory {
    /// Create an inventory over a host
    pub fn new(host: Arc<dyn CaptureHost>) -> Self {
        Self {
            host,
            cached: RwLock::new(DeviceList::default()),
        }
    }

    /// Enumerate devices
    ///
    /// Fails with `Permission` until the host has granted capture access.
    pub async fn list(&self) -> Result<Vec<DeviceDescriptor>> {
        self.host.enumerate_devices().await
    }

    /// Re-enumerate and replace the cached list
    pub async fn refresh(&self) -> Result<DeviceList> {
        let list = DeviceList::from_descriptors(self.list().await?);
        info!(
            "Found {} cameras, {} microphones, {} speakers",
            list.cameras.len(),
            list.microphones.len(),
            list.speakers.len()
        );
        *self.cached.write() = list.clone();
        Ok(list)
    }

    /// Last list fetched by [`refresh`](Self::refresh)
    pub fn cached(&self) -> DeviceList {
        self.cached.read().clone()
    }

    /// Call `callback` whenever the host's device set changes
    ///
    /// Bursts of notifications, including lagged ones, are coalesced into a
    /// single call. Callers should re-list from the callback. Must be called
    /// within a Tokio runtime.
    pub fn on_change<F>(&self, mut callback: F) -> ChangeSubscription
    where
        F: FnMut() + Send + 'static,
    {
        let mut rx = self.host.device_changes();
        let task = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(()) | Err(RecvError::Lagged(_)) => {
                        let mut coalesced = 0usize;
                        loop {
                            match rx.try_recv() {
                                Ok(()) | Err(TryRecvError::Lagged(_)) => coalesced += 1,
                                Err(_) => break,
                            }
                        }
                        trace!("Device change ({} coalesced)", coalesced);
                        callback();
                    }
                    Err(RecvError::Closed) => {
                        debug!("Host device-change channel closed");
                        break;
                    }
                }
            }
        });
        ChangeSubscription { task }
    }
}

impl std::fmt::Debug for DeviceInventory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceInventory")
            .field("cached", &*self.cached.read())
            .finish_non_exhaustive()
    }
}
