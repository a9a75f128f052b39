//! In-process device collaborator.
//!
//! Behaves like a browser's media-devices API: until access to a kind has
//! been granted, enumeration yields a single placeholder entry with an empty
//! id and label. Every request is recorded so callers can inspect what a
//! component asked for.

use super::device::{DeviceEvent, MediaDeviceError, MediaDeviceInfo, MediaDeviceKind, TrackHandle};
use super::permission::PermissionRequest;
use super::source::{MediaDeviceSource, SourceRequest, WatcherSet};
use std::collections::HashMap;
use std::sync::mpsc::Receiver;
use tracing::debug;

/// How the simulated user answers a permission prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionResponse {
    #[default]
    Grant,
    Deny,
}

/// Access state for one device kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionStatus {
    #[default]
    Prompt,
    Granted,
    Denied,
}

/// Device collaborator backed by an in-memory device table.
#[derive(Debug, Default)]
pub struct MemoryDeviceSource {
    devices: Vec<MediaDeviceInfo>,
    active: HashMap<MediaDeviceKind, String>,
    permissions: HashMap<MediaDeviceKind, PermissionStatus>,
    response: PermissionResponse,
    watchers: WatcherSet,
    requests: Vec<SourceRequest>,
}

impl MemoryDeviceSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a source that already knows `devices`.
    pub fn with_devices(devices: Vec<MediaDeviceInfo>) -> Self {
        Self {
            devices,
            ..Self::default()
        }
    }

    /// Answer future permission prompts with `response`.
    pub fn set_permission_response(&mut self, response: PermissionResponse) {
        self.response = response;
    }

    /// Mark `kind` as already accessible (e.g. a track is capturing from it).
    pub fn grant(&mut self, kind: MediaDeviceKind) {
        self.permissions.insert(kind, PermissionStatus::Granted);
        self.broadcast_devices(kind);
    }

    pub fn permission_status(&self, kind: MediaDeviceKind) -> PermissionStatus {
        self.permissions.get(&kind).copied().unwrap_or_default()
    }

    /// Replace the device table, as after a hot-plug.
    pub fn set_devices(&mut self, devices: Vec<MediaDeviceInfo>) {
        self.devices = devices;
        for kind in self.watchers.kinds() {
            self.broadcast_devices(kind);
        }
    }

    pub fn add_device(&mut self, device: MediaDeviceInfo) {
        let kind = device.kind;
        self.devices.push(device);
        self.broadcast_devices(kind);
    }

    pub fn remove_device(&mut self, device_id: &str) {
        let kinds: Vec<MediaDeviceKind> = self
            .devices
            .iter()
            .filter(|d| d.device_id == device_id)
            .map(|d| d.kind)
            .collect();
        self.devices.retain(|d| d.device_id != device_id);
        for kind in kinds {
            self.broadcast_devices(kind);
        }
    }

    /// Change the active device from outside the components (another app,
    /// the OS default changing, a track being re-bound).
    pub fn set_active(&mut self, kind: MediaDeviceKind, device_id: &str) {
        self.active.insert(kind, device_id.to_string());
        self.watchers.send(
            kind,
            &DeviceEvent::ActiveDeviceChanged(device_id.to_string()),
        );
    }

    pub fn active_device(&self, kind: MediaDeviceKind) -> Option<&str> {
        self.active.get(&kind).map(String::as_str)
    }

    /// Report an error to every watcher of `kind`.
    pub fn emit_error(&mut self, kind: MediaDeviceKind, error: MediaDeviceError) {
        self.watchers.send(kind, &DeviceEvent::Error(error));
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> &[SourceRequest] {
        &self.requests
    }

    pub fn take_requests(&mut self) -> Vec<SourceRequest> {
        std::mem::take(&mut self.requests)
    }

    /// Device list as enumeration would currently report it.
    pub fn enumerate(&self, kind: MediaDeviceKind) -> Vec<MediaDeviceInfo> {
        let mut devices = self.devices.iter().filter(|d| d.kind == kind);

        if self.permission_status(kind) == PermissionStatus::Granted {
            return devices.cloned().collect();
        }

        // Without access, the real devices are hidden behind one anonymous entry.
        match devices.next() {
            Some(_) => vec![MediaDeviceInfo::new("", "", kind)],
            None => Vec::new(),
        }
    }

    fn broadcast_devices(&mut self, kind: MediaDeviceKind) {
        let event = DeviceEvent::DevicesChanged(self.enumerate(kind));
        self.watchers.send(kind, &event);
    }

    fn prompt(&mut self, kind: MediaDeviceKind) {
        match self.response {
            PermissionResponse::Grant => {
                self.permissions.insert(kind, PermissionStatus::Granted);
                self.broadcast_devices(kind);
            }
            PermissionResponse::Deny => {
                self.permissions.insert(kind, PermissionStatus::Denied);
                self.emit_error(kind, MediaDeviceError::PermissionDenied { kind });
            }
        }
    }
}

impl MediaDeviceSource for MemoryDeviceSource {
    fn watch(
        &mut self,
        kind: MediaDeviceKind,
        permission: PermissionRequest,
        track: Option<&TrackHandle>,
    ) -> Receiver<DeviceEvent> {
        self.requests.push(SourceRequest::Watch {
            kind,
            permission,
            track_id: track.map(|t| t.track_id.clone()),
        });

        if let Some(device_id) = track.and_then(|t| t.device_id.as_ref()) {
            self.active.insert(kind, device_id.clone());
        }

        let (sender, receiver) = self.watchers.add(kind);
        let _ = sender.send(DeviceEvent::DevicesChanged(self.enumerate(kind)));
        if let Some(active) = self.active.get(&kind) {
            let _ = sender.send(DeviceEvent::ActiveDeviceChanged(active.clone()));
        }

        if permission.is_requested() && self.permission_status(kind) != PermissionStatus::Granted {
            self.prompt(kind);
        }

        receiver
    }

    fn request_permissions(&mut self, kind: MediaDeviceKind) {
        debug!(%kind, "Permission request");
        self.requests.push(SourceRequest::RequestPermissions { kind });

        if self.permission_status(kind) == PermissionStatus::Granted {
            // Already accessible; re-enumerate like a fresh request would.
            self.broadcast_devices(kind);
        } else {
            self.prompt(kind);
        }
    }

    fn set_active_device(&mut self, kind: MediaDeviceKind, device_id: &str) {
        self.requests.push(SourceRequest::SetActiveDevice {
            kind,
            device_id: device_id.to_string(),
        });

        let known = self
            .devices
            .iter()
            .any(|d| d.kind == kind && d.device_id == device_id);

        if known {
            self.set_active(kind, device_id);
        } else {
            self.emit_error(
                kind,
                MediaDeviceError::DeviceNotFound {
                    device_id: device_id.to_string(),
                },
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mics() -> Vec<MediaDeviceInfo> {
        vec![
            MediaDeviceInfo::new("a1", "Mic 1", MediaDeviceKind::AudioInput),
            MediaDeviceInfo::new("a2", "Mic 2", MediaDeviceKind::AudioInput),
            MediaDeviceInfo::new("s1", "Speakers", MediaDeviceKind::AudioOutput),
        ]
    }

    fn drain(receiver: &Receiver<DeviceEvent>) -> Vec<DeviceEvent> {
        receiver.try_iter().collect()
    }

    #[test]
    fn test_enumeration_hides_devices_until_granted() {
        let mut source = MemoryDeviceSource::with_devices(mics());
        assert_eq!(
            source.enumerate(MediaDeviceKind::AudioInput),
            vec![MediaDeviceInfo::new("", "", MediaDeviceKind::AudioInput)]
        );
        assert!(source.enumerate(MediaDeviceKind::VideoInput).is_empty());

        source.grant(MediaDeviceKind::AudioInput);
        assert_eq!(source.enumerate(MediaDeviceKind::AudioInput).len(), 2);
    }

    #[test]
    fn test_watch_delivers_snapshot_and_active() {
        let mut source = MemoryDeviceSource::with_devices(mics());
        source.grant(MediaDeviceKind::AudioInput);
        source.set_active(MediaDeviceKind::AudioInput, "a1");

        let events = source.watch(
            MediaDeviceKind::AudioInput,
            PermissionRequest::NotRequested,
            None,
        );

        let events = drain(&events);
        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], DeviceEvent::DevicesChanged(list) if list.len() == 2));
        assert_eq!(events[1], DeviceEvent::ActiveDeviceChanged("a1".to_string()));
    }

    #[test]
    fn test_eager_watch_prompts_for_access() {
        let mut source = MemoryDeviceSource::with_devices(mics());
        let events = source.watch(
            MediaDeviceKind::AudioInput,
            PermissionRequest::Requested,
            None,
        );

        assert_eq!(
            source.permission_status(MediaDeviceKind::AudioInput),
            PermissionStatus::Granted
        );
        let last = drain(&events).pop().unwrap();
        assert!(matches!(last, DeviceEvent::DevicesChanged(list) if list.len() == 2));
    }

    #[test]
    fn test_denied_prompt_reports_error() {
        let mut source = MemoryDeviceSource::with_devices(mics());
        source.set_permission_response(PermissionResponse::Deny);
        let events = source.watch(
            MediaDeviceKind::AudioInput,
            PermissionRequest::NotRequested,
            None,
        );
        source.request_permissions(MediaDeviceKind::AudioInput);

        let last = drain(&events).pop().unwrap();
        assert_eq!(
            last,
            DeviceEvent::Error(MediaDeviceError::PermissionDenied {
                kind: MediaDeviceKind::AudioInput
            })
        );
        assert_eq!(
            source.permission_status(MediaDeviceKind::AudioInput),
            PermissionStatus::Denied
        );
    }

    #[test]
    fn test_set_active_unknown_device_is_an_error() {
        let mut source = MemoryDeviceSource::with_devices(mics());
        source.grant(MediaDeviceKind::AudioInput);
        let events = source.watch(
            MediaDeviceKind::AudioInput,
            PermissionRequest::NotRequested,
            None,
        );
        drain(&events);

        source.set_active_device(MediaDeviceKind::AudioInput, "nope");

        assert_eq!(
            drain(&events),
            vec![DeviceEvent::Error(MediaDeviceError::DeviceNotFound {
                device_id: "nope".to_string()
            })]
        );
        assert_eq!(source.active_device(MediaDeviceKind::AudioInput), None);
    }

    #[test]
    fn test_track_binding_sets_active_device() {
        let mut source = MemoryDeviceSource::with_devices(mics());
        let track = TrackHandle::new("TR_1", crate::media::TrackSource::Microphone).with_device("a2");

        let _events = source.watch(
            MediaDeviceKind::AudioInput,
            PermissionRequest::NotRequested,
            Some(&track),
        );

        assert_eq!(source.active_device(MediaDeviceKind::AudioInput), Some("a2"));
        assert_eq!(
            source.requests()[0],
            SourceRequest::Watch {
                kind: MediaDeviceKind::AudioInput,
                permission: PermissionRequest::NotRequested,
                track_id: Some("TR_1".to_string()),
            }
        );
    }

    #[test]
    fn test_hot_plug_reaches_watchers() {
        let mut source = MemoryDeviceSource::with_devices(mics());
        source.grant(MediaDeviceKind::AudioInput);
        let events = source.watch(
            MediaDeviceKind::AudioInput,
            PermissionRequest::NotRequested,
            None,
        );
        drain(&events);

        source.remove_device("a2");

        assert_eq!(
            drain(&events),
            vec![DeviceEvent::DevicesChanged(vec![MediaDeviceInfo::new(
                "a1",
                "Mic 1",
                MediaDeviceKind::AudioInput
            )])]
        );
    }
}
