//! `MediaDeviceSource` backed by Windows Core Audio.
//!
//! Desktop endpoints need no access prompt, so enumeration always reports
//! real devices and a permission request simply re-enumerates. The active
//! device of a kind is the Console default endpoint.

use super::enumerator::{data_flow, EndpointEnumerator};
use super::notifications::{EndpointChange, EndpointNotificationClient};
use super::policy;
use crate::media::{
    DeviceEvent, MediaDeviceError, MediaDeviceInfo, MediaDeviceKind, MediaDeviceSource,
    PermissionRequest, TrackHandle, WatcherSet,
};
use std::sync::mpsc::{self, Receiver};
use tracing::{debug, info, warn};
use windows::Win32::Media::Audio::IMMNotificationClient;

/// Core Audio device collaborator.
pub struct CoreAudioSource {
    endpoints: EndpointEnumerator,
    notification_client: IMMNotificationClient,
    changes: Receiver<EndpointChange>,
    watchers: WatcherSet,
}

impl CoreAudioSource {
    /// Create the source and register for endpoint notifications.
    ///
    /// Note: COM must be initialized before calling this function.
    pub fn new() -> Result<Self, MediaDeviceError> {
        let endpoints = EndpointEnumerator::new()?;
        let (sender, changes) = mpsc::channel();
        let notification_client =
            EndpointNotificationClient::new(sender).register(endpoints.raw_enumerator())?;

        Ok(Self {
            endpoints,
            notification_client,
            changes,
            watchers: WatcherSet::new(),
        })
    }

    pub fn endpoints(&self) -> &EndpointEnumerator {
        &self.endpoints
    }

    fn snapshot(
        &self,
        kind: MediaDeviceKind,
    ) -> Result<(Vec<MediaDeviceInfo>, Option<String>), MediaDeviceError> {
        let devices = self.endpoints.devices(kind)?;
        let active = self.endpoints.default_device_id(kind)?;
        Ok((devices, active))
    }

    fn publish_devices(&mut self, kind: MediaDeviceKind) {
        let event = match self.endpoints.devices(kind) {
            Ok(devices) => DeviceEvent::DevicesChanged(devices),
            Err(error) => DeviceEvent::Error(error),
        };
        self.watchers.send(kind, &event);
    }
}

/// Event to publish after a default-endpoint switch.
///
/// A successful switch publishes nothing: the Console-role default change
/// notification reports the new active device when polled.
fn switch_event(
    kind: MediaDeviceKind,
    device_id: &str,
    result: Result<(), MediaDeviceError>,
) -> Option<DeviceEvent> {
    match result {
        Ok(()) => {
            info!(%kind, device_id, "Default endpoint changed");
            None
        }
        Err(error) => {
            warn!(%kind, device_id, %error, "Failed to change default endpoint");
            Some(DeviceEvent::Error(error))
        }
    }
}

impl Drop for CoreAudioSource {
    fn drop(&mut self) {
        unsafe {
            let _ = self
                .endpoints
                .raw_enumerator()
                .UnregisterEndpointNotificationCallback(&self.notification_client);
        }
    }
}

impl MediaDeviceSource for CoreAudioSource {
    fn watch(
        &mut self,
        kind: MediaDeviceKind,
        _permission: PermissionRequest,
        track: Option<&TrackHandle>,
    ) -> Receiver<DeviceEvent> {
        if let Some(track) = track {
            debug!(%kind, track_id = %track.track_id, "Endpoint tracks follow the default device");
        }

        let (sender, receiver) = self.watchers.add(kind);
        match self.snapshot(kind) {
            Ok((devices, active)) => {
                let _ = sender.send(DeviceEvent::DevicesChanged(devices));
                if let Some(active) = active {
                    let _ = sender.send(DeviceEvent::ActiveDeviceChanged(active));
                }
            }
            Err(error) => {
                let _ = sender.send(DeviceEvent::Error(error));
            }
        }
        receiver
    }

    fn request_permissions(&mut self, kind: MediaDeviceKind) {
        self.publish_devices(kind);
    }

    fn set_active_device(&mut self, kind: MediaDeviceKind, device_id: &str) {
        let result = data_flow(kind).and_then(|_| policy::set_default_endpoint(device_id));
        if let Some(event) = switch_event(kind, device_id, result) {
            self.watchers.send(kind, &event);
        }
    }

    fn poll(&mut self) {
        let changes: Vec<EndpointChange> = self.changes.try_iter().collect();
        if changes.is_empty() {
            return;
        }

        let mut topology_changed = false;
        for change in changes {
            match change {
                EndpointChange::Topology => topology_changed = true,
                EndpointChange::DefaultChanged {
                    kind,
                    device_id: Some(device_id),
                } => {
                    self.watchers
                        .send(kind, &DeviceEvent::ActiveDeviceChanged(device_id));
                }
                EndpointChange::DefaultChanged { device_id: None, .. } => {}
            }
        }

        if topology_changed {
            for kind in self.watchers.kinds() {
                self.publish_devices(kind);
            }
        }
    }
}
