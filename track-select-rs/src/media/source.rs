//! Device enumeration collaborator contract.
//!
//! A `MediaDeviceSource` lists devices, tracks the active one per kind and
//! switches it on request. Results are never returned directly: every
//! outcome arrives later as a [`DeviceEvent`] on the channel handed out by
//! [`MediaDeviceSource::watch`].

use super::device::{DeviceEvent, MediaDeviceKind, TrackHandle};
use super::permission::PermissionRequest;
use std::cell::RefCell;
use std::rc::Rc;
use std::sync::mpsc::{Receiver, Sender};

/// External device enumeration service.
pub trait MediaDeviceSource {
    /// Start watching devices of `kind`.
    ///
    /// The current device list (and active device, if known) should be
    /// delivered on the returned channel. With `PermissionRequest::Requested`
    /// the source prompts for access eagerly.
    fn watch(
        &mut self,
        kind: MediaDeviceKind,
        permission: PermissionRequest,
        track: Option<&TrackHandle>,
    ) -> Receiver<DeviceEvent>;

    /// (Re-)request access to devices of `kind`.
    fn request_permissions(&mut self, kind: MediaDeviceKind);

    /// Make `device_id` the active device for `kind`.
    fn set_active_device(&mut self, kind: MediaDeviceKind, device_id: &str);

    /// Advance pending asynchronous work (platform notifications etc.).
    fn poll(&mut self) {}
}

/// Collaborator handle shared by the components of one UI thread.
pub type SharedDeviceSource = Rc<RefCell<dyn MediaDeviceSource>>;

/// Wrap a collaborator for injection into components.
pub fn shared<S: MediaDeviceSource + 'static>(source: S) -> (Rc<RefCell<S>>, SharedDeviceSource) {
    let concrete = Rc::new(RefCell::new(source));
    let erased: SharedDeviceSource = concrete.clone();
    (concrete, erased)
}

/// Creates an event channel and returns both ends.
pub fn create_event_channel() -> (Sender<DeviceEvent>, Receiver<DeviceEvent>) {
    std::sync::mpsc::channel()
}

/// A request a component issued to its collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceRequest {
    Watch {
        kind: MediaDeviceKind,
        permission: PermissionRequest,
        track_id: Option<String>,
    },
    RequestPermissions {
        kind: MediaDeviceKind,
    },
    SetActiveDevice {
        kind: MediaDeviceKind,
        device_id: String,
    },
}

/// Senders for every live watch, keyed by device kind.
///
/// Watches whose receiver has been dropped are pruned on the next send.
#[derive(Debug, Default)]
pub struct WatcherSet {
    watchers: Vec<(MediaDeviceKind, Sender<DeviceEvent>)>,
}

impl WatcherSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new watcher for `kind` and return its receiving end.
    pub fn add(&mut self, kind: MediaDeviceKind) -> (Sender<DeviceEvent>, Receiver<DeviceEvent>) {
        let (sender, receiver) = create_event_channel();
        self.watchers.push((kind, sender.clone()));
        (sender, receiver)
    }

    /// Send `event` to every watcher of `kind`.
    pub fn send(&mut self, kind: MediaDeviceKind, event: &DeviceEvent) {
        self.watchers.retain(|(watched, sender)| {
            if *watched != kind {
                return true;
            }
            sender.send(event.clone()).is_ok()
        });
    }

    /// Kinds with at least one live watcher, in registration order.
    pub fn kinds(&self) -> Vec<MediaDeviceKind> {
        let mut kinds = Vec::new();
        for (kind, _) in &self.watchers {
            if !kinds.contains(kind) {
                kinds.push(*kind);
            }
        }
        kinds
    }

    pub fn len(&self) -> usize {
        self.watchers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.watchers.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaDeviceInfo;

    #[test]
    fn test_send_reaches_only_matching_kind() {
        let mut watchers = WatcherSet::new();
        let (_, mics) = watchers.add(MediaDeviceKind::AudioInput);
        let (_, cams) = watchers.add(MediaDeviceKind::VideoInput);

        watchers.send(
            MediaDeviceKind::AudioInput,
            &DeviceEvent::ActiveDeviceChanged("a1".to_string()),
        );

        assert_eq!(
            mics.try_recv().unwrap(),
            DeviceEvent::ActiveDeviceChanged("a1".to_string())
        );
        assert!(cams.try_recv().is_err());
    }

    #[test]
    fn test_dropped_watchers_are_pruned() {
        let mut watchers = WatcherSet::new();
        let (sender, receiver) = watchers.add(MediaDeviceKind::AudioInput);
        drop(sender);
        drop(receiver);

        watchers.send(
            MediaDeviceKind::AudioInput,
            &DeviceEvent::DevicesChanged(vec![MediaDeviceInfo::new(
                "a1",
                "Mic",
                MediaDeviceKind::AudioInput,
            )]),
        );

        assert!(watchers.is_empty());
    }

    #[test]
    fn test_kinds_are_deduplicated() {
        let mut watchers = WatcherSet::new();
        let _a = watchers.add(MediaDeviceKind::AudioInput);
        let _b = watchers.add(MediaDeviceKind::AudioInput);
        let _c = watchers.add(MediaDeviceKind::AudioOutput);

        assert_eq!(
            watchers.kinds(),
            vec![MediaDeviceKind::AudioInput, MediaDeviceKind::AudioOutput]
        );
        assert_eq!(watchers.len(), 3);
    }
}
