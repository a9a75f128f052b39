//! Device selector component.
//!
//! Tracks the devices of one kind reported by a [`MediaDeviceSource`], the
//! collaborator's active device, and whether the selection surface is open.
//! Opening the surface for the first time latches a permission request so
//! devices hidden by an earlier failed or skipped request can appear.
//!
//! [`MediaDeviceSource`]: crate::media::MediaDeviceSource

use crate::media::{
    DeviceEvent, MediaDeviceError, MediaDeviceInfo, MediaDeviceKind, PermissionRequest,
    SharedDeviceSource, TrackHandle,
};
use serde::{Deserialize, Serialize};
use std::sync::mpsc::{Receiver, TryRecvError};
use tracing::{debug, info, warn};

/// Fewest real devices for which a choice is offered.
pub const MIN_SELECTABLE_DEVICES: usize = 2;

/// Open/closed state of the selection surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectState {
    #[default]
    Closed,
    Open,
}

impl SelectState {
    pub fn is_open(&self) -> bool {
        matches!(self, SelectState::Open)
    }
}

/// Trigger size. `Sm` shows only the icon, without the selected label.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectSize {
    #[default]
    Default,
    Sm,
}

/// Visual emphasis of the trigger.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SelectVariant {
    #[default]
    Primary,
    Secondary,
}

/// Selector configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSelectOptions {
    pub kind: MediaDeviceKind,

    /// Prompt for device access as soon as the selector is created
    #[serde(default)]
    pub request_permissions: bool,

    #[serde(default)]
    pub size: SelectSize,

    #[serde(default)]
    pub variant: SelectVariant,

    /// Track whose device the collaborator should keep in sync with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub track: Option<TrackHandle>,
}

impl DeviceSelectOptions {
    pub fn new(kind: MediaDeviceKind) -> Self {
        Self {
            kind,
            request_permissions: false,
            size: SelectSize::default(),
            variant: SelectVariant::default(),
            track: None,
        }
    }

    pub fn request_permissions(mut self, request: bool) -> Self {
        self.request_permissions = request;
        self
    }

    pub fn size(mut self, size: SelectSize) -> Self {
        self.size = size;
        self
    }

    pub fn variant(mut self, variant: SelectVariant) -> Self {
        self.variant = variant;
        self
    }

    pub fn track(mut self, track: TrackHandle) -> Self {
        self.track = Some(track);
        self
    }
}

type ErrorHandler = Box<dyn FnMut(MediaDeviceError)>;
type DeviceListHandler = Box<dyn FnMut(&[MediaDeviceInfo])>;
type ActiveDeviceHandler = Box<dyn FnMut(&str)>;

/// Caller notifications. Every handler is optional.
#[derive(Default)]
pub struct DeviceSelectHandlers {
    on_media_device_error: Option<ErrorHandler>,
    on_device_list_change: Option<DeviceListHandler>,
    on_active_device_change: Option<ActiveDeviceHandler>,
}

impl DeviceSelectHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_media_device_error(mut self, handler: impl FnMut(MediaDeviceError) + 'static) -> Self {
        self.on_media_device_error = Some(Box::new(handler));
        self
    }

    pub fn on_device_list_change(
        mut self,
        handler: impl FnMut(&[MediaDeviceInfo]) + 'static,
    ) -> Self {
        self.on_device_list_change = Some(Box::new(handler));
        self
    }

    pub fn on_active_device_change(mut self, handler: impl FnMut(&str) + 'static) -> Self {
        self.on_active_device_change = Some(Box::new(handler));
        self
    }

    pub(crate) fn set_error_handler(&mut self, handler: Option<ErrorHandler>) {
        self.on_media_device_error = handler;
    }

    pub(crate) fn set_active_device_handler(&mut self, handler: Option<ActiveDeviceHandler>) {
        self.on_active_device_change = handler;
    }
}

/// One entry of the selection surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectItem {
    pub value: String,
    pub label: String,
}

/// What the host should render for a selector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceSelectView {
    pub kind: MediaDeviceKind,
    pub open: bool,

    /// Active device id, if the collaborator reported one
    pub value: Option<String>,

    /// Trigger text shown while no value is selected (absent for `Sm`)
    pub placeholder: Option<String>,

    /// Whether the trigger shows the selected label
    pub show_value: bool,

    pub items: Vec<SelectItem>,
    pub size: SelectSize,
    pub variant: SelectVariant,
}

/// Devices that can actually be offered: placeholder entries removed,
/// everything else passed through in collaborator order. Labels are not
/// deduplicated; distinct devices may share one.
pub fn filter_devices(devices: &[MediaDeviceInfo]) -> Vec<MediaDeviceInfo> {
    devices
        .iter()
        .filter(|d| !d.is_placeholder())
        .cloned()
        .collect()
}

/// Selector for the active device of one kind.
pub struct DeviceSelector {
    source: SharedDeviceSource,
    kind: MediaDeviceKind,
    size: SelectSize,
    variant: SelectVariant,
    state: SelectState,
    permission: PermissionRequest,

    /// Last list exactly as the collaborator reported it
    reported: Vec<MediaDeviceInfo>,
    active_device_id: Option<String>,
    events: Receiver<DeviceEvent>,
    handlers: DeviceSelectHandlers,
}

impl DeviceSelector {
    /// Create a selector and start watching `options.kind` on `source`.
    pub fn new(
        source: SharedDeviceSource,
        options: DeviceSelectOptions,
        handlers: DeviceSelectHandlers,
    ) -> Self {
        let permission = PermissionRequest::from_flag(options.request_permissions);
        let events = source
            .borrow_mut()
            .watch(options.kind, permission, options.track.as_ref());

        debug!(kind = %options.kind, ?permission, "Device selector created");

        Self {
            source,
            kind: options.kind,
            size: options.size,
            variant: options.variant,
            state: SelectState::Closed,
            permission,
            reported: Vec::new(),
            active_device_id: None,
            events,
            handlers,
        }
    }

    pub fn kind(&self) -> MediaDeviceKind {
        self.kind
    }

    pub fn state(&self) -> SelectState {
        self.state
    }

    pub fn permission(&self) -> PermissionRequest {
        self.permission
    }

    pub fn active_device_id(&self) -> Option<&str> {
        self.active_device_id.as_deref()
    }

    /// Selectable devices, derived from the last reported list.
    pub fn devices(&self) -> Vec<MediaDeviceInfo> {
        filter_devices(&self.reported)
    }

    /// True when there is a meaningful choice to offer.
    pub fn is_visible(&self) -> bool {
        self.devices().len() >= MIN_SELECTABLE_DEVICES
    }

    pub fn open(&mut self) {
        self.set_open(true);
    }

    pub fn close(&mut self) {
        self.set_open(false);
    }

    /// Open or close the selection surface.
    pub fn set_open(&mut self, open: bool) {
        match (self.state, open) {
            (SelectState::Closed, true) => {
                self.state = SelectState::Open;
                if self.permission.latch() {
                    info!(kind = %self.kind, "Requesting device permissions on open");
                    self.source.borrow_mut().request_permissions(self.kind);
                }
            }
            (SelectState::Open, false) => {
                self.state = SelectState::Closed;
            }
            _ => {}
        }
    }

    /// Make `device_id` the active device and notify the caller.
    ///
    /// Failures are reported later by the collaborator through the error
    /// handler.
    pub fn select_device(&mut self, device_id: &str) {
        if !self.devices().iter().any(|d| d.device_id == device_id) {
            warn!(kind = %self.kind, device_id, "Selecting a device that is not offered");
        }

        info!(kind = %self.kind, device_id, "Selecting device");
        self.source
            .borrow_mut()
            .set_active_device(self.kind, device_id);

        if let Some(handler) = self.handlers.on_active_device_change.as_mut() {
            handler(device_id);
        }
    }

    /// Drive the collaborator and handle every queued event, in order.
    ///
    /// Returns the number of events handled.
    pub fn process_events(&mut self) -> usize {
        self.source.borrow_mut().poll();

        let mut handled = 0;
        loop {
            match self.events.try_recv() {
                Ok(event) => {
                    self.handle_event(event);
                    handled += 1;
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    debug!(kind = %self.kind, "Device source stopped reporting");
                    break;
                }
            }
        }
        handled
    }

    /// Handle a single collaborator event.
    pub fn handle_event(&mut self, event: DeviceEvent) {
        match event {
            DeviceEvent::DevicesChanged(devices) => {
                self.reported = devices;
                let devices = self.devices();
                debug!(kind = %self.kind, count = devices.len(), "Device list changed");

                if let Some(handler) = self.handlers.on_device_list_change.as_mut() {
                    handler(&devices);
                }
            }
            DeviceEvent::ActiveDeviceChanged(device_id) => {
                debug!(kind = %self.kind, %device_id, "Active device changed");
                self.active_device_id = Some(device_id);
            }
            DeviceEvent::Error(error) => match self.handlers.on_media_device_error.as_mut() {
                Some(handler) => handler(error),
                None => debug!(kind = %self.kind, %error, "Dropping media device error"),
            },
        }
    }

    /// Render model, or `None` when there is nothing to choose from.
    pub fn view(&self) -> Option<DeviceSelectView> {
        let devices = self.devices();
        if devices.len() < MIN_SELECTABLE_DEVICES {
            return None;
        }

        let compact = self.size == SelectSize::Sm;
        Some(DeviceSelectView {
            kind: self.kind,
            open: self.state.is_open(),
            value: self.active_device_id.clone(),
            placeholder: (!compact).then(|| format!("Select a {}", self.kind)),
            show_value: !compact,
            items: devices
                .into_iter()
                .map(|d| SelectItem {
                    value: d.device_id,
                    label: d.label,
                })
                .collect(),
            size: self.size,
            variant: self.variant,
        })
    }
}
