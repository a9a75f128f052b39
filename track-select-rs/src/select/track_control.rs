//! Track control component.
//!
//! Pairs a mute/unmute toggle with an optional level visualizer and a
//! compact device selector. The pressed/pending/disabled state belongs to the
//! caller; the control only reports what the user asked for.

use super::device_select::{
    DeviceSelectHandlers, DeviceSelectOptions, DeviceSelectView, DeviceSelector, SelectSize,
    SelectVariant,
};
use super::visualizer::BarVisualizer;
use crate::media::{AudioTrackRef, MediaDeviceError, MediaDeviceKind, SharedDeviceSource, TrackSource};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Bars drawn next to the toggle for a live audio track.
pub const VISUALIZER_BAR_COUNT: usize = 3;

/// Lowest bar height in percent.
pub const VISUALIZER_MIN_HEIGHT: f32 = 5.0;

/// Track control configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackControlOptions {
    pub kind: MediaDeviceKind,
    pub source: TrackSource,

    /// Track is enabled (unmuted)
    #[serde(default)]
    pub pressed: bool,

    /// A toggle request is in flight
    #[serde(default)]
    pub pending: bool,

    #[serde(default)]
    pub disabled: bool,

    #[serde(default)]
    pub variant: SelectVariant,
}

impl TrackControlOptions {
    pub fn new(kind: MediaDeviceKind, source: TrackSource) -> Self {
        Self {
            kind,
            source,
            pressed: false,
            pending: false,
            disabled: false,
            variant: SelectVariant::default(),
        }
    }

    /// Options for the usual capture track of `kind`.
    pub fn for_kind(kind: MediaDeviceKind) -> Self {
        Self::new(kind, TrackSource::for_kind(kind))
    }

    pub fn pressed(mut self, pressed: bool) -> Self {
        self.pressed = pressed;
        self
    }

    pub fn variant(mut self, variant: SelectVariant) -> Self {
        self.variant = variant;
        self
    }
}

/// Caller notifications for a track control.
#[derive(Default)]
pub struct TrackControlHandlers {
    on_pressed_change: Option<Box<dyn FnMut(bool)>>,
    on_media_device_error: Option<Box<dyn FnMut(MediaDeviceError)>>,
    on_active_device_change: Option<Box<dyn FnMut(&str)>>,
}

impl TrackControlHandlers {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_pressed_change(mut self, handler: impl FnMut(bool) + 'static) -> Self {
        self.on_pressed_change = Some(Box::new(handler));
        self
    }

    pub fn on_media_device_error(mut self, handler: impl FnMut(MediaDeviceError) + 'static) -> Self {
        self.on_media_device_error = Some(Box::new(handler));
        self
    }

    pub fn on_active_device_change(mut self, handler: impl FnMut(&str) + 'static) -> Self {
        self.on_active_device_change = Some(Box::new(handler));
        self
    }
}

/// Toggle state as the host should render it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToggleView {
    pub source: TrackSource,
    pub pressed: bool,
    pub pending: bool,
    pub disabled: bool,
    pub variant: SelectVariant,
}

/// Render model of a whole track control.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackControlView {
    pub toggle: ToggleView,

    /// Bar heights in percent, present when an audio track is attached
    pub visualizer: Option<Vec<f32>>,

    pub device_select: Option<DeviceSelectView>,
}

struct Visualizer {
    track: AudioTrackRef,
    bars: BarVisualizer,
}

/// Mute toggle + level visualizer + device selector.
pub struct TrackControl {
    source: TrackSource,
    pressed: bool,
    pending: bool,
    disabled: bool,
    variant: SelectVariant,
    visualizer: Option<Visualizer>,
    device_select: DeviceSelector,
    on_pressed_change: Option<Box<dyn FnMut(bool)>>,
}

impl TrackControl {
    pub fn new(
        devices: SharedDeviceSource,
        options: TrackControlOptions,
        audio_track: Option<AudioTrackRef>,
        handlers: TrackControlHandlers,
    ) -> Self {
        let TrackControlHandlers {
            on_pressed_change,
            on_media_device_error,
            on_active_device_change,
        } = handlers;

        let mut select_handlers = DeviceSelectHandlers::new();
        select_handlers.set_error_handler(on_media_device_error);
        select_handlers.set_active_device_handler(on_active_device_change);

        // The secondary picker only asks for access once the user opens it.
        let select_options = DeviceSelectOptions::new(options.kind)
            .request_permissions(false)
            .size(SelectSize::Sm)
            .variant(options.variant);

        Self {
            source: options.source,
            pressed: options.pressed,
            pending: options.pending,
            disabled: options.disabled,
            variant: options.variant,
            visualizer: audio_track.map(Visualizer::new),
            device_select: DeviceSelector::new(devices, select_options, select_handlers),
            on_pressed_change,
        }
    }

    pub fn kind(&self) -> MediaDeviceKind {
        self.device_select.kind()
    }

    pub fn source(&self) -> TrackSource {
        self.source
    }

    pub fn pressed(&self) -> bool {
        self.pressed
    }

    pub fn pending(&self) -> bool {
        self.pending
    }

    pub fn disabled(&self) -> bool {
        self.disabled
    }

    /// Ask to flip the pressed state. The control itself stays unchanged
    /// until the caller applies the result with [`set_pressed`].
    ///
    /// Returns false when the toggle is disabled or a request is in flight.
    ///
    /// [`set_pressed`]: TrackControl::set_pressed
    pub fn toggle(&mut self) -> bool {
        if self.disabled || self.pending {
            debug!(source = ?self.source, "Toggle ignored");
            return false;
        }

        if let Some(handler) = self.on_pressed_change.as_mut() {
            handler(!self.pressed);
        }
        true
    }

    pub fn set_pressed(&mut self, pressed: bool) {
        self.pressed = pressed;
    }

    pub fn set_pending(&mut self, pending: bool) {
        self.pending = pending;
    }

    pub fn set_disabled(&mut self, disabled: bool) {
        self.disabled = disabled;
    }

    /// Attach or detach the audio track driving the visualizer.
    pub fn set_audio_track(&mut self, audio_track: Option<AudioTrackRef>) {
        self.visualizer = audio_track.map(Visualizer::new);
    }

    pub fn audio_track(&self) -> Option<&AudioTrackRef> {
        self.visualizer.as_ref().map(|v| &v.track)
    }

    pub fn device_select(&self) -> &DeviceSelector {
        &self.device_select
    }

    pub fn device_select_mut(&mut self) -> &mut DeviceSelector {
        &mut self.device_select
    }

    /// Handle pending device events. Returns the number handled.
    pub fn process_events(&mut self) -> usize {
        self.device_select.process_events()
    }

    /// Take a level reading for the visualizer, if one is attached.
    pub fn tick(&mut self) {
        if let Some(visualizer) = self.visualizer.as_mut() {
            visualizer.sample();
        }
    }

    pub fn view(&self) -> TrackControlView {
        TrackControlView {
            toggle: ToggleView {
                source: self.source,
                pressed: self.pressed,
                pending: self.pending,
                disabled: self.disabled,
                variant: self.variant,
            },
            visualizer: self.visualizer.as_ref().map(|v| v.bars.bars().to_vec()),
            device_select: self.device_select.view(),
        }
    }
}

impl Visualizer {
    fn new(track: AudioTrackRef) -> Self {
        Self {
            track,
            bars: BarVisualizer::new(VISUALIZER_BAR_COUNT, VISUALIZER_MIN_HEIGHT),
        }
    }

    fn sample(&mut self) {
        self.bars.sample(self.track.levels.as_ref());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::{
        shared, ManualLevelSource, MediaDeviceInfo, MediaDeviceSource, MemoryDeviceSource,
        PermissionRequest, SourceRequest, TrackHandle,
    };
    use std::cell::RefCell;
    use std::rc::Rc;

    const KIND: MediaDeviceKind = MediaDeviceKind::AudioInput;

    fn mics() -> MemoryDeviceSource {
        let mut source = MemoryDeviceSource::with_devices(vec![
            MediaDeviceInfo::new("a1", "Mic 1", KIND),
            MediaDeviceInfo::new("a2", "Mic 2", KIND),
        ]);
        source.grant(KIND);
        source
    }

    #[test]
    fn test_toggle_reports_inverse_without_changing_state() {
        let (_, devices) = shared(mics());
        let requested = Rc::new(RefCell::new(Vec::new()));
        let seen = requested.clone();
        let mut control = TrackControl::new(
            devices,
            TrackControlOptions::for_kind(KIND).pressed(true),
            None,
            TrackControlHandlers::new().on_pressed_change(move |p| seen.borrow_mut().push(p)),
        );

        assert!(control.toggle());
        assert!(control.pressed());
        assert_eq!(*requested.borrow(), vec![false]);

        control.set_pressed(false);
        control.toggle();
        assert_eq!(*requested.borrow(), vec![false, true]);
    }

    #[test]
    fn test_toggle_ignored_while_pending_or_disabled() {
        let (_, devices) = shared(mics());
        let calls = Rc::new(RefCell::new(0));
        let count = calls.clone();
        let mut control = TrackControl::new(
            devices,
            TrackControlOptions::for_kind(KIND),
            None,
            TrackControlHandlers::new().on_pressed_change(move |_| *count.borrow_mut() += 1),
        );

        control.set_pending(true);
        assert!(!control.toggle());
        control.set_pending(false);
        control.set_disabled(true);
        assert!(!control.toggle());

        assert_eq!(*calls.borrow(), 0);
    }

    #[test]
    fn test_embedded_selector_never_requests_eagerly() {
        let (memory, devices) = shared(mics());
        let control = TrackControl::new(
            devices,
            TrackControlOptions::for_kind(KIND),
            None,
            TrackControlHandlers::new(),
        );

        assert_eq!(
            memory.borrow().requests(),
            &[SourceRequest::Watch {
                kind: KIND,
                permission: PermissionRequest::NotRequested,
                track_id: None,
            }]
        );
        assert_eq!(control.device_select().permission(), PermissionRequest::NotRequested);
    }

    #[test]
    fn test_view_uses_compact_selector() {
        let (_, devices) = shared(mics());
        let mut control = TrackControl::new(
            devices,
            TrackControlOptions::for_kind(KIND).variant(SelectVariant::Secondary),
            None,
            TrackControlHandlers::new(),
        );
        control.process_events();

        let view = control.view();
        let select = view.device_select.unwrap();
        assert_eq!(select.size, SelectSize::Sm);
        assert_eq!(select.variant, SelectVariant::Secondary);
        assert_eq!(select.placeholder, None);
        assert_eq!(view.toggle.source, TrackSource::Microphone);
        assert_eq!(view.visualizer, None);
    }

    #[test]
    fn test_selection_is_forwarded_to_caller() {
        let (_, devices) = shared(mics());
        let changes = Rc::new(RefCell::new(Vec::new()));
        let seen = changes.clone();
        let mut control = TrackControl::new(
            devices,
            TrackControlOptions::for_kind(KIND),
            None,
            TrackControlHandlers::new()
                .on_active_device_change(move |id| seen.borrow_mut().push(id.to_string())),
        );
        control.process_events();

        control.device_select_mut().open();
        control.device_select_mut().select_device("a2");
        control.process_events();

        assert_eq!(*changes.borrow(), vec!["a2".to_string()]);
        assert_eq!(control.device_select().active_device_id(), Some("a2"));
    }

    #[test]
    fn test_errors_are_forwarded_to_caller() {
        let (memory, devices) = shared(mics());
        let errors = Rc::new(RefCell::new(Vec::new()));
        let seen = errors.clone();
        let mut control = TrackControl::new(
            devices,
            TrackControlOptions::for_kind(KIND),
            None,
            TrackControlHandlers::new().on_media_device_error(move |e| seen.borrow_mut().push(e)),
        );

        memory.borrow_mut().set_active_device(KIND, "missing");
        control.process_events();

        assert_eq!(
            *errors.borrow(),
            vec![MediaDeviceError::DeviceNotFound {
                device_id: "missing".to_string()
            }]
        );
    }

    #[test]
    fn test_visualizer_follows_attached_track() {
        let (_, devices) = shared(mics());
        let levels = Rc::new(ManualLevelSource::new());
        let track = AudioTrackRef::new(
            TrackHandle::new("TR_mic", TrackSource::Microphone),
            levels.clone(),
        );
        let mut control = TrackControl::new(
            devices,
            TrackControlOptions::for_kind(KIND).pressed(true),
            Some(track),
            TrackControlHandlers::new(),
        );
        assert_eq!(control.view().visualizer, Some(vec![5.0, 5.0, 5.0]));

        levels.set_peaks(vec![1.0]);
        control.tick();
        assert_eq!(control.view().visualizer, Some(vec![100.0, 100.0, 100.0]));

        control.set_audio_track(None);
        control.tick();
        assert_eq!(control.view().visualizer, None);
    }

    #[test]
    fn test_options_deserialize_with_defaults() {
        let options: TrackControlOptions =
            serde_json::from_str(r#"{"kind":"audioinput","source":"microphone"}"#).unwrap();
        assert_eq!(options, TrackControlOptions::for_kind(KIND));
    }
}
