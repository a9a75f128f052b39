//! Device selection components.
//!
//! `DeviceSelector` owns the device list and the permission latch for one
//! device kind; `TrackControl` composes a mute toggle, a level visualizer and
//! a compact `DeviceSelector`. Both produce plain view models for the host to
//! render.

pub mod device_select;
pub mod track_control;
pub mod visualizer;

pub use device_select::{
    filter_devices, DeviceSelectHandlers, DeviceSelectOptions, DeviceSelectView, DeviceSelector,
    SelectItem, SelectSize, SelectState, SelectVariant,
};
pub use track_control::{
    ToggleView, TrackControl, TrackControlHandlers, TrackControlOptions, TrackControlView,
};
pub use visualizer::BarVisualizer;
