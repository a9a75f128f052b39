//! Track Select - Library
//!
//! Media device selection and track toggle components for conferencing
//! clients.
//!
//! ## Features
//!
//! - Device selector per device kind, hidden until there is a real choice
//! - Permission re-request the first time the selector is opened
//! - Mute/unmute toggle with a bar-style audio level visualizer
//! - In-memory device source behaving like a browser's media devices
//! - Windows Core Audio device source with hot-plug notifications

pub mod config;
pub mod media;
pub mod platform;
pub mod select;

pub use config::{AppConfig, ConfigError};
pub use media::{
    DeviceEvent, MediaDeviceError, MediaDeviceInfo, MediaDeviceKind, MediaDeviceSource,
    MemoryDeviceSource, PermissionRequest, SharedDeviceSource, TrackHandle, TrackSource,
};
pub use select::{
    DeviceSelectHandlers, DeviceSelectOptions, DeviceSelectView, DeviceSelector, TrackControl,
    TrackControlHandlers, TrackControlOptions, TrackControlView,
};
