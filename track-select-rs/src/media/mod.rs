//! Media device model and the enumeration collaborator contract.
//!
//! This module provides device kinds and snapshots, the permission latch,
//! the `MediaDeviceSource` trait components depend on, an in-memory
//! implementation of it, and audio level metering.

pub mod device;
pub mod level;
pub mod memory;
pub mod permission;
pub mod source;

pub use device::{
    DeviceEvent, MediaDeviceError, MediaDeviceInfo, MediaDeviceKind, ParseKindError,
    TrackHandle, TrackSource,
};
pub use level::{AudioLevelSource, AudioTrackRef, ManualLevelSource};
pub use memory::{MemoryDeviceSource, PermissionResponse, PermissionStatus};
pub use permission::PermissionRequest;
pub use source::{
    create_event_channel, shared, MediaDeviceSource, SharedDeviceSource, SourceRequest,
    WatcherSet,
};
