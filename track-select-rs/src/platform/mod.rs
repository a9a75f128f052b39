//! Platform device collaborators.
//!
//! On Windows, `core_audio` implements the device source on top of the
//! MMDevice API. Other platforms rely on a host-supplied source.

#[cfg(windows)]
pub mod core_audio;

#[cfg(windows)]
pub use core_audio::{ComGuard, CoreAudioSource, LevelMeter, VolumeController};
