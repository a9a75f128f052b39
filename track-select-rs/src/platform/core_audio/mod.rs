//! Windows Core Audio device collaborator.
//!
//! Enumerates capture and render endpoints, switches the default endpoint,
//! listens for hot-plug notifications and reads endpoint level meters.

pub mod capture;
pub mod enumerator;
pub mod notifications;
pub mod policy;
pub mod source;
pub mod volume;

pub use capture::LevelMeter;
pub use enumerator::EndpointEnumerator;
pub use source::CoreAudioSource;
pub use volume::VolumeController;

use crate::media::MediaDeviceError;
use windows::Win32::System::Com::{CoInitializeEx, CoUninitialize, COINIT_APARTMENTTHREADED};

impl From<windows::core::Error> for MediaDeviceError {
    fn from(err: windows::core::Error) -> Self {
        MediaDeviceError::Platform(err.to_string())
    }
}

/// COM initialization guard that uninitializes COM on drop.
pub struct ComGuard {
    _private: (),
}

impl ComGuard {
    /// Initialize COM for the current thread.
    pub fn new() -> Result<Self, MediaDeviceError> {
        unsafe {
            // Apartment-threaded: sources live on the UI thread
            CoInitializeEx(None, COINIT_APARTMENTTHREADED).ok()?;
        }
        Ok(Self { _private: () })
    }
}

impl Drop for ComGuard {
    fn drop(&mut self) {
        unsafe {
            CoUninitialize();
        }
    }
}
