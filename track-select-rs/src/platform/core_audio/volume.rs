//! Endpoint mute control using IAudioEndpointVolume.

use crate::media::MediaDeviceError;
use windows::Win32::Media::Audio::{Endpoints::IAudioEndpointVolume, IMMDevice};
use windows::Win32::System::Com::CLSCTX_ALL;

/// Mute controller for a specific endpoint.
pub struct VolumeController {
    endpoint_volume: IAudioEndpointVolume,
}

impl VolumeController {
    pub fn new(device: &IMMDevice) -> Result<Self, MediaDeviceError> {
        unsafe {
            let endpoint_volume: IAudioEndpointVolume = device.Activate(CLSCTX_ALL, None)?;
            Ok(Self { endpoint_volume })
        }
    }

    /// Get the current mute state.
    pub fn get_mute(&self) -> Result<bool, MediaDeviceError> {
        unsafe { Ok(self.endpoint_volume.GetMute()?.as_bool()) }
    }

    /// Set the mute state.
    pub fn set_mute(&self, muted: bool) -> Result<(), MediaDeviceError> {
        unsafe {
            self.endpoint_volume.SetMute(muted, std::ptr::null())?;
        }
        Ok(())
    }
}
