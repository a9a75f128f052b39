//! Endpoint level metering using IAudioMeterInformation.

use super::volume::VolumeController;
use crate::media::{AudioLevelSource, MediaDeviceError};
use windows::Win32::Media::Audio::{Endpoints::IAudioMeterInformation, IMMDevice};
use windows::Win32::System::Com::CLSCTX_ALL;

/// Level meter for a specific endpoint.
pub struct LevelMeter {
    meter_info: IAudioMeterInformation,
    volume: Option<VolumeController>,
}

impl LevelMeter {
    /// Create a new LevelMeter for the given endpoint.
    pub fn new(device: &IMMDevice) -> Result<Self, MediaDeviceError> {
        unsafe {
            let meter_info: IAudioMeterInformation = device.Activate(CLSCTX_ALL, None)?;

            Ok(Self {
                meter_info,
                // Mute state is optional; some endpoints expose no volume control
                volume: VolumeController::new(device).ok(),
            })
        }
    }

    /// Get the current peak level across channels (0.0 to 1.0).
    pub fn peak_level(&self) -> Result<f32, MediaDeviceError> {
        unsafe { Ok(self.meter_info.GetPeakValue()?) }
    }
}

impl AudioLevelSource for LevelMeter {
    fn channel_peaks(&self) -> Result<Vec<f32>, MediaDeviceError> {
        unsafe {
            let channel_count = self.meter_info.GetMeteringChannelCount()?;
            if channel_count == 0 {
                return Ok(vec![self.peak_level()?]);
            }

            let mut peaks = vec![0.0f32; channel_count as usize];
            self.meter_info.GetChannelsPeakValues(&mut peaks)?;
            Ok(peaks)
        }
    }

    fn is_muted(&self) -> bool {
        self.volume
            .as_ref()
            .and_then(|v| v.get_mute().ok())
            .unwrap_or(false)
    }
}
