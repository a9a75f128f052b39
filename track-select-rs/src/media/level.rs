//! Audio level metering.
//!
//! Level sources report linear channel peaks (0.0 to 1.0); helpers map them
//! onto the -60dB..0dB scale used by meters.

use super::device::{MediaDeviceError, TrackHandle};
use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::Rc;

/// Floor of the meter scale in dBFS.
pub const METER_FLOOR_DBFS: f64 = -60.0;

/// Live peak readings for an audio track.
pub trait AudioLevelSource {
    /// Peak values for all channels (0.0 to 1.0).
    fn channel_peaks(&self) -> Result<Vec<f32>, MediaDeviceError>;

    /// Whether the track is currently muted.
    fn is_muted(&self) -> bool {
        false
    }
}

/// Linear level in dBFS (clamped to -60dB to 0dB).
pub fn level_to_dbfs(level: f32) -> f64 {
    if level <= 0.0 {
        METER_FLOOR_DBFS
    } else {
        (20.0 * (level as f64).log10()).clamp(METER_FLOOR_DBFS, 0.0)
    }
}

/// Linear level as meter percentage (maps -60dB..0dB to 0..100).
pub fn level_to_percent(level: f32) -> f64 {
    (level_to_dbfs(level) - METER_FLOOR_DBFS) / -METER_FLOOR_DBFS * 100.0
}

/// A live audio track together with its level readings.
#[derive(Clone)]
pub struct AudioTrackRef {
    pub track: TrackHandle,
    pub levels: Rc<dyn AudioLevelSource>,
}

impl AudioTrackRef {
    pub fn new(track: TrackHandle, levels: Rc<dyn AudioLevelSource>) -> Self {
        Self { track, levels }
    }
}

impl fmt::Debug for AudioTrackRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AudioTrackRef")
            .field("track", &self.track)
            .finish_non_exhaustive()
    }
}

/// Level source whose readings are set by the owner.
///
/// Used where no platform meter exists, e.g. when the host pushes levels it
/// measured itself.
#[derive(Debug, Default)]
pub struct ManualLevelSource {
    peaks: RefCell<Vec<f32>>,
    muted: Cell<bool>,
}

impl ManualLevelSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_peaks(&self, peaks: Vec<f32>) {
        *self.peaks.borrow_mut() = peaks;
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
    }
}

impl AudioLevelSource for ManualLevelSource {
    fn channel_peaks(&self) -> Result<Vec<f32>, MediaDeviceError> {
        Ok(self.peaks.borrow().clone())
    }

    fn is_muted(&self) -> bool {
        self.muted.get()
    }
}
