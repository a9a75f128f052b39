//! Bar-style audio level visualizer.
//!
//! Folds a track's channel peaks into a fixed number of bars, each a height
//! percentage on the -60dB..0dB meter scale. Bars rise immediately and fall
//! back by a fixed step per sample, like a peak-hold meter.

use crate::media::level::{level_to_percent, AudioLevelSource};
use tracing::trace;

/// Height percentage a bar falls per sample.
pub const DEFAULT_DECAY: f32 = 10.0;

/// Level visualizer state.
#[derive(Debug, Clone)]
pub struct BarVisualizer {
    min_height: f32,
    decay: f32,
    bars: Vec<f32>,
}

impl BarVisualizer {
    /// Create a visualizer with `bar_count` bars, none lower than `min_height`
    /// percent.
    pub fn new(bar_count: usize, min_height: f32) -> Self {
        let min_height = if min_height.is_finite() {
            min_height.clamp(0.0, 100.0)
        } else {
            0.0
        };
        Self {
            min_height,
            decay: DEFAULT_DECAY,
            bars: vec![min_height; bar_count],
        }
    }

    pub fn with_decay(mut self, decay: f32) -> Self {
        self.decay = if decay.is_finite() { decay.max(0.0) } else { 0.0 };
        self
    }

    pub fn bar_count(&self) -> usize {
        self.bars.len()
    }

    /// Current bar heights in percent.
    pub fn bars(&self) -> &[f32] {
        &self.bars
    }

    /// Take a reading from `levels` and update the bars.
    pub fn sample(&mut self, levels: &dyn AudioLevelSource) -> &[f32] {
        if levels.is_muted() {
            self.bars.fill(self.min_height);
            return &self.bars;
        }

        // Presentational only: an unreadable meter just shows silence.
        let peaks = levels.channel_peaks().unwrap_or_else(|error| {
            trace!(%error, "Level reading failed");
            Vec::new()
        });

        let bands = fold_into_bands(&peaks, self.bars.len());
        for (bar, band) in self.bars.iter_mut().zip(bands) {
            let target = (level_to_percent(band) as f32).clamp(self.min_height, 100.0);
            *bar = if target >= *bar {
                target
            } else {
                (*bar - self.decay).max(target)
            };
        }

        &self.bars
    }
}

/// Spread channel peaks across `bands` bands, taking the loudest channel in
/// each. With fewer channels than bands, channels are repeated.
pub fn fold_into_bands(peaks: &[f32], bands: usize) -> Vec<f32> {
    if peaks.is_empty() {
        return vec![0.0; bands];
    }

    let len = peaks.len();
    (0..bands)
        .map(|i| {
            let start = (i * len / bands).min(len - 1);
            let end = ((i + 1) * len / bands).max(start + 1).min(len);
            peaks[start..end].iter().copied().fold(0.0, f32::max)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::ManualLevelSource;

    #[test]
    fn test_fold_single_channel_fills_all_bands() {
        assert_eq!(fold_into_bands(&[0.5], 3), vec![0.5, 0.5, 0.5]);
    }

    #[test]
    fn test_fold_takes_loudest_channel_per_band() {
        let bands = fold_into_bands(&[0.1, 0.9, 0.2, 0.3, 0.8, 0.4], 3);
        assert_eq!(bands, vec![0.9, 0.3, 0.8]);
    }

    #[test]
    fn test_fold_two_channels_into_three_bands() {
        assert_eq!(fold_into_bands(&[0.2, 0.6], 3), vec![0.2, 0.2, 0.6]);
    }

    #[test]
    fn test_silence_sits_at_min_height() {
        let levels = ManualLevelSource::new();
        let mut visualizer = BarVisualizer::new(3, 5.0);

        assert_eq!(visualizer.sample(&levels), &[5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_bars_rise_immediately_and_decay_stepwise() {
        let levels = ManualLevelSource::new();
        let mut visualizer = BarVisualizer::new(1, 5.0).with_decay(10.0);

        levels.set_peaks(vec![1.0]);
        assert_eq!(visualizer.sample(&levels), &[100.0]);

        levels.set_peaks(vec![0.0]);
        assert_eq!(visualizer.sample(&levels), &[90.0]);
        assert_eq!(visualizer.sample(&levels), &[80.0]);
    }

    #[test]
    fn test_muted_track_drops_to_min_height() {
        let levels = ManualLevelSource::new();
        let mut visualizer = BarVisualizer::new(3, 5.0);
        levels.set_peaks(vec![1.0]);
        visualizer.sample(&levels);

        levels.set_muted(true);
        assert_eq!(visualizer.sample(&levels), &[5.0, 5.0, 5.0]);
    }

    #[test]
    fn test_non_finite_min_height_falls_back_to_zero() {
        let levels = ManualLevelSource::new();
        let mut visualizer = BarVisualizer::new(2, f32::NAN);
        assert_eq!(visualizer.bars(), &[0.0, 0.0]);

        levels.set_peaks(vec![1.0]);
        assert_eq!(visualizer.sample(&levels), &[100.0, 100.0]);
    }
}
