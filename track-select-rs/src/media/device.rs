//! Media device data models.
//!
//! Defines device kinds, the device snapshots reported by an enumeration
//! collaborator, live track handles, the events a collaborator emits and the
//! error category forwarded to callers.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Category of media device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MediaDeviceKind {
    /// Microphones
    #[serde(rename = "audioinput")]
    AudioInput,

    /// Speakers and headphones
    #[serde(rename = "audiooutput")]
    AudioOutput,

    /// Cameras
    #[serde(rename = "videoinput")]
    VideoInput,
}

impl MediaDeviceKind {
    pub const ALL: [MediaDeviceKind; 3] = [
        MediaDeviceKind::AudioInput,
        MediaDeviceKind::AudioOutput,
        MediaDeviceKind::VideoInput,
    ];

    /// Wire name, matching the `kind` field of a browser `MediaDeviceInfo`.
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaDeviceKind::AudioInput => "audioinput",
            MediaDeviceKind::AudioOutput => "audiooutput",
            MediaDeviceKind::VideoInput => "videoinput",
        }
    }

    pub fn is_audio(&self) -> bool {
        !matches!(self, MediaDeviceKind::VideoInput)
    }
}

impl fmt::Display for MediaDeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when a device kind name is not recognised.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Unknown media device kind: {0}")]
pub struct ParseKindError(pub String);

impl FromStr for MediaDeviceKind {
    type Err = ParseKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MediaDeviceKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| ParseKindError(s.to_string()))
    }
}

/// A device as reported by the enumeration collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaDeviceInfo {
    /// Opaque identifier, stable per physical device. Empty when the
    /// collaborator has not been granted access yet.
    pub device_id: String,

    /// Human-readable label (may be empty before access is granted)
    pub label: String,

    pub kind: MediaDeviceKind,

    /// Devices sharing a physical package (e.g. headset mic + speakers)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<String>,
}

impl MediaDeviceInfo {
    pub fn new(
        device_id: impl Into<String>,
        label: impl Into<String>,
        kind: MediaDeviceKind,
    ) -> Self {
        Self {
            device_id: device_id.into(),
            label: label.into(),
            kind,
            group_id: None,
        }
    }

    /// True for the "permission not yet granted" sentinel entry.
    pub fn is_placeholder(&self) -> bool {
        self.device_id.is_empty()
    }
}

/// Category of a published track.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrackSource {
    Camera,
    Microphone,
    ScreenShare,
    ScreenShareAudio,
    #[default]
    Unknown,
}

impl TrackSource {
    /// The source a capture device of `kind` usually feeds.
    pub fn for_kind(kind: MediaDeviceKind) -> Self {
        match kind {
            MediaDeviceKind::AudioInput => TrackSource::Microphone,
            MediaDeviceKind::VideoInput => TrackSource::Camera,
            MediaDeviceKind::AudioOutput => TrackSource::Unknown,
        }
    }
}

/// Reference to a live local track.
///
/// Handed to the collaborator so it can keep its notion of the active device
/// in sync with the device the track is actually capturing from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackHandle {
    pub track_id: String,
    pub source: TrackSource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
}

impl TrackHandle {
    pub fn new(track_id: impl Into<String>, source: TrackSource) -> Self {
        Self {
            track_id: track_id.into(),
            source,
            device_id: None,
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }
}

/// Notifications emitted by an enumeration collaborator for one device kind.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceEvent {
    /// Full, ordered device list for the watched kind
    DevicesChanged(Vec<MediaDeviceInfo>),

    /// The collaborator's active device for the watched kind changed
    ActiveDeviceChanged(String),

    /// Enumeration, permission or switch failure
    Error(MediaDeviceError),
}

/// Media device errors.
///
/// Components never interpret these; they are forwarded verbatim to the
/// caller's error handler. The serialized form is externally tagged, e.g.
/// `{"permission_denied":{"kind":"audioinput"}}` or `{"platform":"..."}`.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaDeviceError {
    #[error("Permission denied for {kind} devices")]
    PermissionDenied { kind: MediaDeviceKind },

    #[error("Failed to enumerate devices: {0}")]
    EnumerationFailed(String),

    #[error("Failed to switch to device {device_id}: {reason}")]
    SwitchFailed { device_id: String, reason: String },

    #[error("Device not found: {device_id}")]
    DeviceNotFound { device_id: String },

    #[error("Device kind not supported: {kind}")]
    UnsupportedKind { kind: MediaDeviceKind },

    #[error("{0}")]
    Platform(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_round_trips_through_wire_name() {
        for kind in MediaDeviceKind::ALL {
            assert_eq!(kind.as_str().parse::<MediaDeviceKind>(), Ok(kind));
        }
        assert!("camera".parse::<MediaDeviceKind>().is_err());
    }

    #[test]
    fn test_device_info_uses_browser_field_names() {
        let json = r#"{"deviceId":"a1","label":"Mic 1","kind":"audioinput","groupId":"g1"}"#;
        let device: MediaDeviceInfo = serde_json::from_str(json).unwrap();

        assert_eq!(device.device_id, "a1");
        assert_eq!(device.kind, MediaDeviceKind::AudioInput);
        assert_eq!(device.group_id.as_deref(), Some("g1"));
        assert!(!device.is_placeholder());
    }

    #[test]
    fn test_empty_id_is_placeholder() {
        let device = MediaDeviceInfo::new("", "Default", MediaDeviceKind::AudioInput);
        assert!(device.is_placeholder());
    }

    #[test]
    fn test_track_source_for_kind() {
        assert_eq!(
            TrackSource::for_kind(MediaDeviceKind::AudioInput),
            TrackSource::Microphone
        );
        assert_eq!(
            TrackSource::for_kind(MediaDeviceKind::VideoInput),
            TrackSource::Camera
        );
    }

    #[test]
    fn test_errors_use_tagged_wire_form() {
        let denied: MediaDeviceError =
            serde_json::from_str(r#"{"permission_denied":{"kind":"videoinput"}}"#).unwrap();
        assert_eq!(
            denied,
            MediaDeviceError::PermissionDenied {
                kind: MediaDeviceKind::VideoInput
            }
        );

        let platform: MediaDeviceError = serde_json::from_str(r#"{"platform":"NotReadableError"}"#).unwrap();
        assert_eq!(platform.to_string(), "NotReadableError");
    }
}
