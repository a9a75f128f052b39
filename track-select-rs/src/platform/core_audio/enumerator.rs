//! Endpoint enumeration using the Windows MMDevice API.

use crate::media::{MediaDeviceError, MediaDeviceInfo, MediaDeviceKind};
use windows::core::{PCWSTR, PWSTR};
use windows::Win32::Devices::Properties::DEVPKEY_Device_FriendlyName;
use windows::Win32::Media::Audio::{
    eCapture, eConsole, eRender, EDataFlow, IMMDevice, IMMDeviceEnumerator, MMDeviceEnumerator,
    DEVICE_STATE_ACTIVE,
};
use windows::Win32::System::Com::{CoCreateInstance, CoTaskMemFree, CLSCTX_ALL, STGM};
use windows::Win32::UI::Shell::PropertiesSystem::{IPropertyStore, PROPERTYKEY};

/// Data flow of the endpoints backing `kind`.
pub fn data_flow(kind: MediaDeviceKind) -> Result<EDataFlow, MediaDeviceError> {
    match kind {
        MediaDeviceKind::AudioInput => Ok(eCapture),
        MediaDeviceKind::AudioOutput => Ok(eRender),
        MediaDeviceKind::VideoInput => Err(MediaDeviceError::UnsupportedKind { kind }),
    }
}

fn enumeration_failed(err: windows::core::Error) -> MediaDeviceError {
    MediaDeviceError::EnumerationFailed(err.to_string())
}

/// Take ownership of a COM-allocated id string.
unsafe fn take_id(id: PWSTR) -> Result<String, MediaDeviceError> {
    let result = id
        .to_string()
        .map_err(|e| MediaDeviceError::EnumerationFailed(e.to_string()));
    CoTaskMemFree(Some(id.0 as *const _));
    result
}

/// Endpoint enumerator.
pub struct EndpointEnumerator {
    enumerator: IMMDeviceEnumerator,
}

impl EndpointEnumerator {
    /// Create a new EndpointEnumerator.
    ///
    /// Note: COM must be initialized before calling this function.
    pub fn new() -> Result<Self, MediaDeviceError> {
        unsafe {
            let enumerator: IMMDeviceEnumerator =
                CoCreateInstance(&MMDeviceEnumerator, None, CLSCTX_ALL)
                    .map_err(enumeration_failed)?;

            Ok(Self { enumerator })
        }
    }

    /// Get all active endpoints of `kind`, in system order.
    pub fn devices(&self, kind: MediaDeviceKind) -> Result<Vec<MediaDeviceInfo>, MediaDeviceError> {
        let flow = data_flow(kind)?;

        unsafe {
            let collection = self
                .enumerator
                .EnumAudioEndpoints(flow, DEVICE_STATE_ACTIVE)
                .map_err(enumeration_failed)?;

            let count = collection.GetCount().map_err(enumeration_failed)?;
            let mut devices = Vec::with_capacity(count as usize);

            for i in 0..count {
                let device = collection.Item(i).map_err(enumeration_failed)?;
                devices.push(self.device_info(&device, kind)?);
            }

            Ok(devices)
        }
    }

    /// Get the id of the default endpoint of `kind`, if there is one.
    pub fn default_device_id(&self, kind: MediaDeviceKind) -> Result<Option<String>, MediaDeviceError> {
        let flow = data_flow(kind)?;

        unsafe {
            let device = match self.enumerator.GetDefaultAudioEndpoint(flow, eConsole) {
                Ok(d) => d,
                Err(_) => return Ok(None),
            };

            let id = device.GetId().map_err(enumeration_failed)?;
            take_id(id).map(Some)
        }
    }

    /// Get a specific endpoint by id.
    pub fn device(&self, device_id: &str) -> Result<IMMDevice, MediaDeviceError> {
        let device_id_wide: Vec<u16> = device_id.encode_utf16().chain(std::iter::once(0)).collect();

        unsafe {
            self.enumerator
                .GetDevice(PCWSTR::from_raw(device_id_wide.as_ptr()))
                .map_err(|_| MediaDeviceError::DeviceNotFound {
                    device_id: device_id.to_string(),
                })
        }
    }

    /// Get the raw IMMDeviceEnumerator for notification registration.
    pub fn raw_enumerator(&self) -> &IMMDeviceEnumerator {
        &self.enumerator
    }

    fn device_info(
        &self,
        device: &IMMDevice,
        kind: MediaDeviceKind,
    ) -> Result<MediaDeviceInfo, MediaDeviceError> {
        unsafe {
            let id = take_id(device.GetId().map_err(enumeration_failed)?)?;

            let props: IPropertyStore = device
                .OpenPropertyStore(STGM(0))
                .map_err(enumeration_failed)?;

            let label = Self::friendly_name(&props).unwrap_or_else(|| "Unknown".to_string());

            Ok(MediaDeviceInfo::new(id, label, kind))
        }
    }

    fn friendly_name(props: &IPropertyStore) -> Option<String> {
        unsafe {
            let key = PROPERTYKEY {
                fmtid: DEVPKEY_Device_FriendlyName.fmtid,
                pid: DEVPKEY_Device_FriendlyName.pid,
            };

            let prop = props.GetValue(&key).ok()?;
            let name = prop.to_string();
            if name.is_empty() {
                None
            } else {
                Some(name)
            }
        }
    }
}
