//! Default endpoint switching through `IPolicyConfig`.

use crate::media::MediaDeviceError;
use windows::core::*;
use windows::Win32::Media::Audio::{eCommunications, eConsole, eMultimedia, ERole};
use windows::Win32::System::Com::*;

/// IPolicyConfig COM interface (undocumented but stable)
#[windows::core::interface("F8679F50-850A-41CF-9C72-430F290290C8")]
pub unsafe trait IPolicyConfig: IUnknown {
    // Reserved methods to maintain vtable order
    fn reserved1(&self) -> HRESULT;
    fn reserved2(&self) -> HRESULT;
    fn reserved3(&self) -> HRESULT;
    fn reserved4(&self) -> HRESULT;
    fn reserved5(&self) -> HRESULT;
    fn reserved6(&self) -> HRESULT;
    fn reserved7(&self) -> HRESULT;
    fn reserved8(&self) -> HRESULT;
    fn reserved9(&self) -> HRESULT;
    fn reserved10(&self) -> HRESULT;

    fn SetDefaultEndpoint(&self, device_id: PCWSTR, role: u32) -> HRESULT;
}

const CLSID_POLICY_CONFIG_CLIENT: GUID = GUID::from_u128(0x870af99c_171d_4f9e_af0d_e63df40c2bc9);

/// Make `device_id` the default endpoint for every role.
pub fn set_default_endpoint(device_id: &str) -> std::result::Result<(), MediaDeviceError> {
    for role in [eConsole, eMultimedia, eCommunications] {
        set_default_endpoint_for_role(device_id, role).map_err(|e| {
            MediaDeviceError::SwitchFailed {
                device_id: device_id.to_string(),
                reason: e.to_string(),
            }
        })?;
    }
    Ok(())
}

fn set_default_endpoint_for_role(device_id: &str, role: ERole) -> Result<()> {
    unsafe {
        let policy_config: IPolicyConfig =
            CoCreateInstance(&CLSID_POLICY_CONFIG_CLIENT, None, CLSCTX_ALL)?;

        let device_id_wide: Vec<u16> = device_id.encode_utf16().chain(std::iter::once(0)).collect();
        policy_config
            .SetDefaultEndpoint(PCWSTR(device_id_wide.as_ptr()), role.0 as u32)
            .ok()
    }
}
