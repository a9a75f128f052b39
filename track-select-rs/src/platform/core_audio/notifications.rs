//! Endpoint change notifications using IMMNotificationClient.
//!
//! Callbacks arrive on a system thread; they only forward a summary over a
//! channel for the source to act on when polled.

use crate::media::MediaDeviceKind;
use std::sync::mpsc::Sender;
use windows::core::{implement, PCWSTR};
use windows::Win32::Media::Audio::{
    eCapture, eConsole, eRender, EDataFlow, ERole, IMMDeviceEnumerator, IMMNotificationClient,
    IMMNotificationClient_Impl, DEVICE_STATE,
};
use windows::Win32::UI::Shell::PropertiesSystem::PROPERTYKEY;
// Re-export windows_core so the implement macro can find it
#[allow(unused_imports)]
use windows_core;

/// What changed on the endpoint side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EndpointChange {
    /// An endpoint was added, removed or changed state
    Topology,

    /// The default endpoint of `kind` changed
    DefaultChanged {
        kind: MediaDeviceKind,
        device_id: Option<String>,
    },
}

/// Notification client that sends endpoint changes to a channel.
#[implement(IMMNotificationClient)]
pub struct EndpointNotificationClient {
    sender: Sender<EndpointChange>,
}

impl EndpointNotificationClient {
    pub fn new(sender: Sender<EndpointChange>) -> Self {
        Self { sender }
    }

    /// Register this notification client with an enumerator.
    /// Takes ownership of self because the COM interface needs to own the data.
    pub fn register(
        self,
        enumerator: &IMMDeviceEnumerator,
    ) -> Result<IMMNotificationClient, windows::core::Error> {
        unsafe {
            let client: IMMNotificationClient = self.into();
            enumerator.RegisterEndpointNotificationCallback(&client)?;
            Ok(client)
        }
    }

    fn kind_for_flow(flow: EDataFlow) -> Option<MediaDeviceKind> {
        if flow == eCapture {
            Some(MediaDeviceKind::AudioInput)
        } else if flow == eRender {
            Some(MediaDeviceKind::AudioOutput)
        } else {
            None
        }
    }
}

impl IMMNotificationClient_Impl for EndpointNotificationClient_Impl {
    fn OnDeviceStateChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _dwnewstate: DEVICE_STATE,
    ) -> windows::core::Result<()> {
        let _ = self.sender.send(EndpointChange::Topology);
        Ok(())
    }

    fn OnDeviceAdded(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        let _ = self.sender.send(EndpointChange::Topology);
        Ok(())
    }

    fn OnDeviceRemoved(&self, _pwstrdeviceid: &PCWSTR) -> windows::core::Result<()> {
        let _ = self.sender.send(EndpointChange::Topology);
        Ok(())
    }

    fn OnDefaultDeviceChanged(
        &self,
        flow: EDataFlow,
        role: ERole,
        pwstrdefaultdeviceid: &PCWSTR,
    ) -> windows::core::Result<()> {
        // Switching sets every role; report the Console one only
        if role != eConsole {
            return Ok(());
        }
        let Some(kind) = EndpointNotificationClient::kind_for_flow(flow) else {
            return Ok(());
        };

        unsafe {
            let device_id = if pwstrdefaultdeviceid.is_null() {
                None
            } else {
                pwstrdefaultdeviceid.to_string().ok()
            };

            let _ = self
                .sender
                .send(EndpointChange::DefaultChanged { kind, device_id });
        }
        Ok(())
    }

    fn OnPropertyValueChanged(
        &self,
        _pwstrdeviceid: &PCWSTR,
        _key: &PROPERTYKEY,
    ) -> windows::core::Result<()> {
        Ok(())
    }
}
