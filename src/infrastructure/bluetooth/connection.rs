//! BLE Connection Module
//!
//! WinRT implementation of [`BleTransport`]: device lookup, GATT service
//! checks and notification subscription.

use crate::infrastructure::bluetooth::protocol::format_bluetooth_address;
use crate::infrastructure::bluetooth::scanner::BleScanner;
use crate::infrastructure::bluetooth::transport::{Advertisement, BleTransport, TransportError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;
use windows::core::GUID;
use windows::Devices::Bluetooth::GenericAttributeProfile::{
    GattCharacteristic, GattClientCharacteristicConfigurationDescriptorValue,
    GattCommunicationStatus, GattDeviceService, GattValueChangedEventArgs,
};
use windows::Devices::Bluetooth::{BluetoothConnectionStatus, BluetoothLEDevice};
use windows::Foundation::TypedEventHandler;
use windows::Storage::Streams::DataReader;

/// Handles kept alive while notifications are flowing.
struct ActiveLink {
    device: BluetoothLEDevice,
    characteristic: GattCharacteristic,
    value_changed_token: i64,
    status_changed_token: i64,
}

#[derive(Default)]
pub struct WinRtTransport {
    scanner: BleScanner,
    link: Option<ActiveLink>,
}

impl WinRtTransport {
    pub fn new() -> Self {
        Self::default()
    }

    async fn service(
        device: &BluetoothLEDevice,
        service: Uuid,
    ) -> Result<Option<GattDeviceService>, TransportError> {
        let result = device
            .GetGattServicesForUuidAsync(GUID::from_u128(service.as_u128()))?
            .await?;

        let status = result.Status()?;
        if status != GattCommunicationStatus::Success {
            return Err(TransportError::Gatt(format!(
                "service query returned {:?}",
                status
            )));
        }

        let services = result.Services()?;
        if services.Size()? == 0 {
            return Ok(None);
        }
        Ok(Some(services.GetAt(0)?))
    }

    /// Unhook the handlers of the previous session and close its device.
    fn release_link(&mut self) {
        if let Some(link) = self.link.take() {
            let address = link.device.BluetoothAddress().unwrap_or_default();
            debug!("Releasing link to {}", format_bluetooth_address(address));
            let _ = link.characteristic.RemoveValueChanged(link.value_changed_token);
            let _ = link
                .device
                .RemoveConnectionStatusChanged(link.status_changed_token);
            let _ = link.device.Close();
        }
    }

    fn forward(sender: &mpsc::Sender<Vec<u8>>, bytes: Vec<u8>) {
        match sender.try_send(bytes) {
            Ok(()) | Err(TrySendError::Closed(_)) => {}
            Err(TrySendError::Full(bytes)) => {
                warn!("Notification queue full, dropping {:02X?}", bytes)
            }
        }
    }
}

impl BleTransport for WinRtTransport {
    type Device = BluetoothLEDevice;

    async fn start_scan(
        &mut self,
        advertisements: mpsc::Sender<Advertisement>,
    ) -> Result<(), TransportError> {
        self.scanner.start(advertisements)
    }

    async fn stop_scan(&mut self) -> Result<(), TransportError> {
        self.scanner.stop()
    }

    async fn connect(&mut self, address: u64) -> Result<BluetoothLEDevice, TransportError> {
        info!(
            "Connecting to Bluetooth device {}",
            format_bluetooth_address(address)
        );
        BluetoothLEDevice::FromBluetoothAddressAsync(address)?
            .await
            .map_err(|e| {
                debug!("FromBluetoothAddressAsync failed: {}", e);
                TransportError::DeviceUnavailable(address)
            })
    }

    async fn has_service(
        &mut self,
        device: &BluetoothLEDevice,
        service: Uuid,
    ) -> Result<bool, TransportError> {
        Ok(Self::service(device, service).await?.is_some())
    }

    async fn disconnect(&mut self, device: BluetoothLEDevice) {
        let address = device.BluetoothAddress().unwrap_or_default();
        debug!("Closing {}", format_bluetooth_address(address));
        if let Err(e) = device.Close() {
            warn!("Failed to close {}: {}", format_bluetooth_address(address), e);
        }
    }

    async fn subscribe(
        &mut self,
        device: &BluetoothLEDevice,
        service: Uuid,
        characteristic: Uuid,
        notifications: mpsc::Sender<Vec<u8>>,
        link_lost: CancellationToken,
    ) -> Result<(), TransportError> {
        let gatt_service = Self::service(device, service)
            .await?
            .ok_or(TransportError::ServiceNotFound(service))?;

        let chars_result = gatt_service
            .GetCharacteristicsForUuidAsync(GUID::from_u128(characteristic.as_u128()))?
            .await?;
        if chars_result.Status()? != GattCommunicationStatus::Success {
            return Err(TransportError::Gatt(format!(
                "characteristic query returned {:?}",
                chars_result.Status()?
            )));
        }
        let characteristics = chars_result.Characteristics()?;
        if characteristics.Size()? == 0 {
            return Err(TransportError::CharacteristicNotFound(characteristic));
        }
        let input_char = characteristics.GetAt(0)?;

        let status = input_char
            .WriteClientCharacteristicConfigurationDescriptorAsync(
                GattClientCharacteristicConfigurationDescriptorValue::Notify,
            )?
            .await?;
        if status != GattCommunicationStatus::Success {
            return Err(TransportError::Subscribe(format!("{:?}", status)));
        }
        info!("Notifications enabled");

        // Data notification handler
        let sender = notifications;
        let data_handler = TypedEventHandler::new(
            move |_: windows::core::Ref<GattCharacteristic>,
                  args: windows::core::Ref<GattValueChangedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let reader = DataReader::FromBuffer(&args.CharacteristicValue()?)?;
                    let mut bytes = vec![0u8; reader.UnconsumedBufferLength()? as usize];
                    if !bytes.is_empty() {
                        reader.ReadBytes(&mut bytes)?;
                        Self::forward(&sender, bytes);
                    }
                }
                Ok(())
            },
        );
        let value_changed_token = input_char.ValueChanged(&data_handler)?;

        // Connection status handler, kept out of the bounded notification queue
        let status_handler =
            TypedEventHandler::new(move |dev: windows::core::Ref<BluetoothLEDevice>, _| {
                if let Some(dev) = dev.as_ref() {
                    if dev.ConnectionStatus()? == BluetoothConnectionStatus::Disconnected {
                        link_lost.cancel();
                    }
                }
                Ok(())
            });
        let status_changed_token = device.ConnectionStatusChanged(&status_handler)?;

        self.release_link();
        self.link = Some(ActiveLink {
            device: device.clone(),
            characteristic: input_char,
            value_changed_token,
            status_changed_token,
        });

        Ok(())
    }
}

impl Drop for WinRtTransport {
    fn drop(&mut self) {
        self.release_link();
    }
}
