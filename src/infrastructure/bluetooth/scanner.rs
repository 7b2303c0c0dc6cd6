//! BLE Scanner Module
//!
//! Wraps the WinRT advertisement watcher and forwards every advertisement
//! into a channel.

use crate::infrastructure::bluetooth::transport::{Advertisement, TransportError};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, info, trace};
use uuid::Uuid;
use windows::Devices::Bluetooth::Advertisement::{
    BluetoothLEAdvertisementReceivedEventArgs, BluetoothLEAdvertisementWatcher,
    BluetoothLEScanningMode,
};
use windows::Foundation::TypedEventHandler;

/// BLE Scanner for discovering entry model controllers
#[derive(Default)]
pub struct BleScanner {
    watcher: Option<BluetoothLEAdvertisementWatcher>,
}

impl BleScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start an active scan, replacing any running one.
    pub fn start(&mut self, sender: mpsc::Sender<Advertisement>) -> Result<(), TransportError> {
        self.stop()?;
        info!("Starting BLE advertisement watcher");

        let watcher = BluetoothLEAdvertisementWatcher::new()?;
        watcher.SetScanningMode(BluetoothLEScanningMode::Active)?;

        let handler = TypedEventHandler::new(
            move |_: windows::core::Ref<BluetoothLEAdvertisementWatcher>,
                  args: windows::core::Ref<BluetoothLEAdvertisementReceivedEventArgs>| {
                if let Some(args) = args.as_ref() {
                    let adv = args.Advertisement()?;
                    let service_uuids = adv.ServiceUuids()?;

                    let mut uuids = Vec::new();
                    for i in 0..service_uuids.Size()? {
                        uuids.push(Uuid::from_u128(service_uuids.GetAt(i)?.to_u128()));
                    }

                    let advertisement = Advertisement {
                        address: args.BluetoothAddress()?,
                        local_name: adv.LocalName()?.to_string(),
                        service_uuids: uuids,
                    };
                    trace!("Advertisement: {:?}", advertisement);

                    match sender.try_send(advertisement) {
                        Ok(()) | Err(TrySendError::Closed(_)) => {}
                        Err(TrySendError::Full(_)) => debug!("Advertisement queue full, dropping"),
                    }
                }
                Ok(())
            },
        );

        watcher.Received(&handler)?;
        watcher
            .Start()
            .map_err(|e| TransportError::Adapter(e.message().to_string()))?;
        self.watcher = Some(watcher);

        Ok(())
    }

    /// Stop scanning
    pub fn stop(&mut self) -> Result<(), TransportError> {
        if let Some(watcher) = self.watcher.take() {
            info!("Stopping BLE advertisement watcher");
            watcher.Stop()?;
        }
        Ok(())
    }
}

impl Drop for BleScanner {
    fn drop(&mut self) {
        let _ = self.stop();
    }
}
