//! Transport seam between the connection session and a BLE stack.

use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// A received advertisement.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: u64,
    pub local_name: String,
    pub service_uuids: Vec<Uuid>,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("bluetooth adapter error: {0}")]
    Adapter(String),
    #[error("device {0:#x} could not be opened")]
    DeviceUnavailable(u64),
    #[error("service {0} not found")]
    ServiceNotFound(Uuid),
    #[error("characteristic {0} not found")]
    CharacteristicNotFound(Uuid),
    #[error("GATT operation failed: {0}")]
    Gatt(String),
    #[error("enabling notifications failed: {0}")]
    Subscribe(String),
}

#[cfg(windows)]
impl From<windows::core::Error> for TransportError {
    fn from(e: windows::core::Error) -> Self {
        Self::Gatt(e.message().to_string())
    }
}

/// BLE discovery and GATT access used by [`super::session::ConnectionSession`].
///
/// Implementations push into the provided senders from whatever thread their
/// stack calls back on; they must never block on a full channel.
#[allow(async_fn_in_trait)]
pub trait BleTransport {
    type Device;

    /// Start delivering advertisements to `advertisements`.
    async fn start_scan(
        &mut self,
        advertisements: mpsc::Sender<Advertisement>,
    ) -> Result<(), TransportError>;

    /// Stop the advertisement watch. Idempotent.
    async fn stop_scan(&mut self) -> Result<(), TransportError>;

    async fn connect(&mut self, address: u64) -> Result<Self::Device, TransportError>;

    /// Single round-trip service presence check.
    async fn has_service(
        &mut self,
        device: &Self::Device,
        service: Uuid,
    ) -> Result<bool, TransportError>;

    /// Release a device that failed validation.
    async fn disconnect(&mut self, device: Self::Device);

    /// Enable notifications on `characteristic` and forward each payload to
    /// `notifications`. Payloads may be dropped when the queue is full; a
    /// dropped link never is, it is reported by cancelling `link_lost`.
    async fn subscribe(
        &mut self,
        device: &Self::Device,
        service: Uuid,
        characteristic: Uuid,
        notifications: mpsc::Sender<Vec<u8>>,
        link_lost: CancellationToken,
    ) -> Result<(), TransportError>;
}
