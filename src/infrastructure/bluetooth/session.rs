//! Connection Session
//!
//! Drives one controller from advertisement to live input:
//!
//! ```text
//! Scanning -> Validating -> Subscribing -> Streaming -> Stopped | Disconnected
//!     ^            |
//!     +- failure --+
//! ```
//!
//! Notifications arrive over a bounded channel and are consumed here, in
//! order, by a single loop that owns the session's [`CalibrationState`].
//! Loss of the link is signalled separately through a cancellation token, so
//! a full queue can drop payloads but never the disconnect.

use crate::domain::calibration::CalibrationState;
use crate::domain::decoder::decode;
use crate::domain::models::{DeviceType, SessionState};
use crate::domain::profiles::DeviceRegistry;
use crate::domain::settings::Settings;
use crate::infrastructure::bluetooth::protocol::{
    format_bluetooth_address, INPUT_CHAR_UUID, SERVICE_UUID,
};
use crate::infrastructure::bluetooth::transport::{Advertisement, BleTransport, TransportError};
use crate::infrastructure::output::{JoystickDevice, OutputSink};
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, trace, warn};

const ADVERTISEMENT_QUEUE_CAPACITY: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("{step} failed: {source}")]
    Transport {
        step: &'static str,
        #[source]
        source: TransportError,
    },
    #[error("{step} timed out after {after:?}")]
    Timeout { step: &'static str, after: Duration },
    #[error("advertisement watcher stopped before a controller was found")]
    ScanEnded,
}

/// How a session that did not fail came to an end.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    Stopped,
    Disconnected,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub operation_timeout: Duration,
    pub notification_queue_capacity: usize,
    pub digital_mode: bool,
    pub sensitivity: [f64; 2],
}

impl SessionConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            operation_timeout: settings.operation_timeout(),
            notification_queue_capacity: settings.notification_queue_capacity,
            digital_mode: settings.digital_mode,
            sensitivity: settings.sensitivity(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StreamStats {
    pub notifications: u64,
    pub frames: u64,
    pub discarded_bytes: u64,
    pub feed_failures: u64,
}

pub struct ConnectionSession<'a, T: BleTransport, D: JoystickDevice> {
    transport: &'a mut T,
    sink: &'a mut OutputSink<D>,
    registry: &'a DeviceRegistry,
    config: SessionConfig,
    state: SessionState,
    stats: StreamStats,
}

impl<'a, T: BleTransport, D: JoystickDevice> ConnectionSession<'a, T, D> {
    pub fn new(
        transport: &'a mut T,
        sink: &'a mut OutputSink<D>,
        registry: &'a DeviceRegistry,
        config: SessionConfig,
    ) -> Self {
        Self {
            transport,
            sink,
            registry,
            config,
            state: SessionState::Scanning,
            stats: StreamStats::default(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn stats(&self) -> StreamStats {
        self.stats
    }

    /// Run until the link drops, `shutdown` fires, or a fatal error occurs.
    pub async fn run(&mut self, shutdown: &CancellationToken) -> Result<SessionEnd, SessionError> {
        let Some((device, device_type)) = self.discover(shutdown).await? else {
            return Ok(SessionEnd::Stopped);
        };
        let (notifications, link_lost) = match self.subscribe(&device, device_type).await {
            Ok(link) => link,
            Err(e) => {
                self.transport.disconnect(device).await;
                return Err(e);
            }
        };
        Ok(self
            .stream(device_type, notifications, &link_lost, shutdown)
            .await)
    }

    fn set_state(&mut self, state: SessionState) {
        if self.state != state {
            info!("Session state: {:?} -> {:?}", self.state, state);
            self.state = state;
        }
    }

    /// Scanning and Validating. Returns `None` on shutdown.
    async fn discover(
        &mut self,
        shutdown: &CancellationToken,
    ) -> Result<Option<(T::Device, DeviceType)>, SessionError> {
        self.set_state(SessionState::Scanning);

        let (sender, mut advertisements) = mpsc::channel(ADVERTISEMENT_QUEUE_CAPACITY);
        self.transport
            .start_scan(sender)
            .await
            .map_err(|source| SessionError::Transport {
                step: "start scan",
                source,
            })?;
        info!("Scanning for controllers...");

        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => None,
                received = advertisements.recv() => Some(received),
            };

            let advertisement = match received {
                None => {
                    self.stop_scan().await;
                    self.set_state(SessionState::Stopped);
                    return Ok(None);
                }
                Some(None) => return Err(SessionError::ScanEnded),
                Some(Some(advertisement)) => advertisement,
            };

            let Some(device_type) = self.match_advertisement(&advertisement) else {
                continue;
            };

            info!(
                "Target service found on device: {} {}",
                format_bluetooth_address(advertisement.address),
                advertisement.local_name
            );
            self.set_state(SessionState::Validating);

            match self.validate(advertisement.address).await {
                Ok(device) => {
                    self.stop_scan().await;
                    return Ok(Some((device, device_type)));
                }
                Err(e) => {
                    warn!("Validation failed: {}; resuming scan", e);
                    self.set_state(SessionState::Scanning);
                }
            }
        }
    }

    /// Name filter plus the advertised service list, when one is present.
    fn match_advertisement(&self, advertisement: &Advertisement) -> Option<DeviceType> {
        let device_type = self.registry.classify(&advertisement.local_name);
        if device_type == DeviceType::Unknown {
            return None;
        }

        if !advertisement.service_uuids.is_empty()
            && !advertisement.service_uuids.contains(&SERVICE_UUID)
        {
            debug!(
                "{} does not advertise the controller service, ignoring",
                advertisement.local_name
            );
            return None;
        }

        Some(device_type)
    }

    async fn validate(&mut self, address: u64) -> Result<T::Device, SessionError> {
        let after = self.config.operation_timeout;
        let device = bounded("connect", after, self.transport.connect(address)).await?;

        let lookup = bounded(
            "service lookup",
            after,
            self.transport.has_service(&device, SERVICE_UUID),
        )
        .await;
        let failure = match lookup {
            Ok(true) => return Ok(device),
            Ok(false) => SessionError::Transport {
                step: "service lookup",
                source: TransportError::ServiceNotFound(SERVICE_UUID),
            },
            Err(e) => e,
        };

        self.transport.disconnect(device).await;
        Err(failure)
    }

    async fn stop_scan(&mut self) {
        if let Err(e) = self.transport.stop_scan().await {
            warn!("Failed to stop advertisement watcher: {}", e);
        }
    }

    async fn subscribe(
        &mut self,
        device: &T::Device,
        device_type: DeviceType,
    ) -> Result<(mpsc::Receiver<Vec<u8>>, CancellationToken), SessionError> {
        self.set_state(SessionState::Subscribing);

        let (sender, notifications) = mpsc::channel(self.config.notification_queue_capacity);
        let link_lost = CancellationToken::new();
        let after = self.config.operation_timeout;
        bounded(
            "subscribe",
            after,
            self.transport.subscribe(
                device,
                SERVICE_UUID,
                INPUT_CHAR_UUID,
                sender,
                link_lost.clone(),
            ),
        )
        .await
        .inspect_err(|e| error!("Subscription failed: {}", e))?;

        info!("Connected controller classified as {}", device_type);
        Ok((notifications, link_lost))
    }

    async fn stream(
        &mut self,
        device_type: DeviceType,
        mut notifications: mpsc::Receiver<Vec<u8>>,
        link_lost: &CancellationToken,
        shutdown: &CancellationToken,
    ) -> SessionEnd {
        self.set_state(SessionState::Streaming);
        let mut calibration = CalibrationState::new(self.config.digital_mode, self.config.sensitivity);
        info!(
            "Streaming input ({} mode)",
            if calibration.digital_mode() { "digital" } else { "analog" }
        );

        // Queued payloads are drained before a lost link is acted on
        loop {
            let received = tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    self.set_state(SessionState::Stopped);
                    return SessionEnd::Stopped;
                }
                received = notifications.recv() => received,
                _ = link_lost.cancelled() => None,
            };

            match received {
                Some(bytes) => self.process_notification(device_type, &mut calibration, &bytes),
                None => {
                    info!("Controller disconnected");
                    self.set_state(SessionState::Disconnected);
                    return SessionEnd::Disconnected;
                }
            }
        }
    }

    /// Decoder -> Calibrator -> Output Sink for one notification.
    fn process_notification(
        &mut self,
        device_type: DeviceType,
        calibration: &mut CalibrationState,
        bytes: &[u8],
    ) {
        self.stats.notifications += 1;
        trace!("Notification: {:02X?}", bytes);

        let frames = match decode(device_type, bytes) {
            Ok(frames) => frames,
            Err(e) => {
                error!("{}", e);
                return;
            }
        };

        let discarded = frames.discarded();
        if discarded > 0 {
            debug!("Dropping {} trailing bytes of a partial packet", discarded);
            self.stats.discarded_bytes += discarded as u64;
        }

        for frame in frames {
            self.stats.frames += 1;
            let report = calibration.apply(device_type, &frame);
            if let Err(e) = self.sink.feed(&report) {
                self.stats.feed_failures += 1;
                warn!("{}", e);
            }
        }
    }
}

/// Bound a transport step with a timeout.
async fn bounded<R>(
    step: &'static str,
    after: Duration,
    operation: impl Future<Output = Result<R, TransportError>>,
) -> Result<R, SessionError> {
    match tokio::time::timeout(after, operation).await {
        Ok(result) => result.map_err(|source| SessionError::Transport { step, source }),
        Err(_) => Err(SessionError::Timeout { step, after }),
    }
}
