//! BLE Connection Module
//!
//! Owns one display link: discovery by address, GATT service validation and
//! the negotiated write/read characteristics.
//!
//! ```text
//! Unconnected → Discovering → Discovered → Connecting → ServiceValidating → Ready
//!                    │                          │                │             │
//!                    └──────────► Failed ◄──────┴────────────────┘             │
//!                                                        Disconnected ◄────────┘
//! ```

use crate::domain::models::Advertisement;
use crate::error::{Error, Result};
use crate::infrastructure::bluetooth::adapter::{
    AdapterError, BleAdapter, BlePeripheral, CharacteristicInfo,
};
use crate::infrastructure::bluetooth::protocol::{
    self, MAX_WRITE_LEN, READ_CHAR_ID, READ_CHAR_UUID, SERVICE_ID, SERVICE_UUID, WRITE_CHAR_ID,
    WRITE_CHAR_UUID,
};
use crate::infrastructure::bluetooth::scanner::{self, ScanCancel};
use crate::infrastructure::bluetooth::transport::{self, FragmentingTransport};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Configuration for connection behavior
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionConfig {
    /// Give up discovery after this long; `None` scans until found or cancelled
    pub max_scan_time: Option<Duration>,
    /// Upper bound for a single BLE write
    pub max_write_len: usize,
    /// Per-fragment write timeout; `None` waits indefinitely
    pub write_timeout: Option<Duration>,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            max_scan_time: None,
            max_write_len: MAX_WRITE_LEN,
            write_timeout: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Unconnected,
    Discovering,
    Discovered,
    Connecting,
    ServiceValidating,
    Ready,
    Disconnected,
    Failed,
}

/// A validated characteristic and the MTU recorded for it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    pub characteristic: CharacteristicInfo,
    pub mtu: u16,
}

struct Link<P> {
    peripheral: P,
    write: Endpoint,
    read: Endpoint,
}

/// One display connection, exclusively owned by its creator.
pub struct DeviceConnection<A: BleAdapter> {
    adapter: Arc<A>,
    address: String,
    config: ConnectionConfig,
    state: ConnectionState,
    discovered: Option<Advertisement>,
    link: Option<Link<A::Peripheral>>,
}

impl<A: BleAdapter> DeviceConnection<A> {
    /// Create an unconnected handle for the display at `address`.
    pub fn new(adapter: Arc<A>, address: impl Into<String>, config: ConnectionConfig) -> Self {
        Self {
            adapter,
            address: address.into(),
            config,
            state: ConnectionState::Unconnected,
            discovered: None,
            link: None,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    pub fn is_ready(&self) -> bool {
        self.state == ConnectionState::Ready
    }

    /// The advertisement that matched during discovery.
    pub fn advertisement(&self) -> Option<&Advertisement> {
        self.discovered.as_ref()
    }

    pub fn write_endpoint(&self) -> Option<&Endpoint> {
        self.link.as_ref().map(|l| &l.write)
    }

    pub fn read_endpoint(&self) -> Option<&Endpoint> {
        self.link.as_ref().map(|l| &l.read)
    }

    /// Enable the adapter and scan until the display advertises.
    pub async fn discover(&mut self, cancel: &ScanCancel) -> Result<Advertisement> {
        match (self.state, &self.discovered) {
            (ConnectionState::Discovered, Some(adv)) => return Ok(adv.clone()),
            (
                ConnectionState::Unconnected
                | ConnectionState::Failed
                | ConnectionState::Disconnected
                | ConnectionState::Discovered,
                _,
            ) => {}
            (other, _) => return Err(Error::NotReady(other)),
        }

        if let Err(e) = self.adapter.enable().await {
            self.state = ConnectionState::Failed;
            return Err(Error::AdapterUnavailable(e.to_string()));
        }

        self.state = ConnectionState::Discovering;
        match scanner::discover(
            self.adapter.as_ref(),
            &self.address,
            self.config.max_scan_time,
            cancel,
        )
        .await
        {
            Ok(adv) => {
                self.state = ConnectionState::Discovered;
                self.discovered = Some(adv.clone());
                Ok(adv)
            }
            Err(e) => {
                error!("Discovery of {} failed: {}", self.address, e);
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    /// Connect to the discovered display and validate its GATT profile.
    ///
    /// On failure the peripheral is disconnected and the handle stays in
    /// `Failed`; it may be connected again since discovery is kept.
    pub async fn connect(&mut self) -> Result<()> {
        if self.state == ConnectionState::Ready {
            return Ok(());
        }
        let Some(adv) = self.discovered.as_ref() else {
            return Err(Error::NotReady(self.state));
        };
        let address = adv.address.clone();

        info!("Connecting to {}", address);
        self.state = ConnectionState::Connecting;
        let peripheral = match self.adapter.connect(&address).await {
            Ok(p) => p,
            Err(e) => {
                self.state = ConnectionState::Failed;
                return Err(Error::ConnectFailed {
                    address,
                    reason: e.to_string(),
                });
            }
        };

        self.state = ConnectionState::ServiceValidating;
        match validate_services(&peripheral, &address).await {
            Ok((write, read)) => {
                info!(
                    "Display ready (write MTU {}, read MTU {})",
                    write.mtu, read.mtu
                );
                self.link = Some(Link {
                    peripheral,
                    write,
                    read,
                });
                self.state = ConnectionState::Ready;
                Ok(())
            }
            Err(e) => {
                error!("Service validation failed: {}", e);
                if let Err(de) = peripheral.disconnect().await {
                    warn!("Disconnect after failed validation: {}", de);
                }
                self.state = ConnectionState::Failed;
                Err(e)
            }
        }
    }

    /// Write a complete command packet to the display.
    ///
    /// A failed write leaves the device mid-packet; the link is dropped and
    /// a fresh [`connect`](Self::connect) is needed.
    pub async fn write(&mut self, packet: &[u8]) -> Result<()> {
        let link = match (&self.state, self.link.as_ref()) {
            (ConnectionState::Ready, Some(link)) => link,
            (state, _) => return Err(Error::NotReady(*state)),
        };

        let size = transport::fragment_size(link.write.mtu, self.config.max_write_len);
        let result = FragmentingTransport::new(
            &link.peripheral,
            &link.write.characteristic,
            size,
            self.config.write_timeout,
        )
        .write(packet)
        .await;

        if let Err(e) = &result {
            error!("Write to {} failed: {}", self.address, e);
            self.drop_link().await;
            self.state = ConnectionState::Failed;
        }
        result
    }

    /// Tear down the link. Safe to call in any state, any number of times.
    pub async fn disconnect(&mut self) {
        if self.drop_link().await {
            info!("Disconnected from {}", self.address);
        }
        self.state = ConnectionState::Disconnected;
    }

    async fn drop_link(&mut self) -> bool {
        let Some(link) = self.link.take() else {
            return false;
        };
        if let Err(e) = link.peripheral.disconnect().await {
            warn!("Disconnect from {} reported: {}", self.address, e);
        }
        true
    }
}

/// Find the vendor service and exactly its write and read characteristics.
async fn validate_services<P: BlePeripheral>(
    peripheral: &P,
    address: &str,
) -> Result<(Endpoint, Endpoint)> {
    let link_error = |e: AdapterError| Error::ConnectFailed {
        address: address.to_string(),
        reason: e.to_string(),
    };

    let services = peripheral
        .discover_services(&[SERVICE_UUID])
        .await
        .map_err(link_error)?;
    let service = services.first().ok_or_else(|| {
        Error::ProtocolMismatch(format!("device doesn't support {} service", SERVICE_UUID))
    })?;
    if protocol::short_uuid(&service.uuid) != Some(SERVICE_ID) {
        return Err(Error::ProtocolMismatch(format!(
            "invalid service id {}",
            service.uuid
        )));
    }
    debug!("Found display service {}", service.uuid);

    let characteristics = peripheral
        .discover_characteristics(service, &[WRITE_CHAR_UUID, READ_CHAR_UUID])
        .await
        .map_err(link_error)?;
    if characteristics.len() != 2 {
        return Err(Error::ProtocolMismatch(format!(
            "unexpected number of characteristics, expected 2, got {}",
            characteristics.len()
        )));
    }

    let mut write = None;
    let mut read = None;
    for characteristic in characteristics {
        let short = protocol::short_uuid(&characteristic.uuid).ok_or_else(|| {
            Error::ProtocolMismatch(format!(
                "characteristic {} is not a 16-bit UUID",
                characteristic.uuid
            ))
        })?;
        let mtu = peripheral
            .mtu(&characteristic)
            .await
            .map_err(link_error)?;
        let endpoint = Endpoint {
            characteristic,
            mtu,
        };
        match short {
            WRITE_CHAR_ID => write = Some(endpoint),
            READ_CHAR_ID => read = Some(endpoint),
            other => {
                return Err(Error::ProtocolMismatch(format!(
                    "invalid characteristic {:#06x}",
                    other
                )))
            }
        }
    }

    match (write, read) {
        (Some(write), Some(read)) => Ok((write, read)),
        (None, _) => Err(Error::ProtocolMismatch(
            "write characteristic missing".to_string(),
        )),
        (_, None) => Err(Error::ProtocolMismatch(
            "read characteristic missing".to_string(),
        )),
    }
}
