//! BLE Adapter Capability
//!
//! The platform Bluetooth stack as seen by the protocol engine. The adapter is
//! passed in explicitly so the engine never reaches for a process-wide
//! default, and so tests can substitute a scripted backend.

use crate::domain::models::Advertisement;
use async_trait::async_trait;
use futures::stream::BoxStream;
use thiserror::Error;
use uuid::Uuid;

/// Advertisements observed by a running scan.
pub type AdvertisementStream = BoxStream<'static, Advertisement>;

#[derive(Debug, Error)]
pub enum AdapterError {
    #[error("no bluetooth adapter available: {0}")]
    Unavailable(String),
    #[error("no peripheral with address {0}")]
    UnknownPeripheral(String),
    #[error("{operation} failed: {message}")]
    Operation {
        operation: &'static str,
        message: String,
    },
}

impl AdapterError {
    pub fn operation(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Operation {
            operation,
            message: err.to_string(),
        }
    }
}

/// A GATT service reported by a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInfo {
    pub uuid: Uuid,
}

/// A GATT characteristic reported by a peripheral.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CharacteristicInfo {
    pub uuid: Uuid,
    pub service_uuid: Uuid,
}

/// Adapter-level operations: power, scanning and connecting.
#[async_trait]
pub trait BleAdapter: Send + Sync {
    type Peripheral: BlePeripheral;

    /// Make the adapter ready for scanning. Safe to call repeatedly.
    async fn enable(&self) -> Result<(), AdapterError>;

    /// Release the adapter. Stops any running scan.
    async fn disable(&self) -> Result<(), AdapterError>;

    /// Start scanning and return the stream of advertisements seen from now on.
    async fn scan(&self) -> Result<AdvertisementStream, AdapterError>;

    /// Stop a running scan. Stopping an idle adapter is not an error.
    async fn stop_scan(&self) -> Result<(), AdapterError>;

    /// Open a link to the peripheral at `address`.
    async fn connect(&self, address: &str) -> Result<Self::Peripheral, AdapterError>;
}

/// Operations on a connected peripheral.
#[async_trait]
pub trait BlePeripheral: Send + Sync {
    /// Discover services, keeping those whose UUID is in `uuids`.
    async fn discover_services(&self, uuids: &[Uuid]) -> Result<Vec<ServiceInfo>, AdapterError>;

    /// Characteristics of `service` whose UUID is in `uuids`.
    async fn discover_characteristics(
        &self,
        service: &ServiceInfo,
        uuids: &[Uuid],
    ) -> Result<Vec<CharacteristicInfo>, AdapterError>;

    /// Largest write payload the link accepts for `characteristic`.
    async fn mtu(&self, characteristic: &CharacteristicInfo) -> Result<u16, AdapterError>;

    async fn write_without_response(
        &self,
        characteristic: &CharacteristicInfo,
        data: &[u8],
    ) -> Result<(), AdapterError>;

    async fn disconnect(&self) -> Result<(), AdapterError>;
}
