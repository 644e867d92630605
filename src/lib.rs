//! iDot LED matrix display control over Bluetooth LE.
//!
//! The crate drives a small LED-matrix display through its vendor GATT service:
//! discovery by address, service validation, and a compact binary command
//! protocol for clock faces, wall-clock time, draw mode and image upload.
//!
//! ```ignore
//! use idot_display::{BtleplugAdapter, ConnectionConfig, DisplayService, ScanCancel};
//! use std::sync::Arc;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let adapter = Arc::new(BtleplugAdapter::new().await?);
//! let mut display = DisplayService::connect(
//!     adapter,
//!     "AA:BB:CC:DD:EE:FF",
//!     ConnectionConfig::default(),
//!     &ScanCancel::new(),
//! )
//! .await?;
//! display.show_image(&std::fs::read("smiley.png")?).await?;
//! display.disconnect().await;
//! # Ok(())
//! # }
//! ```

pub mod domain;
pub mod error;
pub mod infrastructure;

pub use domain::colour::Colour;
pub use domain::models::{Advertisement, ClockStyle, ClockTime};
pub use error::{Error, Result};
pub use infrastructure::bluetooth::adapter::{AdapterError, BleAdapter, BlePeripheral};
pub use infrastructure::bluetooth::btleplug_backend::BtleplugAdapter;
pub use infrastructure::bluetooth::connection::{ConnectionConfig, ConnectionState, DeviceConnection};
pub use infrastructure::bluetooth::scanner::ScanCancel;
pub use infrastructure::bluetooth::service::DisplayService;
