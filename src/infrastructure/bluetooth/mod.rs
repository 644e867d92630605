//! Bluetooth Module
//!
//! Provides BLE communication with the iDot LED matrix display.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                     DisplayService                       │
//! │  (Public facade - clock, time, draw mode, image upload)  │
//! └─────────────────────┬───────────────────────────────────┘
//!                       │
//!         ┌─────────────┼──────────────┐
//!         │             │              │
//!         ▼             ▼              ▼
//! ┌────────────┐  ┌────────────┐  ┌───────────┐
//! │  Protocol  │  │ Connection │  │ Transport │
//! │            │  │            │  │           │
//! │ - UUIDs    │  │ - Scanner  │  │ - MTU     │
//! │ - Packet   │  │ - GATT     │  │   fragments│
//! │   encoders │  │   checks   │  │ - Writes  │
//! └────────────┘  └─────┬──────┘  └───────────┘
//!                       │
//!                       ▼
//!              ┌─────────────────┐
//!              │   BleAdapter    │
//!              │ (btleplug/fake) │
//!              └─────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`protocol`] - GATT identifiers and command packet encoders
//! - [`adapter`] - BLE capability the engine drives
//! - [`btleplug_backend`] - Platform adapter built on btleplug
//! - [`scanner`] - Discovery by address with cancellation
//! - [`transport`] - MTU-bounded fragmented writes
//! - [`connection`] - Connection state machine and service validation
//! - [`service`] - Display facade

pub mod adapter;
pub mod btleplug_backend;
pub mod connection;
pub mod protocol;
pub mod scanner;
pub mod service;
pub mod transport;

#[cfg(test)]
pub(crate) mod fake;

// Re-export main service for convenience
pub use service::DisplayService;
