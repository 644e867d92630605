//! Display Service Module
//!
//! Public facade over the display: encodes each command and hands it to the
//! connection for fragmented delivery. This is the only type front-ends need.

use crate::domain::colour::Colour;
use crate::domain::models::{ClockStyle, ClockTime};
use crate::domain::settings::ClockSettings;
use crate::error::Result;
use crate::infrastructure::bluetooth::{
    adapter::BleAdapter,
    connection::{ConnectionConfig, ConnectionState, DeviceConnection},
    protocol,
    scanner::ScanCancel,
};
use std::sync::Arc;
use tracing::{debug, info};

/// A connected display ready for commands.
pub struct DisplayService<A: BleAdapter> {
    connection: DeviceConnection<A>,
}

impl<A: BleAdapter> DisplayService<A> {
    /// Discover the display at `address` and connect to it.
    pub async fn connect(
        adapter: Arc<A>,
        address: &str,
        config: ConnectionConfig,
        cancel: &ScanCancel,
    ) -> Result<Self> {
        let mut connection = DeviceConnection::new(adapter, address, config);
        connection.discover(cancel).await?;
        connection.connect().await?;
        Ok(Self { connection })
    }

    /// Wrap an existing connection. Commands fail with `NotReady` until it is connected.
    pub fn from_connection(connection: DeviceConnection<A>) -> Self {
        Self { connection }
    }

    pub fn connection(&self) -> &DeviceConnection<A> {
        &self.connection
    }

    pub fn connection_mut(&mut self) -> &mut DeviceConnection<A> {
        &mut self.connection
    }

    pub fn state(&self) -> ConnectionState {
        self.connection.state()
    }

    /// Select a clock face. `style` must be 0..=4.
    pub async fn set_clock_mode(
        &mut self,
        style: u8,
        show_date: bool,
        hour24: bool,
        colour: Colour,
    ) -> Result<()> {
        let style = ClockStyle::try_from(style)?;
        info!(
            "Setting clock mode {:?} (date: {}, 24h: {}, colour: {})",
            style, show_date, hour24, colour
        );
        let packet = protocol::encode_clock_mode(style, show_date, hour24, colour);
        self.connection.write(&packet).await
    }

    /// Set the display's wall clock.
    pub async fn set_time(&mut self, time: &ClockTime) -> Result<()> {
        debug!("Setting time {:?}", time);
        self.connection
            .write(&protocol::encode_set_time(time))
            .await
    }

    pub async fn set_draw_mode(&mut self, mode: u8) -> Result<()> {
        debug!("Setting draw mode {}", mode);
        self.connection
            .write(&protocol::encode_draw_mode(mode))
            .await
    }

    /// Upload raw image bytes.
    ///
    /// The display only accepts the upload after
    /// [`set_draw_mode`](Self::set_draw_mode) with
    /// [`DRAW_MODE_IMAGE`](protocol::DRAW_MODE_IMAGE); use
    /// [`show_image`](Self::show_image) to do both. An empty image sends nothing.
    pub async fn send_image(&mut self, image: &[u8]) -> Result<()> {
        let packet = protocol::encode_image_transfer(image)?;
        if packet.is_empty() {
            debug!("Empty image, nothing to send");
            return Ok(());
        }
        info!(
            "Sending image of {} bytes in {} chunk(s)",
            image.len(),
            protocol::image_chunk_count(image.len())
        );
        self.connection.write(&packet).await
    }

    /// Switch to image drawing and upload `image`.
    pub async fn show_image(&mut self, image: &[u8]) -> Result<()> {
        // encode first so an oversized image fails before the mode switch
        let packet = protocol::encode_image_transfer(image)?;
        self.set_draw_mode(protocol::DRAW_MODE_IMAGE).await?;
        if packet.is_empty() {
            return Ok(());
        }
        self.connection.write(&packet).await
    }

    /// Sync the time and select the configured clock face.
    pub async fn show_clock(&mut self, now: &ClockTime, clock: &ClockSettings) -> Result<()> {
        let colour = match clock.colour.as_deref() {
            Some(text) => Colour::parse(text)?,
            None => Colour::default(),
        };
        self.set_time(now).await?;
        self.set_clock_mode(clock.style.as_raw(), clock.show_date, clock.hour24, colour)
            .await
    }

    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await
    }
}
