//! Fragmenting Transport
//!
//! Splits a command packet into BLE-write-sized fragments and writes them in
//! order without response. Fragmenting knows nothing about the packet
//! contents; the image chunking in [`protocol`](super::protocol) is a separate,
//! device-level layer.

use crate::error::{Error, Result};
use crate::infrastructure::bluetooth::adapter::{BlePeripheral, CharacteristicInfo};
use std::time::Duration;
use tracing::{debug, trace};

/// Fragment size for a characteristic: its MTU, capped at `max_write_len`.
pub fn fragment_size(mtu: u16, max_write_len: usize) -> usize {
    usize::from(mtu).min(max_write_len).max(1)
}

/// The fragments `packet` is written as, in order.
pub fn fragments(packet: &[u8], fragment_size: usize) -> std::slice::Chunks<'_, u8> {
    packet.chunks(fragment_size.max(1))
}

/// Sequential fragment writer bound to one characteristic.
pub struct FragmentingTransport<'a, P: BlePeripheral> {
    peripheral: &'a P,
    characteristic: &'a CharacteristicInfo,
    fragment_size: usize,
    write_timeout: Option<Duration>,
}

impl<'a, P: BlePeripheral> FragmentingTransport<'a, P> {
    pub fn new(
        peripheral: &'a P,
        characteristic: &'a CharacteristicInfo,
        fragment_size: usize,
        write_timeout: Option<Duration>,
    ) -> Self {
        Self {
            peripheral,
            characteristic,
            fragment_size,
            write_timeout,
        }
    }

    /// Write `packet` fragment by fragment.
    ///
    /// Stops at the first failing fragment. Fragments already written stay
    /// written, so the device is left mid-packet.
    pub async fn write(&self, packet: &[u8]) -> Result<()> {
        let total = packet.len().div_ceil(self.fragment_size.max(1));
        debug!(
            "Writing {} bytes as {} fragment(s) of up to {} bytes",
            packet.len(),
            total,
            self.fragment_size
        );

        let mut offset = 0;
        for (index, fragment) in fragments(packet, self.fragment_size).enumerate() {
            trace!("Fragment {}/{}: {:02X?}", index + 1, total, fragment);
            self.write_fragment(index, offset, fragment).await?;
            offset += fragment.len();
        }
        Ok(())
    }

    async fn write_fragment(&self, index: usize, offset: usize, fragment: &[u8]) -> Result<()> {
        let write = self
            .peripheral
            .write_without_response(self.characteristic, fragment);

        let result = match self.write_timeout {
            Some(timeout) => tokio::time::timeout(timeout, write)
                .await
                .map_err(|_| Error::WriteTimeout {
                    fragment: index,
                    timeout,
                })?,
            None => write.await,
        };

        result.map_err(|e| Error::WriteFailed {
            fragment: index,
            offset,
            reason: e.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::bluetooth::fake::{FakeAdapter, TARGET};
    use crate::infrastructure::bluetooth::adapter::BleAdapter;
    use crate::infrastructure::bluetooth::protocol::{MAX_WRITE_LEN, WRITE_CHAR_UUID, SERVICE_UUID};

    fn write_char() -> CharacteristicInfo {
        CharacteristicInfo {
            uuid: WRITE_CHAR_UUID,
            service_uuid: SERVICE_UUID,
        }
    }

    #[test]
    fn test_fragment_size_policy() {
        assert_eq!(fragment_size(23, MAX_WRITE_LEN), 23);
        assert_eq!(fragment_size(517, MAX_WRITE_LEN), MAX_WRITE_LEN);
        assert_eq!(fragment_size(0, MAX_WRITE_LEN), 1);
    }

    #[test]
    fn test_fragments_cover_packet() {
        let packet: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        for size in [1, 20, 514, 4999, 5000, 6000] {
            let pieces: Vec<&[u8]> = fragments(&packet, size).collect();
            assert_eq!(pieces.len(), packet.len().div_ceil(size));
            assert!(pieces.iter().all(|p| p.len() <= size));
            assert_eq!(pieces.concat(), packet);
        }
        assert_eq!(fragments(&[], 20).count(), 0);
    }

    #[tokio::test]
    async fn test_writes_in_order() {
        let adapter = FakeAdapter::builder().build();
        let peripheral = adapter.connect(TARGET).await.unwrap();
        let characteristic = write_char();
        let transport = FragmentingTransport::new(&peripheral, &characteristic, 514, None);

        let packet: Vec<u8> = (0..1200u32).map(|i| i as u8).collect();
        transport.write(&packet).await.unwrap();

        let writes = adapter.writes();
        assert_eq!(
            writes.iter().map(Vec::len).collect::<Vec<_>>(),
            vec![514, 514, 172]
        );
        assert_eq!(writes.concat(), packet);
    }

    #[tokio::test]
    async fn test_first_failure_aborts_remaining_fragments() {
        let adapter = FakeAdapter::builder().fail_write_at(1).build();
        let peripheral = adapter.connect(TARGET).await.unwrap();
        let characteristic = write_char();
        let transport = FragmentingTransport::new(&peripheral, &characteristic, 100, None);

        let err = transport.write(&[7u8; 350]).await.unwrap_err();
        assert!(matches!(
            err,
            Error::WriteFailed {
                fragment: 1,
                offset: 100,
                ..
            }
        ));
        // only the first fragment reached the device
        assert_eq!(adapter.writes().len(), 1);
    }

    #[tokio::test]
    async fn test_write_timeout() {
        let adapter = FakeAdapter::builder()
            .write_delay(Duration::from_millis(200))
            .build();
        let peripheral = adapter.connect(TARGET).await.unwrap();
        let characteristic = write_char();
        let transport = FragmentingTransport::new(
            &peripheral,
            &characteristic,
            514,
            Some(Duration::from_millis(10)),
        );

        let err = transport.write(&[1, 2, 3]).await.unwrap_err();
        assert!(matches!(err, Error::WriteTimeout { fragment: 0, .. }));
        assert!(err.is_retryable());
    }
}
