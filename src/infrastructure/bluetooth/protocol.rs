//! iDot Display Protocol
//!
//! GATT identifiers and packet encoders for the iDot LED matrix. Every
//! encoder is pure; nothing here performs I/O.

use crate::domain::colour::Colour;
use crate::domain::models::{ClockStyle, ClockTime};
use crate::error::{Error, Result};
use tracing::{debug, warn};
use uuid::Uuid;

/// Vendor service (16-bit UUID 0x00FA)
pub const SERVICE_ID: u16 = 0x00fa;

/// Write characteristic - where command packets are sent
pub const WRITE_CHAR_ID: u16 = 0xfa02;

/// Read characteristic - notifications from the display
pub const READ_CHAR_ID: u16 = 0xfa03;

pub const SERVICE_UUID: Uuid = uuid_from_u16(SERVICE_ID);
pub const WRITE_CHAR_UUID: Uuid = uuid_from_u16(WRITE_CHAR_ID);
pub const READ_CHAR_UUID: Uuid = uuid_from_u16(READ_CHAR_ID);

/// Largest single BLE write issued regardless of the negotiated MTU.
pub const MAX_WRITE_LEN: usize = 514;

/// Image payloads are split into chunks of this size, each with its own header.
pub const IMAGE_CHUNK_LEN: usize = 4096;

/// Draw mode that must be selected before an image upload.
pub const DRAW_MODE_IMAGE: u8 = 1;

pub const CLOCK_MODE_LEN: usize = 8;
pub const SET_TIME_LEN: usize = 11;
pub const DRAW_MODE_LEN: usize = 5;
pub const IMAGE_CHUNK_HEADER_LEN: usize = 9;

const CLOCK_MODE_HEADER: [u8; 4] = [8, 0, 6, 1];
const SET_TIME_HEADER: [u8; 4] = [11, 0, 1, 128];
const DRAW_MODE_HEADER: [u8; 4] = [5, 0, 4, 1];

const SHOW_DATE_BIT: u8 = 0x80;
const HOUR24_BIT: u8 = 0x40;

// 0000xxxx-0000-1000-8000-00805f9b34fb
const BLUETOOTH_BASE_UUID: u128 = 0x00000000_0000_1000_8000_00805f9b34fb;
const SHORT_UUID_MASK: u128 = 0xffffffff << 96;

/// Expand a 16-bit assigned number onto the Bluetooth base UUID.
pub const fn uuid_from_u16(short: u16) -> Uuid {
    Uuid::from_u128(BLUETOOTH_BASE_UUID | ((short as u128) << 96))
}

/// The 16-bit form of `uuid`, or `None` when it is not a 16-bit UUID.
pub fn short_uuid(uuid: &Uuid) -> Option<u16> {
    let value = uuid.as_u128();
    if value & !SHORT_UUID_MASK != BLUETOOTH_BASE_UUID {
        return None;
    }
    let prefix = value >> 96;
    u16::try_from(prefix).ok()
}

/// Build the 8-byte clock mode packet.
///
/// ```text
/// 08 00 06 01 <status> R G B
/// status: bit 7 show date, bit 6 24-hour, bits 0-5 style
/// ```
pub fn encode_clock_mode(
    style: ClockStyle,
    show_date: bool,
    hour24: bool,
    colour: Colour,
) -> [u8; CLOCK_MODE_LEN] {
    let mut status = style.as_raw();
    if show_date {
        status |= SHOW_DATE_BIT;
    }
    if hour24 {
        status |= HOUR24_BIT;
    }

    let [r, g, b] = colour.as_bytes();
    let [h0, h1, h2, h3] = CLOCK_MODE_HEADER;
    [h0, h1, h2, h3, status, r, g, b]
}

/// Build the 11-byte set-time packet.
///
/// Every field travels as a single byte. The year is truncated to its low
/// byte (2024 → 0xE8), which is what the display firmware expects.
pub fn encode_set_time(time: &ClockTime) -> [u8; SET_TIME_LEN] {
    let [h0, h1, h2, h3] = SET_TIME_HEADER;
    [
        h0,
        h1,
        h2,
        h3,
        time.year as u8,
        time.month,
        time.day,
        time.weekday,
        time.hour,
        time.minute,
        time.second,
    ]
}

/// Build the 5-byte draw mode packet.
pub fn encode_draw_mode(mode: u8) -> [u8; DRAW_MODE_LEN] {
    let [h0, h1, h2, h3] = DRAW_MODE_HEADER;
    [h0, h1, h2, h3, mode]
}

/// Flag byte distinguishing the first image chunk from the rest.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkFlag {
    First,
    Continuation,
}

impl ChunkFlag {
    pub fn as_raw(self) -> u8 {
        match self {
            Self::First => 0x00,
            Self::Continuation => 0x02,
        }
    }
}

/// Header prefixed to each 4096-byte image chunk.
///
/// ```text
/// [0-1] : total length (u16 little-endian) = image length + chunk count
/// [2-3] : reserved, zero
/// [4]   : chunk flag (0x00 first, 0x02 continuation)
/// [5-8] : image length (i32 little-endian)
/// ```
///
/// The total length adds the chunk count to the image length. That looks
/// accidental but the display depends on it, so it is kept as is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageChunkHeader {
    pub total_len: u16,
    pub flag: ChunkFlag,
    pub image_len: i32,
}

impl ImageChunkHeader {
    pub fn to_bytes(&self) -> [u8; IMAGE_CHUNK_HEADER_LEN] {
        let [t0, t1] = self.total_len.to_le_bytes();
        let [l0, l1, l2, l3] = self.image_len.to_le_bytes();
        [t0, t1, 0, 0, self.flag.as_raw(), l0, l1, l2, l3]
    }
}

/// Number of outer chunks an image of `image_len` bytes is split into.
pub fn image_chunk_count(image_len: usize) -> usize {
    image_len.div_ceil(IMAGE_CHUNK_LEN)
}

/// Build the complete image transfer packet: every 4096-byte chunk of
/// `image` preceded by its [`ImageChunkHeader`].
///
/// The result is usually far larger than one BLE write; the transport
/// fragments it separately.
pub fn encode_image_transfer(image: &[u8]) -> Result<Vec<u8>> {
    let image_len = i32::try_from(image.len()).map_err(|_| Error::ImageTooLarge {
        len: image.len(),
        max: i32::MAX as usize,
    })?;

    let chunk_count = image_chunk_count(image.len());
    let declared = image.len() + chunk_count;
    if declared > u16::MAX as usize {
        warn!(
            "Image length field overflows 16 bits ({} bytes), sending the truncated value",
            declared
        );
    }
    let total_len = declared as u16;

    let mut packet = Vec::with_capacity(image.len() + chunk_count * IMAGE_CHUNK_HEADER_LEN);
    for (index, chunk) in image.chunks(IMAGE_CHUNK_LEN).enumerate() {
        let header = ImageChunkHeader {
            total_len,
            flag: if index == 0 {
                ChunkFlag::First
            } else {
                ChunkFlag::Continuation
            },
            image_len,
        };
        packet.extend_from_slice(&header.to_bytes());
        packet.extend_from_slice(chunk);
    }

    debug!(
        "Encoded image of {} bytes into {} chunk(s), {} bytes total",
        image.len(),
        chunk_count,
        packet.len()
    );
    Ok(packet)
}
