use chrono::{Datelike, Timelike};
use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Clock face shown by the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
#[repr(u8)]
pub enum ClockStyle {
    Default = 0,
    Christmas = 1,
    Racing = 2,
    Inverted = 3,
    #[default]
    AnimatedHourGlass = 4,
}

impl ClockStyle {
    pub fn as_raw(self) -> u8 {
        self as u8
    }
}

impl TryFrom<u8> for ClockStyle {
    type Error = Error;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Default),
            1 => Ok(Self::Christmas),
            2 => Ok(Self::Racing),
            3 => Ok(Self::Inverted),
            4 => Ok(Self::AnimatedHourGlass),
            other => Err(Error::InvalidStyle(other)),
        }
    }
}

impl From<ClockStyle> for u8 {
    fn from(style: ClockStyle) -> Self {
        style.as_raw()
    }
}

/// Wall-clock fields in the order the set-time command carries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ClockTime {
    pub year: i32,
    pub month: u8,
    pub day: u8,
    /// 1-based, counted from Sunday (Sunday = 1, Monday = 2, ..., Saturday = 7).
    pub weekday: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl ClockTime {
    pub fn new(year: i32, month: u8, day: u8, weekday: u8, hour: u8, minute: u8, second: u8) -> Self {
        Self {
            year,
            month,
            day,
            weekday,
            hour,
            minute,
            second,
        }
    }

    /// Capture the fields of any chrono date-time in its own timezone.
    pub fn from_datetime<T: Datelike + Timelike>(t: &T) -> Self {
        // chrono keeps all of these well inside a byte
        Self {
            year: t.year(),
            month: t.month() as u8,
            day: t.day() as u8,
            weekday: t.weekday().num_days_from_sunday() as u8 + 1,
            hour: t.hour() as u8,
            minute: t.minute() as u8,
            second: t.second() as u8,
        }
    }
}

/// One advertisement observed during a scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Advertisement {
    pub address: String,
    pub local_name: Option<String>,
    pub rssi: Option<i16>,
}

impl Advertisement {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            local_name: None,
            rssi: None,
        }
    }

    /// Bluetooth addresses compare case-insensitively.
    pub fn matches_address(&self, address: &str) -> bool {
        self.address.eq_ignore_ascii_case(address)
    }
}
