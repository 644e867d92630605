//! RGB colour values and their textual `"R,G,B"` form.

use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// An RGB colour as sent to the display, one byte per channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Colour {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Colour {
    pub const RED: Colour = Colour::new(255, 0, 0);
    pub const GREEN: Colour = Colour::new(0, 255, 0);
    pub const BLUE: Colour = Colour::new(0, 0, 255);

    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse a colour from `"R,G,B"`, whitespace around each field allowed.
    ///
    /// Channels outside 0-255 are rejected rather than truncated.
    pub fn parse(text: &str) -> Result<Self> {
        let invalid = || Error::InvalidColourFormat(text.to_string());

        let parts: Vec<&str> = text.split(',').collect();
        let [r, g, b] = parts[..] else {
            return Err(invalid());
        };

        let channel = |part: &str| part.trim().parse::<u8>().map_err(|_| invalid());
        Ok(Self::new(channel(r)?, channel(g)?, channel(b)?))
    }

    pub fn as_bytes(&self) -> [u8; 3] {
        [self.r, self.g, self.b]
    }
}

impl FromStr for Colour {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl fmt::Display for Colour {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.r, self.g, self.b)
    }
}
