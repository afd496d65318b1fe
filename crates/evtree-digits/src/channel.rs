//! Channel identifiers and the digit interface.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A 32-bit electronics channel identifier. Its internal layout belongs to
/// the detector that produced it; only the raw value is used here.
#[derive(
    Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct ChannelId(u32);

impl ChannelId {
    /// Wrap a raw channel number.
    pub const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// The raw channel number.
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

impl From<u32> for ChannelId {
    fn from(raw: u32) -> Self {
        Self(raw)
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

/// One raw-data record. Digits are immutable once stored in a container.
pub trait Digit: fmt::Debug {
    fn channel_id(&self) -> ChannelId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_is_zero_padded_hex() {
        assert_eq!(ChannelId::new(0x1f).to_string(), "0x0000001f");
        assert_eq!(ChannelId::from(0xdead_beef).as_u32(), 0xdead_beef);
    }

    #[test]
    fn serializes_as_bare_integer() {
        assert_eq!(serde_json::to_string(&ChannelId::new(42)).unwrap(), "42");
    }
}
