//! Packed, checksummed references to digits.
//!
//! A [`DigitProxy`] is a single `u32`, most significant bit first:
//!
//! ```text
//! ttttt ssssssssss ooooooooooooooooo
//! ```
//!
//! - `t`: 5-bit source type ([`ProxyType`]), taken from the container name
//! - `s`: 10-bit salt, `(signature + channel id) mod 1024`
//! - `o`: 17-bit offset into the container; `0x1FFFF` marks an invalid proxy
//!
//! The proxy does not keep its container alive. It is resolved later, via
//! the [`DigitManager`], against whatever container of the right type the
//! event then holds, and the salt catches most cases where that container
//! was rebuilt with different contents.

use std::fmt;
use std::rc::Rc;

use evtree_core::{Datum, DatumRef};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::channel::Digit;
use crate::container::DigitContainer;
use crate::error::{DigitError, DigitResult};
use crate::manager::DigitManager;

const TYPE_MASK: u32 = 0xF800_0000;
const TYPE_SHIFT: u32 = 27;
const SALT_MASK: u32 = 0x07FE_0000;
const SALT_SHIFT: u32 = 17;
const OFFSET_MASK: u32 = 0x0001_FFFF;
const SALT_MODULUS: u32 = 1024;

/// Source of the digits a proxy points into.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum ProxyType {
    Invalid = 0,
    Test = 1,
    P0D = 2,
    Tpc = 3,
    Fgd = 4,
    ECal = 5,
    Smrd = 6,
    Ingrid = 7,
}

impl ProxyType {
    const ALL: [ProxyType; 8] = [
        ProxyType::Invalid,
        ProxyType::Test,
        ProxyType::P0D,
        ProxyType::Tpc,
        ProxyType::Fgd,
        ProxyType::ECal,
        ProxyType::Smrd,
        ProxyType::Ingrid,
    ];

    /// The type for a container name; unknown names are logged and give
    /// [`ProxyType::Invalid`].
    pub fn from_name(name: &str) -> Self {
        match Self::ALL.into_iter().find(|t| t.name() == name) {
            Some(kind) => kind,
            None => {
                error!(name, "no digit proxy type for container name");
                ProxyType::Invalid
            }
        }
    }

    /// The container name for this type.
    pub fn name(self) -> &'static str {
        match self {
            ProxyType::Invalid => "invalid",
            ProxyType::Test => "test",
            ProxyType::P0D => "p0d",
            ProxyType::Tpc => "tpc",
            ProxyType::Fgd => "fgd",
            ProxyType::ECal => "ecal",
            ProxyType::Smrd => "smrd",
            ProxyType::Ingrid => "ingrid",
        }
    }

    /// The type for a 5-bit tag, if any.
    pub fn from_raw(tag: u32) -> Option<Self> {
        Self::ALL.into_iter().find(|t| *t as u32 == tag)
    }
}

impl fmt::Display for ProxyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The salt a digit carries in a container with the given signature.
fn salt_for(signature: u32, digit: &dyn Digit) -> u32 {
    signature.wrapping_add(digit.channel_id().as_u32()) % SALT_MODULUS
}

/// A packed reference to one digit.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DigitProxy(u32);

impl DigitProxy {
    /// Offset value marking a proxy that points nowhere.
    pub const INVALID_OFFSET: u32 = OFFSET_MASK;

    /// Proxy for the digit at `offset` in `container`.
    pub fn new(container: &DigitContainer, offset: usize) -> DigitResult<Self> {
        let digit = container.get(offset).ok_or_else(|| DigitError::NotFound {
            offset: u32::try_from(offset).unwrap_or(u32::MAX),
            size: container.len(),
        })?;
        let mut proxy = Self::default();
        proxy.set_type(ProxyType::from_name(container.name()));
        proxy.set_salt(salt_for(container.signature(), digit.as_ref()));
        proxy.set_offset(offset);
        Ok(proxy)
    }

    /// Proxy for a digit already held by `container`, located by identity.
    pub fn for_digit(container: &DigitContainer, digit: &Rc<dyn Digit>) -> DigitResult<Self> {
        let offset = container.position(digit).ok_or(DigitError::NotFound {
            offset: Self::INVALID_OFFSET,
            size: container.len(),
        })?;
        Self::new(container, offset)
    }

    /// Reinterpret a packed word.
    pub const fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// The packed word.
    pub const fn as_raw(self) -> u32 {
        self.0
    }

    /// The raw 5-bit type field.
    pub const fn type_tag(self) -> u32 {
        (self.0 & TYPE_MASK) >> TYPE_SHIFT
    }

    /// The source type; an unknown tag is [`DigitError::TypeInvalid`].
    pub fn proxy_type(self) -> DigitResult<ProxyType> {
        ProxyType::from_raw(self.type_tag()).ok_or(DigitError::TypeInvalid(self.type_tag()))
    }

    /// The 10-bit salt field.
    pub const fn salt(self) -> u32 {
        (self.0 & SALT_MASK) >> SALT_SHIFT
    }

    /// The 17-bit offset field.
    pub const fn offset(self) -> u32 {
        self.0 & OFFSET_MASK
    }

    /// False for the invalid offset and for invalid or unknown types.
    pub fn is_valid(self) -> bool {
        self.offset() != Self::INVALID_OFFSET
            && matches!(self.proxy_type(), Ok(kind) if kind != ProxyType::Invalid)
    }

    /// True when `digit`, in a container with `signature`, carries this
    /// proxy's salt.
    pub fn check_salt(self, signature: u32, digit: &dyn Digit) -> bool {
        salt_for(signature, digit) == self.salt()
    }

    /// Look the digit up in `event`. See [`DigitManager::get_digit`].
    pub fn resolve(self, manager: &DigitManager, event: &DatumRef) -> DigitResult<Rc<dyn Digit>> {
        manager.get_digit(event, self)
    }

    fn set_type(&mut self, kind: ProxyType) {
        self.0 = (self.0 & !TYPE_MASK) | (((kind as u32) << TYPE_SHIFT) & TYPE_MASK);
    }

    fn set_salt(&mut self, salt: u32) {
        self.0 = (self.0 & !SALT_MASK) | ((salt << SALT_SHIFT) & SALT_MASK);
    }

    fn set_offset(&mut self, offset: usize) {
        let offset = match u32::try_from(offset) {
            Ok(offset) if offset < Self::INVALID_OFFSET => offset,
            _ => {
                error!(offset, "digit offset does not fit in a proxy");
                Self::INVALID_OFFSET
            }
        };
        self.0 = (self.0 & !OFFSET_MASK) | offset;
    }
}

impl Default for DigitProxy {
    fn default() -> Self {
        Self(((ProxyType::Invalid as u32) << TYPE_SHIFT) | Self::INVALID_OFFSET)
    }
}

impl fmt::Display for DigitProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.proxy_type() {
            Ok(kind) if kind != ProxyType::Invalid => write!(f, "{kind}: ")?,
            _ => write!(f, "invalid type({}) ", self.type_tag())?,
        }
        if self.offset() == Self::INVALID_OFFSET {
            write!(f, "invalid offset({})", self.offset())
        } else {
            write!(f, "{}", self.offset())
        }
    }
}

impl fmt::Debug for DigitProxy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DigitProxy")
            .field("type", &self.type_tag())
            .field("salt", &self.salt())
            .field("offset", &self.offset())
            .finish()
    }
}
