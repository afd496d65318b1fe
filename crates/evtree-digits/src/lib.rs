//! Digit containers and packed digit proxies.
//!
//! Raw detector records ("digits") are stored in a [`DigitContainer`] under
//! `~/digits/<type>` in an event. A [`DigitProxy`] is a 32-bit reference to
//! one of them that stays meaningful after the container is dropped: the
//! [`DigitManager`] regenerates the container through a registered
//! [`DigitFactory`] and the proxy's salt checks that the regenerated digits
//! match the ones the proxy was made from.
//!
//! # Modules
//!
//! - [`channel`] — [`ChannelId`] and the [`Digit`] trait
//! - [`container`] — [`DigitContainer`] and its signature
//! - [`proxy`] — [`DigitProxy`] bit layout and [`ProxyType`]
//! - [`manager`] — [`DigitManager`] and [`DigitFactory`]
//! - [`config`] — [`DigitConfig`]
//! - [`error`] — [`DigitError`]

pub mod channel;
pub mod config;
pub mod container;
pub mod error;
pub mod manager;
pub mod proxy;

#[cfg(test)]
mod fixtures;

pub use channel::{ChannelId, Digit};
pub use config::DigitConfig;
pub use container::{DigitContainer, DigitHeader};
pub use error::{DigitError, DigitResult};
pub use manager::{DigitFactory, DigitManager};
pub use proxy::{DigitProxy, ProxyType};
