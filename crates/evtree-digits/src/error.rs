//! Error types for digit containers, proxies and the digit manager.

use evtree_core::{DatumError, HandleError};

/// Errors that can occur while producing or resolving digit proxies.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DigitError {
    /// The offset does not address a digit in the container.
    #[error("digit not found: offset {offset} in a container of {size}")]
    NotFound {
        /// The requested offset.
        offset: u32,
        /// Number of digits in the container.
        size: usize,
    },

    /// No container of this kind exists and none could be generated.
    #[error("no `{kind}` digits are available")]
    NotAvailable {
        /// Name of the digit kind.
        kind: String,
    },

    /// The digit at the proxy's offset does not carry the proxy's salt; the
    /// container was rebuilt with different contents.
    #[error("proxy `{proxy}` does not match the current `{kind}` digits")]
    Mismatch {
        /// The proxy, as displayed.
        proxy: String,
        /// Name of the digit kind.
        kind: String,
    },

    /// The proxy carries a type tag with no known name.
    #[error("invalid digit proxy type {0}")]
    TypeInvalid(u32),

    /// A factory with this name is already registered.
    #[error("a digit factory named `{0}` is already registered")]
    MultipleFactories(String),

    /// The factory could not produce its digits.
    #[error("the `{0}` digit factory failed")]
    FactoryFailed(String),

    /// A tree error while looking up or storing digits.
    #[error(transparent)]
    Datum(#[from] DatumError),

    /// A handle error while reading a container.
    #[error(transparent)]
    Handle(#[from] HandleError),
}

/// Convenience alias for digit results.
pub type DigitResult<T> = Result<T, DigitError>;
