//! Error types for handles and the datum tree.

/// Errors raised when dereferencing a [`Handle`](crate::Handle).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HandleError {
    /// The handle is null, its pointee has been destroyed, or the pointee
    /// cannot be viewed as the requested type.
    #[error("bad reference: handle to `{expected}` does not point at a live `{expected}`")]
    BadReference {
        /// The type the handle was asked to produce.
        expected: &'static str,
    },

    /// The pointee is already mutably borrowed elsewhere.
    #[error("object `{class}` is already borrowed")]
    Borrowed {
        /// Class name of the borrowed object.
        class: &'static str,
    },
}

/// Errors raised by datum tree operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DatumError {
    /// An insertion was refused; the tree is unchanged.
    #[error("bad insertion: {reason}")]
    BadInsertion {
        /// Why the insertion was refused.
        reason: String,
    },

    /// A lookup found an object that is not of the requested type.
    #[error("bad conversion: `{path}` is a `{from}`, not a `{to}`")]
    BadConversion {
        /// The path that was looked up.
        path: String,
        /// Class name of the object found.
        from: &'static str,
        /// The requested type.
        to: &'static str,
    },

    /// A required element does not exist.
    #[error("no such element: `{path}`")]
    NoSuchElement {
        /// The path or index that was looked up.
        path: String,
    },

    /// A path is syntactically invalid.
    #[error("bad name `{path}`: {reason}")]
    BadName {
        /// The offending path.
        path: String,
        /// What is wrong with it.
        reason: &'static str,
    },

    /// A link cannot be followed.
    #[error("bad link `{name}`")]
    BadLink {
        /// Name of the link that failed.
        name: String,
    },

    /// A handle error surfaced through a tree operation.
    #[error(transparent)]
    Handle(#[from] HandleError),
}

/// Errors raised when loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration text is not valid TOML for the expected structure.
    #[error("invalid configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Convenience alias for handle results.
pub type HandleResult<T> = Result<T, HandleError>;

/// Convenience alias for datum tree results.
pub type DatumResult<T> = Result<T, DatumError>;
