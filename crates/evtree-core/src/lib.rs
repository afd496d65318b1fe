//! Reference-counted handles and the named datum tree for event data.
//!
//! Event data is stored as a mutable tree of named nodes ("datums"). Each
//! container owns its children; children keep a non-owning reference to
//! their parent. Lookup uses unix-like paths (`.`, `..`, `/name`, `~/`,
//! `//`) and is transparent to hard and path links.
//!
//! Independently of the tree, a [`Handle<T>`] gives typed, cloneable,
//! strong-or-weak access to any [`Object`], with checked conversion between
//! views of the same object.
//!
//! # Modules
//!
//! - [`error`] — Error types for handles, the tree, and configuration
//! - [`object`] — [`Object`], [`View`] and [`impl_object!`]
//! - [`handle`] — [`Handle`] and its shared [`HandleCore`]
//! - [`registry`] — Optional leak-diagnosis registry of live handle cores
//! - [`datum`] — [`Datum`], [`DatumHeader`] and the [`DatumRef`] tree API
//! - [`path`] — Path resolution and link following
//! - [`container`] — [`Container`] and [`OrderedContainer`]
//! - [`link`] — [`HardLink`] and [`PathLink`]
//! - [`scalar`] — Simple leaf datums
//! - [`event`] — The [`Event`] root and its [`EventContext`]
//! - [`config`] — [`CoreConfig`]
//!
//! # Single-threaded
//!
//! Handles and datums are built on `Rc` and `RefCell` and are not `Send`.

pub mod config;
pub mod container;
pub mod datum;
pub mod error;
pub mod event;
pub mod handle;
pub mod link;
pub mod object;
pub mod path;
pub mod registry;
pub mod scalar;

#[cfg(test)]
mod fixtures;

pub use config::CoreConfig;
pub use container::{Container, OrderedContainer};
pub use datum::{Datum, DatumHeader, DatumRef, Indirection, ListOptions, UNNAMED};
pub use error::{ConfigError, DatumError, DatumResult, HandleError, HandleResult};
pub use event::{Event, EventContext, EVENT_FOLDERS, UNINITIALIZED_EVENT};
pub use handle::{Handle, HandleCore};
pub use link::{HardLink, PathLink};
pub use object::{into_object, Object, ObjectRef, View, WeakObjectRef};
pub use registry::{RegistryReport, RegistryScope};
pub use scalar::{IntegerDatum, PlainDatum, RealDatum};
