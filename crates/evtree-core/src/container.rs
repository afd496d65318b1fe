//! Datums that own other datums.
//!
//! [`Container`] is the owning side of the tree: it holds the only strong
//! pointers to its children. [`OrderedContainer`] keeps persistent children
//! in insertion order and adds an overlay of temporary entries, which are
//! visible to lookup (masking persistent entries of the same name) but are
//! not part of the persisted contents.
//!
//! Parent back-references are maintained by [`DatumRef`](crate::DatumRef);
//! the methods here only manage the child lists.

use std::any::Any;
use std::fmt;

use crate::datum::{name_matches, Datum, DatumHeader};
use crate::error::DatumResult;
use crate::object::{read_object, same_object, Object, ObjectRef};

/// A datum that owns child datums.
pub trait Container: Datum {
    /// Append `item` to the persistent children.
    fn insert_datum(&mut self, item: ObjectRef);

    /// Remove `item` from the child lists, returning the owning pointer.
    fn take_datum(&mut self, item: &ObjectRef) -> Option<ObjectRef>;

    /// Remove every child, persistent and temporary.
    fn take_all(&mut self) -> Vec<ObjectRef>;

    /// Children in iteration order.
    fn entries(&self) -> Vec<ObjectRef>;

    /// A persistent child called `name`, ignoring temporaries.
    fn find_persistent(&self, name: &str) -> DatumResult<Option<ObjectRef>>;

    /// Number of children, persistent and temporary.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// The latest entry called `name`. A mutably borrowed entry cannot be
// checked, so when nothing else matches the lookup reports the borrow.
fn named(items: &[ObjectRef], name: &str) -> DatumResult<Option<ObjectRef>> {
    let mut blocked = None;
    for item in items.iter().rev() {
        match read_object(item) {
            Ok(object) => {
                if object.as_datum().is_some_and(|d| name_matches(d.name(), name)) {
                    return Ok(Some(item.clone()));
                }
            }
            Err(err) => {
                blocked.get_or_insert(err);
            }
        }
    }
    match blocked {
        Some(err) => Err(err.into()),
        None => Ok(None),
    }
}

fn take(items: &mut Vec<ObjectRef>, item: &ObjectRef) -> Option<ObjectRef> {
    let index = items.iter().position(|o| same_object(o, item))?;
    Some(items.remove(index))
}

/// Ordered persistent children plus an overlay of temporaries.
pub struct OrderedContainer {
    header: DatumHeader,
    persistent: Vec<ObjectRef>,
    temporary: Vec<ObjectRef>,
}

impl OrderedContainer {
    pub const DEFAULT_TITLE: &'static str = "Data Vector";

    /// An empty container with the default title.
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_title(name, Self::DEFAULT_TITLE)
    }

    /// An empty container with an explicit title.
    pub fn with_title(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            header: DatumHeader::new(name, title),
            persistent: Vec::new(),
            temporary: Vec::new(),
        }
    }

    /// Persistent entries in insertion order, then temporaries in insertion
    /// order. Reversible.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &ObjectRef> {
        self.persistent.iter().chain(self.temporary.iter())
    }

    /// Persistent children in insertion order.
    pub fn persistent(&self) -> &[ObjectRef] {
        &self.persistent
    }

    /// Temporary children in insertion order.
    pub fn temporaries(&self) -> &[ObjectRef] {
        &self.temporary
    }

    /// Whether `item` is one of the temporaries, by identity.
    pub fn is_temporary(&self, item: &ObjectRef) -> bool {
        self.temporary.iter().any(|o| same_object(o, item))
    }

    /// A temporary called `name`, ignoring persistent entries.
    pub fn find_temporary(&self, name: &str) -> DatumResult<Option<ObjectRef>> {
        named(&self.temporary, name)
    }

    pub(crate) fn push_temporary(&mut self, item: ObjectRef) {
        self.temporary.push(item);
    }

    pub(crate) fn insert_persistent(&mut self, index: usize, item: ObjectRef) {
        let index = index.min(self.persistent.len());
        self.persistent.insert(index, item);
    }
}

impl fmt::Debug for OrderedContainer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OrderedContainer")
            .field("name", &self.header.name())
            .field("persistent", &self.persistent.len())
            .field("temporary", &self.temporary.len())
            .finish()
    }
}

impl Object for OrderedContainer {
    fn class_name(&self) -> &'static str {
        "OrderedContainer"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }

    fn as_datum(&self) -> Option<&(dyn Datum + 'static)> {
        Some(self)
    }

    fn as_datum_mut(&mut self) -> Option<&mut (dyn Datum + 'static)> {
        Some(self)
    }
}

impl Datum for OrderedContainer {
    fn header(&self) -> &DatumHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut DatumHeader {
        &mut self.header
    }

    // Temporaries first, and the latest entry of a name wins.
    fn find_datum(&self, name: &str) -> DatumResult<Option<ObjectRef>> {
        match named(&self.temporary, name)? {
            Some(found) => Ok(Some(found)),
            None => named(&self.persistent, name),
        }
    }

    fn as_container(&self) -> Option<&(dyn Container + 'static)> {
        Some(self)
    }

    fn as_container_mut(&mut self) -> Option<&mut (dyn Container + 'static)> {
        Some(self)
    }

    fn as_ordered(&self) -> Option<&OrderedContainer> {
        Some(self)
    }

    fn as_ordered_mut(&mut self) -> Option<&mut OrderedContainer> {
        Some(self)
    }
}

impl Container for OrderedContainer {
    fn insert_datum(&mut self, item: ObjectRef) {
        self.persistent.push(item);
    }

    fn take_datum(&mut self, item: &ObjectRef) -> Option<ObjectRef> {
        take(&mut self.temporary, item).or_else(|| take(&mut self.persistent, item))
    }

    fn take_all(&mut self) -> Vec<ObjectRef> {
        let mut all = std::mem::take(&mut self.persistent);
        all.append(&mut self.temporary);
        all
    }

    fn entries(&self) -> Vec<ObjectRef> {
        self.iter().cloned().collect()
    }

    fn find_persistent(&self, name: &str) -> DatumResult<Option<ObjectRef>> {
        named(&self.persistent, name)
    }

    fn len(&self) -> usize {
        self.persistent.len() + self.temporary.len()
    }
}

impl Drop for OrderedContainer {
    fn drop(&mut self) {
        for child in self.iter() {
            if let Ok(mut child) = child.try_borrow_mut() {
                if let Some(datum) = child.as_datum_mut() {
                    datum.header_mut().set_parent(None);
                }
            }
        }
    }
}
