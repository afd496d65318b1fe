//! Tree nodes and the shared node pointer.
//!
//! A [`Datum`] is a named node of the event tree. Its [`DatumHeader`] holds
//! the name, the title and a non-owning back-reference to the parent.
//! Children are owned by their container; nothing else holds a strong
//! pointer to a tree node except the caller's own [`DatumRef`]s.
//!
//! [`DatumRef`] is the entry point for every tree operation: path lookup,
//! insertion, removal, re-parenting and listing. It keeps the parent
//! back-references consistent with container contents.

use std::any::type_name;
use std::fmt::{self, Write as _};
use std::rc::Rc;

use tracing::{debug, warn};

use crate::container::{Container, OrderedContainer};
use crate::error::{DatumError, DatumResult};
use crate::handle::Handle;
use crate::object::{
    class_of, into_object, read_object, same_object, viewable, write_object, Object, ObjectRef,
    View, WeakObjectRef,
};
use crate::path;

/// Display name of a datum with an empty name; also matches it in paths.
pub const UNNAMED: &str = "unnamed";

/// Name, title and parent back-reference shared by every datum.
#[derive(Debug, Default)]
pub struct DatumHeader {
    name: String,
    title: String,
    parent: Option<WeakObjectRef>,
}

impl DatumHeader {
    /// A header with no parent.
    pub fn new(name: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            title: title.into(),
            parent: None,
        }
    }

    /// The datum's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Set the name without looking at siblings. Datums already in a tree
    /// are renamed through [`DatumRef::set_name`].
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// The datum's title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// Set the title.
    pub fn set_title(&mut self, title: impl Into<String>) {
        self.title = title.into();
    }

    /// The parent, if it exists and is still alive.
    pub fn parent(&self) -> Option<ObjectRef> {
        self.parent.as_ref()?.upgrade()
    }

    pub(crate) fn set_parent(&mut self, parent: Option<WeakObjectRef>) {
        self.parent = parent;
    }
}

/// What a datum stands for during path resolution.
#[derive(Debug, Clone)]
pub enum Indirection {
    /// An ordinary node.
    Itself,
    /// A hard link; `target` is `None` when never set.
    Hard {
        name: String,
        target: Option<WeakObjectRef>,
    },
    /// A path link, resolved relative to its parent.
    Path {
        parent: Option<WeakObjectRef>,
        path: String,
    },
}

/// A node of the event tree.
pub trait Datum: Object {
    fn header(&self) -> &DatumHeader;

    fn header_mut(&mut self) -> &mut DatumHeader;

    fn name(&self) -> &str {
        self.header().name()
    }

    fn title(&self) -> &str {
        self.header().title()
    }

    /// Link hook used by path resolution.
    fn indirection(&self) -> Indirection {
        Indirection::Itself
    }

    /// Find an immediate child by name. No path traversal.
    fn find_datum(&self, _name: &str) -> DatumResult<Option<ObjectRef>> {
        Ok(None)
    }

    fn as_container(&self) -> Option<&(dyn Container + 'static)> {
        None
    }

    fn as_container_mut(&mut self) -> Option<&mut (dyn Container + 'static)> {
        None
    }

    fn as_ordered(&self) -> Option<&OrderedContainer> {
        None
    }

    fn as_ordered_mut(&mut self) -> Option<&mut OrderedContainer> {
        None
    }

    /// One-line value summary shown in listings.
    fn summary(&self) -> Option<String> {
        None
    }
}

/// Whether a datum called `name` answers to the path segment `segment`.
pub(crate) fn name_matches(name: &str, segment: &str) -> bool {
    name == segment || (name.is_empty() && segment == UNNAMED)
}

/// Options for [`DatumRef::listing`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ListOptions {
    /// Show titles after names.
    pub titles: bool,
    /// Show full names instead of short names.
    pub full_names: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Placement {
    Append,
    Temporary,
    At(usize),
}

fn bad_insertion(reason: impl Into<String>) -> DatumError {
    DatumError::BadInsertion {
        reason: reason.into(),
    }
}

/// Shared pointer to a datum; the handle for all tree operations.
#[derive(Clone)]
pub struct DatumRef(ObjectRef);

impl DatumRef {
    /// Allocate a new, parentless datum.
    pub fn new<T: Datum>(datum: T) -> Self {
        Self(into_object(datum))
    }

    /// Wrap an object if it is a datum.
    pub fn from_object(object: ObjectRef) -> Option<Self> {
        viewable::<dyn Datum>(&object).then_some(Self(object))
    }

    /// The datum behind a handle, if the handle is live.
    pub fn from_handle<T: ?Sized + View>(handle: &Handle<T>) -> Option<Self> {
        handle.pointer().and_then(Self::from_object)
    }

    /// The underlying object pointer.
    pub fn object(&self) -> &ObjectRef {
        &self.0
    }

    /// Unwrap into the object pointer.
    pub fn into_object(self) -> ObjectRef {
        self.0
    }

    /// Identity comparison.
    pub fn ptr_eq(&self, other: &DatumRef) -> bool {
        same_object(&self.0, &other.0)
    }

    /// The concrete type name, e.g. `OrderedContainer`.
    pub fn class_name(&self) -> &'static str {
        class_of(&self.0)
    }

    /// An undeletable handle observing this datum, null if it is not a `T`.
    pub fn handle<T: ?Sized + View>(&self) -> Handle<T> {
        Handle::observe(&self.0)
    }

    // Infallible accessors see a mutably borrowed datum as absent.
    fn read<R>(&self, f: impl FnOnce(&(dyn Datum + 'static)) -> R) -> Option<R> {
        let object = self.0.try_borrow().ok()?;
        object.as_datum().map(f)
    }

    fn try_write<R>(&self, f: impl FnOnce(&mut (dyn Datum + 'static)) -> R) -> DatumResult<R> {
        let mut object = write_object(&self.0)?;
        let datum = object
            .as_datum_mut()
            .ok_or_else(|| bad_insertion("not a datum"))?;
        Ok(f(datum))
    }

    fn try_parent(&self) -> DatumResult<Option<DatumRef>> {
        let object = read_object(&self.0)?;
        let parent = object.as_datum().and_then(|d| d.header().parent());
        Ok(parent.map(DatumRef))
    }

    // ---------------------------------------------------------------
    // Naming
    // ---------------------------------------------------------------

    /// The name; empty while the datum is mutably borrowed.
    pub fn name(&self) -> String {
        self.read(|d| d.name().to_string()).unwrap_or_default()
    }

    /// The name, or `unnamed` when it is empty.
    pub fn display_name(&self) -> String {
        let name = self.name();
        if name.is_empty() {
            UNNAMED.to_string()
        } else {
            name
        }
    }

    /// Rename the datum.
    ///
    /// Refused when a persistent sibling already uses the name (or, for a
    /// temporary, another temporary does). Empty names never clash.
    pub fn set_name(&self, name: &str) -> DatumResult<()> {
        if let Some(parent) = self.try_parent()? {
            let placement = if parent.is_temporary(self) {
                Placement::Temporary
            } else {
                Placement::Append
            };
            if let Some(other) = parent.sibling_named(name, placement)? {
                if !same_object(&other, &self.0) {
                    return Err(bad_insertion(format!(
                        "`{}` already contains an entry named `{name}`",
                        parent.full_name()
                    )));
                }
            }
        }
        self.try_write(|d| d.header_mut().set_name(name))
    }

    /// The title; empty while the datum is mutably borrowed.
    pub fn title(&self) -> String {
        self.read(|d| d.title().to_string()).unwrap_or_default()
    }

    /// Replace the title.
    pub fn set_title(&self, title: &str) -> DatumResult<()> {
        self.try_write(|d| d.header_mut().set_title(title))
    }

    /// `//root/child/leaf`, with `unnamed` standing in for empty names.
    pub fn full_name(&self) -> String {
        let mut names = Vec::new();
        let mut current = Some(self.clone());
        while let Some(datum) = current {
            names.push(datum.display_name());
            current = datum.parent();
        }
        names.reverse();
        format!("//{}", names.join("/"))
    }

    // ---------------------------------------------------------------
    // Structure
    // ---------------------------------------------------------------

    /// The parent, if any and still alive.
    pub fn parent(&self) -> Option<DatumRef> {
        self.read(|d| d.header().parent()).flatten().map(DatumRef)
    }

    /// The top of the tree this datum belongs to.
    pub fn root(&self) -> DatumRef {
        let mut current = self.clone();
        while let Some(parent) = current.parent() {
            current = parent;
        }
        current
    }

    /// True if `self` is `other` or one of its ancestors.
    pub fn contains(&self, other: &DatumRef) -> bool {
        let mut current = Some(other.clone());
        while let Some(datum) = current {
            if datum.ptr_eq(self) {
                return true;
            }
            current = datum.parent();
        }
        false
    }

    /// Whether the datum can hold children.
    pub fn is_container(&self) -> bool {
        self.read(|d| d.as_container().is_some()).unwrap_or(false)
    }

    /// Children in iteration order: persistent entries, then temporaries.
    pub fn entries(&self) -> Vec<DatumRef> {
        self.read(|d| d.as_container().map(|c| c.entries()))
            .flatten()
            .unwrap_or_default()
            .into_iter()
            .map(DatumRef)
            .collect()
    }

    /// Iterate over a snapshot of [`entries`](Self::entries).
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = DatumRef> + ExactSizeIterator {
        self.entries().into_iter()
    }

    /// Number of children; zero for leaves.
    pub fn len(&self) -> usize {
        self.read(|d| d.as_container().map_or(0, |c| c.len()))
            .unwrap_or(0)
    }

    /// True when there are no children.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `item` is one of this container's temporary entries.
    pub fn is_temporary(&self, item: &DatumRef) -> bool {
        self.read(|d| d.as_ordered().is_some_and(|o| o.is_temporary(&item.0)))
            .unwrap_or(false)
    }

    // ---------------------------------------------------------------
    // Lookup
    // ---------------------------------------------------------------

    /// Resolve link indirection on this datum.
    ///
    /// Ordinary datums resolve to themselves; links resolve to their target.
    /// `Ok(None)` means a path link that currently points nowhere.
    pub fn this(&self) -> DatumResult<Option<DatumRef>> {
        Ok(path::resolve_this(&self.0)?.and_then(DatumRef::from_object))
    }

    /// Look up `path` and view the result as `T`.
    ///
    /// Nothing found gives a null handle; something found that is not a `T`
    /// is a [`DatumError::BadConversion`]. The handle observes the tree node
    /// and never owns it.
    pub fn get<T: ?Sized + View>(&self, path: &str) -> DatumResult<Handle<T>> {
        let Some(found) = path::resolve(&self.0, path)? else {
            return Ok(Handle::null());
        };
        drop(read_object(&found)?);
        let handle = Handle::<T>::observe(&found);
        if handle.is_null() {
            let from = class_of(&found);
            warn!(path, from, to = type_name::<T>(), "cannot convert datum");
            return Err(DatumError::BadConversion {
                path: path.to_string(),
                from,
                to: type_name::<T>(),
            });
        }
        Ok(handle)
    }

    /// True when `path` resolves to a `T`. Never fails.
    pub fn has<T: ?Sized + View>(&self, path: &str) -> bool {
        matches!(self.get::<T>(path), Ok(handle) if !handle.is_null())
    }

    /// Like [`get`](Self::get), but a missing datum is an error.
    pub fn require<T: ?Sized + View>(&self, path: &str) -> DatumResult<Handle<T>> {
        let handle = self.get::<T>(path)?;
        if handle.is_null() {
            return Err(DatumError::NoSuchElement {
                path: path.to_string(),
            });
        }
        Ok(handle)
    }

    /// The parent viewed as `T`; a null handle for a root.
    pub fn parent_as<T: ?Sized + View>(&self) -> DatumResult<Handle<T>> {
        self.get::<T>("..")
    }

    /// Positional access over persistent then temporary entries, following
    /// links.
    pub fn at<T: ?Sized + View>(&self, index: usize) -> DatumResult<Handle<T>> {
        let label = format!("{}[{index}]", self.full_name());
        let entry = self
            .entries()
            .into_iter()
            .nth(index)
            .ok_or_else(|| DatumError::NoSuchElement {
                path: label.clone(),
            })?;
        let handle = match entry.this()? {
            Some(target) => target.handle::<T>(),
            None => Handle::null(),
        };
        if handle.is_null() {
            return Err(DatumError::BadConversion {
                path: label,
                from: entry.class_name(),
                to: type_name::<T>(),
            });
        }
        Ok(handle)
    }

    // ---------------------------------------------------------------
    // Mutation
    // ---------------------------------------------------------------

    /// Build `datum`, add it under its own name and return it.
    pub fn add<T: Datum>(&self, datum: T) -> DatumResult<DatumRef> {
        let item = DatumRef::new(datum);
        self.add_datum(item.clone(), None)?;
        Ok(item)
    }

    /// Take ownership of a parentless datum, optionally renaming it.
    ///
    /// Refused when the item already has a parent, when it is this
    /// container or one of its ancestors, or when a persistent sibling
    /// already uses the name.
    pub fn add_datum(&self, item: DatumRef, name: Option<&str>) -> DatumResult<()> {
        let name = name.map_or_else(|| item.name(), str::to_string);
        self.check_insertion(&item, &name, Placement::Append, false)?;
        self.attach(item, &name, Placement::Append)
    }

    /// Insert the object behind `handle`, releasing the handle's ownership.
    pub fn add_handle<T: ?Sized + View>(
        &self,
        handle: &Handle<T>,
        name: Option<&str>,
    ) -> DatumResult<()> {
        self.insert_handle(handle, name, Placement::Append)
    }

    /// Add a lookup-visible entry that masks a persistent sibling of the
    /// same name. Temporaries may not mask each other.
    pub fn add_temporary(&self, item: DatumRef, name: Option<&str>) -> DatumResult<()> {
        let name = name.map_or_else(|| item.name(), str::to_string);
        self.check_insertion(&item, &name, Placement::Temporary, false)?;
        self.attach(item, &name, Placement::Temporary)
    }

    pub fn add_temporary_handle<T: ?Sized + View>(
        &self,
        handle: &Handle<T>,
        name: Option<&str>,
    ) -> DatumResult<()> {
        self.insert_handle(handle, name, Placement::Temporary)
    }

    /// Persistent insertion at `index` (clamped to the persistent length).
    pub fn insert_datum_at(
        &self,
        index: usize,
        item: DatumRef,
        name: Option<&str>,
    ) -> DatumResult<()> {
        let name = name.map_or_else(|| item.name(), str::to_string);
        let placement = Placement::At(index);
        self.check_insertion(&item, &name, placement, false)?;
        self.attach(item, &name, placement)
    }

    /// Detach `item` if this container is its parent, handing it back.
    /// `Ok(None)` when `item` is not a child of this container.
    pub fn remove_datum(&self, item: &DatumRef) -> DatumResult<Option<DatumRef>> {
        match item.try_parent()? {
            Some(parent) if parent.ptr_eq(self) => {}
            _ => return Ok(None),
        }
        drop(write_object(&item.0)?);
        let removed = {
            let mut object = write_object(&self.0)?;
            object
                .as_datum_mut()
                .and_then(|d| d.as_container_mut())
                .and_then(|c| c.take_datum(&item.0))
        };
        let Some(removed) = removed else {
            return Ok(None);
        };
        item.try_write(|d| d.header_mut().set_parent(None))?;
        debug!(parent = %self.full_name(), child = %item.display_name(), "removed datum");
        Ok(Some(DatumRef(removed)))
    }

    /// Remove and drop `item`. `Ok(false)` if it was not a child.
    pub fn erase(&self, item: &DatumRef) -> DatumResult<bool> {
        Ok(self.remove_datum(item)?.is_some())
    }

    /// Detach and drop every child.
    pub fn clear(&self) -> DatumResult<()> {
        for child in self.entries() {
            drop(write_object(&child.0)?);
        }
        let taken = {
            let mut object = write_object(&self.0)?;
            match object.as_datum_mut().and_then(|d| d.as_container_mut()) {
                Some(container) => container.take_all(),
                None => Vec::new(),
            }
        };
        for child in taken {
            DatumRef(child).try_write(|d| d.header_mut().set_parent(None))?;
        }
        Ok(())
    }

    /// Move this datum under `new_parent`, keeping its name.
    pub fn reassign_parent(&self, new_parent: &DatumRef) -> DatumResult<()> {
        let old_parent = self.try_parent()?;
        if old_parent.as_ref().is_some_and(|p| p.ptr_eq(new_parent)) {
            return Ok(());
        }
        let name = self.name();
        new_parent.check_insertion(self, &name, Placement::Append, true)?;
        if let Some(old) = old_parent {
            old.remove_datum(self)?;
        }
        new_parent.attach(self.clone(), &name, Placement::Append)
    }

    fn insert_handle<T: ?Sized + View>(
        &self,
        handle: &Handle<T>,
        name: Option<&str>,
        placement: Placement,
    ) -> DatumResult<()> {
        let item = DatumRef::from_handle(handle)
            .ok_or_else(|| bad_insertion("handle is null or does not point at a datum"))?;
        let name = name.map_or_else(|| item.name(), str::to_string);
        self.check_insertion(&item, &name, placement, false)?;
        // `item` holds the pointer from here on.
        let _ = handle.release();
        self.attach(item, &name, placement)
    }

    fn check_insertion(
        &self,
        item: &DatumRef,
        name: &str,
        placement: Placement,
        moving: bool,
    ) -> DatumResult<()> {
        // Attaching rewrites the item's header.
        drop(write_object(&item.0)?);
        if !moving {
            if let Some(parent) = item.try_parent()? {
                return Err(bad_insertion(format!(
                    "`{}` already belongs to `{}`",
                    item.display_name(),
                    parent.full_name()
                )));
            }
        }
        if item.try_contains(self)? {
            return Err(bad_insertion(format!(
                "`{}` cannot be inserted into itself or its own descendant",
                item.full_name()
            )));
        }

        {
            let object = read_object(&self.0)?;
            let datum = object
                .as_datum()
                .ok_or_else(|| bad_insertion("target is not a datum"))?;
            let supported = match placement {
                Placement::Append => datum.as_container().is_some(),
                Placement::At(_) | Placement::Temporary => datum.as_ordered().is_some(),
            };
            if !supported {
                let reason = match placement {
                    Placement::Append => "is not a container",
                    Placement::At(_) => "does not support positional insertion",
                    Placement::Temporary => "cannot hold temporary entries",
                };
                return Err(bad_insertion(format!("`{}` {reason}", datum.name())));
            }
        }
        if self.sibling_named(name, placement)?.is_some() {
            return Err(bad_insertion(format!(
                "`{}` already contains an entry named `{name}`",
                self.full_name()
            )));
        }
        Ok(())
    }

    // The entry `name` would clash with: a persistent child for persistent
    // placements, a temporary for temporaries. Empty names never clash.
    fn sibling_named(&self, name: &str, placement: Placement) -> DatumResult<Option<ObjectRef>> {
        if name.is_empty() {
            return Ok(None);
        }
        let object = read_object(&self.0)?;
        let Some(datum) = object.as_datum() else {
            return Ok(None);
        };
        match placement {
            Placement::Append | Placement::At(_) => match datum.as_container() {
                Some(container) => container.find_persistent(name),
                None => Ok(None),
            },
            Placement::Temporary => match datum.as_ordered() {
                Some(ordered) => ordered.find_temporary(name),
                None => Ok(None),
            },
        }
    }

    // Like `contains`, but a borrowed ancestor is an error rather than the
    // end of the chain.
    fn try_contains(&self, other: &DatumRef) -> DatumResult<bool> {
        let mut current = Some(other.clone());
        while let Some(datum) = current {
            if datum.ptr_eq(self) {
                return Ok(true);
            }
            current = datum.try_parent()?;
        }
        Ok(false)
    }

    fn attach(&self, item: DatumRef, name: &str, placement: Placement) -> DatumResult<()> {
        {
            let mut object = write_object(&self.0)?;
            let datum = object
                .as_datum_mut()
                .ok_or_else(|| bad_insertion("target is not a datum"))?;
            match placement {
                Placement::Append => datum
                    .as_container_mut()
                    .ok_or_else(|| bad_insertion("target is not a container"))?
                    .insert_datum(item.0.clone()),
                Placement::Temporary => datum
                    .as_ordered_mut()
                    .ok_or_else(|| bad_insertion("target cannot hold temporaries"))?
                    .push_temporary(item.0.clone()),
                Placement::At(index) => datum
                    .as_ordered_mut()
                    .ok_or_else(|| bad_insertion("target is not ordered"))?
                    .insert_persistent(index, item.0.clone()),
            }
        }
        let parent = Rc::downgrade(&self.0);
        item.try_write(|d| {
            let header = d.header_mut();
            header.set_name(name);
            header.set_parent(Some(parent));
        })?;
        debug!(
            parent = %self.full_name(),
            child = name,
            temporary = placement == Placement::Temporary,
            "added datum"
        );
        Ok(())
    }

    // ---------------------------------------------------------------
    // Listing
    // ---------------------------------------------------------------

    /// Render this datum and everything below it, one line per datum.
    pub fn listing(&self, options: ListOptions) -> String {
        let mut out = String::new();
        self.write_listing(&mut out, options, 0, false);
        out
    }

    fn write_listing(&self, out: &mut String, options: ListOptions, depth: usize, temporary: bool) {
        let name = if options.full_names {
            self.full_name()
        } else {
            self.display_name()
        };
        let _ = write!(out, "{}{} {name}", "  ".repeat(depth), self.class_name());
        if options.titles {
            let title = self.title();
            if !title.is_empty() {
                let _ = write!(out, " \"{title}\"");
            }
        }
        if temporary {
            out.push_str(" [temporary]");
        }
        if let Some(summary) = self.read(|d| d.summary()).flatten() {
            let _ = write!(out, " {summary}");
        }
        out.push('\n');
        for child in self.entries() {
            let temporary = self.is_temporary(&child);
            child.write_listing(out, options, depth + 1, temporary);
        }
    }
}

impl PartialEq for DatumRef {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for DatumRef {}

impl From<DatumRef> for ObjectRef {
    fn from(datum: DatumRef) -> Self {
        datum.0
    }
}

impl fmt::Debug for DatumRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("DatumRef").field(&self.full_name()).finish()
    }
}

impl fmt::Display for DatumRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.full_name())
    }
}
