//! Reference-counted, typed handles.
//!
//! A [`Handle<T>`] is a cloneable smart reference to an [`Object`] viewed as
//! `T`. All handles to the same object share one [`HandleCore`], which
//! either owns the object (deletable) or merely observes it (undeletable,
//! used for objects owned by the datum tree or by someone else).
//!
//! # Counting
//!
//! - Strong handles count toward `references`; weak handles do not.
//! - Every handle, strong or weak, counts toward `handles` (diagnostics).
//! - When `references` drops to zero on a deletable, unreleased core the
//!   object is destroyed, even if weak handles still point at the core.
//! - The core itself goes away with its last handle.

use std::any::type_name;
use std::cell::{Cell, RefCell};
use std::cmp::Ordering;
use std::fmt;
use std::marker::PhantomData;
use std::rc::Rc;

use tracing::{debug, error};

use crate::error::{HandleError, HandleResult};
use crate::object::{class_of, into_object, viewable, Object, ObjectRef, View, WeakObjectRef};
use crate::registry;

enum Slot {
    Owned(ObjectRef),
    Observed(WeakObjectRef),
    Empty,
}

thread_local! {
    static NEXT_CORE_ID: Cell<u64> = const { Cell::new(1) };
}

fn next_core_id() -> u64 {
    NEXT_CORE_ID.with(|n| {
        let id = n.get();
        n.set(id + 1);
        id
    })
}

/// The shared ownership record behind every handle to one object.
pub struct HandleCore {
    id: u64,
    slot: RefCell<Slot>,
    deletable: bool,
    released: Cell<bool>,
    references: Cell<u32>,
    handles: Cell<u32>,
}

impl HandleCore {
    fn new(slot: Slot, deletable: bool) -> Rc<Self> {
        let core = Rc::new(Self {
            id: next_core_id(),
            slot: RefCell::new(slot),
            deletable,
            released: Cell::new(false),
            references: Cell::new(0),
            handles: Cell::new(0),
        });
        registry::register(&core);
        core
    }

    /// Identifier unique within the thread, used by the registry.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Number of strong handles.
    pub fn reference_count(&self) -> u32 {
        self.references.get()
    }

    /// Number of handles, strong and weak.
    pub fn handle_count(&self) -> u32 {
        self.handles.get()
    }

    /// Whether the core destroys its object when the last strong handle goes.
    pub fn is_deletable(&self) -> bool {
        self.deletable
    }

    pub fn is_released(&self) -> bool {
        self.released.get()
    }

    /// A strong pointer to the object, if it is still alive.
    pub fn pointer(&self) -> Option<ObjectRef> {
        match &*self.slot.borrow() {
            Slot::Owned(object) => Some(object.clone()),
            Slot::Observed(weak) => weak.upgrade(),
            Slot::Empty => None,
        }
    }

    // ---------------------------------------------------------------
    // Counting
    // ---------------------------------------------------------------

    fn attach(&self, strong: bool) {
        let handles = self.handles.get() + 1;
        self.handles.set(handles);
        if strong {
            self.add_reference();
        }
        if handles > registry::handle_count_warning() {
            error!(core = self.id, handles, "excessive number of handles to one object");
        }
    }

    fn detach(&self, strong: bool) {
        self.handles.set(self.handles.get().saturating_sub(1));
        if strong {
            self.drop_reference();
        }
    }

    fn add_reference(&self) {
        self.references.set(self.references.get() + 1);
    }

    fn drop_reference(&self) {
        let references = self.references.get().saturating_sub(1);
        self.references.set(references);
        if references == 0 && self.deletable && !self.released.get() {
            self.destroy();
        }
    }

    fn destroy(&self) {
        let old = std::mem::replace(&mut *self.slot.borrow_mut(), Slot::Empty);
        if let Slot::Owned(object) = old {
            debug!(core = self.id, class = class_of(&object), "destroying handle object");
            drop(object);
        }
    }

    fn release(&self) -> Option<ObjectRef> {
        let mut slot = self.slot.borrow_mut();
        let owned = match &*slot {
            Slot::Owned(object) => object.clone(),
            _ => return None,
        };
        *slot = Slot::Observed(Rc::downgrade(&owned));
        self.released.set(true);
        Some(owned)
    }
}

impl Drop for HandleCore {
    fn drop(&mut self) {
        registry::unregister(self.id);
    }
}

impl fmt::Debug for HandleCore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandleCore")
            .field("id", &self.id)
            .field("deletable", &self.deletable)
            .field("released", &self.released.get())
            .field("references", &self.references.get())
            .field("handles", &self.handles.get())
            .finish()
    }
}

/// A typed, cloneable reference to an object, strong or weak.
pub struct Handle<T: ?Sized + View> {
    core: Option<Rc<HandleCore>>,
    weak: bool,
    _marker: PhantomData<*const T>,
}

impl<T: Object + View> Handle<T> {
    /// Take ownership of `value`. The object is destroyed with the last
    /// strong handle.
    pub fn new(value: T) -> Self {
        Self::attach(HandleCore::new(Slot::Owned(into_object(value)), true), false)
    }
}

impl<T: ?Sized + View> Handle<T> {
    /// A handle that points at nothing.
    pub fn null() -> Self {
        Self {
            core: None,
            weak: false,
            _marker: PhantomData,
        }
    }

    fn attach(core: Rc<HandleCore>, weak: bool) -> Self {
        core.attach(!weak);
        Self {
            core: Some(core),
            weak,
            _marker: PhantomData,
        }
    }

    /// Wrap an existing object.
    ///
    /// With `owner` set the new core owns `object` and destroys it with the
    /// last strong handle; otherwise it only observes it, and `object` must
    /// be kept alive elsewhere. Returns a null handle when the object cannot
    /// be viewed as `T`.
    pub fn from_object(object: ObjectRef, owner: bool) -> Self {
        if !viewable::<T>(&object) {
            debug!(class = class_of(&object), to = type_name::<T>(), "handle conversion failed");
            return Self::null();
        }
        let slot = if owner {
            Slot::Owned(object)
        } else {
            Slot::Observed(Rc::downgrade(&object))
        };
        Self::attach(HandleCore::new(slot, owner), false)
    }

    /// An undeletable handle observing an object owned elsewhere.
    pub fn observe(object: &ObjectRef) -> Self {
        Self::from_object(object.clone(), false)
    }

    /// True when there is no live object behind the handle.
    pub fn is_null(&self) -> bool {
        self.pointer().is_none()
    }

    pub fn is_weak(&self) -> bool {
        self.weak
    }

    /// True when the shared core still owns the object.
    pub fn is_owner(&self) -> bool {
        self.core
            .as_ref()
            .is_some_and(|c| c.is_deletable() && !c.is_released())
    }

    /// A strong pointer to the object, if alive.
    pub fn pointer(&self) -> Option<ObjectRef> {
        self.core.as_ref()?.pointer()
    }

    pub fn core(&self) -> Option<&Rc<HandleCore>> {
        self.core.as_ref()
    }

    pub fn reference_count(&self) -> u32 {
        self.core.as_ref().map_or(0, |c| c.reference_count())
    }

    pub fn handle_count(&self) -> u32 {
        self.core.as_ref().map_or(0, |c| c.handle_count())
    }

    // ---------------------------------------------------------------
    // Strong / weak
    // ---------------------------------------------------------------

    /// Turn this handle into a weak one.
    ///
    /// The strong count drops first, so if this was the last strong handle
    /// to a deletable object the object is destroyed right here and the
    /// handle becomes null.
    pub fn make_weak(&mut self) {
        if self.weak {
            return;
        }
        if let Some(core) = &self.core {
            self.weak = true;
            core.drop_reference();
        }
    }

    /// Turn a weak handle back into a strong one.
    pub fn make_lock(&mut self) {
        if !self.weak {
            return;
        }
        if let Some(core) = &self.core {
            self.weak = false;
            core.add_reference();
        }
    }

    /// Give up ownership: the object is no longer destroyed by any handle
    /// and the owning pointer is returned to the caller. Returns `None` for
    /// observing handles, which never owned anything.
    #[must_use = "the released object is dropped unless kept"]
    pub fn release(&self) -> Option<ObjectRef> {
        self.core.as_ref()?.release()
    }

    /// Checked conversion to another view of the same object. Yields a null
    /// handle when the object is not a `U`; the weak flag is preserved.
    pub fn cast<U: ?Sized + View>(&self) -> Handle<U> {
        match (&self.core, self.pointer()) {
            (Some(core), Some(object)) if viewable::<U>(&object) => {
                Handle::attach(core.clone(), self.weak)
            }
            _ => {
                let mut null = Handle::null();
                null.weak = self.weak;
                null
            }
        }
    }

    // ---------------------------------------------------------------
    // Access
    // ---------------------------------------------------------------

    fn bad_reference() -> HandleError {
        HandleError::BadReference {
            expected: type_name::<T>(),
        }
    }

    /// Run `f` with a shared borrow of the object.
    pub fn with<R>(&self, f: impl FnOnce(&T) -> R) -> HandleResult<R> {
        let object = self.pointer().ok_or_else(Self::bad_reference)?;
        let borrowed = object.try_borrow().map_err(|_| HandleError::Borrowed {
            class: type_name::<T>(),
        })?;
        let view = T::view(&*borrowed).ok_or_else(Self::bad_reference)?;
        Ok(f(view))
    }

    /// Run `f` with a mutable borrow of the object.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut T) -> R) -> HandleResult<R> {
        let object = self.pointer().ok_or_else(Self::bad_reference)?;
        let mut borrowed = object.try_borrow_mut().map_err(|_| HandleError::Borrowed {
            class: type_name::<T>(),
        })?;
        let view = T::view_mut(&mut *borrowed).ok_or_else(Self::bad_reference)?;
        Ok(f(view))
    }

    fn address(&self) -> usize {
        self.pointer()
            .map_or(0, |object| Rc::as_ptr(&object) as *const () as usize)
    }
}

impl<T: ?Sized + View> Clone for Handle<T> {
    fn clone(&self) -> Self {
        match &self.core {
            Some(core) => Self::attach(core.clone(), self.weak),
            None => Self {
                core: None,
                weak: self.weak,
                _marker: PhantomData,
            },
        }
    }
}

impl<T: ?Sized + View> Drop for Handle<T> {
    fn drop(&mut self) {
        if let Some(core) = self.core.take() {
            core.detach(!self.weak);
        }
    }
}

impl<T: ?Sized + View> Default for Handle<T> {
    fn default() -> Self {
        Self::null()
    }
}

impl<T: ?Sized + View, U: ?Sized + View> PartialEq<Handle<U>> for Handle<T> {
    fn eq(&self, other: &Handle<U>) -> bool {
        self.address() == other.address()
    }
}

impl<T: ?Sized + View> Eq for Handle<T> {}

impl<T: ?Sized + View> PartialOrd for Handle<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T: ?Sized + View> Ord for Handle<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.address().cmp(&other.address())
    }
}

impl<T: ?Sized + View> fmt::Debug for Handle<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("core", &self.core.as_ref().map(|c| c.id()))
            .field("weak", &self.weak)
            .field("class", &self.pointer().map(|o| class_of(&o)))
            .field("references", &self.reference_count())
            .field("handles", &self.handle_count())
            .finish()
    }
}
