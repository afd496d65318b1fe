//! The type-erased object model shared by handles and the datum tree.
//!
//! Every value a [`Handle`](crate::Handle) can point at implements
//! [`Object`]. A [`View`] is anything that can be recovered from a
//! `&dyn Object` by a checked conversion: a concrete type (via [`Any`]
//! downcasting) or an open interface such as `dyn Datum` (via the
//! capability queries on [`Object`]).
//!
//! Concrete types get both impls from [`impl_object!`](crate::impl_object).

use std::any::Any;
use std::cell::{Ref, RefCell, RefMut};
use std::rc::{Rc, Weak};

use crate::container::{Container, OrderedContainer};
use crate::datum::Datum;
use crate::error::{HandleError, HandleResult};

/// Shared, interior-mutable pointer to any object.
pub type ObjectRef = Rc<RefCell<dyn Object>>;

/// Non-owning counterpart of [`ObjectRef`].
pub type WeakObjectRef = Weak<RefCell<dyn Object>>;

/// Base trait of everything that can live behind a handle.
pub trait Object: Any {
    /// Short class name used in diagnostics and listings.
    fn class_name(&self) -> &'static str;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    /// Capability query: the datum interface, if this object is a tree node.
    fn as_datum(&self) -> Option<&(dyn Datum + 'static)> {
        None
    }

    fn as_datum_mut(&mut self) -> Option<&mut (dyn Datum + 'static)> {
        None
    }
}

/// A type that can be recovered from a `&dyn Object` by checked conversion.
pub trait View: 'static {
    fn view<'a>(object: &'a (dyn Object + 'static)) -> Option<&'a Self>;

    fn view_mut<'a>(object: &'a mut (dyn Object + 'static)) -> Option<&'a mut Self>;
}

impl View for dyn Object {
    fn view<'a>(object: &'a (dyn Object + 'static)) -> Option<&'a Self> {
        Some(object)
    }

    fn view_mut<'a>(object: &'a mut (dyn Object + 'static)) -> Option<&'a mut Self> {
        Some(object)
    }
}

impl View for dyn Datum {
    fn view<'a>(object: &'a (dyn Object + 'static)) -> Option<&'a Self> {
        object.as_datum()
    }

    fn view_mut<'a>(object: &'a mut (dyn Object + 'static)) -> Option<&'a mut Self> {
        object.as_datum_mut()
    }
}

impl View for dyn Container {
    fn view<'a>(object: &'a (dyn Object + 'static)) -> Option<&'a Self> {
        object.as_datum()?.as_container()
    }

    fn view_mut<'a>(object: &'a mut (dyn Object + 'static)) -> Option<&'a mut Self> {
        object.as_datum_mut()?.as_container_mut()
    }
}

// Anything that embeds an ordered container (an event, for example) can be
// viewed as one, so this goes through the datum capability query rather
// than a plain downcast.
impl View for OrderedContainer {
    fn view<'a>(object: &'a (dyn Object + 'static)) -> Option<&'a Self> {
        object.as_datum()?.as_ordered()
    }

    fn view_mut<'a>(object: &'a mut (dyn Object + 'static)) -> Option<&'a mut Self> {
        object.as_datum_mut()?.as_ordered_mut()
    }
}

/// Wrap a value in a fresh [`ObjectRef`].
pub fn into_object<T: Object>(value: T) -> ObjectRef {
    Rc::new(RefCell::new(value))
}

/// Class name of the object behind `object`, or `"<borrowed>"` when it is
/// mutably borrowed.
pub fn class_of(object: &ObjectRef) -> &'static str {
    match object.try_borrow() {
        Ok(borrowed) => borrowed.class_name(),
        Err(_) => "<borrowed>",
    }
}

/// Identity comparison of two objects, ignoring vtable metadata.
pub fn same_object(a: &ObjectRef, b: &ObjectRef) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// A shared borrow, or [`HandleError::Borrowed`] while `object` is mutably
/// borrowed.
pub(crate) fn read_object(object: &ObjectRef) -> HandleResult<Ref<'_, dyn Object + 'static>> {
    object
        .try_borrow()
        .map_err(|_| HandleError::Borrowed { class: "datum" })
}

/// An exclusive borrow, or [`HandleError::Borrowed`] while `object` is
/// borrowed at all.
pub(crate) fn write_object(
    object: &ObjectRef,
) -> HandleResult<RefMut<'_, dyn Object + 'static>> {
    let class = class_of(object);
    object
        .try_borrow_mut()
        .map_err(|_| HandleError::Borrowed { class })
}

/// Whether `object` can currently be viewed as `T`.
pub(crate) fn viewable<T: View + ?Sized>(object: &ObjectRef) -> bool {
    match object.try_borrow() {
        Ok(borrowed) => T::view(&*borrowed).is_some(),
        Err(_) => false,
    }
}

/// Implement [`Object`] and [`View`] for a concrete type.
///
/// `impl_object!(MyType)` is for plain objects, `impl_object!(MyType, datum)`
/// for types implementing [`Datum`](crate::Datum).
#[macro_export]
macro_rules! impl_object {
    (@view $ty:ty) => {
        impl $crate::object::View for $ty {
            fn view<'a>(
                object: &'a (dyn $crate::object::Object + 'static),
            ) -> Option<&'a Self> {
                object.as_any().downcast_ref::<$ty>()
            }

            fn view_mut<'a>(
                object: &'a mut (dyn $crate::object::Object + 'static),
            ) -> Option<&'a mut Self> {
                object.as_any_mut().downcast_mut::<$ty>()
            }
        }
    };
    ($ty:ty, datum) => {
        impl $crate::object::Object for $ty {
            fn class_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }

            fn as_datum(&self) -> Option<&(dyn $crate::datum::Datum + 'static)> {
                Some(self)
            }

            fn as_datum_mut(&mut self) -> Option<&mut (dyn $crate::datum::Datum + 'static)> {
                Some(self)
            }
        }
        $crate::impl_object!(@view $ty);
    };
    ($ty:ty) => {
        impl $crate::object::Object for $ty {
            fn class_name(&self) -> &'static str {
                stringify!($ty)
            }

            fn as_any(&self) -> &dyn ::std::any::Any {
                self
            }

            fn as_any_mut(&mut self) -> &mut dyn ::std::any::Any {
                self
            }
        }
        $crate::impl_object!(@view $ty);
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::{IntegerDatum, RealDatum};

    #[derive(Debug)]
    struct Payload(u32);
    crate::impl_object!(Payload);

    #[test]
    fn concrete_view_is_a_checked_downcast() {
        let object = into_object(Payload(7));
        let borrowed = object.borrow();
        assert_eq!(Payload::view(&*borrowed).map(|p| p.0), Some(7));
        assert!(RealDatum::view(&*borrowed).is_none());
        assert!(<dyn Datum>::view(&*borrowed).is_none());
    }

    #[test]
    fn datum_capability_query() {
        let object = into_object(IntegerDatum::new("count", 3));
        assert!(viewable::<dyn Datum>(&object));
        assert!(viewable::<IntegerDatum>(&object));
        assert!(!viewable::<dyn Container>(&object));
        assert!(!viewable::<RealDatum>(&object));
        assert_eq!(class_of(&object), "IntegerDatum");
    }

    #[test]
    fn ordered_container_view_reaches_through_capability() {
        let object = into_object(OrderedContainer::new("folder"));
        assert!(viewable::<OrderedContainer>(&object));
        assert!(viewable::<dyn Container>(&object));
    }

    #[test]
    fn mutably_borrowed_objects_are_not_viewable() {
        let object = into_object(Payload(1));
        let _guard = object.borrow_mut();
        assert!(!viewable::<Payload>(&object));
        assert_eq!(class_of(&object), "<borrowed>");
    }

    #[test]
    fn identity_ignores_equal_contents() {
        let a = into_object(Payload(1));
        let b = into_object(Payload(1));
        assert!(same_object(&a, &a.clone()));
        assert!(!same_object(&a, &b));
    }
}
