//! Link datums: two tree locations naming one object without shared
//! ownership.
//!
//! A [`HardLink`] holds a non-owning pointer to its target; it breaks when
//! the target is destroyed. A [`PathLink`] holds a path interpreted
//! relative to the link's own parent at lookup time, so it follows renames
//! and moves and may legitimately point nowhere.

use std::rc::Rc;

use crate::datum::{Datum, DatumHeader, DatumRef, Indirection};
use crate::object::WeakObjectRef;

/// Non-owning pointer to another datum.
#[derive(Debug)]
pub struct HardLink {
    header: DatumHeader,
    target: Option<WeakObjectRef>,
}

impl HardLink {
    pub const DEFAULT_TITLE: &'static str = "Datum Reference";

    /// A link to `target`, held weakly.
    pub fn new(name: impl Into<String>, target: &DatumRef) -> Self {
        Self {
            header: DatumHeader::new(name, Self::DEFAULT_TITLE),
            target: Some(Rc::downgrade(target.object())),
        }
    }

    /// A link with no target; resolving it is a bad link until one is set.
    pub fn unset(name: impl Into<String>) -> Self {
        Self {
            header: DatumHeader::new(name, Self::DEFAULT_TITLE),
            target: None,
        }
    }

    /// Point the link at `target`.
    pub fn set_target(&mut self, target: &DatumRef) {
        self.target = Some(Rc::downgrade(target.object()));
    }

    /// The target, if set and still alive.
    pub fn target(&self) -> Option<DatumRef> {
        self.target
            .as_ref()?
            .upgrade()
            .and_then(DatumRef::from_object)
    }
}

crate::impl_object!(HardLink, datum);

impl Datum for HardLink {
    fn header(&self) -> &DatumHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut DatumHeader {
        &mut self.header
    }

    fn indirection(&self) -> Indirection {
        Indirection::Hard {
            name: self.header.name().to_string(),
            target: self.target.clone(),
        }
    }

    fn summary(&self) -> Option<String> {
        Some(match self.target() {
            Some(target) => format!("-> {}", target.full_name()),
            None => "-> (dangling)".to_string(),
        })
    }
}

/// A textual path resolved relative to the link's parent.
#[derive(Debug)]
pub struct PathLink {
    header: DatumHeader,
    path: String,
}

impl PathLink {
    pub const DEFAULT_TITLE: &'static str = "Link To";

    /// A link resolving `path` from its parent.
    pub fn new(name: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            header: DatumHeader::new(name, Self::DEFAULT_TITLE),
            path: path.into(),
        }
    }

    /// The unresolved path text.
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Replace the path; takes effect on the next lookup.
    pub fn set_path(&mut self, path: impl Into<String>) {
        self.path = path.into();
    }
}

crate::impl_object!(PathLink, datum);

impl Datum for PathLink {
    fn header(&self) -> &DatumHeader {
        &self.header
    }

    fn header_mut(&mut self) -> &mut DatumHeader {
        &mut self.header
    }

    fn indirection(&self) -> Indirection {
        Indirection::Path {
            parent: self.header.parent().map(|p| Rc::downgrade(&p)),
            path: self.path.clone(),
        }
    }

    fn summary(&self) -> Option<String> {
        Some(format!("-> {}", self.path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::OrderedContainer;
    use crate::error::DatumError;
    use crate::fixtures::sample_tree;
    use crate::scalar::{IntegerDatum, PlainDatum, RealDatum};

    #[test]
    fn hard_link_is_transparent() {
        let root = sample_tree();
        let target = root.add(RealDatum::new("energy", 12.5)).unwrap();
        let links = root.add(OrderedContainer::new("links")).unwrap();
        links.add(HardLink::new("to-energy", &target)).unwrap();

        let via_link = root.require::<RealDatum>("links/to-energy").unwrap();
        assert_eq!(via_link.with(|d| d.value()), Ok(12.5));
        assert_eq!(via_link, target.handle::<RealDatum>());

        // The link does not adopt its target.
        assert_eq!(target.parent(), Some(root.clone()));
    }

    #[test]
    fn hard_link_into_a_container_continues_the_path() {
        let root = sample_tree();
        let child = DatumRef::from_handle(&root.require::<OrderedContainer>("child.2").unwrap())
            .unwrap();
        root.add(HardLink::new("alias", &child)).unwrap();
        assert!(root.has::<PlainDatum>("alias/child.2.3"));
    }

    #[test]
    fn hard_link_chains_resolve_to_the_real_object() {
        let root = DatumRef::new(OrderedContainer::new("root"));
        let real = root.add(IntegerDatum::new("real", 5)).unwrap();
        let first = root.add(HardLink::new("first", &real)).unwrap();
        root.add(HardLink::new("second", &first)).unwrap();
        let found = root.require::<IntegerDatum>("second").unwrap();
        assert_eq!(found.with(|d| d.value()), Ok(5));
        assert_eq!(first.this().unwrap(), Some(real));
    }

    #[test]
    fn broken_hard_link_is_an_error() {
        let root = DatumRef::new(OrderedContainer::new("root"));
        let target = root.add(PlainDatum::new("target")).unwrap();
        root.add(HardLink::new("link", &target)).unwrap();
        root.add(HardLink::unset("unset")).unwrap();

        assert_eq!(root.erase(&target), Ok(true));
        drop(target);
        assert!(matches!(
            root.get::<PlainDatum>("link"),
            Err(DatumError::BadLink { .. })
        ));
        assert!(matches!(
            root.get::<PlainDatum>("unset"),
            Err(DatumError::BadLink { .. })
        ));
    }

    #[test]
    fn hard_link_cycle_is_a_bad_link() {
        let root = DatumRef::new(OrderedContainer::new("root"));
        let a = root.add(HardLink::unset("a")).unwrap();
        let b = root.add(HardLink::new("b", &a)).unwrap();
        a.handle::<HardLink>()
            .with_mut(|link| link.set_target(&b))
            .unwrap();
        assert!(matches!(
            root.get::<PlainDatum>("a"),
            Err(DatumError::BadLink { .. })
        ));
    }

    #[test]
    fn path_link_resolves_relative_to_its_parent() {
        let root = sample_tree();
        let child = DatumRef::from_handle(&root.require::<OrderedContainer>("child.1").unwrap())
            .unwrap();
        child.add(PathLink::new("sibling", "../child.3/child.3.1")).unwrap();
        let found = root.require::<PlainDatum>("child.1/sibling").unwrap();
        assert_eq!(found.with(|d| d.name().to_string()), Ok("child.3.1".to_string()));
    }

    #[test]
    fn path_link_tracks_renames() {
        let root = DatumRef::new(OrderedContainer::new("root"));
        let old = root.add(IntegerDatum::new("v1", 1)).unwrap();
        let link = root.add(PathLink::new("current", "v2")).unwrap();
        assert!(root.get::<IntegerDatum>("current").unwrap().is_null());

        old.set_name("v2").unwrap();
        let found = root.require::<IntegerDatum>("current").unwrap();
        assert_eq!(found.with(|d| d.value()), Ok(1));

        root.add(IntegerDatum::new("v3", 3)).unwrap();
        link.handle::<PathLink>()
            .with_mut(|l| l.set_path("v3"))
            .unwrap();
        let found = root.require::<IntegerDatum>("current").unwrap();
        assert_eq!(found.with(|d| d.value()), Ok(3));
    }

    #[test]
    fn dangling_path_link_is_not_an_error() {
        let root = DatumRef::new(OrderedContainer::new("root"));
        let link = root.add(PathLink::new("nowhere", "missing/thing")).unwrap();
        assert!(root.get::<PlainDatum>("nowhere").unwrap().is_null());
        assert!(!root.has::<PlainDatum>("nowhere"));
        assert_eq!(link.this().unwrap(), None);

        let orphan = DatumRef::new(PathLink::new("orphan", "anything"));
        assert_eq!(orphan.this().unwrap(), None);
    }

    #[test]
    fn self_referencing_path_link_is_a_bad_link() {
        let root = DatumRef::new(OrderedContainer::new("root"));
        root.add(PathLink::new("loop", "loop")).unwrap();
        assert!(matches!(
            root.get::<PlainDatum>("loop"),
            Err(DatumError::BadLink { .. })
        ));
    }

    #[test]
    fn links_list_their_targets() {
        let root = DatumRef::new(OrderedContainer::new("root"));
        let target = root.add(PlainDatum::new("target")).unwrap();
        root.add(HardLink::new("hard", &target)).unwrap();
        root.add(PathLink::new("soft", "target")).unwrap();
        let text = root.listing(Default::default());
        assert!(text.contains("HardLink hard -> //root/target"));
        assert!(text.contains("PathLink soft -> target"));
    }
}
