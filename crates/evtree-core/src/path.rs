//! Path resolution over the datum tree.
//!
//! Grammar, in order of precedence:
//!
//! | path           | resolves to                                           |
//! |----------------|-------------------------------------------------------|
//! | `""`, `"."`    | the starting datum                                    |
//! | `".."`         | its parent                                            |
//! | `"./rest"`     | `rest` from the starting datum                        |
//! | `"../rest"`    | `rest` from the parent                                |
//! | `"~/rest"`     | `rest` from the root                                  |
//! | `"//"`         | the root                                              |
//! | `"//name/rest"`| `rest` from the root, which must be called `name`     |
//! | `"/name/rest"` | `rest` from the nearest self-or-ancestor called `name`|
//! | `"name/rest"`  | `rest` from the child `name`                          |
//!
//! Every datum reached on the way passes through its link indirection, so
//! hard and path links are transparent to lookup.

use tracing::trace;

use crate::datum::{name_matches, Indirection};
use crate::error::{DatumError, DatumResult};
use crate::object::{read_object, ObjectRef};

/// Longest chain of links followed before giving up.
pub const MAX_LINK_DEPTH: usize = 64;

/// Resolve `path` starting at `start`. `Ok(None)` means nothing is there.
pub(crate) fn resolve(start: &ObjectRef, path: &str) -> DatumResult<Option<ObjectRef>> {
    Resolver { full: path }.resolve(start, path, 0)
}

/// Resolve link indirection on a single datum.
pub(crate) fn resolve_this(object: &ObjectRef) -> DatumResult<Option<ObjectRef>> {
    this(object, 0)
}

fn parent_of(object: &ObjectRef) -> DatumResult<Option<ObjectRef>> {
    Ok(read_object(object)?
        .as_datum()
        .and_then(|d| d.header().parent()))
}

fn root_of(object: &ObjectRef) -> DatumResult<ObjectRef> {
    let mut current = object.clone();
    while let Some(parent) = parent_of(&current)? {
        current = parent;
    }
    Ok(current)
}

fn has_name(object: &ObjectRef, segment: &str) -> DatumResult<bool> {
    Ok(read_object(object)?
        .as_datum()
        .is_some_and(|d| name_matches(d.name(), segment)))
}

fn link_name(object: &ObjectRef) -> String {
    object
        .try_borrow()
        .ok()
        .and_then(|o| o.as_datum().map(|d| d.name().to_string()))
        .unwrap_or_default()
}

fn this(object: &ObjectRef, depth: usize) -> DatumResult<Option<ObjectRef>> {
    let mut current = object.clone();
    let mut depth = depth;
    loop {
        if depth > MAX_LINK_DEPTH {
            return Err(DatumError::BadLink {
                name: link_name(object),
            });
        }
        let indirection = match read_object(&current)?.as_datum() {
            Some(datum) => datum.indirection(),
            None => Indirection::Itself,
        };
        match indirection {
            Indirection::Itself => return Ok(Some(current)),
            Indirection::Hard { name, target } => {
                current = target
                    .and_then(|t| t.upgrade())
                    .ok_or(DatumError::BadLink { name })?;
                depth += 1;
            }
            Indirection::Path { parent, path } => {
                // A link outside any container, or a target that has gone
                // away, is simply unresolved.
                let Some(parent) = parent.and_then(|p| p.upgrade()) else {
                    return Ok(None);
                };
                trace!(path = %path, "following path link");
                return Resolver { full: &path }.resolve(&parent, &path, depth + 1);
            }
        }
    }
}

struct Resolver<'p> {
    full: &'p str,
}

impl Resolver<'_> {
    fn bad_name(&self, reason: &'static str) -> DatumError {
        DatumError::BadName {
            path: self.full.to_string(),
            reason,
        }
    }

    /// Split off the first segment. An empty segment means a doubled slash.
    fn split<'a>(&self, path: &'a str) -> DatumResult<(&'a str, Option<&'a str>)> {
        let (head, tail) = match path.split_once('/') {
            Some((head, tail)) => (head, Some(tail)),
            None => (path, None),
        };
        if head.is_empty() || tail.is_some_and(|t| t.starts_with('/')) {
            return Err(self.bad_name("empty path segment"));
        }
        Ok((head, tail))
    }

    /// Continue with `tail` from `at`, or finish there.
    fn descend(
        &self,
        at: &ObjectRef,
        tail: Option<&str>,
        depth: usize,
    ) -> DatumResult<Option<ObjectRef>> {
        match tail {
            None => this(at, depth),
            Some(rest) => self.resolve(at, rest, depth),
        }
    }

    fn resolve(
        &self,
        start: &ObjectRef,
        path: &str,
        depth: usize,
    ) -> DatumResult<Option<ObjectRef>> {
        if path.is_empty() || path == "." {
            return this(start, depth);
        }
        if path == ".." {
            return match parent_of(start)? {
                Some(parent) => this(&parent, depth),
                None => Ok(None),
            };
        }
        if let Some(rest) = path.strip_prefix("./") {
            if rest.starts_with('/') {
                return Err(self.bad_name("empty path segment"));
            }
            return self.resolve(start, rest, depth);
        }
        if let Some(rest) = path.strip_prefix("../") {
            if rest.starts_with('/') {
                return Err(self.bad_name("empty path segment"));
            }
            return match parent_of(start)? {
                Some(parent) => self.resolve(&parent, rest, depth),
                None => Ok(None),
            };
        }
        if let Some(rest) = path.strip_prefix('~') {
            let Some(rest) = rest.strip_prefix('/') else {
                return Err(self.bad_name("`~` must be followed by `/`"));
            };
            if rest.starts_with('/') {
                return Err(self.bad_name("empty path segment"));
            }
            return self.resolve(&root_of(start)?, rest, depth);
        }
        if let Some(rest) = path.strip_prefix("//") {
            let root = root_of(start)?;
            if rest.is_empty() {
                return this(&root, depth);
            }
            let (head, tail) = self.split(rest)?;
            if !has_name(&root, head)? {
                return Ok(None);
            }
            return self.descend(&root, tail, depth);
        }
        if let Some(rest) = path.strip_prefix('/') {
            let (head, tail) = self.split(rest)?;
            let mut candidate = Some(start.clone());
            while let Some(node) = candidate {
                if has_name(&node, head)? {
                    return self.descend(&node, tail, depth);
                }
                candidate = parent_of(&node)?;
            }
            return Ok(None);
        }

        let (head, tail) = self.split(path)?;
        let Some(current) = this(start, depth)? else {
            return Ok(None);
        };
        let child = match read_object(&current)?.as_datum() {
            Some(datum) => datum.find_datum(head)?,
            None => None,
        };
        match child {
            Some(child) => self.descend(&child, tail, depth),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::container::OrderedContainer;
    use crate::datum::{Datum, DatumRef};
    use crate::fixtures::sample_tree;
    use crate::scalar::{IntegerDatum, PlainDatum};

    fn name_at(from: &DatumRef, path: &str) -> Option<String> {
        from.get::<dyn Datum>(path)
            .unwrap()
            .with(|d| d.name().to_string())
            .ok()
    }

    fn child(root: &DatumRef, path: &str) -> DatumRef {
        DatumRef::from_handle(&root.require::<dyn Datum>(path).unwrap()).unwrap()
    }

    #[test]
    fn absolute_and_relative_paths_agree() {
        let root = sample_tree();
        let by_root = root.get::<dyn Datum>("//parent/child.3/child.3.2").unwrap();
        let by_relative = root.get::<dyn Datum>("child.3/child.3.2").unwrap();
        assert!(!by_root.is_null());
        assert_eq!(by_root, by_relative);
    }

    #[test]
    fn dot_and_dot_dot() {
        let root = sample_tree();
        let leaf = child(&root, "child.3/child.3.2");
        assert_eq!(name_at(&leaf, "."), Some("child.3.2".into()));
        assert_eq!(name_at(&leaf, ""), Some("child.3.2".into()));
        assert_eq!(name_at(&leaf, ".."), Some("child.3".into()));
        assert_eq!(name_at(&leaf, "../.."), Some("parent".into()));
        assert_eq!(name_at(&leaf, "../child.3.1"), Some("child.3.1".into()));
        assert_eq!(name_at(&leaf, "./../child.3.3"), Some("child.3.3".into()));
        assert_eq!(name_at(&root, ".."), None);
        assert_eq!(name_at(&root, "../anything"), None);
    }

    #[test]
    fn ancestor_search_by_name() {
        let root = sample_tree();
        let leaf = child(&root, "child.3/child.3.2");
        assert_eq!(name_at(&leaf, "/child.3"), Some("child.3".into()));
        assert_eq!(name_at(&leaf, "/child.3.2"), Some("child.3.2".into()));
        assert_eq!(
            name_at(&leaf, "/parent/child.2/child.2.2"),
            Some("child.2.2".into())
        );
        assert_eq!(name_at(&leaf, "/child.2/child.2.2"), None);
        assert_eq!(name_at(&leaf, "/nowhere"), None);
    }

    #[test]
    fn paths_from_a_second_level_leaf() {
        let root = sample_tree();
        let leaf = child(&root, "child.2/child.2.3");
        assert_eq!(
            name_at(&leaf, "//parent/child.3/child.3.2"),
            Some("child.3.2".into())
        );
        assert_eq!(name_at(&leaf, ".."), Some("child.2".into()));
        assert_eq!(
            name_at(&leaf, "/child.2/child.2.2"),
            Some("child.2.2".into())
        );
        assert_eq!(
            leaf.get::<dyn Datum>("/child.2/child.2.2").unwrap(),
            root.get::<dyn Datum>("child.2/child.2.2").unwrap()
        );
    }

    #[test]
    fn root_forms() {
        let root = sample_tree();
        let leaf = child(&root, "child.1/child.1.1");
        assert_eq!(name_at(&leaf, "//"), Some("parent".into()));
        assert_eq!(name_at(&leaf, "//parent"), Some("parent".into()));
        assert_eq!(name_at(&leaf, "//other/child.1"), None);
        assert_eq!(name_at(&leaf, "~/child.2"), Some("child.2".into()));
        assert_eq!(
            name_at(&leaf, "~/child.2/child.2.3"),
            Some("child.2.3".into())
        );
    }

    #[test]
    fn malformed_paths_are_bad_names() {
        let root = sample_tree();
        for path in ["child.1//child.1.1", "~child.1", "/", "//parent//child.1", "~//x"] {
            let err = root.get::<dyn Datum>(path).unwrap_err();
            assert!(
                matches!(err, DatumError::BadName { .. }),
                "{path} gave {err:?}"
            );
        }
    }

    #[test]
    fn missing_names_are_null_not_errors() {
        let root = sample_tree();
        assert!(root.get::<dyn Datum>("child.9").unwrap().is_null());
        assert!(root.get::<dyn Datum>("child.1/child.9.9").unwrap().is_null());
        assert!(!root.has::<dyn Datum>("child.9"));
        let err = root.require::<dyn Datum>("child.9").unwrap_err();
        assert!(matches!(err, DatumError::NoSuchElement { .. }));
    }

    #[test]
    fn wrong_type_is_a_conversion_error() {
        let root = sample_tree();
        let err = root.get::<IntegerDatum>("child.1").unwrap_err();
        assert!(matches!(
            err,
            DatumError::BadConversion { from: "OrderedContainer", .. }
        ));
        assert!(!root.has::<IntegerDatum>("child.1"));
        assert!(root.has::<OrderedContainer>("child.1"));
    }

    #[test]
    fn lookup_inside_a_leaf_finds_nothing() {
        let root = sample_tree();
        let leaf = child(&root, "child.2/child.2.1");
        leaf.set_name("renamed").unwrap();
        assert!(root.get::<dyn Datum>("child.2/renamed/deeper").unwrap().is_null());
        assert!(root.has::<PlainDatum>("child.2/renamed"));
    }

    #[test]
    fn trailing_slash_names_the_node_itself() {
        let root = sample_tree();
        assert_eq!(name_at(&root, "child.1/"), Some("child.1".into()));
    }

    #[test]
    fn parent_as_checks_type() {
        let root = sample_tree();
        let leaf = child(&root, "child.1/child.1.2");
        assert!(!leaf.parent_as::<OrderedContainer>().unwrap().is_null());
        assert!(root.parent_as::<OrderedContainer>().unwrap().is_null());
        assert!(matches!(
            leaf.parent_as::<IntegerDatum>(),
            Err(DatumError::BadConversion { .. })
        ));
    }
}
