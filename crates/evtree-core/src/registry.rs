//! Optional leak-diagnosis registry of live handle cores.
//!
//! The registry is off by default. While disabled every hook is a single
//! flag check; while enabled each [`HandleCore`] is recorded on construction
//! and erased on destruction, so [`live_count`] and [`dump`] show exactly
//! which cores are still alive. State is per thread, matching the
//! single-threaded handle model.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};

use tracing::{info, warn};

use crate::handle::HandleCore;

/// Handle count above which a core logs an error on every new handle.
pub const DEFAULT_HANDLE_COUNT_WARNING: u32 = 30_000;

struct Registry {
    enabled: bool,
    live: BTreeMap<u64, Weak<HandleCore>>,
    checkpoint: usize,
    handle_count_warning: u32,
}

impl Default for Registry {
    fn default() -> Self {
        Self {
            enabled: false,
            live: BTreeMap::new(),
            checkpoint: 0,
            handle_count_warning: DEFAULT_HANDLE_COUNT_WARNING,
        }
    }
}

thread_local! {
    static REGISTRY: RefCell<Registry> = RefCell::new(Registry::default());
}

// ---------------------------------------------------------------
// Lifecycle
// ---------------------------------------------------------------

/// Start tracking handle cores created from now on.
pub fn enable() {
    REGISTRY.with(|r| {
        let mut r = r.borrow_mut();
        if !r.enabled {
            r.enabled = true;
            r.checkpoint = r.live.len();
            info!("handle registry enabled");
        }
    });
}

/// Stop tracking and forget every recorded core.
pub fn disable() {
    REGISTRY.with(|r| {
        let mut r = r.borrow_mut();
        if r.enabled {
            r.enabled = false;
            r.live.clear();
            r.checkpoint = 0;
            info!("handle registry disabled");
        }
    });
}

pub fn is_enabled() -> bool {
    REGISTRY.with(|r| r.borrow().enabled)
}

/// Enables the registry for the lifetime of the guard, then restores the
/// previous state.
#[must_use = "the registry is disabled again when the scope is dropped"]
pub struct RegistryScope {
    was_enabled: bool,
}

impl RegistryScope {
    pub fn new() -> Self {
        let was_enabled = is_enabled();
        enable();
        Self { was_enabled }
    }
}

impl Default for RegistryScope {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for RegistryScope {
    fn drop(&mut self) {
        if !self.was_enabled {
            disable();
        }
    }
}

// ---------------------------------------------------------------
// Hooks called by HandleCore
// ---------------------------------------------------------------

pub(crate) fn register(core: &Rc<HandleCore>) {
    let _ = REGISTRY.try_with(|r| {
        let mut r = r.borrow_mut();
        if r.enabled {
            r.live.insert(core.id(), Rc::downgrade(core));
        }
    });
}

pub(crate) fn unregister(id: u64) {
    // The thread-local may already be gone during thread teardown.
    let _ = REGISTRY.try_with(|r| {
        if let Ok(mut r) = r.try_borrow_mut() {
            if r.enabled {
                r.live.remove(&id);
            }
        }
    });
}

pub(crate) fn handle_count_warning() -> u32 {
    REGISTRY
        .try_with(|r| r.borrow().handle_count_warning)
        .unwrap_or(DEFAULT_HANDLE_COUNT_WARNING)
}

pub(crate) fn set_handle_count_warning(limit: u32) {
    REGISTRY.with(|r| r.borrow_mut().handle_count_warning = limit);
}

// ---------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------

/// Number of live cores recorded since the registry was enabled.
pub fn live_count() -> usize {
    REGISTRY.with(|r| r.borrow().live.len())
}

/// Compare the live count with the last checkpoint and move the checkpoint.
///
/// Returns `true` when nothing was created or leaked since the previous
/// check. Always `true` while the registry is disabled.
pub fn check_clean() -> bool {
    REGISTRY.with(|r| {
        let mut r = r.borrow_mut();
        if !r.enabled {
            return true;
        }
        let live = r.live.len();
        let previous = r.checkpoint;
        r.checkpoint = live;
        if live != previous {
            warn!(previous, live, "handle registry count changed");
            return false;
        }
        true
    })
}

/// One live core in a [`RegistryReport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryEntry {
    pub id: u64,
    pub class: Option<&'static str>,
    pub name: Option<String>,
    pub references: u32,
    pub handles: u32,
    pub deletable: bool,
}

/// Snapshot of every live core.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RegistryReport {
    pub entries: Vec<RegistryEntry>,
}

impl fmt::Display for RegistryReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} live handle core(s)", self.entries.len())?;
        for e in &self.entries {
            write!(
                f,
                "  #{} refs={} handles={} {}",
                e.id,
                e.references,
                e.handles,
                if e.deletable { "owner" } else { "observer" },
            )?;
            match (e.class, &e.name) {
                (Some(class), Some(name)) => writeln!(f, " {class} `{name}`")?,
                (Some(class), None) => writeln!(f, " {class}")?,
                _ => writeln!(f, " <no object>")?,
            }
        }
        Ok(())
    }
}

/// Describe every live core and log the report.
pub fn dump() -> RegistryReport {
    let cores: Vec<Rc<HandleCore>> = REGISTRY.with(|r| {
        r.borrow()
            .live
            .values()
            .filter_map(Weak::upgrade)
            .collect()
    });

    let entries = cores
        .iter()
        .map(|core| {
            let (class, name) = core
                .pointer()
                .and_then(|object| {
                    let o = object.try_borrow().ok()?;
                    let name = o.as_datum().map(|d| d.name().to_string());
                    Some((o.class_name(), name))
                })
                .map_or((None, None), |(class, name)| (Some(class), name));
            RegistryEntry {
                id: core.id(),
                class,
                name,
                references: core.reference_count(),
                handles: core.handle_count(),
                deletable: core.is_deletable(),
            }
        })
        .collect();

    let report = RegistryReport { entries };
    info!(live = report.entries.len(), "handle registry dump\n{report}");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handle::Handle;
    use crate::scalar::PlainDatum;

    #[test]
    fn disabled_registry_tracks_nothing() {
        disable();
        let _h = Handle::new(PlainDatum::new("quiet"));
        assert_eq!(live_count(), 0);
        assert!(check_clean());
    }

    #[test]
    fn scope_enables_and_restores() {
        disable();
        {
            let _scope = RegistryScope::new();
            assert!(is_enabled());
        }
        assert!(!is_enabled());
    }

    #[test]
    fn check_clean_detects_changes_and_rebaselines() {
        let _scope = RegistryScope::new();
        assert!(check_clean());
        let h = Handle::new(PlainDatum::new("leak"));
        assert!(!check_clean());
        assert!(check_clean());
        drop(h);
        assert!(!check_clean());
        assert!(check_clean());
    }

    #[test]
    fn dump_names_live_objects() {
        let _scope = RegistryScope::new();
        let h = Handle::new(PlainDatum::new("visible"));
        let report = dump();
        let entry = report
            .entries
            .iter()
            .find(|e| e.name.as_deref() == Some("visible"))
            .unwrap();
        assert_eq!(entry.class, Some("PlainDatum"));
        assert_eq!(entry.references, 1);
        assert!(entry.deletable);
        assert!(report.to_string().contains("PlainDatum `visible`"));
        drop(h);
        assert!(dump().entries.iter().all(|e| e.name.as_deref() != Some("visible")));
    }
}
