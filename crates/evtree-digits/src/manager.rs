//! Finding and regenerating digit containers.
//!
//! Digit containers live in an event under `~/digits/<type>`. When a proxy
//! is resolved against an event that no longer holds its container (the
//! digits were not saved, say), the manager asks the [`DigitFactory`]
//! registered under that type name to rebuild them and caches the result in
//! the event.

use std::collections::BTreeMap;
use std::rc::Rc;

use evtree_core::{Datum, DatumRef, Handle, OrderedContainer, EVENT_FOLDERS};
use tracing::{debug, info, warn};

use crate::channel::Digit;
use crate::config::DigitConfig;
use crate::container::DigitContainer;
use crate::error::{DigitError, DigitResult};
use crate::proxy::{DigitProxy, ProxyType};

/// Rebuilds one type of digits for an event.
pub trait DigitFactory {
    /// The digit type this factory produces; also the container name.
    fn name(&self) -> &str;

    /// Build the digits for `event`, or `None` when that is impossible.
    /// The manager renames the result after the factory.
    fn make_digits(&self, event: &DatumRef) -> Option<DigitContainer>;
}

/// Registry of digit factories and the proxy resolution service.
#[derive(Default)]
pub struct DigitManager {
    factories: BTreeMap<String, Box<dyn DigitFactory>>,
    config: DigitConfig,
}

impl DigitManager {
    /// A manager with no factories and the default config.
    pub fn new() -> Self {
        Self::default()
    }

    /// A manager with no factories and the given config.
    pub fn with_config(config: DigitConfig) -> Self {
        Self {
            factories: BTreeMap::new(),
            config,
        }
    }

    /// The active configuration.
    pub fn config(&self) -> &DigitConfig {
        &self.config
    }

    /// Register a factory under its own name. Names are unique.
    pub fn register_factory(&mut self, factory: Box<dyn DigitFactory>) -> DigitResult<()> {
        let name = factory.name().to_string();
        if self.factories.contains_key(&name) {
            warn!(factory = %name, "digit factory already registered");
            return Err(DigitError::MultipleFactories(name));
        }
        info!(factory = %name, "registered digit factory");
        self.factories.insert(name, factory);
        Ok(())
    }

    /// Whether a factory is registered under `name`.
    pub fn factory_available(&self, name: &str) -> bool {
        self.factories.contains_key(name)
    }

    /// The `kind` digits of `event`, regenerating them when absent.
    ///
    /// A null handle means there are no such digits and no factory to make
    /// them.
    pub fn cache_digits(
        &self,
        event: &DatumRef,
        kind: &str,
    ) -> DigitResult<Handle<DigitContainer>> {
        let found = event.get::<DigitContainer>(&format!("~/digits/{kind}"))?;
        if !found.is_null() {
            return Ok(found);
        }
        let Some(factory) = self.factories.get(kind) else {
            return Ok(Handle::null());
        };

        let Some(mut digits) = factory.make_digits(event) else {
            warn!(factory = %kind, event = %event.name(), "digit factory produced nothing");
            return Err(DigitError::FactoryFailed(kind.to_string()));
        };
        digits.header_mut().set_name(kind);
        let count = digits.len();

        let folder = self.digits_folder(event)?;
        let item = DatumRef::new(digits);
        if self.config.persistent_digits {
            folder.add_datum(item.clone(), None)?;
        } else {
            folder.add_temporary(item.clone(), None)?;
        }
        debug!(
            kind,
            count,
            persistent = self.config.persistent_digits,
            "regenerated digits"
        );
        Ok(item.handle::<DigitContainer>())
    }

    /// The container `proxy` points into.
    pub fn find_digits(
        &self,
        event: &DatumRef,
        proxy: DigitProxy,
    ) -> DigitResult<Handle<DigitContainer>> {
        let kind = match proxy.proxy_type()? {
            ProxyType::Invalid => return Err(DigitError::TypeInvalid(proxy.type_tag())),
            kind => kind.name(),
        };
        let digits = self.cache_digits(event, kind)?;
        if digits.is_null() {
            return Err(DigitError::NotAvailable {
                kind: kind.to_string(),
            });
        }
        Ok(digits)
    }

    /// The digit `proxy` points at, checked against its salt.
    pub fn get_digit(&self, event: &DatumRef, proxy: DigitProxy) -> DigitResult<Rc<dyn Digit>> {
        let digits = self.find_digits(event, proxy)?;
        digits.with(|container| -> DigitResult<Rc<dyn Digit>> {
            let offset = proxy.offset();
            let digit = usize::try_from(offset)
                .ok()
                .filter(|_| offset != DigitProxy::INVALID_OFFSET)
                .and_then(|index| container.get(index))
                .ok_or(DigitError::NotFound {
                    offset,
                    size: container.len(),
                })?;
            if !proxy.check_salt(container.signature(), digit.as_ref()) {
                warn!(%proxy, signature = container.signature(), "digit proxy salt mismatch");
                return Err(DigitError::Mismatch {
                    proxy: proxy.to_string(),
                    kind: container.name().to_string(),
                });
            }
            Ok(Rc::clone(digit))
        })?
    }

    // `~/digits`, created when the event lacks it.
    fn digits_folder(&self, event: &DatumRef) -> DigitResult<DatumRef> {
        let existing = event.get::<OrderedContainer>("~/digits")?;
        if let Some(folder) = DatumRef::from_handle(&existing) {
            return Ok(folder);
        }
        let (name, title) = EVENT_FOLDERS[0];
        Ok(event.root().add(OrderedContainer::with_title(name, title))?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::{container, init_logging, TestFactory};
    use evtree_core::{Event, EventContext, PlainDatum};

    fn event() -> DatumRef {
        init_logging();
        Event::build(EventContext::new(4, 17)).unwrap()
    }

    fn tpc_manager(config: DigitConfig) -> (DigitManager, TestFactory) {
        let factory = TestFactory::new("tpc", &[0x100, 0x200, 0x300]);
        let shared = TestFactory {
            channels: factory.channels.clone(),
            fail: factory.fail.clone(),
            calls: factory.calls.clone(),
            ..TestFactory::new("tpc", &[])
        };
        let mut manager = DigitManager::with_config(config);
        manager.register_factory(Box::new(factory)).unwrap();
        (manager, shared)
    }

    fn digits_folder(event: &DatumRef) -> DatumRef {
        DatumRef::from_handle(&event.require::<OrderedContainer>("~/digits").unwrap()).unwrap()
    }

    #[test]
    fn stored_digits_are_used_as_is() {
        let event = event();
        digits_folder(&event)
            .add(container("tpc", &[0x100, 0x200, 0x300]))
            .unwrap();
        let (manager, factory) = tpc_manager(DigitConfig::default());

        let digits = manager.cache_digits(&event, "tpc").unwrap();
        assert_eq!(digits.with(|d| d.signature()), Ok(0xda9f_0f3f));
        assert_eq!(factory.calls.get(), 0);
    }

    #[test]
    fn missing_digits_are_regenerated_as_a_temporary() {
        let event = event();
        let (manager, factory) = tpc_manager(DigitConfig::default());

        let digits = manager.cache_digits(&event, "tpc").unwrap();
        assert_eq!(digits.with(|d| d.name().to_string()), Ok("tpc".to_string()));
        assert_eq!(digits.with(|d| d.signature()), Ok(0xda9f_0f3f));

        let folder = digits_folder(&event);
        let item = DatumRef::from_handle(&digits).unwrap();
        assert!(folder.is_temporary(&item));

        // Cached: a second lookup does not call the factory again.
        manager.cache_digits(&event, "tpc").unwrap();
        assert_eq!(factory.calls.get(), 1);
    }

    #[test]
    fn persistent_digits_when_configured() {
        let event = event();
        let config = DigitConfig {
            persistent_digits: true,
        };
        let (manager, _factory) = tpc_manager(config);
        let digits = manager.cache_digits(&event, "tpc").unwrap();
        let item = DatumRef::from_handle(&digits).unwrap();
        assert!(!digits_folder(&event).is_temporary(&item));
        assert!(event.has::<DigitContainer>("digits/tpc"));
    }

    #[test]
    fn missing_digits_folder_is_created() {
        init_logging();
        let bare = DatumRef::new(Event::new(EventContext::new(1, 1)));
        let (manager, _factory) = tpc_manager(DigitConfig::default());
        let digits = manager.cache_digits(&bare, "tpc").unwrap();
        assert!(!digits.is_null());
        assert!(bare.has::<DigitContainer>("digits/tpc"));
    }

    #[test]
    fn no_factory_gives_a_null_handle() {
        let event = event();
        let manager = DigitManager::new();
        assert!(manager.cache_digits(&event, "fgd").unwrap().is_null());
    }

    #[test]
    fn failing_factory_is_an_error() {
        let event = event();
        let (manager, factory) = tpc_manager(DigitConfig::default());
        factory.fail.set(true);
        assert_eq!(
            manager.cache_digits(&event, "tpc"),
            Err(DigitError::FactoryFailed("tpc".to_string()))
        );
    }

    #[test]
    fn factory_names_are_unique() {
        let (mut manager, _factory) = tpc_manager(DigitConfig::default());
        assert!(manager.factory_available("tpc"));
        assert!(!manager.factory_available("fgd"));
        assert_eq!(
            manager.register_factory(Box::new(TestFactory::new("tpc", &[]))),
            Err(DigitError::MultipleFactories("tpc".to_string()))
        );
        manager
            .register_factory(Box::new(TestFactory::new("fgd", &[])))
            .unwrap();
        assert!(manager.factory_available("fgd"));
    }

    #[test]
    fn proxy_resolves_to_its_digit() {
        let event = event();
        let (manager, _factory) = tpc_manager(DigitConfig::default());
        let digits = manager.cache_digits(&event, "tpc").unwrap();
        let proxy = digits.with(|d| DigitProxy::new(d, 1)).unwrap().unwrap();

        let digit = manager.get_digit(&event, proxy).unwrap();
        assert_eq!(digit.channel_id().as_u32(), 0x200);
        let again = proxy.resolve(&manager, &event).unwrap();
        assert!(Rc::ptr_eq(&digit, &again));
    }

    #[test]
    fn proxy_survives_an_identical_rebuild() {
        let event = event();
        let (manager, factory) = tpc_manager(DigitConfig::default());
        let digits = manager.cache_digits(&event, "tpc").unwrap();
        let proxy = digits.with(|d| DigitProxy::new(d, 2)).unwrap().unwrap();

        let folder = digits_folder(&event);
        assert_eq!(folder.erase(&DatumRef::from_handle(&digits).unwrap()), Ok(true));
        let digit = manager.get_digit(&event, proxy).unwrap();
        assert_eq!(digit.channel_id().as_u32(), 0x300);
        assert_eq!(factory.calls.get(), 2);
    }

    #[test]
    fn rebuilt_digits_are_detected() {
        let event = event();
        let (manager, factory) = tpc_manager(DigitConfig::default());
        let digits = manager.cache_digits(&event, "tpc").unwrap();
        let proxy = digits.with(|d| DigitProxy::new(d, 1)).unwrap().unwrap();
        assert_eq!(proxy.salt(), 319);

        for channels in [vec![0x100, 0x500, 0x300], vec![0x100, 0x200, 0x300, 0x400]] {
            let folder = digits_folder(&event);
            let stale = DatumRef::from_handle(&folder.require::<DigitContainer>("tpc").unwrap())
                .unwrap();
            assert_eq!(folder.erase(&stale), Ok(true));
            *factory.channels.borrow_mut() = channels;
            assert_eq!(
                manager.get_digit(&event, proxy).unwrap_err(),
                DigitError::Mismatch {
                    proxy: "tpc: 1".to_string(),
                    kind: "tpc".to_string(),
                }
            );
        }
    }

    #[test]
    fn unavailable_and_out_of_range() {
        let event = event();
        let (manager, _factory) = tpc_manager(DigitConfig::default());

        let fgd = DigitProxy::new(&container("fgd", &[1]), 0).unwrap();
        assert!(matches!(
            manager.get_digit(&event, fgd),
            Err(DigitError::NotAvailable { kind }) if kind == "fgd"
        ));

        let far = DigitProxy::new(&container("tpc", &[0; 10]), 9).unwrap();
        assert!(matches!(
            manager.get_digit(&event, far),
            Err(DigitError::NotFound { offset: 9, size: 3 })
        ));
        assert!(matches!(
            manager.get_digit(&event, DigitProxy::default()),
            Err(DigitError::TypeInvalid(0))
        ));
    }

    #[test]
    fn non_digit_entry_is_a_conversion_error() {
        let event = event();
        digits_folder(&event).add(PlainDatum::new("tpc")).unwrap();
        let (manager, _factory) = tpc_manager(DigitConfig::default());
        assert!(matches!(
            manager.cache_digits(&event, "tpc"),
            Err(DigitError::Datum(_))
        ));
    }
}
