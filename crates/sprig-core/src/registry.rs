use std::cell::RefCell;
use std::rc::Rc;

use crate::collections::map::HashMap;
use crate::controller::ScopeFactory;

/// Scope name to factory table. Entries are never removed; registering a
/// name again replaces the earlier factory.
#[derive(Clone, Default)]
pub struct ScopeRegistry {
    factories: Rc<RefCell<HashMap<String, ScopeFactory>>>,
}

impl ScopeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, name: impl Into<String>, factory: ScopeFactory) {
        let name = name.into();
        if self
            .factories
            .borrow_mut()
            .insert(name.clone(), factory)
            .is_some()
        {
            log::debug!("scope `{name}` re-registered; the new factory wins");
        }
    }

    pub fn lookup(&self, name: &str) -> Option<ScopeFactory> {
        self.factories.borrow().get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.factories.borrow().contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.factories.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::controller::{ActionSet, Controller, ScopeContext};
    use crate::memory::MemoryDocument;
    use crate::runtime::Runtime;
    use crate::EngineConfig;

    fn factory(tag: &'static str) -> ScopeFactory {
        Rc::new(move |_ctx: &ScopeContext| -> Box<dyn Controller> {
            Box::new(ActionSet::new().on(tag, |_ctx| {}))
        })
    }

    #[test]
    fn lookup_returns_registered_factory() {
        let registry = ScopeRegistry::new();
        assert!(registry.lookup("counter").is_none());
        registry.register("counter", factory("inc"));
        assert!(registry.contains("counter"));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn last_registration_wins() {
        let registry = ScopeRegistry::new();
        registry.register("counter", factory("first"));
        registry.register("counter", factory("second"));
        assert_eq!(registry.len(), 1);

        let runtime = Runtime::default();
        let doc = MemoryDocument::new(runtime.handle());
        let ctx = ScopeContext::new(doc.clone(), doc.body(), &EngineConfig::default());
        let built = (registry.lookup("counter").unwrap())(&ctx);
        let set = built.as_any().downcast_ref::<ActionSet>().unwrap();
        assert_eq!(set.methods().collect::<Vec<_>>(), vec!["second"]);
    }
}
