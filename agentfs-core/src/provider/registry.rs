use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use tracing::{debug, info};

use crate::error::{FsError, FsResult};
use crate::provider::Provider;
use crate::session::Session;

/// Named providers plus an optional default. Cheap to clone; clones share
/// the same table.
#[derive(Clone, Default)]
pub struct ProviderRegistry {
    providers: Arc<RwLock<BTreeMap<String, Arc<dyn Provider>>>>,
    default_provider: Option<String>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Provider used by sessions that never picked one.
    pub fn with_default(mut self, name: impl Into<String>) -> Self {
        self.default_provider = Some(name.into());
        self
    }

    pub fn default_provider(&self) -> Option<&str> {
        self.default_provider.as_deref()
    }

    /// Registering an existing name replaces the previous provider.
    pub fn register(&self, name: impl Into<String>, provider: Arc<dyn Provider>) {
        let name = name.into();
        let replaced = self
            .providers
            .write()
            .expect("lock poisoned")
            .insert(name.clone(), provider)
            .is_some();
        if replaced {
            info!(provider = %name, "Replaced provider registration");
        } else {
            info!(provider = %name, "Registered provider");
        }
    }

    pub fn unregister(&self, name: &str) -> bool {
        let removed = self
            .providers
            .write()
            .expect("lock poisoned")
            .remove(name)
            .is_some();
        if removed {
            info!(provider = %name, "Unregistered provider");
        }
        removed
    }

    pub fn resolve(&self, name: &str) -> FsResult<Arc<dyn Provider>> {
        self.providers
            .read()
            .expect("lock poisoned")
            .get(name)
            .cloned()
            .ok_or_else(|| FsError::ProviderNotRegistered {
                name: name.to_string(),
            })
    }

    pub fn names(&self) -> Vec<String> {
        self.providers
            .read()
            .expect("lock poisoned")
            .keys()
            .cloned()
            .collect()
    }

    /// The session's provider, else the default, else `NoActiveProvider`.
    /// A binding to a name that has since been unregistered is a
    /// configuration error, not a silent fallback.
    pub fn active(&self, session: &Session) -> FsResult<Arc<dyn Provider>> {
        match session
            .active_provider
            .as_deref()
            .or(self.default_provider.as_deref())
        {
            Some(name) => self.resolve(name),
            None => Err(FsError::NoActiveProvider),
        }
    }

    /// Bind the session to `name`. Validated before anything is changed.
    pub fn set_active(&self, session: &mut Session, name: &str) -> FsResult<()> {
        self.resolve(name)?;
        if session.active_provider.as_deref() != Some(name) {
            debug!(
                session = %session.id,
                from = ?session.active_provider,
                to = %name,
                "Switching provider"
            );
        }
        session.active_provider = Some(name.to_string());
        session.invalidate_ignore_filter();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ignore_filter::IgnoreFilter;
    use crate::provider::MemoryProvider;

    fn registry() -> ProviderRegistry {
        let registry = ProviderRegistry::new().with_default("a");
        registry.register("a", Arc::new(MemoryProvider::new("a")));
        registry.register("b", Arc::new(MemoryProvider::new("b")));
        registry
    }

    #[test]
    fn test_resolve_and_names() {
        let registry = registry();
        assert_eq!(registry.names(), vec!["a", "b"]);
        assert_eq!(registry.resolve("b").unwrap().name(), "b");
        let err = registry.resolve("ssh").err().unwrap();
        assert!(matches!(err, FsError::ProviderNotRegistered { ref name } if name == "ssh"));
    }

    #[test]
    fn test_register_replaces() {
        let registry = registry();
        registry.register("a", Arc::new(MemoryProvider::new("replacement")));
        assert_eq!(registry.resolve("a").unwrap().name(), "replacement");
        assert_eq!(registry.names().len(), 2);
    }

    #[test]
    fn test_active_falls_back_to_default() {
        let registry = registry();
        let mut session = Session::new();
        assert_eq!(registry.active(&session).unwrap().name(), "a");

        registry.set_active(&mut session, "b").unwrap();
        assert_eq!(registry.active(&session).unwrap().name(), "b");
    }

    #[test]
    fn test_no_default_no_binding() {
        let registry = ProviderRegistry::new();
        let err = registry.active(&Session::new()).err().unwrap();
        assert!(matches!(err, FsError::NoActiveProvider));
    }

    #[test]
    fn test_set_active_unknown_leaves_session_untouched() {
        let registry = registry();
        let mut session = Session::new();
        registry.set_active(&mut session, "b").unwrap();
        session.cache_ignore_filter(IgnoreFilter::none());

        let err = registry.set_active(&mut session, "nope").unwrap_err();
        assert!(err.is_configuration());
        assert_eq!(session.active_provider.as_deref(), Some("b"));
        assert!(session.has_cached_ignore_filter());
    }

    #[test]
    fn test_switch_clears_ignore_cache() {
        let registry = registry();
        let mut session = Session::new();
        session.cache_ignore_filter(IgnoreFilter::none());
        registry.set_active(&mut session, "b").unwrap();
        assert!(!session.has_cached_ignore_filter());
    }

    #[test]
    fn test_unregister() {
        let registry = registry();
        let mut session = Session::new();
        registry.set_active(&mut session, "b").unwrap();
        assert!(registry.unregister("b"));
        assert!(!registry.unregister("b"));
        assert!(registry.active(&session).err().unwrap().is_configuration());
    }
}
