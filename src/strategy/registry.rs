//! Lazily created, shared namespace handlers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::cache::Namespace;
use crate::strategy::handler::NamespaceHandler;

/// Map of namespace to handler, owned by the cache service.
#[derive(Debug, Default)]
pub struct HandlerRegistry {
    handlers: RwLock<HashMap<Namespace, Arc<NamespaceHandler>>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get the handler for `namespace`, creating it on first use.
    pub fn get_or_create(&self, namespace: &Namespace) -> Arc<NamespaceHandler> {
        if let Some(handler) = self.handlers.read().get(namespace) {
            return Arc::clone(handler);
        }

        let mut handlers = self.handlers.write();
        // another thread may have created it while we waited
        Arc::clone(
            handlers
                .entry(namespace.clone())
                .or_insert_with(|| Arc::new(NamespaceHandler::new(namespace.clone()))),
        )
    }

    /// Namespaces that have been used through this registry, sorted.
    pub fn namespaces(&self) -> Vec<Namespace> {
        let mut names: Vec<Namespace> = self.handlers.read().keys().cloned().collect();
        names.sort();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handler_is_cached() {
        let registry = HandlerRegistry::new();
        let ns = Namespace::new("ns1").unwrap();

        let a = registry.get_or_create(&ns);
        let b = registry.get_or_create(&ns);
        assert!(Arc::ptr_eq(&a, &b));

        registry.get_or_create(&Namespace::new("alpha").unwrap());
        let names: Vec<String> = registry.namespaces().iter().map(|n| n.to_string()).collect();
        assert_eq!(names, vec!["alpha", "ns1"]);
    }

    #[test]
    fn test_concurrent_creation() {
        let registry = Arc::new(HandlerRegistry::new());
        let ns = Namespace::new("shared").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let registry = Arc::clone(&registry);
                let ns = ns.clone();
                std::thread::spawn(move || registry.get_or_create(&ns))
            })
            .collect();
        let handlers: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

        assert!(handlers.windows(2).all(|w| Arc::ptr_eq(&w[0], &w[1])));
    }
}
