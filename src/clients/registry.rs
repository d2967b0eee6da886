//! Client registry for tracking known edge nodes

use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock};

use super::types::{ClientInfo, OutputKind};

/// Registry of known edge nodes, keyed by identifier
///
/// Entries are rarely mutated after registration, so a read/write lock is
/// enough; lookups return owned copies.
#[derive(Debug, Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<String, ClientInfo>>,
}

impl ClientRegistry {
    /// Create a new empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a client, replacing any previous entry with the same
    /// identifier
    pub fn register(&self, info: ClientInfo) {
        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        clients.insert(info.identifier.clone(), info);
    }

    /// Remove a client
    pub fn unregister(&self, identifier: &str) -> Option<ClientInfo> {
        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        clients.remove(identifier)
    }

    /// Look up a client by identifier
    #[must_use]
    pub fn lookup(&self, identifier: &str) -> Option<ClientInfo> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.get(identifier).cloned()
    }

    /// List all known clients
    #[must_use]
    pub fn list(&self) -> Vec<ClientInfo> {
        let clients = self.clients.read().unwrap_or_else(PoisonError::into_inner);
        clients.values().cloned().collect()
    }

    /// Replace one of a client's output sets
    ///
    /// Returns false if the client is unknown.
    pub fn update_outputs(
        &self,
        identifier: &str,
        kind: OutputKind,
        values: HashSet<String>,
    ) -> bool {
        let mut clients = self
            .clients
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(info) = clients.get_mut(identifier) else {
            return false;
        };
        match kind {
            OutputKind::Music => info.music_outputs = values,
            OutputKind::Video => info.video_outputs = values,
        }
        true
    }

    /// Number of known clients
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Whether the registry is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use std::net::{IpAddr, Ipv4Addr};

    use super::*;

    fn sample_client(identifier: &str) -> ClientInfo {
        ClientInfo::new(
            identifier,
            IpAddr::V4(Ipv4Addr::new(192, 168, 1, 20)),
            7583,
        )
    }

    #[test]
    fn register_and_lookup() {
        let registry = ClientRegistry::new();
        registry.register(sample_client("livingroom-pi"));

        let info = registry.lookup("livingroom-pi").unwrap();
        assert_eq!(info.port, 7583);
        assert!(registry.lookup("kitchen-pi").is_none());
    }

    #[test]
    fn unregister_removes_entry() {
        let registry = ClientRegistry::new();
        registry.register(sample_client("livingroom-pi"));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister("livingroom-pi").is_some());
        assert!(registry.is_empty());
    }

    #[test]
    fn reregistration_replaces_entry() {
        let registry = ClientRegistry::new();
        registry.register(sample_client("livingroom-pi"));

        let mut updated = sample_client("livingroom-pi");
        updated.port = 9000;
        registry.register(updated);

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.lookup("livingroom-pi").unwrap().port, 9000);
    }

    #[test]
    fn update_outputs_replaces_set() {
        let registry = ClientRegistry::new();
        registry.register(sample_client("livingroom-pi"));

        let outputs: HashSet<String> = ["AirPlay Speakers".to_string()].into_iter().collect();
        assert!(registry.update_outputs("livingroom-pi", OutputKind::Music, outputs));

        let info = registry.lookup("livingroom-pi").unwrap();
        assert!(info.music_outputs.contains("AirPlay Speakers"));
        assert!(info.video_outputs.is_empty());
    }

    #[test]
    fn update_outputs_unknown_client() {
        let registry = ClientRegistry::new();
        assert!(!registry.update_outputs("ghost", OutputKind::Video, HashSet::new()));
    }
}
