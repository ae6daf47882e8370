//! Open client contexts

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Identifier of an open client context (a page)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ClientId(Uuid);

impl ClientId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ClientId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for ClientId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A client context and the controller version governing it
#[derive(Debug, Clone, Serialize)]
pub struct ClientInfo {
    pub id: ClientId,
    pub controller: Option<String>,
    pub registered_at: DateTime<Utc>,
}

/// Registry of open client contexts
#[derive(Default)]
pub struct ClientRegistry {
    clients: RwLock<HashMap<ClientId, ClientInfo>>,
}

impl ClientRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a client context, controlled by `controller` if any is active
    pub fn register(&self, controller: Option<&str>) -> ClientId {
        let id = ClientId::new();
        self.clients.write().insert(
            id,
            ClientInfo {
                id,
                controller: controller.map(str::to_string),
                registered_at: Utc::now(),
            },
        );
        id
    }

    /// Close a client context
    pub fn release(&self, id: &ClientId) -> bool {
        self.clients.write().remove(id).is_some()
    }

    /// Put every open client under `version`; returns how many there are
    pub fn claim(&self, version: &str) -> usize {
        let mut clients = self.clients.write();
        for client in clients.values_mut() {
            client.controller = Some(version.to_string());
        }
        clients.len()
    }

    /// Number of clients governed by `version`
    pub fn controlled_by(&self, version: &str) -> usize {
        self.clients
            .read()
            .values()
            .filter(|c| c.controller.as_deref() == Some(version))
            .count()
    }

    pub fn get(&self, id: &ClientId) -> Option<ClientInfo> {
        self.clients.read().get(id).cloned()
    }

    pub fn list(&self) -> Vec<ClientInfo> {
        let mut clients: Vec<_> = self.clients.read().values().cloned().collect();
        clients.sort_by_key(|c| c.registered_at);
        clients
    }

    pub fn len(&self) -> usize {
        self.clients.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.read().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_and_release() {
        let registry = ClientRegistry::new();
        let id = registry.register(None);
        assert_eq!(registry.len(), 1);
        assert!(registry.get(&id).unwrap().controller.is_none());

        assert!(registry.release(&id));
        assert!(!registry.release(&id));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_claim_takes_over_every_client() {
        let registry = ClientRegistry::new();
        registry.register(None);
        registry.register(Some("v1"));

        assert_eq!(registry.controlled_by("v1"), 1);
        assert_eq!(registry.claim("v2"), 2);
        assert_eq!(registry.controlled_by("v1"), 0);
        assert_eq!(registry.controlled_by("v2"), 2);
    }

    #[test]
    fn test_client_id_round_trip() {
        let id = ClientId::new();
        assert_eq!(id.to_string().parse::<ClientId>().unwrap(), id);
        assert!("not-a-uuid".parse::<ClientId>().is_err());
    }
}
