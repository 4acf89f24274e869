use std::collections::BTreeMap;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::RegistryError;

/// Client facade over the coordination store that persists job configuration
/// and scheduler state. Keys are `/`-separated paths; values are strings.
///
/// Implementations must provide linearizable read-modify-write per key so the
/// ready queue, running set, and failover queue survive scheduler restarts
/// with consistent membership.
#[async_trait]
pub trait RegistryCenter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RegistryError>;

    /// Direct child names under `key`, sorted lexicographically.
    async fn get_children(&self, key: &str) -> Result<Vec<String>, RegistryError>;

    async fn exists(&self, key: &str) -> Result<bool, RegistryError>;

    async fn persist(&self, key: &str, value: &str) -> Result<(), RegistryError>;

    /// Remove `key` and everything below it. Removing an absent key is a no-op.
    async fn remove(&self, key: &str) -> Result<(), RegistryError>;
}

/// In-process registry used by tests and embedders that do not need a durable
/// store. A sorted map keeps child enumeration deterministic.
#[derive(Debug, Default)]
pub struct MemoryRegistryCenter {
    data: RwLock<BTreeMap<String, String>>,
}

impl MemoryRegistryCenter {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RegistryCenter for MemoryRegistryCenter {
    async fn get(&self, key: &str) -> Result<Option<String>, RegistryError> {
        Ok(self.data.read().await.get(key).cloned())
    }

    async fn get_children(&self, key: &str) -> Result<Vec<String>, RegistryError> {
        let prefix = format!("{}/", key.trim_end_matches('/'));
        let data = self.data.read().await;
        let mut children = Vec::new();
        for path in data.range(prefix.clone()..) {
            let (path, _) = path;
            if !path.starts_with(&prefix) {
                break;
            }
            let child = match path[prefix.len()..].split('/').next() {
                Some(c) if !c.is_empty() => c.to_string(),
                _ => continue,
            };
            if children.last() != Some(&child) {
                children.push(child);
            }
        }
        Ok(children)
    }

    async fn exists(&self, key: &str) -> Result<bool, RegistryError> {
        Ok(self.data.read().await.contains_key(key))
    }

    async fn persist(&self, key: &str, value: &str) -> Result<(), RegistryError> {
        self.data
            .write()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), RegistryError> {
        let prefix = format!("{}/", key.trim_end_matches('/'));
        let mut data = self.data.write().await;
        data.remove(key);
        data.retain(|path, _| !path.starts_with(&prefix));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn children_are_direct_and_sorted() {
        let registry = MemoryRegistryCenter::new();
        registry.persist("/state/running/b/b@-@0", "x").await.unwrap();
        registry.persist("/state/running/a/a@-@1", "y").await.unwrap();
        registry.persist("/state/running/a/a@-@0", "z").await.unwrap();

        let children = registry.get_children("/state/running").await.unwrap();
        assert_eq!(children, vec!["a".to_string(), "b".to_string()]);

        let grandchildren = registry.get_children("/state/running/a").await.unwrap();
        assert_eq!(grandchildren, vec!["a@-@0".to_string(), "a@-@1".to_string()]);
    }

    #[tokio::test]
    async fn remove_deletes_subtree() {
        let registry = MemoryRegistryCenter::new();
        registry.persist("/config/job_a", "cfg").await.unwrap();
        registry.persist("/state/failover/job_a/job_a@-@0", "t").await.unwrap();
        registry.persist("/state/failover/job_a/job_a@-@1", "t").await.unwrap();

        registry.remove("/state/failover/job_a").await.unwrap();
        assert!(registry
            .get_children("/state/failover/job_a")
            .await
            .unwrap()
            .is_empty());
        assert!(registry.get("/config/job_a").await.unwrap().is_some());
    }
}
