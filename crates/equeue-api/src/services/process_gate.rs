//! Business-process switchboard.
//!
//! Each named process gates a whole API surface. The persisted flags are
//! mirrored in memory so the per-request check never touches the database.
//! Writes go to the store first; the map changes only once the store has
//! recorded the new state.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{debug, info};

use equeue_core::{BusinessProcess, BusinessProcessRepository, Error, Result};

/// Cached view of the `business_processes` table.
#[derive(Clone)]
pub struct ProcessGate {
    flags: Arc<RwLock<HashMap<String, bool>>>,
    store: Arc<dyn BusinessProcessRepository>,
}

impl ProcessGate {
    /// Build the gate from a full reload of the store.
    pub async fn load(store: Arc<dyn BusinessProcessRepository>) -> Result<Self> {
        let gate = Self {
            flags: Arc::new(RwLock::new(HashMap::new())),
            store,
        };
        gate.reload().await?;
        Ok(gate)
    }

    /// Replace the in-memory map with the current persisted state.
    pub async fn reload(&self) -> Result<()> {
        let processes = self.store.list().await?;
        let count = processes.len();
        let disabled: Vec<String> = processes
            .iter()
            .filter(|p| !p.is_enabled)
            .map(|p| p.process_name.clone())
            .collect();

        let fresh: HashMap<String, bool> = processes
            .into_iter()
            .map(|p| (p.process_name, p.is_enabled))
            .collect();
        *self.flags.write().await = fresh;

        info!(
            subsystem = "api",
            component = "process_gate",
            processes = count,
            disabled = ?disabled,
            "Business process flags loaded"
        );
        Ok(())
    }

    /// Whether `name` is enabled. Unknown names are disabled.
    pub async fn is_enabled(&self, name: &str) -> bool {
        self.flags.read().await.get(name).copied().unwrap_or(false)
    }

    /// True if at least one of `names` is enabled.
    pub async fn any_enabled(&self, names: &[&str]) -> bool {
        let flags = self.flags.read().await;
        names
            .iter()
            .any(|name| flags.get(*name).copied().unwrap_or(false))
    }

    /// Persist a new flag value, then mirror it in memory.
    pub async fn update_status(&self, name: &str, enabled: bool) -> Result<BusinessProcess> {
        if !self.store.set_enabled(name, enabled).await? {
            return Err(Error::ProcessNotFound(name.to_string()));
        }

        self.flags.write().await.insert(name.to_string(), enabled);

        info!(
            subsystem = "api",
            component = "process_gate",
            process = name,
            enabled,
            "Business process updated"
        );
        Ok(BusinessProcess {
            process_name: name.to_string(),
            is_enabled: enabled,
        })
    }

    /// All processes as persisted.
    pub async fn get_all(&self) -> Result<Vec<BusinessProcess>> {
        self.store.list().await
    }

    /// One process as persisted.
    pub async fn get(&self, name: &str) -> Result<BusinessProcess> {
        self.store
            .get(name)
            .await?
            .ok_or_else(|| Error::ProcessNotFound(name.to_string()))
    }

    /// The in-memory map, sorted by name.
    pub async fn snapshot(&self) -> BTreeMap<String, bool> {
        let flags = self.flags.read().await;
        debug!(
            subsystem = "api",
            component = "process_gate",
            processes = flags.len(),
            "Process snapshot read"
        );
        flags.iter().map(|(k, v)| (k.clone(), *v)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Mutex;

    /// In-memory store that can be told to fail writes.
    struct FakeStore {
        rows: Mutex<Vec<BusinessProcess>>,
        fail_writes: AtomicBool,
    }

    impl FakeStore {
        fn with(rows: &[(&str, bool)]) -> Arc<Self> {
            Arc::new(Self {
                rows: Mutex::new(
                    rows.iter()
                        .map(|(n, e)| BusinessProcess {
                            process_name: n.to_string(),
                            is_enabled: *e,
                        })
                        .collect(),
                ),
                fail_writes: AtomicBool::new(false),
            })
        }
    }

    #[async_trait]
    impl BusinessProcessRepository for FakeStore {
        async fn list(&self) -> Result<Vec<BusinessProcess>> {
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn get(&self, name: &str) -> Result<Option<BusinessProcess>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|p| p.process_name == name)
                .cloned())
        }

        async fn set_enabled(&self, name: &str, enabled: bool) -> Result<bool> {
            if self.fail_writes.load(Ordering::SeqCst) {
                return Err(Error::Internal("store unavailable".into()));
            }
            let mut rows = self.rows.lock().unwrap();
            match rows.iter_mut().find(|p| p.process_name == name) {
                Some(p) => {
                    p.is_enabled = enabled;
                    Ok(true)
                }
                None => Ok(false),
            }
        }
    }

    #[tokio::test]
    async fn test_load_mirrors_store() {
        let store = FakeStore::with(&[("reception", true), ("doctor", false)]);
        let gate = ProcessGate::load(store).await.unwrap();

        assert!(gate.is_enabled("reception").await);
        assert!(!gate.is_enabled("doctor").await);
    }

    #[tokio::test]
    async fn test_unknown_process_is_disabled() {
        let gate = ProcessGate::load(FakeStore::with(&[("reception", true)]))
            .await
            .unwrap();
        assert!(!gate.is_enabled("nonexistent").await);
        assert!(!gate.any_enabled(&["nonexistent", "other"]).await);
    }

    #[tokio::test]
    async fn test_any_enabled() {
        let gate = ProcessGate::load(FakeStore::with(&[
            ("registry", false),
            ("queue_doctor", true),
        ]))
        .await
        .unwrap();
        assert!(gate.any_enabled(&["registry", "queue_doctor"]).await);
        assert!(!gate.any_enabled(&["registry"]).await);
    }

    #[tokio::test]
    async fn test_update_is_visible_immediately_and_persisted() {
        let store = FakeStore::with(&[("terminal", true)]);
        let gate = ProcessGate::load(store.clone()).await.unwrap();

        gate.update_status("terminal", false).await.unwrap();

        assert!(!gate.is_enabled("terminal").await);
        assert!(!store.get("terminal").await.unwrap().unwrap().is_enabled);
    }

    #[tokio::test]
    async fn test_failed_write_leaves_cache_untouched() {
        let store = FakeStore::with(&[("terminal", true)]);
        let gate = ProcessGate::load(store.clone()).await.unwrap();
        store.fail_writes.store(true, Ordering::SeqCst);

        assert!(gate.update_status("terminal", false).await.is_err());
        assert!(gate.is_enabled("terminal").await);
    }

    #[tokio::test]
    async fn test_update_unknown_process() {
        let gate = ProcessGate::load(FakeStore::with(&[])).await.unwrap();
        let err = gate.update_status("ghost", true).await.unwrap_err();
        assert!(matches!(err, Error::ProcessNotFound(name) if name == "ghost"));
        assert!(!gate.is_enabled("ghost").await);
    }

    #[tokio::test]
    async fn test_snapshot_is_sorted() {
        let gate = ProcessGate::load(FakeStore::with(&[("terminal", true), ("doctor", false)]))
            .await
            .unwrap();
        let names: Vec<String> = gate.snapshot().await.into_keys().collect();
        assert_eq!(names, vec!["doctor", "terminal"]);
    }
}
