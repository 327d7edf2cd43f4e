#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};

use crate::database::Database;
use crate::error::{Error, NotFound};
use crate::path::encode_path;
use crate::pool::SubscriptionPool;
use crate::value::SubscriptionUpdate;
use crate::watch::WatchHandle;
use crate::watch_group::{GroupConfig, WatchGroup};

/// Owns the single `SubscriptionPool` shared by every group it produces, and
/// the factory that supplies each new group with its own `Database`. This is
/// the root of the back-reference chain (`Watch` → `WatchGroup` →
/// `DatabaseProvider` → `SubscriptionPool`): a `Provider` is constructed once
/// by the host application (the node action tree, out of scope here) and
/// outlives every `WatchGroup` it hands out, since groups only ever hold an
/// `Arc` back to the pool, never to the provider itself.
pub struct DatabaseProvider<D: Database + 'static> {
    pool: Arc<SubscriptionPool>,
    make_database: Box<dyn Fn() -> Result<D, Error> + Send + Sync>,
    groups: StdMutex<HashMap<String, WatchGroup<D>>>,
    on_watch_added: StdMutex<Option<Arc<dyn Fn(&WatchHandle) + Send + Sync>>>,
}

impl<D: Database + 'static> DatabaseProvider<D> {
    pub fn new(
        pool: Arc<SubscriptionPool>,
        make_database: impl Fn() -> Result<D, Error> + Send + Sync + 'static,
    ) -> Arc<Self> {
        Arc::new(Self {
            pool,
            make_database: Box::new(make_database),
            groups: StdMutex::new(HashMap::new()),
            on_watch_added: StdMutex::new(None),
        })
    }

    pub fn pool(&self) -> &Arc<SubscriptionPool> {
        &self.pool
    }

    /// Registers a hook invoked after every `add_watch_path`, e.g. for a
    /// provider-level index keyed by node identity, kept as a side table
    /// instead of attaching metadata to the node tree itself.
    pub fn set_on_watch_added(&self, hook: Arc<dyn Fn(&WatchHandle) + Send + Sync>) {
        *self.on_watch_added.lock().unwrap() = Some(hook);
    }

    /// Created when a user adds a WatchGroup via the node action tree
    /// (out of scope here): produces a fresh `Database` for it, starts
    /// whichever schedulers its config calls for, and registers it under
    /// `name` so later actions (`add_watch_path`, `edit`, `delete`) can find
    /// it again.
    pub async fn create_group(
        &self,
        name: impl Into<String>,
        config: GroupConfig,
    ) -> Result<WatchGroup<D>, Error> {
        let name = name.into();
        let db = (self.make_database)()?;
        let group = WatchGroup::new(db, config);
        group.init_settings().await;
        self.groups.lock().unwrap().insert(name, group.clone());
        Ok(group)
    }

    pub fn group(&self, name: &str) -> Option<WatchGroup<D>> {
        self.groups.lock().unwrap().get(name).cloned()
    }

    pub fn group_names(&self) -> Vec<String> {
        self.groups.lock().unwrap().keys().cloned().collect()
    }

    /// `addWatchPath` action: adds a Watch to the named group, subscribing it
    /// through this provider's shared pool.
    pub async fn add_watch_path(&self, group_name: &str, raw_path: &str) -> Result<WatchHandle, Error> {
        let group = self
            .group(group_name)
            .ok_or_else(|| -> Error { Box::new(NotFound(group_name.to_string())) })?;
        let watch = group.add_watch_path(&self.pool, raw_path).await?;
        if let Some(hook) = self.on_watch_added.lock().unwrap().clone() {
            hook(&watch);
        }
        Ok(watch)
    }

    /// Toggles a Watch's `enabled` node-tree field, (un)subscribing it from
    /// the pool only on an actual true↔false transition — `Watch::set_enabled`
    /// already reports whether the flag moved, so toggling twice in a row
    /// with the same value is a no-op at the pool.
    pub async fn set_watch_enabled(&self, watch: &WatchHandle, enabled: bool) -> Result<(), Error> {
        if !watch.set_enabled(enabled) {
            return Ok(());
        }
        if enabled {
            self.pool.subscribe(watch.clone()).await
        } else {
            self.pool.unsubscribe(watch).await
        }
    }

    /// `edit` action: atomically reconfigures the named group's logging
    /// policy (see `WatchGroup::edit_settings` for the cancel-then-restart
    /// atomicity primitive).
    pub async fn edit_group(&self, group_name: &str, config: GroupConfig) -> Result<(), Error> {
        let group = self
            .group(group_name)
            .ok_or_else(|| -> Error { Box::new(NotFound(group_name.to_string())) })?;
        group.edit_settings(config).await;
        Ok(())
    }

    /// `delete` action: unsubscribes every Watch in the group and drops it
    /// from the registry.
    pub async fn delete_group(&self, group_name: &str) -> Result<(), Error> {
        let group = self.groups.lock().unwrap().remove(group_name);
        if let Some(group) = group {
            group.delete(&self.pool).await?;
        }
        Ok(())
    }

    /// The bus dispatch loop's entry point: the host application (it owns
    /// the actual link connection, out of scope here) calls this once per
    /// inbound `SubscriptionUpdate`. `SubscriptionPool` guarantees the bus
    /// itself only sees one subscription per path, but more than one group
    /// can independently hold a Watch there (see the "kitchen"/"hallway"
    /// integration test), so this fans the update out to every group's own
    /// `WatchGroup::dispatch` — each looks up its own Watches at that path
    /// via its own registry rather than this provider keeping a second
    /// path-to-group index.
    pub async fn ingest(&self, update: SubscriptionUpdate) -> Result<(), Error> {
        let groups: Vec<WatchGroup<D>> = self.groups.lock().unwrap().values().cloned().collect();
        for group in groups {
            group.dispatch(&update).await?;
        }
        Ok(())
    }

    /// `restoreGetHistoryAction`: the alias path/payload pairs a node-tree
    /// layer would publish to rebuild every Watch's `@@getHistory` bus alias
    /// in `group_name`. Publishing them is the out-of-scope wire-protocol
    /// collaborator's job; this only recomputes what to send.
    pub fn restore_get_history_action(
        &self,
        group_name: &str,
        link_path: &str,
        group_node_path: &str,
    ) -> Vec<(String, serde_json::Value)> {
        let Some(group) = self.group(group_name) else {
            return Vec::new();
        };
        group
            .watches()
            .into_iter()
            .map(|watch| {
                let encoded = encode_path(&watch.path);
                let alias_path = format!("{encoded}/@@getHistory");
                let target = format!("{link_path}{group_node_path}/{encoded}/getHistory");
                let payload = serde_json::json!({"@": "merge", "type": "paths", "val": [target]});
                (alias_path, payload)
            })
            .collect()
    }
}
