
use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::Mutex;

use crate::bus::Bus;
use crate::error::Error;
use crate::value::SubscriptionUpdate;
use crate::watch::WatchHandle;

/// Multiplexes many `Watch`es onto one bus subscription per path: the bus
/// only ever sees one subscribe/unsubscribe per distinct path, regardless of
/// how many groups have registered a Watch against it.
pub struct SubscriptionPool {
    bus: Arc<dyn Bus>,
    watches: Mutex<HashMap<String, Vec<WatchHandle>>>,
}

impl SubscriptionPool {
    pub fn new(bus: Arc<dyn Bus>) -> Arc<Self> {
        Arc::new(Self {
            bus,
            watches: Mutex::new(HashMap::new()),
        })
    }

    /// Registers `watch` under its path, subscribing to the bus only if this
    /// is the first Watch registered for that path.
    pub async fn subscribe(&self, watch: WatchHandle) -> Result<(), Error> {
        let path = watch.path.clone();
        let first_for_path = {
            let mut watches = self.watches.lock().await;
            let entry = watches.entry(path.clone()).or_default();
            let first = entry.is_empty();
            entry.push(watch);
            first
        };
        if first_for_path {
            self.bus.subscribe(&path).await?;
        }
        Ok(())
    }

    /// Deregisters `watch`, unsubscribing from the bus only once no Watch
    /// remains for its path.
    pub async fn unsubscribe(&self, watch: &WatchHandle) -> Result<(), Error> {
        let path = watch.path.clone();
        let now_empty = {
            let mut watches = self.watches.lock().await;
            match watches.get_mut(&path) {
                Some(list) => {
                    list.retain(|w| !Arc::ptr_eq(w, watch));
                    let empty = list.is_empty();
                    if empty {
                        watches.remove(&path);
                    }
                    empty
                }
                None => false,
            }
        };
        if now_empty {
            self.bus.unsubscribe(&path).await?;
        }
        Ok(())
    }

    /// All Watches currently registered for `path`, fanned out to by the
    /// caller (typically the provider's dispatch loop) on each inbound
    /// `SubscriptionUpdate`.
    pub async fn watches_for(&self, path: &str) -> Vec<WatchHandle> {
        self.watches
            .lock()
            .await
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    pub async fn dispatch(&self, update: &SubscriptionUpdate) -> Vec<WatchHandle> {
        self.watches_for(&update.path).await
    }
}
