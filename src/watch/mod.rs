#[cfg(test)]
mod tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use tokio::sync::RwLock;

use crate::path::decode_path;
use crate::value::{SubscriptionUpdate, Value};

/// Notified, in registration order is not guaranteed, after every successful
/// database write for the Watch's path. A handler that panics is logged and
/// does not prevent its siblings from being notified.
pub trait RealTimeHandler: Send + Sync {
    fn handle(&self, path: &str, value: &Value, time: i64);
}

pub type HandlerToken = u64;
pub type WatchHandle = Arc<Watch>;

struct WatchState {
    enabled: bool,
    last_value: Value,
    last_written_value: Value,
    last_written_time: Option<i64>,
    start_date: Option<i64>,
    end_date: Option<i64>,
    last_watch_update: Option<SubscriptionUpdate>,
}

/// A single subscribed path inside a `WatchGroup`. Owns the bookkeeping the
/// group's write policy needs (last value seen, last value/time actually
/// persisted) and the real-time handler fan-out for its path.
pub struct Watch {
    pub path: String,
    state: Mutex<WatchState>,
    handlers: RwLock<HashMap<HandlerToken, Arc<dyn RealTimeHandler>>>,
    next_token: AtomicU64,
}

impl Watch {
    pub fn new(raw_path: impl Into<String>) -> WatchHandle {
        Arc::new(Watch {
            path: decode_path(&raw_path.into()),
            state: Mutex::new(WatchState {
                enabled: true,
                last_value: Value::Null,
                last_written_value: Value::Null,
                last_written_time: None,
                start_date: None,
                end_date: None,
                last_watch_update: None,
            }),
            handlers: RwLock::new(HashMap::new()),
            next_token: AtomicU64::new(1),
        })
    }

    pub fn enabled(&self) -> bool {
        self.state.lock().unwrap().enabled
    }

    /// Returns whether this call actually flipped the flag, so callers only
    /// (un)register with the pool on a real transition.
    pub fn set_enabled(&self, enabled: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        if state.enabled == enabled {
            return false;
        }
        state.enabled = enabled;
        true
    }

    pub fn last_value(&self) -> Value {
        self.state.lock().unwrap().last_value.clone()
    }

    pub fn set_last_value(&self, value: Value) {
        self.state.lock().unwrap().last_value = value;
    }

    pub fn last_watch_update(&self) -> Option<SubscriptionUpdate> {
        self.state.lock().unwrap().last_watch_update.clone()
    }

    pub fn set_last_watch_update(&self, update: SubscriptionUpdate) {
        self.state.lock().unwrap().last_watch_update = Some(update);
    }

    pub fn last_written_value(&self) -> Value {
        self.state.lock().unwrap().last_written_value.clone()
    }

    pub fn last_written_time(&self) -> Option<i64> {
        self.state.lock().unwrap().last_written_time
    }

    pub fn start_date(&self) -> Option<i64> {
        self.state.lock().unwrap().start_date
    }

    pub fn end_date(&self) -> Option<i64> {
        self.state.lock().unwrap().end_date
    }

    /// Called by the owning group after a row for `value` at `time` has
    /// actually been committed to the database.
    pub fn handle_last_written(&self, value: Value, time: i64) {
        let mut state = self.state.lock().unwrap();
        state.last_written_value = value;
        if state.start_date.is_none() {
            state.start_date = Some(time);
        }
        state.end_date = Some(time);
        state.last_written_time = Some(time);
    }

    pub async fn add_handler(&self, handler: Arc<dyn RealTimeHandler>) -> HandlerToken {
        let token = self.next_token.fetch_add(1, Ordering::SeqCst);
        self.handlers.write().await.insert(token, handler);
        token
    }

    pub async fn remove_handler(&self, token: HandlerToken) {
        self.handlers.write().await.remove(&token);
    }

    pub async fn notify_handlers(&self, value: &Value, time: i64) {
        let handlers: Vec<_> = {
            let guard = self.handlers.read().await;
            guard.values().cloned().collect()
        };
        for handler in handlers {
            let path = self.path.clone();
            let value = value.clone();
            let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
                handler.handle(&path, &value, time)
            }));
            if result.is_err() {
                tracing::error!(path = %self.path, "real-time handler panicked");
            }
        }
    }
}

/// One pending write for a group's queue: the Watch it belongs to, the raw
/// update, and (for interval-sampled rows) the tick time to stamp it with.
#[derive(Clone)]
pub struct WatchUpdate {
    pub watch: WatchHandle,
    pub update: SubscriptionUpdate,
    pub interval_timestamp: Option<i64>,
}
