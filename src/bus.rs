use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::error::Error;

/// The wire-level collaborator `SubscriptionPool` multiplexes subscriptions
/// onto. The actual DSA link transport is out of scope for this crate;
/// anything that can subscribe/unsubscribe a path and push
/// `SubscriptionUpdate`s through the pool's dispatch side satisfies this.
#[async_trait]
pub trait Bus: Send + Sync {
    async fn subscribe(&self, path: &str) -> Result<(), Error>;
    async fn unsubscribe(&self, path: &str) -> Result<(), Error>;
}

/// A bus with no real transport: subscribe/unsubscribe just record which
/// paths are currently live, so tests can assert the pool's dedup behavior
/// without a link SDK.
#[derive(Default)]
pub struct InProcessBus {
    subscribed: Mutex<HashSet<String>>,
}

impl InProcessBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self, path: &str) -> bool {
        self.subscribed.lock().unwrap().contains(path)
    }

    pub fn subscribed_paths(&self) -> Vec<String> {
        self.subscribed.lock().unwrap().iter().cloned().collect()
    }
}

#[async_trait]
impl Bus for InProcessBus {
    async fn subscribe(&self, path: &str) -> Result<(), Error> {
        self.subscribed.lock().unwrap().insert(path.to_string());
        Ok(())
    }

    async fn unsubscribe(&self, path: &str) -> Result<(), Error> {
        self.subscribed.lock().unwrap().remove(path);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn subscribe_then_unsubscribe_clears_the_path() {
        let bus = InProcessBus::new();
        bus.subscribe("a/b").await.unwrap();
        assert!(bus.is_subscribed("a/b"));
        bus.unsubscribe("a/b").await.unwrap();
        assert!(!bus.is_subscribed("a/b"));
    }

    #[tokio::test]
    async fn unsubscribing_an_unknown_path_is_not_an_error() {
        let bus = InProcessBus::new();
        bus.unsubscribe("never/subscribed").await.unwrap();
    }
}
