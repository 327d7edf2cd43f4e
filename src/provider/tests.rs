use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use super::*;
use crate::bus::InProcessBus;
use crate::database::memory::InMemoryDatabase;
use crate::watch_group::LoggingType;

fn provider() -> Arc<DatabaseProvider<InMemoryDatabase>> {
    let pool = SubscriptionPool::new(Arc::new(InProcessBus::new()));
    DatabaseProvider::new(pool, || Ok(InMemoryDatabase::new()))
}

#[tokio::test]
async fn create_group_registers_it_by_name() {
    let provider = provider();
    provider
        .create_group("living-room", GroupConfig::default())
        .await
        .unwrap();
    assert_eq!(provider.group_names(), vec!["living-room".to_string()]);
    assert!(provider.group("living-room").is_some());
    assert!(provider.group("missing").is_none());
}

#[tokio::test]
async fn each_group_gets_its_own_database() {
    let provider = provider();
    let a = provider.create_group("a", GroupConfig::default()).await.unwrap();
    let b = provider.create_group("b", GroupConfig::default()).await.unwrap();

    let watch = a
        .add_watch_path(provider.pool(), "sensors/temp")
        .await
        .unwrap();
    a.write(&watch, crate::value::SubscriptionUpdate::new("sensors/temp", crate::value::Value::Number(1.0), 100))
        .await
        .unwrap();

    assert_eq!(a.get_history(&watch, 0, 1000).await.unwrap().len(), 1);
    let watch_b = b
        .add_watch_path(provider.pool(), "sensors/temp")
        .await
        .unwrap();
    assert_eq!(b.get_history(&watch_b, 0, 1000).await.unwrap().len(), 0);
}

#[tokio::test]
async fn add_watch_path_against_an_unknown_group_fails() {
    let provider = provider();
    assert!(provider.add_watch_path("nope", "a/b").await.is_err());
}

#[tokio::test]
async fn on_watch_added_hook_fires_once_per_add_watch_path() {
    let provider = provider();
    provider
        .create_group("g", GroupConfig::default())
        .await
        .unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let count_clone = count.clone();
    provider.set_on_watch_added(Arc::new(move |_watch| {
        count_clone.fetch_add(1, Ordering::SeqCst);
    }));

    provider.add_watch_path("g", "a/b").await.unwrap();
    provider.add_watch_path("g", "c/d").await.unwrap();
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn edit_group_reconfigures_logging_type() {
    let provider = provider();
    let group = provider
        .create_group("g", GroupConfig::default())
        .await
        .unwrap();
    assert_eq!(group.config().await.logging_type, LoggingType::AllData);

    provider
        .edit_group(
            "g",
            GroupConfig {
                logging_type: LoggingType::PointChange,
                ..GroupConfig::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(group.config().await.logging_type, LoggingType::PointChange);
}

#[tokio::test]
async fn delete_group_unsubscribes_its_watches_and_forgets_it() {
    let provider = provider();
    provider
        .create_group("g", GroupConfig::default())
        .await
        .unwrap();
    provider.add_watch_path("g", "a/b").await.unwrap();

    provider.delete_group("g").await.unwrap();
    assert!(provider.group("g").is_none());
    assert!(provider.pool().watches_for("a/b").await.is_empty());
}

#[tokio::test]
async fn set_watch_enabled_toggles_the_pool_subscription_idempotently() {
    let provider = provider();
    provider.create_group("g", GroupConfig::default()).await.unwrap();
    let watch = provider.add_watch_path("g", "a/b").await.unwrap();
    assert_eq!(provider.pool().watches_for("a/b").await.len(), 1);

    provider.set_watch_enabled(&watch, false).await.unwrap();
    assert!(provider.pool().watches_for("a/b").await.is_empty());

    // Repeating the same value is a no-op at the pool.
    provider.set_watch_enabled(&watch, false).await.unwrap();
    assert!(provider.pool().watches_for("a/b").await.is_empty());

    provider.set_watch_enabled(&watch, true).await.unwrap();
    assert_eq!(provider.pool().watches_for("a/b").await.len(), 1);
}

#[tokio::test]
async fn restore_get_history_action_emits_an_alias_per_watch() {
    let provider = provider();
    provider
        .create_group("g", GroupConfig::default())
        .await
        .unwrap();
    provider.add_watch_path("g", "sensors%2Ftemp").await.unwrap();

    let aliases = provider.restore_get_history_action("g", "/link1", "/historian/g");
    assert_eq!(aliases.len(), 1);
    let (alias_path, payload) = &aliases[0];
    assert_eq!(alias_path, "sensors%2Ftemp/@@getHistory");
    assert_eq!(
        payload["val"][0],
        "/link1/historian/g/sensors%2Ftemp/getHistory"
    );
}

#[tokio::test]
async fn restore_get_history_action_on_unknown_group_is_empty() {
    let provider = provider();
    assert!(provider
        .restore_get_history_action("nope", "/link1", "/historian/g")
        .is_empty());
}
