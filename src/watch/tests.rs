use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use static_assertions::assert_impl_all;

use super::*;

assert_impl_all!(Watch: Send, Sync);

struct CountingHandler(Arc<AtomicUsize>);

impl RealTimeHandler for CountingHandler {
    fn handle(&self, _path: &str, _value: &Value, _time: i64) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

struct PanickingHandler;

impl RealTimeHandler for PanickingHandler {
    fn handle(&self, _path: &str, _value: &Value, _time: i64) {
        panic!("boom");
    }
}

#[test]
fn decodes_escaped_segments_on_construction() {
    let watch = Watch::new("devices%2Flab/temp%2Ecelsius");
    assert_eq!(watch.path, "devices/lab/temp.celsius");
}

#[test]
fn set_enabled_reports_transitions_only() {
    let watch = Watch::new("a/b");
    assert!(watch.enabled());
    assert!(!watch.set_enabled(true));
    assert!(watch.set_enabled(false));
    assert!(!watch.enabled());
    assert!(!watch.set_enabled(false));
}

#[test]
fn handle_last_written_sets_start_date_once() {
    let watch = Watch::new("a/b");
    watch.handle_last_written(Value::Number(1.0), 100);
    watch.handle_last_written(Value::Number(2.0), 200);
    assert_eq!(watch.start_date(), Some(100));
    assert_eq!(watch.end_date(), Some(200));
    assert_eq!(watch.last_written_value(), Value::Number(2.0));
    assert_eq!(watch.last_written_time(), Some(200));
}

#[tokio::test]
async fn notifies_every_registered_handler() {
    let watch = Watch::new("a/b");
    let count = Arc::new(AtomicUsize::new(0));
    watch
        .add_handler(Arc::new(CountingHandler(count.clone())))
        .await;
    watch
        .add_handler(Arc::new(CountingHandler(count.clone())))
        .await;
    watch.notify_handlers(&Value::Number(1.0), 100).await;
    assert_eq!(count.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn removed_handler_is_not_notified() {
    let watch = Watch::new("a/b");
    let count = Arc::new(AtomicUsize::new(0));
    let token = watch
        .add_handler(Arc::new(CountingHandler(count.clone())))
        .await;
    watch.remove_handler(token).await;
    watch.notify_handlers(&Value::Number(1.0), 100).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn a_panicking_handler_does_not_block_its_siblings() {
    let watch = Watch::new("a/b");
    let count = Arc::new(AtomicUsize::new(0));
    watch.add_handler(Arc::new(PanickingHandler)).await;
    watch
        .add_handler(Arc::new(CountingHandler(count.clone())))
        .await;
    watch.notify_handlers(&Value::Number(1.0), 100).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);
}
