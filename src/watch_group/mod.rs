mod config;

pub use config::{GroupConfig, LoggingType};

use std::collections::VecDeque;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::database::Database;
use crate::error::{Error, InvalidPath};
use crate::pool::SubscriptionPool;
use crate::value::{changed, now_millis, SubscriptionUpdate, Value};
use crate::watch::{Watch, WatchHandle, WatchUpdate};

struct Scheduled {
    config: GroupConfig,
    buffer_flush_task: Option<JoinHandle<()>>,
    interval_sampling_task: Option<JoinHandle<()>>,
}

struct Inner<D: Database + 'static> {
    db: D,
    queue: StdMutex<VecDeque<WatchUpdate>>,
    watches: StdMutex<Vec<WatchHandle>>,
    state: AsyncMutex<Scheduled>,
}

/// The per-group ingestion engine: accepts updates from its Watches, applies
/// the group's logging policy, buffers and time-stamps them, and flushes
/// them to `db` under two coupled schedules (a buffer flush and an interval
/// sampler), with atomic live reconfiguration of its own policy.
///
/// Cloning a `WatchGroup` is cheap and shares the same underlying state
/// (`Arc`) — clones are handed to the spawned scheduler tasks.
pub struct WatchGroup<D: Database + 'static> {
    inner: Arc<Inner<D>>,
}

impl<D: Database + 'static> Clone for WatchGroup<D> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<D: Database + 'static> WatchGroup<D> {
    pub fn new(db: D, config: GroupConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                db,
                queue: StdMutex::new(VecDeque::new()),
                watches: StdMutex::new(Vec::new()),
                state: AsyncMutex::new(Scheduled {
                    config: config.clamped(),
                    buffer_flush_task: None,
                    interval_sampling_task: None,
                }),
            }),
        }
    }

    pub async fn config(&self) -> GroupConfig {
        self.inner.state.lock().await.config
    }

    pub fn watches(&self) -> Vec<WatchHandle> {
        self.inner.watches.lock().unwrap().clone()
    }

    pub fn queue_len(&self) -> usize {
        self.inner.queue.lock().unwrap().len()
    }

    /// Starts whichever schedulers the current config calls for. Call once
    /// after construction (a fresh group has nothing scheduled yet).
    pub async fn init_settings(&self) {
        let mut state = self.inner.state.lock().await;
        self.start_required(&mut state);
    }

    /// Atomically applies `new_config`: under one lock, cancels both
    /// schedulers, swaps the config, then restarts whichever the new config
    /// calls for. Observers never see a half-applied reconfiguration.
    pub async fn edit_settings(&self, new_config: GroupConfig) {
        let new_config = new_config.clamped();
        let mut state = self.inner.state.lock().await;
        Self::cancel(&mut state);
        state.config = new_config;
        self.start_required(&mut state);
    }

    /// Registers a new Watch for `raw_path` with both this group and `pool`.
    pub async fn add_watch_path(
        &self,
        pool: &SubscriptionPool,
        raw_path: &str,
    ) -> Result<WatchHandle, Error> {
        if raw_path.is_empty() {
            return Err(Box::new(InvalidPath(raw_path.to_string())));
        }
        let watch = Watch::new(raw_path);
        self.inner.watches.lock().unwrap().push(watch.clone());
        pool.subscribe(watch.clone()).await?;
        Ok(watch)
    }

    /// Detaches a single Watch from this group and from `pool`.
    pub async fn remove_watch(&self, pool: &SubscriptionPool, watch: &WatchHandle) -> Result<(), Error> {
        self.inner
            .watches
            .lock()
            .unwrap()
            .retain(|w| !Arc::ptr_eq(w, watch));
        pool.unsubscribe(watch).await
    }

    /// Tears the whole group down: every Watch is detached from `pool`, both
    /// schedulers are cancelled, and the queue is discarded.
    pub async fn delete(&self, pool: &SubscriptionPool) -> Result<(), Error> {
        let watches = self.watches();
        for watch in &watches {
            pool.unsubscribe(watch).await?;
        }
        self.inner.watches.lock().unwrap().clear();
        self.unsubscribe().await;
        Ok(())
    }

    /// Cancels both schedulers and discards any queued-but-unwritten rows.
    pub async fn unsubscribe(&self) {
        let mut state = self.inner.state.lock().await;
        Self::cancel(&mut state);
        self.inner.queue.lock().unwrap().clear();
    }

    /// Cancels the buffer-flush scheduler only, leaving any queued rows in
    /// place (a later `init_settings`/`edit_settings` can pick them back up).
    pub async fn close(&self) {
        let mut state = self.inner.state.lock().await;
        if let Some(handle) = state.buffer_flush_task.take() {
            handle.abort();
        }
    }

    /// The entry point a `Watch` calls on every inbound `SubscriptionUpdate`
    /// once it has decided this group may write on new data, i.e.
    /// `logging_type != Interval`. Never calls the database directly under
    /// `Interval` — see the `Interval` arm below.
    #[tracing::instrument(skip(self, watch, update), fields(path = %watch.path))]
    pub async fn write(&self, watch: &WatchHandle, update: SubscriptionUpdate) -> Result<(), Error> {
        let logging_type = self.inner.state.lock().await.config.logging_type;

        let should_write = match logging_type {
            LoggingType::AllData => true,
            LoggingType::PointChange => {
                let did_change = changed(&watch.last_value(), &update.value);
                watch.set_last_value(update.value.clone());
                did_change
            }
            LoggingType::Interval => {
                watch.set_last_watch_update(update);
                return Ok(());
            }
        };

        if !should_write {
            return Ok(());
        }

        let wu = WatchUpdate {
            watch: watch.clone(),
            update,
            interval_timestamp: None,
        };
        self.enqueue_or_flush(wu).await
    }

    /// Bus-delivery entry point: the host's dispatch loop calls this once
    /// per inbound `SubscriptionUpdate` for every group that might care
    /// about it. Finds this group's own enabled Watches at `update.path`
    /// (a group may hold none — the update simply isn't for it) and runs
    /// each through `write`, which is `Watch.onData`'s policy check: store
    /// for the next interval tick under `Interval`, else enqueue/write.
    /// Disabled Watches are skipped, matching `SubscriptionPool`'s own
    /// unsubscribe-on-disable behavior.
    pub async fn dispatch(&self, update: &SubscriptionUpdate) -> Result<(), Error> {
        let matches: Vec<WatchHandle> = self
            .inner
            .watches
            .lock()
            .unwrap()
            .iter()
            .filter(|w| w.path == update.path && w.enabled())
            .cloned()
            .collect();
        for watch in matches {
            self.write(&watch, update.clone()).await?;
        }
        Ok(())
    }

    /// `getHistory` action front end: delegates to `Database::query`,
    /// collecting the rows for `watch.path` between `from_millis` and
    /// `to_millis`. Lives on `WatchGroup` rather than `Watch` because a
    /// `Watch` never holds a reference back to its group's `Database`.
    pub async fn get_history(
        &self,
        watch: &WatchHandle,
        from_millis: i64,
        to_millis: i64,
    ) -> Result<Vec<(Value, i64)>, Error> {
        let mut rows = Vec::new();
        self.inner
            .db
            .query(&watch.path, from_millis, to_millis, &mut |v, t| {
                rows.push((v, t))
            })
            .await?;
        Ok(rows)
    }

    /// Same query, as a `Stream` rather than a collected `Vec` — the shape
    /// callers that hand rows off to a response stream (rather than
    /// buffering the whole range) want.
    pub async fn get_history_stream(
        &self,
        watch: &WatchHandle,
        from_millis: i64,
        to_millis: i64,
    ) -> Result<impl futures::Stream<Item = (Value, i64)>, Error> {
        let rows = self.get_history(watch, from_millis, to_millis).await?;
        Ok(futures::stream::iter(rows))
    }

    /// Queues `wu`, then — unless a buffer-flush scheduler is active and
    /// will pick it up on its own schedule — immediately drains and writes
    /// the whole queue. This single path implements both the direct-write
    /// bypass (drain the queue before any direct write) and the interval
    /// sampler's "enqueue, never write directly" contract: when there's no
    /// flush scheduler to defer to, enqueuing *is* the write.
    async fn enqueue_or_flush(&self, wu: WatchUpdate) -> Result<(), Error> {
        {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.push_back(wu);
        }

        let flush_active = {
            let state = self.inner.state.lock().await;
            state.buffer_flush_task.is_some()
        };

        if flush_active {
            return Ok(());
        }

        let drained: Vec<WatchUpdate> = {
            let mut queue = self.inner.queue.lock().unwrap();
            queue.drain(..).collect()
        };
        self.write_batch(drained).await
    }

    /// The buffer-flush scheduler's own tick: reads the queue size once,
    /// pops exactly that many entries (anything enqueued concurrently after
    /// the size was read waits for the next tick), and writes them.
    async fn buffer_flush_tick(&self) -> Result<(), Error> {
        let batch: Vec<WatchUpdate> = {
            let mut queue = self.inner.queue.lock().unwrap();
            let n = queue.len();
            (0..n).filter_map(|_| queue.pop_front()).collect()
        };
        if batch.is_empty() {
            return Ok(());
        }
        self.write_batch(batch).await
    }

    /// The interval sampler's own tick: for every enabled Watch with a
    /// non-null `last_watch_update`, enqueues a sample stamped with `now`.
    async fn interval_tick(&self, now: i64) -> Result<(), Error> {
        let watches = self.watches();
        for watch in watches {
            if !watch.enabled() {
                continue;
            }
            let Some(update) = watch.last_watch_update() else {
                continue;
            };
            let wu = WatchUpdate {
                watch,
                update,
                interval_timestamp: Some(now),
            };
            self.enqueue_or_flush(wu).await?;
        }
        Ok(())
    }

    /// Writes every entry of `batch` to the database in order, then calls
    /// `handle_last_written`/`notify_handlers` on the batch's own Watch only
    /// for the final entry: the "most recently observed" markers follow the
    /// tail of a flush, not every intermediate row.
    async fn write_batch(&self, batch: Vec<WatchUpdate>) -> Result<(), Error> {
        let logging_type = self.inner.state.lock().await.config.logging_type;
        let len = batch.len();
        for (i, wu) in batch.into_iter().enumerate() {
            if wu.update.value.is_null() {
                continue;
            }
            let time = match logging_type {
                LoggingType::Interval => wu.interval_timestamp.unwrap_or(wu.update.timestamp),
                _ => wu.update.timestamp,
            };
            self.inner.db.write(&wu.watch.path, wu.update.value.clone(), time).await?;
            if i + 1 == len {
                wu.watch.handle_last_written(wu.update.value.clone(), time);
                wu.watch.notify_handlers(&wu.update.value, time).await;
            }
        }
        Ok(())
    }

    fn cancel(state: &mut Scheduled) {
        if let Some(handle) = state.buffer_flush_task.take() {
            handle.abort();
        }
        if let Some(handle) = state.interval_sampling_task.take() {
            handle.abort();
        }
    }

    fn start_required(&self, state: &mut Scheduled) {
        if state.config.buffer_flush_seconds > 0 {
            let group = self.clone();
            let period = Duration::from_secs(state.config.buffer_flush_seconds as u64);
            state.buffer_flush_task = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(err) = group.buffer_flush_tick().await {
                        tracing::error!(?err, "buffer flush tick failed");
                    }
                }
            }));
        }

        if state.config.logging_type == LoggingType::Interval && state.config.interval_seconds > 0 {
            let group = self.clone();
            let period = Duration::from_secs(state.config.interval_seconds as u64);
            state.interval_sampling_task = Some(tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                ticker.tick().await;
                loop {
                    ticker.tick().await;
                    if let Err(err) = group.interval_tick(now_millis()).await {
                        tracing::error!(?err, "interval sampling tick failed");
                    }
                }
            }));
        }
    }
}
