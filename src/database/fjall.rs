use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle};

use super::Database;
use crate::error::Error;
use crate::thread_pool::ThreadPool;
use crate::value::Value;

/// Row key layout: `path` bytes, a `0xFF` separator (`/` and `.` are escaped
/// out of paths, so this byte can never occur in `path`), the timestamp as
/// big-endian so lexicographic order is time order, then a scru128 id to
/// keep same-millisecond writes distinct and ordered by arrival.
fn row_key(path: &str, time_millis: i64, id: &scru128::Scru128Id) -> Vec<u8> {
    let mut key = Vec::with_capacity(path.len() + 1 + 8 + 16);
    key.extend_from_slice(path.as_bytes());
    key.push(0xFF);
    key.extend_from_slice(&(time_millis as u64).to_be_bytes());
    key.extend_from_slice(&id.as_bytes()[..]);
    key
}

fn range_bounds(path: &str, from_millis: i64, to_millis: i64) -> (Vec<u8>, Vec<u8>) {
    let mut lower = Vec::with_capacity(path.len() + 1 + 8);
    lower.extend_from_slice(path.as_bytes());
    lower.push(0xFF);
    lower.extend_from_slice(&(from_millis as u64).to_be_bytes());

    let mut upper = Vec::with_capacity(path.len() + 1 + 8 + 16);
    upper.extend_from_slice(path.as_bytes());
    upper.push(0xFF);
    upper.extend_from_slice(&(to_millis as u64).to_be_bytes());
    upper.extend_from_slice(&[0xFF; 16]);

    (lower, upper)
}

/// The reference durable `Database`: one fjall keyspace/partition per
/// provider, with writes and range scans pushed to the shared `ThreadPool`
/// since fjall's API is synchronous disk I/O.
pub struct FjallDatabase {
    rows: PartitionHandle,
    pool: Arc<ThreadPool>,
}

impl FjallDatabase {
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, Error> {
        let config = Config::new(dir.into().join("fjall"));
        let keyspace: Keyspace = config.open()?;
        let rows = keyspace.open_partition("historian_rows", PartitionCreateOptions::default())?;
        Ok(Self {
            rows,
            pool: Arc::new(ThreadPool::new(2)),
        })
    }
}

#[async_trait]
impl Database for FjallDatabase {
    async fn write(&self, path: &str, value: Value, time_millis: i64) -> Result<(), Error> {
        if value.is_null() {
            return Ok(());
        }

        let (tx, rx) = tokio::sync::oneshot::channel();
        let rows = self.rows.clone();
        let path = path.to_string();

        self.pool.execute(move || {
            let result = (|| -> Result<(), Error> {
                let id = scru128::new();
                let key = row_key(&path, time_millis, &id);
                let encoded = serde_json::to_vec(&value)?;
                rows.insert(key, encoded)?;
                Ok(())
            })();
            let _ = tx.send(result);
        });

        rx.await.map_err(|_| -> Error { "fjall worker thread dropped".into() })?
    }

    async fn query(
        &self,
        path: &str,
        from_millis: i64,
        to_millis: i64,
        row_handler: &mut (dyn FnMut(Value, i64) + Send),
    ) -> Result<(), Error> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let rows = self.rows.clone();
        let path_owned = path.to_string();

        self.pool.execute(move || {
            let result = (|| -> Result<Vec<(Value, i64)>, Error> {
                let (lower, upper) = range_bounds(&path_owned, from_millis, to_millis);
                let mut out = Vec::new();
                for record in rows.range(lower..=upper) {
                    let (key, value_bytes) = record?;
                    let sep = key
                        .iter()
                        .position(|b| *b == 0xFF)
                        .ok_or("malformed historian row key")?;
                    let time_bytes: [u8; 8] = key[sep + 1..sep + 9]
                        .try_into()
                        .map_err(|_| "malformed historian row key timestamp")?;
                    let time = u64::from_be_bytes(time_bytes) as i64;
                    let value: Value = serde_json::from_slice(&value_bytes)?;
                    out.push((value, time));
                }
                Ok(out)
            })();
            let _ = tx.send(result);
        });

        let rows = rx
            .await
            .map_err(|_| -> Error { "fjall worker thread dropped".into() })??;
        for (value, time) in rows {
            row_handler(value, time);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_query_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let db = FjallDatabase::open(dir.path()).unwrap();

        db.write("a/b", Value::Number(1.0), 100).await.unwrap();
        db.write("a/b", Value::Number(2.0), 200).await.unwrap();
        db.write("c/d", Value::Number(9.0), 150).await.unwrap();

        let mut rows = Vec::new();
        db.query("a/b", 0, 1000, &mut |v, t| rows.push((v, t)))
            .await
            .unwrap();

        assert_eq!(rows, vec![(Value::Number(1.0), 100), (Value::Number(2.0), 200)]);
    }

    #[tokio::test]
    async fn null_values_are_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let db = FjallDatabase::open(dir.path()).unwrap();
        db.write("a/b", Value::Null, 100).await.unwrap();

        let mut rows = Vec::new();
        db.query("a/b", 0, 1000, &mut |v, t| rows.push((v, t)))
            .await
            .unwrap();
        assert!(rows.is_empty());
    }
}
