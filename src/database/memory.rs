use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use super::Database;
use crate::error::Error;
use crate::value::Value;

/// An in-process `Database` backed by a `BTreeMap`, used by tests and by
/// callers that don't need durability.
#[derive(Default)]
pub struct InMemoryDatabase {
    rows: Mutex<BTreeMap<(String, i64, u64), Value>>,
    seq: AtomicU64,
}

impl InMemoryDatabase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Database for InMemoryDatabase {
    async fn write(&self, path: &str, value: Value, time_millis: i64) -> Result<(), Error> {
        if value.is_null() {
            return Ok(());
        }
        let seq = self.seq.fetch_add(1, Ordering::SeqCst);
        self.rows
            .lock()
            .unwrap()
            .insert((path.to_string(), time_millis, seq), value);
        Ok(())
    }

    async fn query(
        &self,
        path: &str,
        from_millis: i64,
        to_millis: i64,
        row_handler: &mut (dyn FnMut(Value, i64) + Send),
    ) -> Result<(), Error> {
        let rows = self.rows.lock().unwrap();
        let lower = (path.to_string(), from_millis, 0u64);
        let upper = (path.to_string(), to_millis, u64::MAX);
        for ((p, t, _), v) in rows.range(lower..=upper) {
            if p == path {
                row_handler(v.clone(), *t);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_query_returns_rows_time_ascending() {
        let db = InMemoryDatabase::new();
        db.write("a/b", Value::Number(3.0), 300).await.unwrap();
        db.write("a/b", Value::Number(1.0), 100).await.unwrap();
        db.write("a/b", Value::Number(2.0), 200).await.unwrap();

        let mut rows = Vec::new();
        db.query("a/b", 0, 1000, &mut |v, t| rows.push((v, t)))
            .await
            .unwrap();

        assert_eq!(
            rows,
            vec![
                (Value::Number(1.0), 100),
                (Value::Number(2.0), 200),
                (Value::Number(3.0), 300),
            ]
        );
    }

    #[tokio::test]
    async fn null_values_are_never_written() {
        let db = InMemoryDatabase::new();
        db.write("a/b", Value::Null, 100).await.unwrap();
        assert!(db.is_empty());
    }

    #[tokio::test]
    async fn query_is_scoped_to_its_path() {
        let db = InMemoryDatabase::new();
        db.write("a/b", Value::Number(1.0), 100).await.unwrap();
        db.write("c/d", Value::Number(2.0), 100).await.unwrap();

        let mut rows = Vec::new();
        db.query("a/b", 0, 1000, &mut |v, t| rows.push((v, t)))
            .await
            .unwrap();
        assert_eq!(rows, vec![(Value::Number(1.0), 100)]);
    }

    #[tokio::test]
    async fn query_range_excludes_rows_outside_the_window() {
        let db = InMemoryDatabase::new();
        db.write("a/b", Value::Number(1.0), 100).await.unwrap();
        db.write("a/b", Value::Number(2.0), 500).await.unwrap();

        let mut rows = Vec::new();
        db.query("a/b", 0, 200, &mut |v, t| rows.push((v, t)))
            .await
            .unwrap();
        assert_eq!(rows, vec![(Value::Number(1.0), 100)]);
    }
}
