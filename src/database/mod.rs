pub mod fjall;
pub mod memory;

use async_trait::async_trait;

use crate::error::Error;
use crate::value::Value;

/// The persistence backend a `WatchGroup` writes to. `Null` values are never
/// written — they mark "no value yet", not a row.
#[async_trait]
pub trait Database: Send + Sync {
    async fn write(&self, path: &str, value: Value, time_millis: i64) -> Result<(), Error>;

    /// Streams rows for `path` with `from_millis <= time <= to_millis`, time
    /// ascending, to `row_handler`.
    async fn query(
        &self,
        path: &str,
        from_millis: i64,
        to_millis: i64,
        row_handler: &mut (dyn FnMut(Value, i64) + Send),
    ) -> Result<(), Error>;
}
