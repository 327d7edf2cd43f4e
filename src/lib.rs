pub mod bus;
pub mod database;
pub mod error;
pub mod path;
pub mod pool;
pub mod provider;
pub mod thread_pool;
pub mod trace;
pub mod value;
pub mod watch;
pub mod watch_group;

pub use bus::Bus;
pub use database::Database;
pub use error::Error;
pub use pool::SubscriptionPool;
pub use provider::DatabaseProvider;
pub use value::{SubscriptionUpdate, Value};
pub use watch::{Watch, WatchHandle};
pub use watch_group::{GroupConfig, LoggingType, WatchGroup};
