//! Key-value persistence for login sessions, spread over a rotating pool of
//! hosted Redis databases.

pub mod errors;
pub mod memory;
pub mod metrics_defs;
pub mod pool;
pub mod sessions;
pub mod store;
pub mod upstash;

#[cfg(test)]
mod testutils;

pub use errors::{PoolError, StoreError};
pub use pool::{BackendPool, Rotation};
pub use sessions::SessionStore;
pub use store::KvStore;
