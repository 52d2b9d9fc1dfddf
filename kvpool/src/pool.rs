//! Quota based rotation over an ordered list of storage backends.
//!
//! Hosted free tiers cap the number of commands per month. After each unit of
//! work the pool asks the current backend how many commands it has served and
//! moves on to the next backend once that count passes the threshold. The pool
//! wraps around at the end of the list.

use crate::errors::PoolError;
use crate::metrics_defs::{
    BACKEND_COMMANDS_PROCESSED, BACKEND_ROTATIONS, BACKEND_USAGE_CHECK_FAILED,
};
use crate::store::KvStore;
use shared::{counter, gauge};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

/// Rotate once a backend has served this many commands (of a 500,000 budget).
pub const DEFAULT_ROTATION_THRESHOLD: u64 = 450_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rotation {
    /// Usage is at or below the threshold.
    Stayed { index: usize, usage: u64 },
    /// Usage exceeded the threshold. `from == to` for a single-backend pool.
    Advanced { from: usize, to: usize, usage: u64 },
    /// Usage could not be read; the current backend is kept.
    Failed { index: usize },
    /// Another caller is already checking usage.
    Skipped { index: usize },
}

pub struct BackendPool {
    backends: Vec<Arc<dyn KvStore>>,
    current: AtomicUsize,
    threshold: u64,
    // Serializes the read-usage-then-advance step.
    rotation_lock: Mutex<()>,
}

impl BackendPool {
    pub fn new(backends: Vec<Arc<dyn KvStore>>, threshold: u64) -> Result<Self, PoolError> {
        if backends.is_empty() {
            return Err(PoolError::Empty);
        }

        Ok(BackendPool {
            backends,
            current: AtomicUsize::new(0),
            threshold,
            rotation_lock: Mutex::new(()),
        })
    }

    pub fn size(&self) -> usize {
        self.backends.len()
    }

    pub fn threshold(&self) -> u64 {
        self.threshold
    }

    pub fn current_index(&self) -> usize {
        self.current.load(Ordering::Acquire)
    }

    pub fn current(&self) -> Arc<dyn KvStore> {
        self.backends[self.current_index()].clone()
    }

    /// All backends, starting with the current one and wrapping around.
    pub fn lookup_order(&self) -> impl Iterator<Item = &Arc<dyn KvStore>> + '_ {
        let start = self.current_index();
        let size = self.size();
        (0..size).map(move |offset| &self.backends[(start + offset) % size])
    }

    /// Advances to the next backend if the current one is over its quota.
    ///
    /// Never fails: a backend whose usage cannot be read is kept and the
    /// problem is logged. Returns immediately with [`Rotation::Skipped`] when
    /// a check is already in flight, so a slow usage query only holds up the
    /// caller that issued it.
    pub async fn maybe_rotate(&self) -> Rotation {
        let Ok(_guard) = self.rotation_lock.try_lock() else {
            return Rotation::Skipped {
                index: self.current_index(),
            };
        };

        let index = self.current_index();
        let backend = &self.backends[index];

        let usage = match backend.commands_processed().await {
            Ok(usage) => usage,
            Err(err) => {
                tracing::error!(
                    backend = backend.name(),
                    error = %err,
                    "Error checking backend usage for rotation"
                );
                counter!(BACKEND_USAGE_CHECK_FAILED).increment(1);
                return Rotation::Failed { index };
            }
        };

        gauge!(BACKEND_COMMANDS_PROCESSED).set(usage as f64);

        if usage <= self.threshold {
            return Rotation::Stayed { index, usage };
        }

        let to = (index + 1) % self.size();
        self.current.store(to, Ordering::Release);
        counter!(BACKEND_ROTATIONS).increment(1);

        tracing::info!(
            from = backend.name(),
            to = self.backends[to].name(),
            usage,
            "Rotated to storage backend {}",
            to + 1
        );

        Rotation::Advanced {
            from: index,
            to,
            usage,
        }
    }
}
