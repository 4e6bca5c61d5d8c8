//! Exclusive access to the inference device.
//!
//! Jobs that run model inference hold this lock for their whole body so at
//! most one of them drives the GPU at a time. Acquisition order is whatever
//! the runtime gives; there is no fairness guarantee.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Mutex, OwnedMutexGuard};
use tracing::{debug, warn};

use feedlens_core::{defaults, TaskId};

/// Process-wide exclusive resource. Clones share the same lock.
#[derive(Debug, Clone, Default)]
pub struct ExclusiveResource {
    lock: Arc<Mutex<()>>,
}

/// Held while a job owns the resource. Released on drop, including
/// during unwinding.
#[derive(Debug)]
pub struct ExclusiveGuard {
    task_id: TaskId,
    acquired_at: Instant,
    _guard: OwnedMutexGuard<()>,
}

impl ExclusiveResource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait until the resource is free and take it.
    pub async fn acquire(&self, task_id: TaskId) -> ExclusiveGuard {
        let start = Instant::now();
        let guard = self.lock.clone().lock_owned().await;
        let wait_ms = start.elapsed().as_millis() as u64;

        if wait_ms > defaults::EXCLUSIVE_WAIT_WARN_MS {
            warn!(
                subsystem = "jobs",
                component = "exclusive",
                task_id = %task_id,
                wait_ms,
                "Long wait for inference device"
            );
        } else {
            debug!(
                subsystem = "jobs",
                component = "exclusive",
                task_id = %task_id,
                wait_ms,
                "Inference device acquired"
            );
        }

        ExclusiveGuard {
            task_id,
            acquired_at: Instant::now(),
            _guard: guard,
        }
    }

    /// Whether some job currently holds the resource.
    pub fn is_held(&self) -> bool {
        self.lock.try_lock().is_err()
    }
}

impl Drop for ExclusiveGuard {
    fn drop(&mut self) {
        debug!(
            subsystem = "jobs",
            component = "exclusive",
            task_id = %self.task_id,
            held_ms = self.acquired_at.elapsed().as_millis() as u64,
            "Inference device released"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[tokio::test]
    async fn test_guard_releases_on_drop() {
        let res = ExclusiveResource::new();
        let guard = res.acquire(TaskId(1)).await;
        assert!(res.is_held());
        drop(guard);
        assert!(!res.is_held());
    }

    #[tokio::test]
    async fn test_at_most_one_holder() {
        let res = ExclusiveResource::new();
        let inside = Arc::new(AtomicUsize::new(0));
        let peak = Arc::new(AtomicUsize::new(0));

        let tasks: Vec<_> = (0..6)
            .map(|i| {
                let res = res.clone();
                let inside = inside.clone();
                let peak = peak.clone();
                tokio::spawn(async move {
                    let _g = res.acquire(TaskId(i)).await;
                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(5)).await;
                    inside.fetch_sub(1, Ordering::SeqCst);
                })
            })
            .collect();
        for t in tasks {
            t.await.unwrap();
        }
        assert_eq!(peak.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_released_after_panic() {
        let res = ExclusiveResource::new();
        let res2 = res.clone();
        let joined = tokio::spawn(async move {
            let _g = res2.acquire(TaskId(1)).await;
            panic!("job blew up");
        })
        .await;
        assert!(joined.unwrap_err().is_panic());
        assert!(!res.is_held());
    }
}
