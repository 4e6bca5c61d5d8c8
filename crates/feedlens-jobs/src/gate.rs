//! Crawl gate.
//!
//! Crawl jobs hold a pass from submission until they finish. Per-app sentiment
//! jobs wait for the gate to be idle so they score a complete snapshot.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::sync::Notify;
use tracing::debug;

#[derive(Debug, Default)]
struct Inner {
    active: AtomicUsize,
    idle: Notify,
}

/// Counts in-progress crawls. Clones share state.
#[derive(Debug, Clone, Default)]
pub struct CrawlGate {
    inner: Arc<Inner>,
}

/// Held by a running crawl.
#[derive(Debug)]
pub struct CrawlPass {
    inner: Arc<Inner>,
}

impl CrawlGate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enter(&self) -> CrawlPass {
        let active = self.inner.active.fetch_add(1, Ordering::SeqCst) + 1;
        debug!(subsystem = "jobs", component = "crawl_gate", active, "Crawl entered");
        CrawlPass {
            inner: self.inner.clone(),
        }
    }

    pub fn active(&self) -> usize {
        self.inner.active.load(Ordering::SeqCst)
    }

    /// Resolve once no crawl is running.
    pub async fn wait_idle(&self) {
        loop {
            let notified = self.inner.idle.notified();
            if self.active() == 0 {
                return;
            }
            notified.await;
        }
    }
}

impl Drop for CrawlPass {
    fn drop(&mut self) {
        if self.inner.active.fetch_sub(1, Ordering::SeqCst) == 1 {
            self.inner.idle.notify_waiters();
        }
    }
}
