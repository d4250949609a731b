// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Per-call deadlines and cooperative cancellation.
//!
//! Every outbound operation carries a deadline; cancellation
//! tokens are observed at each suspension point rather than killing a task
//! outright, so an in-flight send always completes its current I/O step
//! cleanly.

use std::time::{Duration, Instant};

/// Absolute point in time by which an operation must complete.
#[derive(Debug, Clone, Copy)]
pub struct Deadline(Instant);

impl Deadline {
    pub fn after(timeout: Duration) -> Self {
        Self(Instant::now() + timeout)
    }

    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.0
    }
}

/// A minimal cooperative cancellation token: a single `Arc<AtomicBool>`
/// flag plus a `tokio::sync::Notify` so awaiting tasks wake promptly
/// instead of polling. Kept local to this crate (no `tokio-util` dependency)
/// since only this one primitive is needed.
mod tokio_util_lite {
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use tokio::sync::Notify;

    #[derive(Clone, Default)]
    pub struct CancellationToken {
        cancelled: Arc<AtomicBool>,
        notify: Arc<Notify>,
    }

    impl CancellationToken {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn cancel(&self) {
            self.cancelled.store(true, Ordering::SeqCst);
            self.notify.notify_waiters();
        }

        pub fn is_cancelled(&self) -> bool {
            self.cancelled.load(Ordering::SeqCst)
        }

        pub async fn cancelled(&self) {
            if self.is_cancelled() {
                return;
            }
            self.notify.notified().await;
        }
    }
}

pub use tokio_util_lite::CancellationToken;
