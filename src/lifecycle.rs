//! Process lifecycle: request-count recycling and shutdown signals.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rand::Rng;
use tokio::sync::Notify;

/// Counts handled conversions and fires once the limit is reached, so an
/// external supervisor can replace the process before leaks pile up.
pub struct RequestBudget {
    handled: AtomicU64,
    limit: u64,
    exhausted: Notify,
}

impl RequestBudget {
    /// `None` when recycling is disabled (`max_requests == 0`). The limit is
    /// spread by up to `jitter` so replicas don't restart together.
    pub fn new(max_requests: u64, jitter: u64) -> Option<Self> {
        if max_requests == 0 {
            return None;
        }
        let spread = if jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter)
        };
        Some(Self::with_limit(max_requests + spread))
    }

    pub fn with_limit(limit: u64) -> Self {
        RequestBudget {
            handled: AtomicU64::new(0),
            limit,
            exhausted: Notify::new(),
        }
    }

    pub fn limit(&self) -> u64 {
        self.limit
    }

    pub fn handled(&self) -> u64 {
        self.handled.load(Ordering::Relaxed)
    }

    /// Returns true for the request that used up the budget.
    pub fn record(&self) -> bool {
        let n = self.handled.fetch_add(1, Ordering::Relaxed) + 1;
        if n == self.limit {
            tracing::info!(handled = n, "request budget exhausted, recycling process");
            self.exhausted.notify_one();
            true
        } else {
            false
        }
    }

    pub async fn exhausted(&self) {
        self.exhausted.notified().await
    }
}

/// Resolves on Ctrl-C, SIGTERM, or an exhausted request budget.
pub async fn shutdown_signal(budget: Option<Arc<RequestBudget>>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl-C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    let recycled = async {
        match budget {
            Some(budget) => {
                budget.exhausted().await;
                budget.handled()
            }
            None => std::future::pending::<u64>().await,
        }
    };

    tokio::select! {
        _ = ctrl_c => tracing::info!("received Ctrl-C, shutting down"),
        _ = terminate => tracing::info!("received SIGTERM, shutting down"),
        handled = recycled => tracing::info!(handled, "shutting down for recycle"),
    }
}
