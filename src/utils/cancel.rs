use std::{
    sync::{Arc, Condvar, Mutex, PoisonError},
    time::{Duration, Instant},
};

/// Cooperative stop signal shared between a worker and whoever owns it.
///
/// Cancellation is only observed at the worker's own check points. Waiting on
/// the token (instead of sleeping) lets retry delays and frame timers end as
/// soon as the token is cancelled.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    inner: Arc<TokenShared>,
}

#[derive(Debug, Default)]
struct TokenShared {
    cancelled: Mutex<bool>,
    cv: Condvar,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        *cancelled = true;

        self.inner.cv.notify_all();
    }

    pub fn is_cancelled(&self) -> bool {
        *self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Blocks for at most `timeout`. Returns `true` if the token was (or
    /// became) cancelled.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut cancelled = self
            .inner
            .cancelled
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        while !*cancelled {
            let now = Instant::now();
            if now >= deadline {
                break;
            }

            let (guard, _) = self
                .inner
                .cv
                .wait_timeout(cancelled, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            cancelled = guard;
        }

        *cancelled
    }
}
