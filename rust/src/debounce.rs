use std::sync::Mutex;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Coalesces bursts of triggers into one callback that runs after `window`
/// of quiet. Each trigger aborts the pending callback and schedules its own.
///
/// Must be triggered from inside a tokio runtime.
pub struct Debouncer {
    window: Duration,
    pending: Mutex<Option<JoinHandle<()>>>,
}

impl Debouncer {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            pending: Mutex::new(None),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn trigger<F>(&self, task: F)
    where
        F: FnOnce() + Send + 'static,
    {
        let window = self.window;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(window).await;
            task();
        });

        let previous = match self.pending.lock() {
            Ok(mut pending) => pending.replace(handle),
            Err(poisoned) => poisoned.into_inner().replace(handle),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    pub fn cancel(&self) {
        let previous = match self.pending.lock() {
            Ok(mut pending) => pending.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    pub fn is_pending(&self) -> bool {
        match self.pending.lock() {
            Ok(pending) => pending.as_ref().is_some_and(|handle| !handle.is_finished()),
            Err(_) => false,
        }
    }
}

impl Drop for Debouncer {
    fn drop(&mut self) {
        self.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::Debouncer;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    fn counter_task(counter: &Arc<AtomicUsize>) -> impl FnOnce() + Send + 'static {
        let counter = counter.clone();
        move || {
            counter.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn burst_runs_once_after_quiet_window() {
        let debouncer = Debouncer::new(Duration::from_millis(150));
        let counter = Arc::new(AtomicUsize::new(0));

        debouncer.trigger(counter_task(&counter));
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.trigger(counter_task(&counter));
        tokio::time::sleep(Duration::from_millis(100)).await;
        debouncer.trigger(counter_task(&counter));
        assert_eq!(counter.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(counter.load(Ordering::SeqCst), 1);
        assert!(!debouncer.is_pending());
    }

    #[tokio::test(start_paused = true)]
    async fn separated_triggers_each_run() {
        let debouncer = Debouncer::new(Duration::from_millis(150));
        let counter = Arc::new(AtomicUsize::new(0));

        debouncer.trigger(counter_task(&counter));
        tokio::time::sleep(Duration::from_millis(200)).await;
        debouncer.trigger(counter_task(&counter));
        tokio::time::sleep(Duration::from_millis(200)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_drops_pending_callback() {
        let debouncer = Debouncer::new(Duration::from_millis(150));
        let counter = Arc::new(AtomicUsize::new(0));

        debouncer.trigger(counter_task(&counter));
        assert!(debouncer.is_pending());
        debouncer.cancel();
        tokio::time::sleep(Duration::from_millis(300)).await;

        assert_eq!(counter.load(Ordering::SeqCst), 0);
    }
}
