use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::debug;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TimerName {
    Refresh,
    Security,
}

impl TimerName {
    pub fn as_str(self) -> &'static str {
        match self {
            TimerName::Refresh => "refresh",
            TimerName::Security => "security",
        }
    }
}

/// Named periodic tasks. Starting a name that is already running replaces it.
#[derive(Default)]
pub struct Timers {
    running: Mutex<HashMap<TimerName, JoinHandle<()>>>,
}

impl Timers {
    /// First tick fires one `period` after the call.
    pub fn start<F, Fut>(&self, name: TimerName, period: Duration, mut tick: F)
    where
        F: FnMut() -> Fut + Send + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let handle = tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                tick().await;
            }
        });

        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = running.insert(name, handle) {
            previous.abort();
            debug!(event = "TIMER_REPLACED", timer = name.as_str(), "Previous timer cancelled");
        } else {
            debug!(event = "TIMER_STARTED", timer = name.as_str(), period_ms = period.as_millis() as u64, "Timer started");
        }
    }

    pub fn stop(&self, name: TimerName) -> bool {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        match running.remove(&name) {
            Some(handle) => {
                handle.abort();
                debug!(event = "TIMER_STOPPED", timer = name.as_str(), "Timer stopped");
                true
            }
            None => false,
        }
    }

    pub fn stop_all(&self) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        for (_, handle) in running.drain() {
            handle.abort();
        }
    }

    pub fn is_running(&self, name: TimerName) -> bool {
        let running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        running.get(&name).map(|h| !h.is_finished()).unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn ticks_after_each_period() {
        let timers = Timers::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        timers.start(TimerName::Refresh, Duration::from_secs(10), move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });

        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
        tokio::time::sleep(Duration::from_secs(21)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn restarting_cancels_previous_timer() {
        let timers = Timers::default();
        let hits = Arc::new(AtomicUsize::new(0));
        for _ in 0..3 {
            let h = hits.clone();
            timers.start(TimerName::Security, Duration::from_secs(30), move || {
                let h = h.clone();
                async move {
                    h.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
        tokio::time::sleep(Duration::from_secs(31)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn stop_prevents_further_ticks() {
        let timers = Timers::default();
        let hits = Arc::new(AtomicUsize::new(0));
        let h = hits.clone();
        timers.start(TimerName::Security, Duration::from_secs(1), move || {
            let h = h.clone();
            async move {
                h.fetch_add(1, Ordering::SeqCst);
            }
        });
        assert!(timers.is_running(TimerName::Security));
        assert!(timers.stop(TimerName::Security));
        assert!(!timers.stop(TimerName::Security));
        tokio::time::sleep(Duration::from_secs(5)).await;
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }
}
