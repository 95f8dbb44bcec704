use crate::logger::approximate;

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

#[derive(Debug)]
struct Window {
    since: Instant,
    count_at_start: i64,
    last_rate: f64,
}

#[derive(Debug)]
struct Inner {
    label: String,
    tick_freq: Duration,
    started: Instant,
    counter: AtomicI64,
    window: Mutex<Window>,
    stop: CancellationToken,
}

/// Sliding-window throughput meter. `start` spawns a ticker that captures
/// the counter every window, recomputes the rate since the previous capture
/// and resets the window.
#[derive(Debug, Clone)]
pub struct RateTracker {
    inner: Arc<Inner>,
}

impl RateTracker {
    pub fn new<T: Into<String>>(label: T, tick_freq: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                label: label.into(),
                tick_freq,
                started: Instant::now(),
                counter: AtomicI64::new(0),
                window: Mutex::new(Window {
                    since: Instant::now(),
                    count_at_start: 0,
                    last_rate: 0.0,
                }),
                stop: CancellationToken::new(),
            }),
        }
    }

    pub fn start(&self) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(inner.tick_freq);
            // The first tick fires immediately; skip it so the opening
            // window spans a full period.
            ticker.tick().await;

            loop {
                tokio::select! {
                    _ = inner.stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let current = inner.counter.load(Ordering::SeqCst);
                        let mut window = inner.window.lock().unwrap_or_else(|err| err.into_inner());

                        let elapsed = window.since.elapsed().as_secs_f64();
                        if elapsed > 0.0 {
                            window.last_rate = (current - window.count_at_start) as f64 / elapsed;
                        }

                        window.since = Instant::now();
                        window.count_at_start = current;
                    }
                }
            }
        });
    }

    pub fn stop(&self) {
        self.inner.stop.cancel();
    }

    pub fn increment(&self, by: i64) {
        self.inner.counter.fetch_add(by, Ordering::SeqCst);
    }

    pub fn count(&self) -> i64 {
        self.inner.counter.load(Ordering::SeqCst)
    }

    pub fn approximate_count(&self) -> String {
        approximate(self.count())
    }

    /// The rate from the last completed window, e.g. "213 WCUs/s".
    pub fn rate_per_second(&self) -> String {
        let window = self
            .inner
            .window
            .lock()
            .unwrap_or_else(|err| err.into_inner());
        format!("{:.0} {}/s", window.last_rate, self.inner.label)
    }

    /// Time since the tracker was created, rounded to whole seconds.
    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.inner.started.elapsed().as_secs())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(flavor = "multi_thread")]
    async fn it_reports_the_rate_of_the_last_window() {
        let tracker = RateTracker::new("items", Duration::from_secs(1));
        tracker.start();

        tracker.increment(100);
        tokio::time::sleep(Duration::from_millis(1_250)).await;

        let report = tracker.rate_per_second();
        let rate: f64 = report
            .split_whitespace()
            .next()
            .and_then(|value| value.parse().ok())
            .unwrap_or_default();
        assert!(
            (90.0..=110.0).contains(&rate),
            "rate {rate} out of range in {report:?}"
        );

        tracker.stop();
    }

    #[tokio::test]
    async fn it_counts_increments() {
        let tracker = RateTracker::new("items", Duration::from_secs(9));
        tracker.increment(3);
        tracker.increment(4);
        assert_eq!(tracker.count(), 7);
        assert_eq!(tracker.approximate_count(), "7");
    }

    #[tokio::test]
    async fn it_formats_the_rate_with_its_label() {
        let tracker = RateTracker::new("WCUs", Duration::from_secs(9));
        assert_eq!(tracker.rate_per_second(), "0 WCUs/s");
    }
}
