use log::{debug, info, warn};
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};

use crate::collector::UsageCollector;
use crate::source::UsagePortal;

/// Default polling interval (one hour)
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(3600);

/// Shortest interval the poller accepts
pub const MIN_SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Interval driver that calls `refresh` on a collector
pub struct Poller {
    stop_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl Poller {
    /// Start polling on every `interval` tick
    ///
    /// The immediate first tick is skipped; the owner is expected to have
    /// run the initial refresh before handing the collector over. Intervals
    /// below [`MIN_SCAN_INTERVAL`] are raised to it.
    pub fn spawn<P: UsagePortal>(collector: UsageCollector<P>, interval: Duration) -> Self {
        let interval = if interval < MIN_SCAN_INTERVAL {
            warn!(
                "Polling interval {:?} for {} is too short, using {:?}",
                interval,
                collector.name(),
                MIN_SCAN_INTERVAL
            );
            MIN_SCAN_INTERVAL
        } else {
            interval
        };
        let (stop_tx, mut stop_rx) = watch::channel(false);

        let handle = tokio::spawn(async move {
            let mut ticker = time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            ticker.tick().await;

            info!(
                "Polling {} every {}s",
                collector.name(),
                interval.as_secs()
            );

            loop {
                tokio::select! {
                    _ = ticker.tick() => {
                        match collector.refresh().await {
                            Ok(reading) => debug!("Scheduled refresh of {} read {}", collector.name(), reading.value),
                            Err(e) => warn!("Scheduled refresh of {} failed, retrying next tick: {}", collector.name(), e),
                        }
                    }
                    _ = stop_rx.changed() => break,
                }
            }

            info!("Stopped polling {}", collector.name());
        });

        Self { stop_tx, handle }
    }

    /// Stop the loop and wait for it to exit
    pub async fn stop(self) {
        let _ = self.stop_tx.send(true);
        if let Err(e) = self.handle.await {
            warn!("Poller task ended abnormally: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::{UsageExtractor, DEFAULT_USAGE_SELECTOR};
    use crate::testing::{ScriptedPortal, Step};

    fn collector(portal: ScriptedPortal) -> UsageCollector<ScriptedPortal> {
        let extractor = UsageExtractor::new(DEFAULT_USAGE_SELECTOR).unwrap();
        UsageCollector::new("poller-test", portal, extractor)
    }

    #[tokio::test(start_paused = true)]
    async fn test_refreshes_once_per_tick() {
        let portal = ScriptedPortal::new(vec![
            Step::usage("1.0"),
            Step::usage("2.0"),
            Step::usage("3.0"),
        ]);
        let collector = collector(portal.clone());
        let interval = Duration::from_secs(3600);

        let poller = Poller::spawn(collector.clone(), interval);

        // The first tick is skipped.
        time::sleep(Duration::from_secs(1)).await;
        assert_eq!(portal.logins(), 0);

        time::sleep(interval * 3).await;
        assert_eq!(portal.logins(), 3);
        assert_eq!(collector.current().value(), Some(3.0));

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_failures_do_not_stop_polling() {
        let portal = ScriptedPortal::new(vec![
            Step::login_status(500),
            Step::page("<html></html>"),
            Step::usage("4.5"),
        ]);
        let collector = collector(portal.clone());
        let interval = Duration::from_secs(60);

        let poller = Poller::spawn(collector.clone(), interval);
        time::sleep(interval * 3 + Duration::from_secs(1)).await;

        assert_eq!(portal.logins(), 3);
        assert!(collector.current().last_success);
        assert_eq!(collector.current().value(), Some(4.5));

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_clamped() {
        let portal = ScriptedPortal::new(vec![Step::usage("1.0"), Step::usage("2.0")]);
        let collector = collector(portal.clone());

        let poller = Poller::spawn(collector.clone(), Duration::ZERO);
        time::sleep(MIN_SCAN_INTERVAL * 2 + Duration::from_millis(500)).await;

        assert_eq!(portal.logins(), 2);
        assert_eq!(collector.current().value(), Some(2.0));

        poller.stop().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_polling() {
        let portal = ScriptedPortal::new(vec![Step::usage("1.0")]);
        let collector = collector(portal.clone());
        let interval = Duration::from_secs(60);

        let poller = Poller::spawn(collector, interval);
        poller.stop().await;

        time::sleep(interval * 5).await;
        assert_eq!(portal.logins(), 0);
    }
}
