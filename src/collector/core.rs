//! Single-flight polling coordinator
use std::sync::Arc;

use log::{debug, error, info};
use parking_lot::{Mutex, RwLock};
use tokio::sync::watch;

use super::state::{CollectorState, UsageReading};
use crate::error::CollectorError;
use crate::extract::UsageExtractor;
use crate::source::UsagePortal;

type Outcome = Result<UsageReading, CollectorError>;
type Flight = watch::Receiver<Option<Outcome>>;

/// Collector that caches the latest usage reading from a portal
///
/// Cloning yields another handle to the same collector. Each `refresh` runs
/// login, fetch and extract as one cycle; callers arriving while a cycle is
/// running wait for that cycle instead of starting their own.
pub struct UsageCollector<P: UsagePortal> {
    inner: Arc<Inner<P>>,
}

struct Inner<P: UsagePortal> {
    name: String,
    portal: P,
    extractor: UsageExtractor,
    state: RwLock<CollectorState>,
    flight: Mutex<Option<Flight>>,
}

impl<P: UsagePortal> Clone for UsageCollector<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: UsagePortal> UsageCollector<P> {
    /// Create a new collector
    pub fn new(name: impl Into<String>, portal: P, extractor: UsageExtractor) -> Self {
        Self {
            inner: Arc::new(Inner {
                name: name.into(),
                portal,
                extractor,
                state: RwLock::new(CollectorState::default()),
                flight: Mutex::new(None),
            }),
        }
    }

    /// Get the collector name
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Snapshot of the cached state; never touches the network
    pub fn current(&self) -> CollectorState {
        self.inner.state.read().clone()
    }

    /// Run a refresh cycle, or join the one already running
    pub async fn refresh(&self) -> Outcome {
        let mut flight = self.join_or_start();

        let outcome = flight
            .wait_for(Option::is_some)
            .await
            .map_err(|_| CollectorError::Interrupted)?;

        match &*outcome {
            Some(outcome) => outcome.clone(),
            None => Err(CollectorError::Interrupted),
        }
    }

    fn join_or_start(&self) -> Flight {
        let mut slot = self.inner.flight.lock();
        if let Some(flight) = slot.as_ref() {
            debug!("Joining in-flight refresh for {}", self.inner.name);
            return flight.clone();
        }

        let (tx, rx) = watch::channel(None);
        *slot = Some(rx.clone());
        self.inner.state.write().in_flight = true;

        let inner = Arc::clone(&self.inner);
        // The cycle owns its task so dropping the caller does not cancel it.
        tokio::spawn(async move {
            let guard = FlightGuard {
                inner: &inner,
                armed: true,
            };
            let outcome = guard.inner.run_cycle().await;
            guard.finish(&tx, outcome);
        });

        rx
    }
}

impl<P: UsagePortal> Inner<P> {
    async fn run_cycle(&self) -> Outcome {
        debug!("Starting refresh cycle for {} via {}", self.name, self.portal.name());

        let result = self.login_fetch_extract().await;

        let mut state = self.state.write();
        match result {
            Ok(value) => {
                let reading = UsageReading::new(value);
                state.record_success(reading.clone());
                drop(state);
                info!("Collected usage for {}: {} kWh", self.name, reading.value);
                Ok(reading)
            }
            Err(e) => {
                state.record_failure(e.clone());
                drop(state);
                error!("Refresh failed for {}: {}", self.name, e);
                Err(e)
            }
        }
    }

    async fn login_fetch_extract(&self) -> Result<f64, CollectorError> {
        let session = self.portal.login().await?;
        let document = self.portal.fetch_usage_page(&session).await?;
        drop(session);

        Ok(self.extractor.extract(&document)?)
    }
}

/// Clears the flight slot when a cycle ends, even if it panicked
struct FlightGuard<'a, P: UsagePortal> {
    inner: &'a Inner<P>,
    armed: bool,
}

impl<P: UsagePortal> FlightGuard<'_, P> {
    fn finish(mut self, tx: &watch::Sender<Option<Outcome>>, outcome: Outcome) {
        // Publish while holding the slot so no caller joins a finished flight.
        let mut slot = self.inner.flight.lock();
        *slot = None;
        let _ = tx.send(Some(outcome));
        self.armed = false;
    }
}

impl<P: UsagePortal> Drop for FlightGuard<'_, P> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let mut slot = self.inner.flight.lock();
        if slot.take().is_some() {
            let mut state = self.inner.state.write();
            state.in_flight = false;
            state.last_success = false;
            state.last_error = Some(CollectorError::Interrupted);
        }
    }
}
