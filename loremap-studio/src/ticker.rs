//! Elapsed-time ticker driven by the progress flags.
//!
//! The ticker is a store subscriber: the first update that raises any
//! progress flag starts a periodic task, the first update that leaves every
//! flag down stops it. Nothing else starts or stops it.

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use loremap_core::{AppState, Store, Subscription, WeakStore};
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

type Slot = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Keeps `gen_timer` counting while a job is in flight.
#[derive(Debug)]
pub struct Ticker {
    subscription: Option<Subscription<AppState>>,
    running: Slot,
}

impl Ticker {
    /// Attach to `app`, ticking every `period` on the current tokio runtime.
    ///
    /// Outside a runtime the ticker is inert.
    #[must_use]
    pub fn attach(app: &Store<AppState>, period: Duration) -> Self {
        let running: Slot = Arc::new(Mutex::new(None));
        let Ok(runtime) = Handle::try_current() else {
            warn!("No tokio runtime, elapsed-time ticker disabled");
            return Self {
                subscription: None,
                running,
            };
        };

        let weak = app.downgrade();
        let slot = Arc::clone(&running);
        let subscription = app.subscribe(move |state| {
            let mut slot = slot.lock().unwrap_or_else(PoisonError::into_inner);
            if state.progress.any() {
                if slot.is_none() {
                    debug!("Ticker started");
                    *slot = Some(runtime.spawn(tick(weak.clone(), period)));
                }
            } else if let Some(task) = slot.take() {
                debug!(elapsed = state.gen_timer, "Ticker stopped");
                task.abort();
            }
        });

        Self {
            subscription: Some(subscription),
            running,
        }
    }

    /// Whether the periodic task is alive.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }
}

impl Drop for Ticker {
    fn drop(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            subscription.unsubscribe();
        }
        if let Some(task) = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            task.abort();
        }
    }
}

async fn tick(app: WeakStore<AppState>, period: Duration) {
    let step = period.as_secs_f64();
    let mut interval = tokio::time::interval(period);
    // The first tick fires immediately.
    interval.tick().await;
    loop {
        interval.tick().await;
        let Some(app) = app.upgrade() else {
            break;
        };
        app.update(|s| {
            if !s.progress.any() {
                return Arc::clone(s);
            }
            let mut next = AppState::clone(s);
            next.gen_timer += step;
            Arc::new(next)
        });
    }
}
