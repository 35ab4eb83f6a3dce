//! Connectivity monitor.
//!
//! The monitor owns the engine's view of whether the remote is reachable.
//! Raw signals come from outside (an injected `watch` channel, or the
//! [`ReachabilityProbe`]); the monitor only debounces them: repeated signals
//! with an unchanged value produce no transition, and every
//! unreachable→reachable transition runs each registered callback exactly
//! once.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

const TRANSITION_CHANNEL_CAPACITY: usize = 64;

/// A change in reachability.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    Reachable,
    Unreachable,
}

/// Handle for removing a registered callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CallbackId(u64);

type Callback = Arc<dyn Fn() + Send + Sync>;

/// Debounced reachability state with transition notifications.
pub struct ConnectivityMonitor {
    reachable: AtomicBool,
    transitions: broadcast::Sender<Transition>,
    callbacks: Mutex<Vec<(CallbackId, Callback)>>,
    next_callback: AtomicU64,
}

impl ConnectivityMonitor {
    pub fn new(initially_reachable: bool) -> Self {
        let (transitions, _) = broadcast::channel(TRANSITION_CHANNEL_CAPACITY);
        Self {
            reachable: AtomicBool::new(initially_reachable),
            transitions,
            callbacks: Mutex::new(Vec::new()),
            next_callback: AtomicU64::new(1),
        }
    }

    pub fn new_shared(initially_reachable: bool) -> Arc<Self> {
        Arc::new(Self::new(initially_reachable))
    }

    /// Current reachability.
    pub fn is_reachable(&self) -> bool {
        self.reachable.load(Ordering::SeqCst)
    }

    /// Stream of transitions. Only transitions after the call are delivered.
    pub fn subscribe(&self) -> broadcast::Receiver<Transition> {
        self.transitions.subscribe()
    }

    /// Register a callback run on every unreachable→reachable transition.
    ///
    /// Callbacks run on the task that delivered the signal and must not
    /// block; hand work off to a channel or a spawned task.
    pub fn on_reachable(&self, callback: impl Fn() + Send + Sync + 'static) -> CallbackId {
        let id = CallbackId(self.next_callback.fetch_add(1, Ordering::Relaxed));
        self.callbacks.lock().push((id, Arc::new(callback)));
        id
    }

    /// Unregister a callback. Returns whether it was registered.
    pub fn remove_callback(&self, id: CallbackId) -> bool {
        let mut callbacks = self.callbacks.lock();
        let before = callbacks.len();
        callbacks.retain(|(registered, _)| *registered != id);
        callbacks.len() != before
    }

    /// Feed a raw reachability signal. Returns the transition it caused, if
    /// any.
    pub fn report(&self, reachable: bool) -> Option<Transition> {
        // The swap decides which caller observes the change, so concurrent
        // duplicate signals yield a single transition.
        if self.reachable.swap(reachable, Ordering::SeqCst) == reachable {
            return None;
        }

        let transition = if reachable {
            Transition::Reachable
        } else {
            Transition::Unreachable
        };
        tracing::info!(?transition, "connectivity changed");

        // No subscribers is fine
        let _ = self.transitions.send(transition);

        if transition == Transition::Reachable {
            let callbacks: Vec<Callback> = self
                .callbacks
                .lock()
                .iter()
                .map(|(_, callback)| callback.clone())
                .collect();
            for callback in callbacks {
                callback();
            }
        }

        Some(transition)
    }

    /// Drive the monitor from an injected signal until the sender is dropped.
    pub fn attach(self: &Arc<Self>, mut signal: watch::Receiver<bool>) -> JoinHandle<()> {
        let monitor = Arc::clone(self);
        tokio::spawn(async move {
            let initial = *signal.borrow_and_update();
            monitor.report(initial);

            while signal.changed().await.is_ok() {
                let value = *signal.borrow_and_update();
                monitor.report(value);
            }
            tracing::debug!("connectivity signal closed");
        })
    }
}

impl std::fmt::Debug for ConnectivityMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectivityMonitor")
            .field("reachable", &self.is_reachable())
            .field("callbacks", &self.callbacks.lock().len())
            .finish()
    }
}

/// Polls the remote's health endpoint and publishes the result as a
/// reachability signal.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    client: reqwest::Client,
    health_url: String,
    interval: Duration,
}

impl ReachabilityProbe {
    pub fn new(
        health_url: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> crate::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| crate::Error::Config(format!("failed to build probe client: {e}")))?;
        Ok(Self {
            client,
            health_url: health_url.into(),
            interval,
        })
    }

    /// One probe: any 2xx response means reachable.
    pub async fn check(&self) -> bool {
        match self.client.get(&self.health_url).send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::trace!(error = %e, "health probe failed");
                false
            }
        }
    }

    /// Probe every interval until `shutdown` fires, publishing changes to
    /// `signal`.
    pub fn spawn(self, signal: watch::Sender<bool>, shutdown: CancellationToken) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = ticker.tick() => {
                        let reachable = self.check().await;
                        signal.send_if_modified(|current| {
                            if *current == reachable {
                                return false;
                            }
                            *current = reachable;
                            true
                        });
                    }
                }
            }
            tracing::debug!(url = %self.health_url, "reachability probe stopped");
        })
    }
}
