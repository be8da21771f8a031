//! The rate governor: a single long-lived actor tracking the remote API's
//! quota, gating every outbound call through [`RateGovernor::wait`]
//! (`spec.md` §4.2).

use gcse_core::Error;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// A snapshot of remote quota, as returned by a [`QuotaProbe`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quota {
    /// Calls remaining in the current window.
    pub remaining: u64,
    /// Size of the window.
    pub limit: u64,
}

impl Quota {
    /// Fraction of quota remaining, in `[0.0, 1.0]`. A zero limit reads as
    /// fully exhausted rather than dividing by zero.
    #[must_use]
    pub fn pct(self) -> f64 {
        if self.limit == 0 {
            0.0
        } else {
            self.remaining as f64 / self.limit as f64
        }
    }
}

/// How a [`RateGovernor`] learns the current quota. Implemented by the
/// remote adapter that owns the actual HTTP client; kept as a trait here so
/// `gcse-ratelimit` has no dependency on `gcse-remote` (the dependency runs
/// the other way: the adapter calls into the governor).
#[async_trait::async_trait]
pub trait QuotaProbe: Send + Sync + 'static {
    /// Fetch the current quota from the remote. Transient failures should
    /// be returned as `Err` and are logged and retried by the governor on
    /// its next loop iteration; they are never surfaced to `wait()` callers
    /// (`spec.md` §4.2).
    async fn probe(&self) -> Result<Quota, Error>;
}

const PROBE_PERIOD: Duration = Duration::from_secs(30);
const RECOVERY_SLEEP: Duration = Duration::from_secs(30);
const FLOOR: f64 = 0.1;
const UNAUTHENTICATED_INTERVAL: Duration = Duration::from_secs(1);

struct State {
    last_probe: Option<Instant>,
    last_pct: f64,
}

struct Inner<P> {
    probe: Option<P>,
    state: Mutex<State>,
}

/// A cheaply-clonable handle to the rate governor actor. Every clone shares
/// the same probe state; there is no static global (`spec.md` §9).
pub struct RateGovernor<P> {
    inner: Arc<Inner<P>>,
}

impl<P> Clone for RateGovernor<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: QuotaProbe> RateGovernor<P> {
    /// Build a governor against an authenticated quota source.
    #[must_use]
    pub fn new(probe: P) -> Self {
        Self::with_probe(Some(probe))
    }

    /// Build a governor with no quota source: every `wait()` sleeps
    /// [`UNAUTHENTICATED_INTERVAL`] (`spec.md` §4.2 rule 1).
    #[must_use]
    pub fn unauthenticated() -> Self {
        Self::with_probe(None)
    }

    fn with_probe(probe: Option<P>) -> Self {
        Self {
            inner: Arc::new(Inner {
                probe,
                state: Mutex::new(State {
                    last_probe: None,
                    last_pct: 1.0,
                }),
            }),
        }
    }

    /// Block until the quota budget allows another remote call, per
    /// `spec.md` §4.2's five-step algorithm. Returns `Err(Error::Cancelled)`
    /// promptly if `cancel` fires while sleeping, without completing the
    /// remaining sleep.
    pub async fn wait(&self, cancel: &CancellationToken) -> Result<(), Error> {
        let Some(probe) = &self.inner.probe else {
            return sleep_cancellable(UNAUTHENTICATED_INTERVAL, cancel).await;
        };

        let mut state = self.inner.state.lock().await;

        if let Some(last) = state.last_probe {
            if last.elapsed() < PROBE_PERIOD {
                return Ok(());
            }
        }

        let mut old_pct = match probe.probe().await {
            Ok(q) => q.pct(),
            Err(err) => {
                warn!(error = %err, "quota probe failed, retrying next loop");
                return Ok(());
            }
        };

        if old_pct >= FLOOR {
            state.last_probe = Some(Instant::now());
            state.last_pct = old_pct;
            return Ok(());
        }

        loop {
            sleep_cancellable(RECOVERY_SLEEP, cancel).await?;

            let new_pct = match probe.probe().await {
                Ok(q) => q.pct(),
                Err(err) => {
                    warn!(error = %err, "quota probe failed during recovery, retrying");
                    continue;
                }
            };

            if old_pct > 0.0 && new_pct / old_pct > 2.0 {
                state.last_probe = Some(Instant::now());
                state.last_pct = new_pct;
                return Ok(());
            }
            old_pct = new_pct;
        }
    }
}

async fn sleep_cancellable(d: Duration, cancel: &CancellationToken) -> Result<(), Error> {
    tokio::select! {
        () = tokio::time::sleep(d) => Ok(()),
        () = cancel.cancelled() => Err(Error::Cancelled),
    }
}
