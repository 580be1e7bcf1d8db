//! Retry, backoff and rate-limit handling for every outbound call.
//!
//! Each call's result is classified into a [`CallOutcome`], and
//! [`RetryPolicy::decide`] turns a failed outcome into a [`Decision`]. The
//! [`Governor`] runs that loop: sleeping through backoffs and short
//! rate-limit windows and handing everything else back to the caller as an
//! [`Escalation`].

use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::{Duration, Instant};

use coverset_lib::CrawlSettings;

use crate::crawl::CrawlEvent;
use crate::error::{CatalogError, CrawlError, FailureClass, Interrupt};

/// Shortest rate-limit pause; a zero `Retry-After` would otherwise spin.
const MIN_RATE_LIMIT_WAIT: Duration = Duration::from_secs(1);

/// Rate-limit pauses a single call may take before the run stops.
const MAX_RATE_LIMIT_WAITS: u32 = 10;

/// Which budget a call draws from. Only catalog calls are paced; cover
/// downloads go to a CDN.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallKind {
    Catalog,
    Asset,
}

/// A call's result after classification.
#[derive(Debug)]
pub enum CallOutcome<T> {
    Success(T),
    RateLimited(Duration),
    TransientNetworkError(String),
    PermanentError(String),
    Fatal(String),
}

impl<T> CallOutcome<T> {
    pub fn classify(result: Result<T, CatalogError>) -> Self {
        match result {
            Ok(value) => CallOutcome::Success(value),
            Err(e) => match e.class() {
                FailureClass::RateLimited(after) => CallOutcome::RateLimited(after),
                FailureClass::Transient => CallOutcome::TransientNetworkError(e.to_string()),
                FailureClass::Permanent => CallOutcome::PermanentError(e.to_string()),
                FailureClass::Fatal => CallOutcome::Fatal(e.to_string()),
            },
        }
    }
}

/// What to do about a failed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Sleep, then reissue the same call.
    Retry(Duration),
    /// Suspend for the service-requested window, then reissue the same call.
    WaitOut(Duration),
    /// Give up on the entity this call was for.
    Skip(String),
    /// The requested window is too long: checkpoint and end the run.
    Stop(Duration),
    /// End the run with an error.
    Abort(String),
}

/// A failure the governor could not absorb.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Escalation {
    Skip(String),
    Stop(Duration),
    Abort(String),
}

impl Escalation {
    /// The skip reason, or the interrupt that must end the current unit.
    pub fn skip_reason(self) -> Result<String, Interrupt> {
        match self {
            Escalation::Skip(reason) => Ok(reason),
            Escalation::Stop(after) => Err(Interrupt::RateLimitStop(after)),
            Escalation::Abort(reason) => Err(Interrupt::Abort(CrawlError::Fatal(reason))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Attempts per call before a transient failure is treated as permanent.
    pub max_attempts: u32,
    pub backoff_base: Duration,
    pub backoff_max: Duration,
    /// Longest rate-limit window the run will sleep through.
    pub max_rate_limit_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_settings(&CrawlSettings::default())
    }
}

impl RetryPolicy {
    pub fn from_settings(settings: &CrawlSettings) -> Self {
        Self {
            max_attempts: settings.max_attempts.max(1),
            backoff_base: Duration::from_millis(settings.backoff_base_ms),
            backoff_max: Duration::from_millis(settings.backoff_max_ms),
            max_rate_limit_wait: Duration::from_secs(settings.max_rate_limit_wait_secs),
        }
    }

    /// Delay before the retry that follows failed attempt number `attempt`
    /// (1-based): `base * 2^(attempt-1)`, capped at `backoff_max`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(20);
        self.backoff_base
            .saturating_mul(1u32 << exponent)
            .min(self.backoff_max)
    }

    /// Map an outcome of attempt number `attempt` to its value or a decision.
    pub fn decide<T>(&self, outcome: CallOutcome<T>, attempt: u32) -> Result<T, Decision> {
        match outcome {
            CallOutcome::Success(value) => Ok(value),
            CallOutcome::RateLimited(after) if after <= self.max_rate_limit_wait => {
                Err(Decision::WaitOut(after))
            }
            CallOutcome::RateLimited(after) => Err(Decision::Stop(after)),
            CallOutcome::TransientNetworkError(_) if attempt < self.max_attempts => {
                Err(Decision::Retry(self.backoff(attempt)))
            }
            CallOutcome::TransientNetworkError(reason) => Err(Decision::Skip(format!(
                "gave up after {} attempts: {}",
                attempt, reason
            ))),
            CallOutcome::PermanentError(reason) => Err(Decision::Skip(reason)),
            CallOutcome::Fatal(reason) => Err(Decision::Abort(reason)),
        }
    }
}

/// Counters for the calls a governor has made.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GovernorStats {
    pub calls: u64,
    pub retries: u64,
    pub rate_limit_waits: u64,
}

pub struct Governor {
    policy: RetryPolicy,
    min_interval: Duration,
    last_catalog_call: Option<Instant>,
    events: Option<mpsc::UnboundedSender<CrawlEvent>>,
    stats: GovernorStats,
}

impl Governor {
    pub fn new(policy: RetryPolicy, min_interval: Duration) -> Self {
        Self {
            policy,
            min_interval,
            last_catalog_call: None,
            events: None,
            stats: GovernorStats::default(),
        }
    }

    pub fn from_settings(settings: &CrawlSettings) -> Self {
        Self::new(
            RetryPolicy::from_settings(settings),
            Duration::from_millis(settings.min_request_interval_ms),
        )
    }

    /// Report retries and rate-limit pauses on `events`.
    pub fn with_events(mut self, events: mpsc::UnboundedSender<CrawlEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn stats(&self) -> GovernorStats {
        self.stats
    }

    /// Run `op` until it succeeds or fails in a way the governor cannot
    /// absorb. `label` names the call in logs.
    ///
    /// Rate-limit waits do not use up attempts. They share a budget of
    /// `max_rate_limit_wait` in total and [`MAX_RATE_LIMIT_WAITS`] in number;
    /// past either the call escalates to [`Escalation::Stop`].
    pub async fn call<T, F, Fut>(
        &mut self,
        kind: CallKind,
        label: &str,
        mut op: F,
    ) -> Result<T, Escalation>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, CatalogError>>,
    {
        let mut attempt = 0u32;
        let mut waits = 0u32;
        let mut waited = Duration::ZERO;
        loop {
            if kind == CallKind::Catalog {
                self.pace().await;
            }
            attempt += 1;
            self.stats.calls += 1;

            let outcome = CallOutcome::classify(op().await);
            let decision = match self.policy.decide(outcome, attempt) {
                Ok(value) => return Ok(value),
                Err(decision) => decision,
            };

            match decision {
                Decision::Retry(delay) => {
                    log::debug!(
                        "{}: transient failure on attempt {}, retrying in {}ms",
                        label,
                        attempt,
                        delay.as_millis()
                    );
                    self.stats.retries += 1;
                    self.emit(CrawlEvent::Retrying {
                        label: label.to_string(),
                        attempt,
                        delay,
                    });
                    tokio::time::sleep(delay).await;
                }
                Decision::WaitOut(after) => {
                    let after = after.max(MIN_RATE_LIMIT_WAIT);
                    waits += 1;
                    waited += after;
                    if waited > self.policy.max_rate_limit_wait || waits > MAX_RATE_LIMIT_WAITS {
                        log::warn!(
                            "{}: still rate limited after {} pauses ({}s)",
                            label,
                            waits - 1,
                            (waited - after).as_secs()
                        );
                        return Err(Escalation::Stop(after));
                    }
                    log::debug!("{}: rate limited, pausing for {}s", label, after.as_secs());
                    self.stats.rate_limit_waits += 1;
                    attempt -= 1;
                    self.emit(CrawlEvent::RateLimited { retry_after: after });
                    tokio::time::sleep(after).await;
                }
                Decision::Skip(reason) => {
                    log::debug!("{}: giving up: {}", label, reason);
                    return Err(Escalation::Skip(reason));
                }
                Decision::Stop(after) => {
                    log::warn!(
                        "{}: rate limited for {}s, longer than the {}s limit",
                        label,
                        after.as_secs(),
                        self.policy.max_rate_limit_wait.as_secs()
                    );
                    return Err(Escalation::Stop(after));
                }
                Decision::Abort(reason) => return Err(Escalation::Abort(reason)),
            }
        }
    }

    /// Wait until at least `min_interval` has passed since the last catalog
    /// call.
    async fn pace(&mut self) {
        if let Some(last) = self.last_catalog_call {
            let elapsed = last.elapsed();
            if elapsed < self.min_interval {
                tokio::time::sleep(self.min_interval - elapsed).await;
            }
        }
        self.last_catalog_call = Some(Instant::now());
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
