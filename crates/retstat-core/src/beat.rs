// ── Beat ──
//
// The service facade: open every configured session, then run one
// independent polling task per session until stopped.
//
// Startup is sequential and builds the full session set before any task
// is spawned. After that the set is immutable and shared by `Arc` only.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::backend::{HttpBackend, RetsBackend};
use crate::config::{Discovery, SessionConfig};
use crate::error::CoreError;
use crate::publish::{Publisher, StatsEvent};
use crate::session::Session;

/// Periodic stats collection over a fixed set of sessions.
pub struct Beat<B = HttpBackend> {
    sessions: Vec<Arc<Session<B>>>,
    period: Duration,
    publisher: Arc<dyn Publisher>,
    cancel: CancellationToken,
}

impl Beat<HttpBackend> {
    /// Build an HTTP backend per config and open every session.
    ///
    /// Sessions that fail to open are logged and dropped. Fails only when
    /// no session could be opened.
    pub async fn new(
        configs: &[SessionConfig],
        period: Duration,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, CoreError> {
        let mut backends = Vec::with_capacity(configs.len());
        for config in configs {
            match HttpBackend::new(&config.connection) {
                Ok(backend) => {
                    backends.push((config.code.clone(), backend, config.discovery.clone()));
                }
                Err(e) => {
                    error!(session = %config.code, error = %e, "cannot build client, session dropped");
                }
            }
        }
        Self::from_backends(backends, period, publisher).await
    }
}

impl<B: RetsBackend + 'static> Beat<B> {
    /// Open one session per `(code, backend, discovery)`.
    pub async fn from_backends(
        backends: impl IntoIterator<Item = (String, B, Discovery)>,
        period: Duration,
        publisher: Arc<dyn Publisher>,
    ) -> Result<Self, CoreError> {
        if period.is_zero() {
            return Err(CoreError::Config {
                message: "period must be greater than zero".into(),
            });
        }

        let mut sessions = Vec::new();
        for (code, backend, discovery) in backends {
            match Session::open(code, backend, &discovery).await {
                Ok(session) => sessions.push(Arc::new(session)),
                Err(e) => error!(error = %e, "session dropped"),
            }
        }

        if sessions.is_empty() {
            return Err(CoreError::NoSessions);
        }

        Ok(Self {
            sessions,
            period,
            publisher,
            cancel: CancellationToken::new(),
        })
    }

    pub fn sessions(&self) -> &[Arc<Session<B>>] {
        &self.sessions
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Start one polling task per session and wait until all of them end.
    ///
    /// Returns after [`stop`](Self::stop) once every in-flight cycle has
    /// finished.
    pub async fn run(&self) -> Result<(), CoreError> {
        info!(
            sessions = self.sessions.len(),
            period = %humantime::format_duration(self.period),
            "beat is running"
        );

        let handles: Vec<_> = self
            .sessions
            .iter()
            .map(|session| {
                tokio::spawn(session_task(
                    Arc::clone(session),
                    self.period,
                    Arc::clone(&self.publisher),
                    self.cancel.child_token(),
                ))
            })
            .collect();

        let mut failed = 0_usize;
        for handle in handles {
            if let Err(e) = handle.await {
                error!(error = %e, "session task aborted");
                failed += 1;
            }
        }

        info!("beat stopped");
        if failed > 0 {
            return Err(CoreError::Internal(format!(
                "{failed} session task(s) aborted"
            )));
        }
        Ok(())
    }

    /// Signal every session task to stop at its next wait point.
    pub fn stop(&self) {
        debug!("stop requested");
        self.cancel.cancel();
    }

    /// Run a single cycle for every session, in order.
    ///
    /// Each session's result is returned separately; nothing is published.
    pub async fn run_once(&self) -> Vec<Result<StatsEvent, CoreError>> {
        let mut results = Vec::with_capacity(self.sessions.len());
        for session in &self.sessions {
            let result = session
                .collect()
                .await
                .map(|tree| StatsEvent::new(session.code(), 1, tree));
            results.push(result);
        }
        results
    }
}

/// Poll one session until cancelled.
///
/// The cycle runs inside the tick arm, so two cycles of one session never
/// overlap; ticks missed during a long cycle are skipped, not queued.
async fn session_task<B: RetsBackend>(
    session: Arc<Session<B>>,
    period: Duration,
    publisher: Arc<dyn Publisher>,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval.tick().await; // consume the immediate first tick

    let mut counter: u64 = 1;
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if run_cycle(&session, counter, publisher.as_ref(), period).await {
                    counter += 1;
                }
            }
        }
    }
    debug!(session = %session.code(), "session task finished");
}

/// One tick: aggregate, publish, check for overrun. Returns whether an
/// event was produced.
async fn run_cycle<B: RetsBackend>(
    session: &Session<B>,
    counter: u64,
    publisher: &dyn Publisher,
    period: Duration,
) -> bool {
    let start = Instant::now();

    let produced = match session.collect().await {
        Ok(tree) => {
            let event = StatsEvent::new(session.code(), counter, tree);
            if let Err(e) = publisher.publish(event) {
                error!(session = %session.code(), error = %e, "publishing stats failed");
            } else {
                debug!(session = %session.code(), counter, "stats published");
            }
            true
        }
        Err(e) => {
            error!(error = %e, "stats cycle failed, nothing published");
            false
        }
    };

    let elapsed = start.elapsed();
    if elapsed > period {
        warn!(
            session = %session.code(),
            elapsed = %humantime::format_duration(elapsed),
            period = %humantime::format_duration(period),
            "stats cycle overran the period, ticks were skipped"
        );
    }
    produced
}
