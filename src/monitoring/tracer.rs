/*!
 * Structured Tracing
 * Subscriber setup and timed spans around processing runs
 */

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, info, span, warn, Level};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Environment variable switching log output to JSON
pub const ENV_LOG_JSON: &str = "TRACEMERGE_LOG_JSON";

const SLOW_RUN_THRESHOLD: Duration = Duration::from_millis(250);

static NEXT_RUN_ID: AtomicU64 = AtomicU64::new(1);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - TRACEMERGE_LOG_JSON: Enable JSON output (default: false)
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var(ENV_LOG_JSON)
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_line_number(true)
                    .with_file(true)
                    .with_current_span(true)
                    .with_span_list(true)
                    .with_span_events(FmtSpan::CLOSE),
            )
            .try_init()
            .is_ok()
    } else {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(true)
                    .with_line_number(true)
                    .with_span_events(FmtSpan::CLOSE)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        info!(json = use_json, "structured tracing initialized");
    }
}

/// Timed span around one processing run or seek
///
/// Logs the number of dispatched events and the elapsed time when dropped;
/// runs slower than a quarter second are reported at warn level.
pub struct RunSpan {
    span: tracing::Span,
    start: Instant,
    run_id: u64,
    operation: &'static str,
    events: u64,
}

impl RunSpan {
    pub fn new(operation: &'static str) -> Self {
        let run_id = NEXT_RUN_ID.fetch_add(1, Ordering::Relaxed);
        let span = span!(
            Level::DEBUG,
            "run",
            run_id,
            operation,
            events = tracing::field::Empty,
            duration_us = tracing::field::Empty,
        );
        Self {
            span,
            start: Instant::now(),
            run_id,
            operation,
            events: 0,
        }
    }

    #[inline]
    pub fn run_id(&self) -> u64 {
        self.run_id
    }

    /// Record how many events the run dispatched
    pub fn record_events(&mut self, events: u64) {
        self.events = events;
        self.span.record("events", events);
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }
}

impl Drop for RunSpan {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        let _entered = self.span.enter();
        self.span.record("duration_us", elapsed.as_micros() as u64);

        if elapsed > SLOW_RUN_THRESHOLD {
            warn!(
                run_id = self.run_id,
                operation = self.operation,
                events = self.events,
                duration_ms = elapsed.as_millis() as u64,
                slow = true,
                "slow processing run"
            );
        } else {
            debug!(
                run_id = self.run_id,
                operation = self.operation,
                events = self.events,
                duration_us = elapsed.as_micros() as u64,
                "processing run completed"
            );
        }
    }
}
