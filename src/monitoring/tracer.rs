/*!
 * Tracing
 * Subscriber setup and per-syscall spans using the tracing crate
 */

use crate::core::types::Pid;
use crate::syscalls::SyscallNumber;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tracing::{debug, span, warn, Level, Span};
use tracing_subscriber::{fmt::format::FmtSpan, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Syscalls slower than this are reported, unless they are allowed to block
const SLOW_SYSCALL: Duration = Duration::from_millis(10);

static NEXT_TRACE_ID: AtomicU64 = AtomicU64::new(1);

/// Initialize structured tracing
///
/// Environment variables:
/// - RUST_LOG: Set log level (default: info)
/// - KERNEL_TRACE_JSON: Enable JSON output (default: false)
///
/// Does nothing if a global subscriber is already installed.
pub fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let use_json = std::env::var("KERNEL_TRACE_JSON")
        .map(|v| v == "1" || v == "true")
        .unwrap_or(false);

    let registry = tracing_subscriber::registry().with(env_filter);

    let installed = if use_json {
        registry
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_target(true)
                    .with_thread_names(true)
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
                    .with_target(false)
                    .with_thread_names(true)
                    .with_writer(std::io::stderr)
                    .compact(),
            )
            .try_init()
            .is_ok()
    };

    if installed {
        debug!(json = use_json, "Tracing initialized");
    }
}

/// Span covering one syscall, from argument fetch to return
pub struct SyscallSpan {
    span: Span,
    start: Instant,
    call: SyscallNumber,
    trace_id: u64,
}

impl SyscallSpan {
    pub fn new(call: SyscallNumber, pid: Pid) -> Self {
        let trace_id = NEXT_TRACE_ID.fetch_add(1, Ordering::Relaxed);
        let span = span!(
            Level::DEBUG,
            "syscall",
            trace_id,
            syscall = call.name(),
            pid,
            return_value = tracing::field::Empty,
        );

        Self {
            span,
            start: Instant::now(),
            call,
            trace_id,
        }
    }

    pub fn trace_id(&self) -> u64 {
        self.trace_id
    }

    pub fn enter(&self) -> tracing::span::Entered<'_> {
        self.span.enter()
    }

    pub fn record_return(&self, value: i32) {
        self.span.record("return_value", value);
    }
}

impl Drop for SyscallSpan {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let _entered = self.span.enter();

        if duration > SLOW_SYSCALL && !self.call.may_block() {
            warn!(
                trace_id = self.trace_id,
                syscall = %self.call,
                duration_ms = duration.as_millis() as u64,
                "slow syscall detected"
            );
        } else {
            debug!(
                trace_id = self.trace_id,
                syscall = %self.call,
                duration_us = duration.as_micros() as u64,
                "syscall completed"
            );
        }
    }
}
