//! Call context carried on the OpenTelemetry [`Context`].
//!
//! Two values scope the behaviour of instrumented clients:
//!
//! - the suppression marker, which makes instrumented clients pass straight
//!   through to the wrapped client;
//! - the content-tracing override, which wins over `TRACELOOP_TRACE_CONTENT`
//!   and configuration.
//!
//! Both are attached with [`Context::attach`] and last as long as the
//! returned [`ContextGuard`]. The current span travels on the same context,
//! so nested spans parent through it as well.

use opentelemetry::{Context, ContextGuard};

use crate::config::{parse_trace_content, TRACE_CONTENT_ENV};

#[derive(Debug, Clone, Copy)]
struct SuppressInstrumentation;

#[derive(Debug, Clone, Copy)]
struct ContentTracing(bool);

/// Suppress instrumentation until the guard is dropped
#[must_use = "instrumentation is only suppressed while the guard is alive"]
pub fn suppress_instrumentation() -> ContextGuard {
    Context::current_with_value(SuppressInstrumentation).attach()
}

/// Whether instrumented clients should skip span creation
pub fn is_instrumentation_suppressed() -> bool {
    Context::map_current(|cx| cx.get::<SuppressInstrumentation>().is_some())
}

/// Force prompt/completion capture on or off until the guard is dropped
#[must_use = "the override only applies while the guard is alive"]
pub fn override_enable_content_tracing(enabled: bool) -> ContextGuard {
    Context::current_with_value(ContentTracing(enabled)).attach()
}

/// Innermost content-tracing override, if any
pub fn content_tracing_override() -> Option<bool> {
    Context::map_current(|cx| cx.get::<ContentTracing>().map(|c| c.0))
}

/// Decide whether prompts and completions go on the span.
///
/// Precedence: context override, then `TRACELOOP_TRACE_CONTENT`, then the
/// configured default.
pub fn should_send_prompts(configured: bool) -> bool {
    if let Some(enabled) = content_tracing_override() {
        return enabled;
    }
    let env = std::env::var(TRACE_CONTENT_ENV).ok();
    parse_trace_content(env.as_deref()).unwrap_or(configured)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suppression_nests() {
        assert!(!is_instrumentation_suppressed());
        let outer = suppress_instrumentation();
        {
            let _inner = suppress_instrumentation();
            assert!(is_instrumentation_suppressed());
        }
        assert!(is_instrumentation_suppressed());
        drop(outer);
        assert!(!is_instrumentation_suppressed());
    }

    #[test]
    fn test_content_override_wins() {
        assert_eq!(content_tracing_override(), None);
        let _off = override_enable_content_tracing(false);
        assert!(!should_send_prompts(true));
        {
            let _on = override_enable_content_tracing(true);
            assert!(should_send_prompts(false));
        }
        assert_eq!(content_tracing_override(), Some(false));
    }

    #[test]
    fn test_override_guards_dropped_out_of_order() {
        let outer = override_enable_content_tracing(false);
        let inner = override_enable_content_tracing(true);

        drop(outer);
        assert_eq!(content_tracing_override(), Some(true));
        assert!(should_send_prompts(false));

        drop(inner);
        assert_eq!(content_tracing_override(), None);
    }

    #[test]
    fn test_suppression_outlives_override_dropped_first() {
        let suppress = suppress_instrumentation();
        let content = override_enable_content_tracing(true);
        drop(suppress);
        assert!(is_instrumentation_suppressed());
        drop(content);
        assert!(!is_instrumentation_suppressed());
    }

    #[test]
    fn test_context_is_thread_local() {
        let _guard = suppress_instrumentation();
        let other = std::thread::spawn(is_instrumentation_suppressed)
            .join()
            .unwrap();
        assert!(!other);
    }
}
