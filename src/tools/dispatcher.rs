//! Call dispatch: resolve, validate, rate-gate, invoke, normalize.
//!
//! A single `execute` walks `Received → Resolved → Validated →
//! [RateGated] → Invoked → {Succeeded | Failed}`; every gate failure
//! short-circuits to one of the five result variants and nothing else.
//! There is no retry loop here.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use crate::error::ConfigError;
use crate::quota::{AdmitResult, RateLimiter, RetryAfter};
use crate::tools::redaction::{redact_secrets, redact_sensitive_json};
use crate::tools::registry::ToolRegistry;
use crate::tools::tool::{CallContext, validate_arguments};

/// The complete externally observable result space of a dispatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    Success { value: Value },
    InvalidArguments { fields: Vec<String> },
    NotFound { message: String },
    RateLimited { retry_after: RetryAfter },
    ExecutionFailed { message: String },
}

/// Maps (toolset, operation, arguments) onto a validated handler
/// invocation, isolating failures per call.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    limiter: Arc<RateLimiter>,
}

impl Dispatcher {
    /// Build a dispatcher over an immutable registry.
    ///
    /// Fails when a registered tool declares a rate category the
    /// limiter does not know about — a misconfigured toolset must not
    /// reach serving.
    pub fn new(
        registry: Arc<ToolRegistry>,
        limiter: Arc<RateLimiter>,
    ) -> Result<Self, ConfigError> {
        for category in registry.declared_categories() {
            if !limiter.has_category(category) {
                return Err(ConfigError::InvalidCategory {
                    key: category.to_string(),
                    reason: "declared by a tool but missing from rate-limit configuration"
                        .to_string(),
                });
            }
        }
        Ok(Self { registry, limiter })
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }

    pub fn limiter(&self) -> &RateLimiter {
        &self.limiter
    }

    /// Execute one operation.
    ///
    /// The handler runs at most once per call, and only after lookup,
    /// validation, and the rate gate have all passed; a quota slot is
    /// only consumed once those earlier gates succeed. Handler errors
    /// are caught here and normalized — they never escape as panics or
    /// foreign error types.
    pub async fn execute(
        &self,
        toolset_id: &str,
        tool_name: &str,
        arguments: Value,
        ctx: &CallContext,
    ) -> ExecutionResult {
        let descriptor = match self.registry.resolve(toolset_id, tool_name) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                tracing::debug!(toolset = toolset_id, tool = tool_name, "Lookup failed: {e}");
                return ExecutionResult::NotFound {
                    message: e.to_string(),
                };
            }
        };

        let arguments = if arguments.is_null() {
            Value::Object(Default::default())
        } else {
            arguments
        };

        if let Err(fields) = validate_arguments(&descriptor.parameters, &arguments) {
            tracing::debug!(
                toolset = toolset_id,
                tool = tool_name,
                fields = ?fields,
                "Argument validation failed"
            );
            return ExecutionResult::InvalidArguments { fields };
        }

        if let Some(category) = descriptor.rate_category.as_deref() {
            match self.limiter.admit(category).await {
                AdmitResult::Denied { retry_after } => {
                    tracing::warn!(
                        toolset = toolset_id,
                        tool = tool_name,
                        category,
                        retry_after = %retry_after,
                        "Rate limited"
                    );
                    return ExecutionResult::RateLimited { retry_after };
                }
                AdmitResult::Allowed { wait } if !wait.is_zero() => {
                    tracing::info!(
                        toolset = toolset_id,
                        tool = tool_name,
                        category,
                        wait_secs = wait.as_secs_f64(),
                        "Holding for spacing"
                    );
                    tokio::time::sleep(wait).await;
                }
                AdmitResult::Allowed { .. } => {}
            }
        }

        tracing::debug!(
            toolset = toolset_id,
            tool = tool_name,
            user = %ctx.user_id,
            args = %redact_sensitive_json(&arguments),
            "Tool call started"
        );
        let started = std::time::Instant::now();
        let outcome = tokio::time::timeout(
            descriptor.timeout,
            descriptor.handler.call(arguments, ctx),
        )
        .await;
        let elapsed_ms = started.elapsed().as_millis() as u64;

        match outcome {
            Ok(Ok(value)) => {
                tracing::debug!(tool = tool_name, elapsed_ms, "Tool call succeeded");
                ExecutionResult::Success { value }
            }
            Ok(Err(e)) => {
                tracing::debug!(tool = tool_name, elapsed_ms, error = %e, "Tool call failed");
                ExecutionResult::ExecutionFailed {
                    message: redact_secrets(&e.to_string()),
                }
            }
            Err(_) => {
                tracing::debug!(
                    tool = tool_name,
                    timeout_secs = descriptor.timeout.as_secs(),
                    "Tool call timed out"
                );
                ExecutionResult::ExecutionFailed {
                    message: format!("timed out after {:?}", descriptor.timeout),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::config::CategoryLimits;
    use crate::error::HandlerError;
    use crate::quota::QuotaStore;
    use crate::testing::{FixedJitter, ManualClock};
    use crate::tools::tool::{ParamType, ToolDescriptor, handler_fn};

    fn test_limiter(dir: &std::path::Path, categories: Vec<CategoryLimits>) -> Arc<RateLimiter> {
        Arc::new(
            RateLimiter::with_parts(
                QuotaStore::new(dir),
                categories,
                Arc::new(ManualClock::new()),
                Arc::new(FixedJitter(0.0)),
            )
            .unwrap(),
        )
    }

    fn echo_tool() -> ToolDescriptor {
        ToolDescriptor::builder("echo", "Echo the message back")
            .param("message", ParamType::String, "Message to echo")
            .handler(handler_fn(|args, _ctx| async move {
                Ok(json!({ "echo": args["message"] }))
            }))
    }

    fn dispatcher(
        dir: &std::path::Path,
        tools: Vec<ToolDescriptor>,
        categories: Vec<CategoryLimits>,
    ) -> Dispatcher {
        let mut registry = ToolRegistry::new();
        registry.register("test", tools).unwrap();
        Dispatcher::new(Arc::new(registry), test_limiter(dir, categories)).unwrap()
    }

    #[tokio::test]
    async fn success_wraps_handler_value() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path(), vec![echo_tool()], vec![]);

        let result = dispatcher
            .execute("test", "echo", json!({"message": "hi"}), &CallContext::default())
            .await;
        assert_eq!(
            result,
            ExecutionResult::Success {
                value: json!({"echo": "hi"})
            }
        );
    }

    #[tokio::test]
    async fn unknown_tool_returns_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let dispatcher = dispatcher(dir.path(), vec![echo_tool()], vec![]);

        let result = dispatcher
            .execute("test", "missing", json!({}), &CallContext::default())
            .await;
        assert!(matches!(result, ExecutionResult::NotFound { .. }));

        let result = dispatcher
            .execute("nope", "echo", json!({}), &CallContext::default())
            .await;
        assert!(matches!(result, ExecutionResult::NotFound { .. }));
    }

    #[tokio::test]
    async fn invalid_arguments_never_reach_the_handler_or_the_quota() {
        let dir = tempfile::tempdir().unwrap();
        let gated = ToolDescriptor::builder("lookup", "Gated lookup")
            .param("id", ParamType::String, "Lookup id")
            .rate_category("profiles")
            .handler(handler_fn(|_args, _ctx| async {
                Err::<Value, _>(HandlerError::msg("handler must not run"))
            }));
        let dispatcher = dispatcher(
            dir.path(),
            vec![gated],
            vec![CategoryLimits::new("profiles", 0.0, 0.0, 5)],
        );

        let result = dispatcher
            .execute("test", "lookup", json!({}), &CallContext::default())
            .await;
        assert_eq!(
            result,
            ExecutionResult::InvalidArguments {
                fields: vec!["id".to_string()]
            }
        );
        assert_eq!(
            dispatcher.limiter().status("profiles").unwrap().count_today,
            0
        );
    }

    #[tokio::test]
    async fn denied_admission_surfaces_as_rate_limited() {
        let dir = tempfile::tempdir().unwrap();
        let gated = ToolDescriptor::builder("lookup", "Gated lookup")
            .param("id", ParamType::String, "Lookup id")
            .rate_category("profiles")
            .handler(handler_fn(|_args, _ctx| async { Ok(json!("found")) }));
        let dispatcher = dispatcher(
            dir.path(),
            vec![gated],
            vec![CategoryLimits::new("profiles", 0.0, 0.0, 1)],
        );

        let ok = dispatcher
            .execute("test", "lookup", json!({"id": "a"}), &CallContext::default())
            .await;
        assert!(matches!(ok, ExecutionResult::Success { .. }));

        let denied = dispatcher
            .execute("test", "lookup", json!({"id": "b"}), &CallContext::default())
            .await;
        assert_eq!(
            denied,
            ExecutionResult::RateLimited {
                retry_after: RetryAfter::Tomorrow
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn spacing_wait_is_performed_before_the_handler_runs() {
        let dir = tempfile::tempdir().unwrap();
        let gated = ToolDescriptor::builder("lookup", "Gated lookup")
            .rate_category("profiles")
            .handler(handler_fn(|_args, _ctx| async { Ok(json!("found")) }));
        let mut registry = ToolRegistry::new();
        registry.register("test", vec![gated]).unwrap();
        let limiter = Arc::new(
            RateLimiter::with_parts(
                QuotaStore::new(dir.path()),
                vec![CategoryLimits::new("profiles", 5.0, 5.0, 10)],
                Arc::new(ManualClock::new()),
                Arc::new(FixedJitter(5.0)),
            )
            .unwrap(),
        );
        let dispatcher = Dispatcher::new(Arc::new(registry), limiter).unwrap();

        // Back-to-back calls: the second must sit out the full spacing
        // (auto-advanced under paused time).
        let first = dispatcher
            .execute("test", "lookup", json!({}), &CallContext::default())
            .await;
        assert!(matches!(first, ExecutionResult::Success { .. }));

        let started = tokio::time::Instant::now();
        let second = dispatcher
            .execute("test", "lookup", json!({}), &CallContext::default())
            .await;
        assert!(matches!(second, ExecutionResult::Success { .. }));
        assert!(started.elapsed() >= Duration::from_secs(5));
    }

    #[tokio::test]
    async fn handler_error_is_normalized_and_redacted() {
        let dir = tempfile::tempdir().unwrap();
        let failing = ToolDescriptor::builder("send", "Failing send")
            .handler(handler_fn(|_args, _ctx| async {
                Err::<Value, _>(HandlerError::ExternalService(
                    "upstream rejected call with token=sk-super-secret".to_string(),
                ))
            }));
        let dispatcher = dispatcher(dir.path(), vec![failing], vec![]);

        let result = dispatcher
            .execute("test", "send", json!({}), &CallContext::default())
            .await;
        match result {
            ExecutionResult::ExecutionFailed { message } => {
                assert!(message.contains("upstream rejected"));
                assert!(!message.contains("sk-super-secret"));
            }
            other => panic!("expected ExecutionFailed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn slow_handler_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let slow = ToolDescriptor::builder("slow", "Never finishes")
            .timeout(Duration::from_secs(1))
            .handler(handler_fn(|_args, _ctx| async {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(json!("done"))
            }));
        let dispatcher = dispatcher(dir.path(), vec![slow], vec![]);

        let result = dispatcher
            .execute("test", "slow", json!({}), &CallContext::default())
            .await;
        match result {
            ExecutionResult::ExecutionFailed { message } => {
                assert!(message.contains("timed out"));
            }
            other => panic!("expected ExecutionFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn null_arguments_are_treated_as_empty() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ToolDescriptor::builder("ping", "No parameters")
            .handler(handler_fn(|_args, _ctx| async { Ok(json!("pong")) }));
        let dispatcher = dispatcher(dir.path(), vec![tool], vec![]);

        let result = dispatcher
            .execute("test", "ping", Value::Null, &CallContext::default())
            .await;
        assert_eq!(result, ExecutionResult::Success { value: json!("pong") });
    }

    #[test]
    fn undeclared_category_fails_dispatcher_construction() {
        let dir = tempfile::tempdir().unwrap();
        let gated = ToolDescriptor::builder("lookup", "Gated lookup")
            .rate_category("unconfigured")
            .handler(handler_fn(|_args, _ctx| async { Ok(json!(0)) }));
        let mut registry = ToolRegistry::new();
        registry.register("test", vec![gated]).unwrap();

        let err = Dispatcher::new(Arc::new(registry), test_limiter(dir.path(), vec![]))
            .map(|_| ())
            .unwrap_err();
        assert!(err.to_string().contains("unconfigured"));
    }

    #[test]
    fn execution_result_serializes_with_status_tag() {
        let success = serde_json::to_value(ExecutionResult::Success { value: json!(1) }).unwrap();
        assert_eq!(success, json!({"status": "success", "value": 1}));

        let limited = serde_json::to_value(ExecutionResult::RateLimited {
            retry_after: RetryAfter::Tomorrow,
        })
        .unwrap();
        assert_eq!(
            limited,
            json!({"status": "rate_limited", "retry_after": "tomorrow"})
        );
    }
}
