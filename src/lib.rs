//! Toolset dispatch with persistent, category-scoped rate limiting.
//!
//! The crate exposes named groups of callable operations ("toolsets")
//! over a uniform request/response surface:
//!
//! - [`tools::ToolRegistry`] maps toolset and operation names onto
//!   immutable [`tools::ToolDescriptor`]s built once at startup.
//! - [`tools::Dispatcher`] validates arguments, consults the rate
//!   limiter, invokes the handler, and normalizes every outcome into
//!   [`tools::ExecutionResult`].
//! - [`quota::RateLimiter`] enforces per-category daily quotas and
//!   jittered inter-call spacing, persisted across process restarts so
//!   a wrapped service's usage ceilings are never overshot.
//!
//! External API clients, OAuth, and the transport layer live outside
//! this crate and plug in through the narrow traits in
//! [`tools::builtin`].

pub mod config;
pub mod error;
pub mod quota;
pub mod testing;
pub mod tools;

pub use config::Config;
pub use quota::{AdmitResult, QuotaStatus, RateLimiter, RetryAfter};
pub use tools::{CallContext, Dispatcher, ExecutionResult, ToolDescriptor, ToolRegistry};
