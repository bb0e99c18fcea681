//! Tool registry and dispatch engine.
//!
//! Tools are the callers' interface to the wrapped services. The
//! pieces fit together as: descriptors declare an operation's
//! parameters and handler, the registry groups descriptors into
//! toolsets, and the dispatcher resolves, validates, rate-gates, and
//! invokes — isolating every failure to the call that caused it.

pub mod builtin;
pub mod redaction;

mod dispatcher;
mod registry;
mod tool;

pub use dispatcher::{Dispatcher, ExecutionResult};
pub use registry::ToolRegistry;
pub use tool::{
    CallContext, FnHandler, Handler, ParamSpec, ParamType, ToolBuilder, ToolDescriptor,
    ToolListing, handler_fn, require_str, validate_arguments,
};
