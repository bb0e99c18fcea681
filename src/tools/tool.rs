//! Tool descriptors: metadata, parameter declarations, and handlers.

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::error::{HandlerError, RegistryError};

/// Default ceiling on a single handler invocation.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// Identity context for one call. Authentication happens upstream; the
/// dispatch core treats the identity as already validated.
#[derive(Debug, Clone)]
pub struct CallContext {
    pub user_id: String,
}

impl CallContext {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

impl Default for CallContext {
    fn default() -> Self {
        Self::new("local")
    }
}

/// Declared type of a tool parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
}

impl ParamType {
    /// Whether `value` matches this declared type.
    pub fn matches(&self, value: &Value) -> bool {
        match self {
            ParamType::String => value.is_string(),
            ParamType::Integer => value.is_i64() || value.is_u64(),
            ParamType::Number => value.is_number(),
            ParamType::Boolean => value.is_boolean(),
            ParamType::Array => value.is_array(),
            ParamType::Object => value.is_object(),
        }
    }
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParamType::String => "string",
            ParamType::Integer => "integer",
            ParamType::Number => "number",
            ParamType::Boolean => "boolean",
            ParamType::Array => "array",
            ParamType::Object => "object",
        };
        write!(f, "{name}")
    }
}

/// One declared parameter of a tool.
#[derive(Debug, Clone, Serialize)]
pub struct ParamSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: ParamType,
    pub required: bool,
    pub description: String,
}

/// Executable body of a tool.
#[async_trait]
pub trait Handler: Send + Sync {
    /// Run with arguments already validated against the descriptor.
    async fn call(&self, args: Value, ctx: &CallContext) -> Result<Value, HandlerError>;
}

/// Adapter so plain async functions can serve as handlers.
pub struct FnHandler<F>(pub F);

#[async_trait]
impl<F, Fut> Handler for FnHandler<F>
where
    F: Fn(Value, CallContext) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Value, HandlerError>> + Send,
{
    async fn call(&self, args: Value, ctx: &CallContext) -> Result<Value, HandlerError> {
        (self.0)(args, ctx.clone()).await
    }
}

/// Wrap an async function as a boxed handler.
pub fn handler_fn<F, Fut>(f: F) -> Arc<dyn Handler>
where
    F: Fn(Value, CallContext) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, HandlerError>> + Send + 'static,
{
    Arc::new(FnHandler(f))
}

/// Immutable metadata bound to one executable operation.
///
/// Created once at registry build time and never mutated afterward.
/// The handler is owned exclusively by the descriptor and is excluded
/// from every externally observable listing.
#[derive(Clone)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Declaration order is preserved and surfaced in listings.
    pub parameters: Vec<ParamSpec>,
    /// `false` marks operations with side effects that need explicit
    /// caller confirmation upstream; the core only surfaces the flag.
    pub safe: bool,
    /// Rate-limit category consulted before invocation, if any.
    pub rate_category: Option<String>,
    /// Ceiling on a single invocation.
    pub timeout: Duration,
    pub(crate) handler: Arc<dyn Handler>,
}

impl fmt::Debug for ToolDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolDescriptor")
            .field("name", &self.name)
            .field("parameters", &self.parameters.len())
            .field("safe", &self.safe)
            .field("rate_category", &self.rate_category)
            .finish_non_exhaustive()
    }
}

impl ToolDescriptor {
    /// Start building a descriptor.
    pub fn builder(name: impl Into<String>, description: impl Into<String>) -> ToolBuilder {
        ToolBuilder {
            name: name.into(),
            description: description.into(),
            parameters: Vec::new(),
            safe: true,
            rate_category: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Discovery view: everything a caller may see, handler excluded.
    pub fn listing(&self) -> ToolListing {
        ToolListing {
            name: self.name.clone(),
            description: self.description.clone(),
            parameters: self.parameters.clone(),
            safe: self.safe,
        }
    }

    pub(crate) fn validate(&self) -> Result<(), RegistryError> {
        if self.name.is_empty() {
            return Err(RegistryError::InvalidDescriptor {
                name: self.name.clone(),
                reason: "tool name must not be empty".to_string(),
            });
        }
        let mut seen = BTreeSet::new();
        for param in &self.parameters {
            if !seen.insert(param.name.as_str()) {
                return Err(RegistryError::InvalidDescriptor {
                    name: self.name.clone(),
                    reason: format!("duplicate parameter '{}'", param.name),
                });
            }
        }
        Ok(())
    }
}

/// Discovery view of a descriptor — no handler, no secrets.
#[derive(Debug, Clone, Serialize)]
pub struct ToolListing {
    pub name: String,
    pub description: String,
    pub parameters: Vec<ParamSpec>,
    pub safe: bool,
}

/// Builder producing a [`ToolDescriptor`] value; registration is
/// appending the result to a toolset table.
pub struct ToolBuilder {
    name: String,
    description: String,
    parameters: Vec<ParamSpec>,
    safe: bool,
    rate_category: Option<String>,
    timeout: Duration,
}

impl ToolBuilder {
    /// Declare a required parameter.
    pub fn param(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            kind,
            required: true,
            description: description.into(),
        });
        self
    }

    /// Declare an optional parameter.
    pub fn optional_param(
        mut self,
        name: impl Into<String>,
        kind: ParamType,
        description: impl Into<String>,
    ) -> Self {
        self.parameters.push(ParamSpec {
            name: name.into(),
            kind,
            required: false,
            description: description.into(),
        });
        self
    }

    /// Mark the operation as having side effects (`safe = false`).
    pub fn unsafe_op(mut self) -> Self {
        self.safe = false;
        self
    }

    /// Gate invocations through a rate-limit category.
    pub fn rate_category(mut self, key: impl Into<String>) -> Self {
        self.rate_category = Some(key.into());
        self
    }

    /// Override the invocation timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Bind the handler and finish the descriptor.
    pub fn handler(self, handler: Arc<dyn Handler>) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name,
            description: self.description,
            parameters: self.parameters,
            safe: self.safe,
            rate_category: self.rate_category,
            timeout: self.timeout,
            handler,
        }
    }
}

/// Validate `args` against the declared parameters.
///
/// Returns the offending field names on failure: missing required
/// parameters, undeclared parameters, and type mismatches. An explicit
/// `null` counts as absent.
pub fn validate_arguments(parameters: &[ParamSpec], args: &Value) -> Result<(), Vec<String>> {
    let Some(map) = args.as_object() else {
        return Err(vec!["arguments".to_string()]);
    };

    let mut offending = Vec::new();

    for spec in parameters {
        match map.get(&spec.name) {
            Some(Value::Null) | None => {
                if spec.required {
                    offending.push(spec.name.clone());
                }
            }
            Some(value) => {
                if !spec.kind.matches(value) {
                    offending.push(spec.name.clone());
                }
            }
        }
    }

    for key in map.keys() {
        if !parameters.iter().any(|p| &p.name == key) {
            offending.push(key.clone());
        }
    }

    if offending.is_empty() {
        Ok(())
    } else {
        Err(offending)
    }
}

/// Extract a required string argument.
///
/// Handlers use this for arguments the descriptor already declares as
/// required strings; the error is a backstop, not the primary check.
pub fn require_str<'a>(args: &'a Value, name: &str) -> Result<&'a str, HandlerError> {
    args.get(name)
        .and_then(Value::as_str)
        .ok_or_else(|| HandlerError::msg(format!("missing '{name}' argument")))
}
