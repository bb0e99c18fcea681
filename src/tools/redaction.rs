//! Secret redaction for logged arguments and failure messages.
//!
//! Failure messages quote whatever the wrapped collaborator said,
//! which may include credentials; everything caller-facing or logged
//! passes through here first.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

const REDACTED: &str = "[REDACTED]";

const SENSITIVE_KEY_FRAGMENTS: &[&str] = &[
    "token",
    "secret",
    "password",
    "passwd",
    "credential",
    "auth",
    "api_key",
    "api-key",
    "apikey",
    "cookie",
    "private_key",
];

static SECRET_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)\b(bearer\s+|(?:api[_-]?key|token|secret|password|credential|cookie)\s*[=:]\s*)[^\s'\x22]+",
    )
    .expect("redaction pattern is valid")
});

fn is_sensitive_key(key: &str) -> bool {
    let lower = key.to_ascii_lowercase();
    SENSITIVE_KEY_FRAGMENTS.iter().any(|f| lower.contains(f))
}

/// Copy of `value` with every credential-looking field masked.
/// Applied to call arguments before they reach any log line.
pub fn redact_sensitive_json(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(key, val)| {
                    if is_sensitive_key(key) {
                        (key.clone(), Value::String(REDACTED.to_string()))
                    } else {
                        (key.clone(), redact_sensitive_json(val))
                    }
                })
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_json).collect()),
        other => other.clone(),
    }
}

/// Mask credential-looking fragments in a free-form message.
pub fn redact_secrets(message: &str) -> String {
    SECRET_PATTERN
        .replace_all(message, format!("${{1}}{REDACTED}").as_str())
        .into_owned()
}
