//! Error formatting and debug flags.
//!
//! The default formatter produces the client-facing shape
//! `{"message", "locations", "path", "extensions"}`. Debug entries are added
//! on top by [`prepare_formatter`] according to [`DebugFlags`].

use serde_json::{Map, Value};
use std::ops::{BitOr, BitOrAssign};
use std::sync::Arc;

use crate::result::OperationError;

/// Message sent to clients in place of non client-safe errors.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

/// Formats a single error into its JSON object.
pub type ErrorFormatter = Arc<dyn Fn(&OperationError) -> Map<String, Value> + Send + Sync>;

/// Maps the whole error list of a result, given the active formatter.
pub type ErrorsHandler =
    Arc<dyn Fn(&[OperationError], &ErrorFormatter) -> Vec<Value> + Send + Sync>;

/// Debug output switches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DebugFlags(u8);

impl DebugFlags {
    /// No debug output.
    pub const NONE: Self = Self(0);
    /// Adds `debugMessage` and `category` to masked errors.
    pub const INCLUDE_DEBUG_MESSAGE: Self = Self(1);
    /// Adds `category` and the cause chain as `trace`.
    pub const INCLUDE_TRACE: Self = Self(2);
    /// Every debug entry.
    pub const ALL: Self = Self(Self::INCLUDE_DEBUG_MESSAGE.0 | Self::INCLUDE_TRACE.0);

    /// Builds flags from raw bits, dropping unknown ones.
    pub const fn from_bits_truncate(bits: u8) -> Self {
        Self(bits & Self::ALL.0)
    }

    /// Returns the raw bits.
    pub const fn bits(&self) -> u8 {
        self.0
    }

    /// Returns true if no flag is set.
    pub const fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Returns true if every flag in `other` is set.
    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl From<bool> for DebugFlags {
    fn from(enabled: bool) -> Self {
        if enabled {
            Self::ALL
        } else {
            Self::NONE
        }
    }
}

impl BitOr for DebugFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for DebugFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Formats an error for clients.
pub fn format_error(error: &OperationError) -> Map<String, Value> {
    let mut formatted = Map::new();
    let message = if error.is_client_safe() {
        error.message.clone()
    } else {
        INTERNAL_ERROR_MESSAGE.to_string()
    };
    formatted.insert("message".to_string(), Value::String(message));

    if !error.locations.is_empty() {
        let locations = error
            .locations
            .iter()
            .map(|l| serde_json::json!({"line": l.line, "column": l.column}))
            .collect();
        formatted.insert("locations".to_string(), Value::Array(locations));
    }
    if let Some(path) = &error.path {
        if let Ok(path) = serde_json::to_value(path) {
            formatted.insert("path".to_string(), path);
        }
    }
    if let Some(extensions) = error.extensions.as_ref().filter(|e| !e.is_empty()) {
        formatted.insert("extensions".to_string(), Value::Object(extensions.clone()));
    }
    if let Some(validation) = &error.validation {
        formatted.insert("validation".to_string(), Value::Object(validation.clone()));
    }
    formatted
}

/// Returns the default formatter.
pub fn default_formatter() -> ErrorFormatter {
    Arc::new(format_error)
}

/// Adds the debug entries selected by `debug` to an already formatted error.
pub fn add_debug_entries(
    mut formatted: Map<String, Value>,
    error: &(dyn std::error::Error + 'static),
    client_safe: bool,
    category: &str,
    debug: DebugFlags,
) -> Map<String, Value> {
    if debug.is_empty() {
        return formatted;
    }

    if debug.contains(DebugFlags::INCLUDE_DEBUG_MESSAGE) && !client_safe {
        formatted.insert(
            "debugMessage".to_string(),
            Value::String(error.to_string()),
        );
    }
    formatted.insert("category".to_string(), Value::String(category.to_string()));

    if debug.contains(DebugFlags::INCLUDE_TRACE) {
        let trace = cause_chain(error);
        if !trace.is_empty() {
            formatted.insert("trace".to_string(), Value::Array(trace));
        }
    }
    formatted
}

/// Combines an optional custom formatter with the debug entries.
pub fn prepare_formatter(formatter: Option<ErrorFormatter>, debug: DebugFlags) -> ErrorFormatter {
    let formatter = formatter.unwrap_or_else(default_formatter);
    if debug.is_empty() {
        return formatter;
    }
    Arc::new(move |error: &OperationError| {
        add_debug_entries(
            formatter(error),
            error,
            error.is_client_safe(),
            error.category.as_str(),
            debug,
        )
    })
}

/// Formats an error raised outside normal execution (fatal path).
pub fn format_fatal(
    error: &(dyn std::error::Error + 'static),
    debug: DebugFlags,
) -> Map<String, Value> {
    let mut formatted = Map::new();
    formatted.insert(
        "message".to_string(),
        Value::String(INTERNAL_ERROR_MESSAGE.to_string()),
    );
    add_debug_entries(formatted, error, false, "internal", debug)
}

fn cause_chain(error: &(dyn std::error::Error + 'static)) -> Vec<Value> {
    let mut chain = Vec::new();
    let mut current = error.source();
    while let Some(cause) = current {
        chain.push(Value::String(cause.to_string()));
        current = cause.source();
    }
    chain
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::InvariantViolation;
    use serde_json::json;

    #[test]
    fn test_debug_flags() {
        assert!(DebugFlags::from(false).is_empty());
        assert_eq!(DebugFlags::from(true), DebugFlags::ALL);
        assert_eq!(DebugFlags::from_bits_truncate(0xff), DebugFlags::ALL);

        let mut flags = DebugFlags::NONE;
        flags |= DebugFlags::INCLUDE_TRACE;
        assert!(flags.contains(DebugFlags::INCLUDE_TRACE));
        assert!(!flags.contains(DebugFlags::INCLUDE_DEBUG_MESSAGE));
    }

    #[test]
    fn test_internal_errors_are_masked() {
        let err = OperationError::internal("db password is hunter2");
        assert_eq!(
            Value::Object(format_error(&err)),
            json!({"message": "Internal server error"})
        );

        let debug = prepare_formatter(None, DebugFlags::INCLUDE_DEBUG_MESSAGE);
        assert_eq!(
            Value::Object(debug(&err)),
            json!({
                "message": "Internal server error",
                "debugMessage": "db password is hunter2",
                "category": "internal"
            })
        );
    }

    #[test]
    fn test_trace_lists_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::Other, "connection reset");
        let err = OperationError::new("Cannot load user").with_source(io);

        let formatter = prepare_formatter(None, DebugFlags::INCLUDE_TRACE);
        let formatted = formatter(&err);
        assert_eq!(formatted["message"], "Cannot load user");
        assert_eq!(formatted["category"], "graphql");
        assert_eq!(formatted["trace"], json!(["connection reset"]));
        assert!(formatted.get("debugMessage").is_none());
    }

    #[test]
    fn test_custom_formatter_keeps_debug_entries() {
        let custom: ErrorFormatter = Arc::new(|e| {
            let mut m = Map::new();
            m.insert("msg".to_string(), Value::String(e.message.to_uppercase()));
            m
        });
        let formatter = prepare_formatter(Some(custom), DebugFlags::ALL);
        let formatted = formatter(&OperationError::new("bad"));
        assert_eq!(
            Value::Object(formatted),
            json!({"msg": "BAD", "category": "graphql"})
        );
    }

    #[test]
    fn test_validation_messages() {
        let err = OperationError::new("validation failed")
            .with_validation("email", ["must be an email"]);
        assert_eq!(
            format_error(&err)["validation"],
            json!({"email": ["must be an email"]})
        );
    }

    #[test]
    fn test_fatal_format() {
        let violation = InvariantViolation::new("Schema is required for the server");
        assert_eq!(
            Value::Object(format_fatal(&violation, DebugFlags::NONE)),
            json!({"message": "Internal server error"})
        );
        assert_eq!(
            format_fatal(&violation, DebugFlags::ALL)["debugMessage"],
            "Schema is required for the server"
        );
    }
}
