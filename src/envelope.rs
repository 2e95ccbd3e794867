/// Envelope Module
///
/// The result envelope returned by every catalog operation.

use crate::core::AdminError;
use serde::Serialize;
use serde_json::Value;

/// Hint returned when a database-scoped operation runs without an active database.
pub const NO_DATABASE_HINT: &str = "Please use switch_database() to select a database first";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

/// `{status, message, data | error, timestamp}`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Envelope {
    pub status: Status,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub timestamp: String,
    /// Error category, kept out of the wire shape
    #[serde(skip)]
    pub kind: Option<&'static str>,
}

fn now() -> String {
    chrono::Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string()
}

impl Envelope {
    pub fn success(data: Value, message: impl Into<String>) -> Self {
        Envelope {
            status: Status::Success,
            message: message.into(),
            data: Some(data),
            error: None,
            timestamp: now(),
            kind: None,
        }
    }

    /// Builds the error envelope for `err`. A missing active database gets the
    /// switch hint as its message regardless of `message`.
    pub fn failure(err: &AdminError, message: impl Into<String>) -> Self {
        let message = match err {
            AdminError::NoActiveDatabase => NO_DATABASE_HINT.to_string(),
            _ => message.into(),
        };
        Envelope {
            status: Status::Error,
            message,
            data: None,
            error: Some(err.to_string()),
            timestamp: now(),
            kind: Some(err.kind()),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == Status::Success
    }

    /// The payload, or `Value::Null` for error envelopes
    pub fn data(&self) -> &Value {
        self.data.as_ref().unwrap_or(&Value::Null)
    }

    pub fn to_json(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_shape() {
        let envelope = Envelope::success(json!({"tables": ["orders"]}), "Found 1 tables");
        let rendered = envelope.to_json();
        assert_eq!(rendered["status"], "success");
        assert_eq!(rendered["data"]["tables"][0], "orders");
        assert!(rendered.get("error").is_none());
        assert!(rendered.get("kind").is_none());
        assert!(rendered["timestamp"].as_str().unwrap().contains('T'));
    }

    #[test]
    fn test_failure_shape() {
        let envelope = Envelope::failure(
            &AdminError::Execution("Table 'shop.nope' doesn't exist".into()),
            "Failed to read from table 'nope'",
        );
        let rendered = envelope.to_json();
        assert_eq!(rendered["status"], "error");
        assert_eq!(rendered["message"], "Failed to read from table 'nope'");
        assert!(rendered["error"].as_str().unwrap().contains("doesn't exist"));
        assert!(rendered.get("data").is_none());
        assert_eq!(envelope.kind, Some("ExecutionError"));
    }

    #[test]
    fn test_missing_database_uses_hint() {
        let envelope = Envelope::failure(&AdminError::NoActiveDatabase, "Failed to list tables");
        assert_eq!(envelope.message, NO_DATABASE_HINT);
        assert_eq!(envelope.error.as_deref(), Some("No database selected"));
        assert_eq!(envelope.kind, Some("PreconditionError"));
    }
}
