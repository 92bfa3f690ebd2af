//! WebSocket message types for live download reporting.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// WebSocket message types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum WsMessageType {
    /// Log message
    Log,
    /// Progress update
    Progress,
    /// Error message
    Error,
    /// Download complete
    Done,
}

impl WsMessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            WsMessageType::Log => "log",
            WsMessageType::Progress => "progress",
            WsMessageType::Error => "error",
            WsMessageType::Done => "done",
        }
    }
}

/// WebSocket message envelope.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WsMessage {
    /// Raw line from the external tool, or a status note
    Log {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Progress update (0-100)
    Progress { value: u8 },

    /// Error message
    Error {
        message: String,
        timestamp: DateTime<Utc>,
    },

    /// Download complete
    Done {
        #[serde(rename = "jobId")]
        job_id: String,
        #[serde(rename = "downloadUrl")]
        download_url: String,
    },
}

impl WsMessage {
    /// Create a log message.
    pub fn log(message: impl Into<String>) -> Self {
        WsMessage::Log {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a progress message.
    pub fn progress(value: u8) -> Self {
        WsMessage::Progress {
            value: value.min(100),
        }
    }

    /// Create an error message.
    pub fn error(message: impl Into<String>) -> Self {
        WsMessage::Error {
            message: message.into(),
            timestamp: Utc::now(),
        }
    }

    /// Create a done message.
    pub fn done(job_id: impl Into<String>, download_url: impl Into<String>) -> Self {
        WsMessage::Done {
            job_id: job_id.into(),
            download_url: download_url.into(),
        }
    }

    /// Get the message type.
    pub fn message_type(&self) -> WsMessageType {
        match self {
            WsMessage::Log { .. } => WsMessageType::Log,
            WsMessage::Progress { .. } => WsMessageType::Progress,
            WsMessage::Error { .. } => WsMessageType::Error,
            WsMessage::Done { .. } => WsMessageType::Done,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_progress_is_clamped() {
        assert!(matches!(WsMessage::progress(250), WsMessage::Progress { value: 100 }));
    }

    #[test]
    fn test_done_serialization() {
        let json = serde_json::to_value(WsMessage::done("abc", "/api/artifacts/abc.mp4")).unwrap();
        assert_eq!(json["type"], "done");
        assert_eq!(json["jobId"], "abc");
        assert_eq!(json["downloadUrl"], "/api/artifacts/abc.mp4");
    }

    #[test]
    fn test_error_serialization() {
        let json = serde_json::to_value(WsMessage::error("Operation cancelled")).unwrap();
        let mut keys: Vec<_> = json.as_object().unwrap().keys().cloned().collect();
        keys.sort();
        assert_eq!(keys, ["message", "timestamp", "type"]);
        assert_eq!(json["message"], "Operation cancelled");
    }

    #[test]
    fn test_message_type() {
        assert_eq!(WsMessage::log("x").message_type(), WsMessageType::Log);
        assert_eq!(WsMessage::error("x").message_type().as_str(), "error");
    }
}
