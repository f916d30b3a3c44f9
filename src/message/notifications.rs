//! Typed view of session notifications
//!
//! The engine wraps every session update in a single
//! `droid.session_notification` envelope whose `params.notification.type`
//! selects the sub-type. Events always forward the raw params untouched;
//! this module only interprets them.

use serde_json::Value;

use crate::protocol::methods::notification as kind;

/// Engine working state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkingState {
    /// No turn is running
    Idle,
    /// Any other reported state (streaming, executing tools, ...)
    Busy(String),
}

impl WorkingState {
    /// Parse the `newState` string
    #[must_use]
    pub fn from_wire(state: &str) -> Self {
        if state == kind::IDLE_STATE {
            Self::Idle
        } else {
            Self::Busy(state.to_string())
        }
    }

    /// Whether this is the idle state
    #[must_use]
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }
}

/// Interpreted notification payload
#[derive(Debug, Clone, PartialEq)]
pub enum SessionNotification {
    /// Streamed assistant text
    AssistantTextDelta {
        /// Assistant message the delta belongs to
        message_id: Option<String>,
        /// Text fragment
        text_delta: String,
    },
    /// Tool invocation
    ToolUse(Value),
    /// Tool result
    ToolResult(Value),
    /// Tool progress
    ToolProgress(Value),
    /// Working state change
    WorkingStateChanged(WorkingState),
    /// Engine-reported error
    Error {
        /// Best-effort error message
        message: String,
    },
    /// A permission request was resolved
    PermissionResolved(Value),
    /// Settings changed
    SettingsUpdated(Value),
    /// Token usage changed
    TokenUsageChanged(Value),
    /// Auxiliary service status
    McpStatusChanged(Value),
    /// Auxiliary service requires authentication
    McpAuthRequired(Value),
    /// Sub-type this crate does not know
    Other {
        /// The `type` discriminator, if any
        kind: Option<String>,
        /// The untouched payload
        payload: Value,
    },
}

impl SessionNotification {
    /// Interpret the params of a `droid.session_notification`
    ///
    /// Returns `None` when there is no `notification` object to interpret.
    #[must_use]
    pub fn from_params(params: &Value) -> Option<Self> {
        let payload = params.get("notification")?;
        if !payload.is_object() {
            return None;
        }
        let str_field = |name: &str| payload.get(name).and_then(Value::as_str);

        let notification = match str_field("type") {
            Some(kind::ASSISTANT_TEXT_DELTA) => Self::AssistantTextDelta {
                message_id: str_field("messageId").map(String::from),
                text_delta: str_field("textDelta").unwrap_or_default().to_string(),
            },
            Some(kind::TOOL_USE) => Self::ToolUse(payload.clone()),
            Some(kind::TOOL_RESULT) => Self::ToolResult(payload.clone()),
            Some(kind::TOOL_PROGRESS) => Self::ToolProgress(payload.clone()),
            Some(kind::WORKING_STATE_CHANGED) => match str_field("newState") {
                Some(state) => Self::WorkingStateChanged(WorkingState::from_wire(state)),
                None => Self::other(payload),
            },
            Some(kind::ERROR) => Self::Error {
                message: error_message(payload),
            },
            Some(kind::PERMISSION_RESOLVED) => Self::PermissionResolved(payload.clone()),
            Some(kind::SETTINGS_UPDATED) => Self::SettingsUpdated(payload.clone()),
            Some(kind::TOKEN_USAGE_CHANGED) => Self::TokenUsageChanged(payload.clone()),
            Some(kind::MCP_STATUS_CHANGED) => Self::McpStatusChanged(payload.clone()),
            Some(kind::MCP_AUTH_REQUIRED) => Self::McpAuthRequired(payload.clone()),
            _ => Self::other(payload),
        };
        Some(notification)
    }

    fn other(payload: &Value) -> Self {
        Self::Other {
            kind: payload.get("type").and_then(Value::as_str).map(String::from),
            payload: payload.clone(),
        }
    }
}

fn error_message(payload: &Value) -> String {
    if let Some(msg) = payload.get("message").and_then(Value::as_str) {
        return msg.to_string();
    }
    match payload.get("error") {
        Some(Value::String(msg)) => msg.clone(),
        Some(err) => err
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| err.to_string(), String::from),
        None => "engine reported an error".to_string(),
    }
}
