//! Method and notification names of the Droid stream-jsonrpc dialect

/// Create a fresh session
pub const INITIALIZE_SESSION: &str = "droid.initialize_session";

/// Switch the process to a previously created session
pub const LOAD_SESSION: &str = "droid.load_session";

/// Patch the session settings
pub const UPDATE_SESSION_SETTINGS: &str = "droid.update_session_settings";

/// Submit user input, starting a turn
pub const ADD_USER_MESSAGE: &str = "droid.add_user_message";

/// Ask the engine to stop the current turn
pub const INTERRUPT_SESSION: &str = "droid.interrupt_session";

/// Envelope method of every session notification
pub const SESSION_NOTIFICATION: &str = "droid.session_notification";

/// Inbound: the engine wants permission to run a tool
pub const REQUEST_PERMISSION: &str = "droid.request_permission";

/// Inbound: the engine asks the user a question
pub const ASK_USER: &str = "droid.ask_user";

/// Notification sub-types carried in `params.notification.type`
pub mod notification {
    /// Streamed assistant text
    pub const ASSISTANT_TEXT_DELTA: &str = "assistant_text_delta";
    /// Tool invocation
    pub const TOOL_USE: &str = "tool_use";
    /// Tool result
    pub const TOOL_RESULT: &str = "tool_result";
    /// Tool progress
    pub const TOOL_PROGRESS: &str = "tool_progress_update";
    /// Working state change
    pub const WORKING_STATE_CHANGED: &str = "droid_working_state_changed";
    /// Error
    pub const ERROR: &str = "error";
    /// A pending permission request was resolved
    pub const PERMISSION_RESOLVED: &str = "permission_resolved";
    /// Settings changed
    pub const SETTINGS_UPDATED: &str = "settings_updated";
    /// Token usage changed
    pub const TOKEN_USAGE_CHANGED: &str = "session_token_usage_changed";
    /// Auxiliary service (MCP) status
    pub const MCP_STATUS_CHANGED: &str = "mcp_status_changed";
    /// Auxiliary service (MCP) needs authentication
    pub const MCP_AUTH_REQUIRED: &str = "mcp_auth_required";

    /// Working state reported when no turn is running
    pub const IDLE_STATE: &str = "idle";
}
