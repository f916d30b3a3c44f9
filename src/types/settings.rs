//! Session settings sent to the engine
//!
//! The same structure is used for the initial settings of
//! `initialize_session` and as a patch for `update_session_settings`: every
//! field is optional and absent fields are left untouched by the engine.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// How much the agent may do without asking
///
/// This is the interaction mode negotiated at initialization time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AutonomyLevel {
    /// Read-only and low-risk edits
    #[serde(rename = "auto-low")]
    Low,
    /// Reversible changes
    #[serde(rename = "auto-medium")]
    Medium,
    /// Everything, including irreversible commands
    #[serde(rename = "auto-high")]
    High,
}

impl AutonomyLevel {
    /// Wire representation
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "auto-low",
            Self::Medium => "auto-medium",
            Self::High => "auto-high",
        }
    }
}

/// Session settings / settings patch
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Model to use
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model_id: Option<String>,
    /// Interaction mode
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub autonomy_level: Option<AutonomyLevel>,
    /// Reasoning effort hint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reasoning_effort: Option<String>,
    /// Engine settings this crate does not model, passed through verbatim
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl SessionSettings {
    /// Create a new builder for `SessionSettings`
    #[must_use]
    pub fn builder() -> SessionSettingsBuilder {
        SessionSettingsBuilder::default()
    }

    /// True when nothing would be sent
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.model_id.is_none()
            && self.autonomy_level.is_none()
            && self.reasoning_effort.is_none()
            && self.extra.is_empty()
    }

    /// Serialize as a JSON object suitable for flattening into params
    #[must_use]
    pub fn to_params(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}

/// Builder for [`SessionSettings`]
#[derive(Debug, Default)]
pub struct SessionSettingsBuilder {
    settings: SessionSettings,
}

impl SessionSettingsBuilder {
    /// Set the model
    #[must_use]
    pub fn model_id(mut self, model: impl Into<String>) -> Self {
        self.settings.model_id = Some(model.into());
        self
    }

    /// Set the autonomy level
    #[must_use]
    pub fn autonomy_level(mut self, level: AutonomyLevel) -> Self {
        self.settings.autonomy_level = Some(level);
        self
    }

    /// Set the reasoning effort
    #[must_use]
    pub fn reasoning_effort(mut self, effort: impl Into<String>) -> Self {
        self.settings.reasoning_effort = Some(effort.into());
        self
    }

    /// Add an engine setting not modelled here
    #[must_use]
    pub fn extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.settings.extra.insert(key.into(), value);
        self
    }

    /// Build the settings
    #[must_use]
    pub fn build(self) -> SessionSettings {
        self.settings
    }
}
