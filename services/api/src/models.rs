//! API Models
//!
//! Request and response bodies for the REST API, annotated for OpenAPI
//! generation with `utoipa`. Conversions into the core types live here so
//! handlers stay thin.

use chrono::{DateTime, Utc};
use pitchperfect_core::{
    CoachError, feedback::FeedbackReport, scenario::Preset, scenario::Scenario, turn::Role,
    turn::Turn,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    #[serde(alias = "model")]
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl From<MessageRole> for Role {
    fn from(role: MessageRole) -> Self {
        match role {
            MessageRole::System => Role::System,
            MessageRole::User => Role::User,
            MessageRole::Assistant => Role::Assistant,
        }
    }
}

impl From<Role> for MessageRole {
    fn from(role: Role) -> Self {
        match role {
            Role::System => MessageRole::System,
            Role::User => MessageRole::User,
            Role::Assistant => MessageRole::Assistant,
        }
    }
}

/// One message of a conversation history.
#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
pub struct ChatMessage {
    #[schema(value_type = String, example = "user")]
    pub role: MessageRole,
    pub content: String,
}

impl From<&ChatMessage> for Turn {
    fn from(message: &ChatMessage) -> Self {
        Turn::new(message.role.into(), message.content.clone())
    }
}

impl From<&Turn> for ChatMessage {
    fn from(turn: &Turn) -> Self {
        Self {
            role: turn.role().into(),
            content: turn.text().to_string(),
        }
    }
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioPayload {
    #[serde(alias = "product")]
    #[schema(example = "CloudSecure Pro")]
    pub product_name: String,
    #[schema(example = "IT Director at a Fortune 500 company")]
    pub prospect_type: String,
    #[schema(example = "Book a demo meeting")]
    pub goal: String,
}

impl TryFrom<ScenarioPayload> for Scenario {
    type Error = CoachError;

    fn try_from(payload: ScenarioPayload) -> Result<Self, Self::Error> {
        Scenario::new(payload.product_name, payload.prospect_type, payload.goal)
    }
}

impl From<&Scenario> for ScenarioPayload {
    fn from(scenario: &Scenario) -> Self {
        Self {
            product_name: scenario.product_name().to_string(),
            prospect_type: scenario.prospect_type().to_string(),
            goal: scenario.goal().to_string(),
        }
    }
}

#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct ScenarioPreset {
    #[schema(example = "cold_outreach")]
    pub key: String,
    pub scenario: ScenarioPayload,
}

impl From<&Preset> for ScenarioPreset {
    fn from(preset: &Preset) -> Self {
        Self {
            key: preset.key.to_string(),
            scenario: ScenarioPayload::from(&preset.scenario()),
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct ChatRequest {
    /// Required when `history` is empty.
    pub scenario: Option<ScenarioPayload>,
    #[serde(default)]
    pub history: Vec<ChatMessage>,
    #[schema(example = "Hi, I'm calling about CloudSecure Pro.")]
    pub message: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct ChatResponse {
    pub response: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct TtsRequest {
    #[schema(example = "Okay, I'm ready. What have you got for me?")]
    pub text: String,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct FeedbackRequest {
    pub conversation: String,
    pub scenario: ScenarioPayload,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackResponse {
    pub transcript: String,
    pub metrics: String,
    pub key_moments: String,
    pub strengths: String,
    pub recommendations: String,
}

impl From<FeedbackReport> for FeedbackResponse {
    fn from(report: FeedbackReport) -> Self {
        Self {
            transcript: report.transcript,
            metrics: report.metrics,
            key_moments: report.key_moments,
            strengths: report.strengths,
            recommendations: report.recommendations,
        }
    }
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct CreateSessionPayload {
    pub scenario: ScenarioPayload,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub scenario: ScenarioPayload,
    pub opening_line: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Serialize, Deserialize, ToSchema, Debug, Clone)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[schema(value_type = String, format = Uuid)]
    pub id: Uuid,
    pub scenario: ScenarioPayload,
    pub turns: Vec<ChatMessage>,
    pub transcript: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Deserialize, ToSchema, Debug)]
pub struct TurnPayload {
    #[schema(example = "We cut breach response time in half.")]
    pub text: String,
}

#[derive(Serialize, Deserialize, ToSchema, Debug)]
pub struct TurnReply {
    pub reply: String,
}

/// Which backends are configured. Key values are never reported.
#[derive(Serialize, Deserialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    pub google_api_key_present: bool,
    pub openai_api_key_present: bool,
    pub eleven_labs_api_key_present: bool,
    pub eleven_labs_voice_id_present: bool,
    #[schema(example = "gemini")]
    pub provider: String,
    #[schema(example = "gemini-1.5-flash")]
    pub model: String,
    pub active_sessions: usize,
}

#[derive(Serialize, ToSchema, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub message: String,
    /// Status code returned by the upstream service, when it rejected the call.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub upstream_status: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            upstream_status: None,
            details: None,
        }
    }
}
