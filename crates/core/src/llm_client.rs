//! Completion clients for the text-generation backends.
//!
//! Each call serializes the supplied turns, followed by the current user text,
//! into the backend's request shape and issues exactly one HTTP request. There
//! is no retry, no caching and no internal timeout; callers that need a
//! deadline wrap the future themselves.

use crate::error::{CoachError, Result, ensure_success};
use crate::turn::{Role, Turn, flatten_turns};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::{debug, instrument};

/// Label a model sometimes echoes in front of the prospect's reply.
pub const PERSONA_LABEL: &str = "Prospect: ";

pub const GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const OPENAI_API_BASE: &str = "https://api.openai.com/v1";

/// A backend that turns an ordered conversation into the next reply.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait CompletionClient: Send + Sync {
    /// Sends `turns` followed by one user turn holding `user_text` and returns
    /// the generated text, with a leading persona label stripped once.
    async fn complete(&self, turns: &[Turn], user_text: &str) -> Result<String>;
}

/// Removes the literal `Prospect: ` prefix once, if and only if the text starts with it.
pub fn strip_persona_label(text: &str) -> &str {
    text.strip_prefix(PERSONA_LABEL).unwrap_or(text)
}

fn validate(turns: &[Turn], user_text: &str) -> Result<()> {
    if turns.is_empty() {
        return Err(CoachError::invalid("at least one prior turn is required"));
    }
    if user_text.trim().is_empty() {
        return Err(CoachError::invalid("user text must not be empty"));
    }
    Ok(())
}

fn finish(text: Option<String>, backend: &str) -> Result<String> {
    let text = text
        .filter(|t| !t.trim().is_empty())
        .ok_or_else(|| {
            CoachError::MalformedUpstreamResponse(format!("{backend} response contained no text"))
        })?;
    Ok(strip_persona_label(&text).to_string())
}

// --- Gemini ---

/// How the conversation is laid out in a Gemini request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum HistoryShape {
    /// One content entry per turn, roles mapped to `user` / `model`.
    #[default]
    Structured,
    /// A single user content holding every turn as `"<Label>: <text>\n\n"`.
    Flat,
}

impl FromStr for HistoryShape {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "structured" => Ok(Self::Structured),
            "flat" => Ok(Self::Flat),
            other => Err(format!("'{other}' is not one of 'structured' or 'flat'")),
        }
    }
}

#[derive(Serialize, Debug)]
struct GenerateContentRequest {
    contents: Vec<Content>,
}

#[derive(Serialize, Debug)]
struct Content {
    role: &'static str,
    parts: Vec<Part>,
}

#[derive(Serialize, Debug)]
struct Part {
    text: String,
}

#[derive(Deserialize, Debug)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Deserialize, Debug)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize, Debug)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize, Debug)]
struct CandidatePart {
    text: Option<String>,
}

fn gemini_contents(turns: &[Turn], user_text: &str, shape: HistoryShape) -> Vec<Content> {
    let content = |role, text: String| Content {
        role,
        parts: vec![Part { text }],
    };

    match shape {
        HistoryShape::Structured => turns
            .iter()
            .map(|turn| match turn.role() {
                Role::User => content("user", turn.text().to_string()),
                Role::Assistant => content("model", turn.text().to_string()),
                // Gemini has no system role in `contents`.
                Role::System => content("user", format!("{}: {}", Role::System.label(), turn.text())),
            })
            .chain(std::iter::once(content("user", user_text.to_string())))
            .collect(),
        HistoryShape::Flat => {
            let mut all = turns.to_vec();
            all.push(Turn::user(user_text));
            vec![content("user", flatten_turns(&all))]
        }
    }
}

fn parse_gemini_reply(body: &str) -> Result<String> {
    let response: GenerateContentResponse = serde_json::from_str(body)
        .map_err(|e| CoachError::MalformedUpstreamResponse(e.to_string()))?;
    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|c| c.content)
        .and_then(|c| c.parts.into_iter().next())
        .and_then(|p| p.text);
    finish(text, "Gemini")
}

/// Google Gemini `generateContent` client.
pub struct GeminiClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
    shape: HistoryShape,
}

impl GeminiClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model,
            base_url: GEMINI_API_BASE.to_string(),
            shape: HistoryShape::default(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_history_shape(mut self, shape: HistoryShape) -> Self {
        self.shape = shape;
        self
    }
}

#[async_trait]
impl CompletionClient for GeminiClient {
    #[instrument(name = "gemini_complete", skip_all, fields(model = %self.model, turns = turns.len()))]
    async fn complete(&self, turns: &[Turn], user_text: &str) -> Result<String> {
        validate(turns, user_text)?;

        let request = GenerateContentRequest {
            contents: gemini_contents(turns, user_text, self.shape),
        };
        let url = format!("{}/models/{}:generateContent", self.base_url, self.model);

        let response = self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(&request)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        debug!(bytes = body.len(), "Gemini responded");

        parse_gemini_reply(&body)
    }
}

// --- OpenAI-compatible chat completions ---

#[derive(Serialize, Debug)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Serialize, Debug)]
struct ChatMessage<'a> {
    role: Role,
    content: &'a str,
}

#[derive(Deserialize, Debug)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize, Debug)]
struct Choice {
    message: Option<ChoiceMessage>,
}

#[derive(Deserialize, Debug)]
struct ChoiceMessage {
    content: Option<String>,
}

fn parse_chat_reply(body: &str) -> Result<String> {
    let response: ChatResponse = serde_json::from_str(body)
        .map_err(|e| CoachError::MalformedUpstreamResponse(e.to_string()))?;
    let text = response
        .choices
        .into_iter()
        .next()
        .and_then(|c| c.message)
        .and_then(|m| m.content);
    finish(text, "Chat completion")
}

/// Client for any OpenAI-compatible `/chat/completions` endpoint.
pub struct OpenAiChatClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl OpenAiChatClient {
    pub fn new(api_key: String, model: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            model,
            base_url: OPENAI_API_BASE.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl CompletionClient for OpenAiChatClient {
    #[instrument(name = "chat_complete", skip_all, fields(model = %self.model, turns = turns.len()))]
    async fn complete(&self, turns: &[Turn], user_text: &str) -> Result<String> {
        validate(turns, user_text)?;

        let messages = turns
            .iter()
            .map(|turn| ChatMessage {
                role: turn.role(),
                content: turn.text(),
            })
            .chain(std::iter::once(ChatMessage {
                role: Role::User,
                content: user_text,
            }))
            .collect();
        let request = ChatRequest {
            model: &self.model,
            messages,
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;
        let body = ensure_success(response).await?.text().await?;
        debug!(bytes = body.len(), "Chat completion responded");

        parse_chat_reply(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{Json, Router, extract::Query, http::StatusCode, routing::post};
    use serde_json::{Value, json};
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    /// Serves `router` on an ephemeral local port and returns its base URL.
    async fn spawn_upstream(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn two_turn_history() -> Vec<Turn> {
        vec![
            Turn::system("You are a CTO."),
            Turn::assistant("Okay, I'm ready. What have you got for me?"),
        ]
    }

    #[test]
    fn test_strip_persona_label() {
        assert_eq!(strip_persona_label("Prospect: Hello"), "Hello");
        assert_eq!(strip_persona_label("Hello Prospect"), "Hello Prospect");
        assert_eq!(strip_persona_label("Prospect: Prospect: Hi"), "Prospect: Hi");
        assert_eq!(strip_persona_label(" Prospect: Hi"), " Prospect: Hi");
        assert_eq!(strip_persona_label("prospect: Hi"), "prospect: Hi");
    }

    #[test]
    fn test_history_shape_from_str() {
        assert_eq!("FLAT".parse::<HistoryShape>(), Ok(HistoryShape::Flat));
        assert_eq!("structured".parse::<HistoryShape>(), Ok(HistoryShape::Structured));
        assert!("nested".parse::<HistoryShape>().is_err());
    }

    #[test]
    fn test_gemini_structured_contents_map_roles() {
        let contents = gemini_contents(&two_turn_history(), "Hi there", HistoryShape::Structured);
        let json = serde_json::to_value(&contents).unwrap();
        assert_eq!(
            json,
            json!([
                {"role": "user", "parts": [{"text": "System: You are a CTO."}]},
                {"role": "model", "parts": [{"text": "Okay, I'm ready. What have you got for me?"}]},
                {"role": "user", "parts": [{"text": "Hi there"}]},
            ])
        );
    }

    #[test]
    fn test_gemini_flat_contents() {
        let contents = gemini_contents(&two_turn_history(), "Hi there", HistoryShape::Flat);
        assert_eq!(contents.len(), 1);
        assert_eq!(
            contents[0].parts[0].text,
            "System: You are a CTO.\n\nProspect: Okay, I'm ready. What have you got for me?\n\nUser: Hi there\n\n"
        );
    }

    #[test]
    fn test_parse_gemini_reply() {
        let body = r#"{"candidates":[{"content":{"role":"model","parts":[{"text":"Prospect: Why should I care?"}]}}]}"#;
        assert_eq!(parse_gemini_reply(body).unwrap(), "Why should I care?");
    }

    #[test]
    fn test_parse_gemini_reply_without_candidates_is_malformed() {
        let err = parse_gemini_reply(r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#).unwrap_err();
        assert!(matches!(err, CoachError::MalformedUpstreamResponse(_)));

        let err = parse_gemini_reply("not json").unwrap_err();
        assert!(matches!(err, CoachError::MalformedUpstreamResponse(_)));
    }

    #[test]
    fn test_parse_chat_reply() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"Sounds pricey."}}]}"#;
        assert_eq!(parse_chat_reply(body).unwrap(), "Sounds pricey.");

        let err = parse_chat_reply(r#"{"choices":[{"message":{"role":"assistant","content":null}}]}"#)
            .unwrap_err();
        assert!(matches!(err, CoachError::MalformedUpstreamResponse(_)));
    }

    #[tokio::test]
    async fn test_gemini_client_sends_history_in_order() {
        let captured: Arc<Mutex<Option<(HashMap<String, String>, Value)>>> = Arc::default();
        let sink = captured.clone();
        let router = Router::new().route(
            "/models/{model}",
            post(
                move |Query(query): Query<HashMap<String, String>>, Json(body): Json<Value>| {
                    let sink = sink.clone();
                    async move {
                        *sink.lock().unwrap() = Some((query, body));
                        Json(json!({
                            "candidates": [{"content": {"parts": [{"text": "Prospect: Go on."}]}}]
                        }))
                    }
                },
            ),
        );
        let base = spawn_upstream(router).await;

        let client = GeminiClient::new("test-key".into(), "gemini-1.5-flash".into()).with_base_url(base);
        let reply = client
            .complete(&two_turn_history(), "Hi, I'd like to show you our product")
            .await
            .unwrap();

        assert_eq!(reply, "Go on.");
        let (query, body) = captured.lock().unwrap().take().expect("request captured");
        assert_eq!(query.get("key").map(String::as_str), Some("test-key"));
        let contents = body["contents"].as_array().unwrap();
        assert_eq!(contents.len(), 3);
        assert_eq!(contents[1]["role"], "model");
        assert_eq!(contents[2]["parts"][0]["text"], "Hi, I'd like to show you our product");
    }

    #[tokio::test]
    async fn test_gemini_client_surfaces_rejection() {
        let router = Router::new().route(
            "/models/{model}",
            post(|| async { (StatusCode::FORBIDDEN, r#"{"error":{"message":"API key not valid"}}"#) }),
        );
        let base = spawn_upstream(router).await;

        let client = GeminiClient::new("bad".into(), "gemini-1.5-flash".into()).with_base_url(base);
        let err = client.complete(&two_turn_history(), "Hello").await.unwrap_err();

        assert_eq!(
            err,
            CoachError::UpstreamRejected {
                status: 403,
                body: r#"{"error":{"message":"API key not valid"}}"#.to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_openai_client_sends_native_roles() {
        let captured: Arc<Mutex<Option<Value>>> = Arc::default();
        let sink = captured.clone();
        let router = Router::new().route(
            "/chat/completions",
            post(move |Json(body): Json<Value>| {
                let sink = sink.clone();
                async move {
                    *sink.lock().unwrap() = Some(body);
                    Json(json!({"choices": [{"message": {"role": "assistant", "content": "Tell me more."}}]}))
                }
            }),
        );
        let base = spawn_upstream(router).await;

        let client = OpenAiChatClient::new("sk-test".into(), "gpt-4o".into()).with_base_url(format!("{base}/"));
        let reply = client.complete(&two_turn_history(), "Hi").await.unwrap();

        assert_eq!(reply, "Tell me more.");
        let body = captured.lock().unwrap().take().unwrap();
        assert_eq!(body["model"], "gpt-4o");
        let roles: Vec<&str> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap())
            .collect();
        assert_eq!(roles, vec!["system", "assistant", "user"]);
    }

    #[tokio::test]
    async fn test_unreachable_upstream_is_unavailable() {
        // Nothing listens on port 9 of the loopback interface.
        let client = OpenAiChatClient::new("sk".into(), "gpt-4o".into()).with_base_url("http://127.0.0.1:9");
        let err = client.complete(&two_turn_history(), "Hi").await.unwrap_err();
        assert!(matches!(err, CoachError::UpstreamUnavailable(_)));
    }

    #[tokio::test]
    async fn test_invalid_input_issues_no_call() {
        let client = OpenAiChatClient::new("sk".into(), "gpt-4o".into()).with_base_url("http://127.0.0.1:9");
        let err = client.complete(&[], "Hi").await.unwrap_err();
        assert!(matches!(err, CoachError::InvalidRequest(_)));

        let err = client.complete(&two_turn_history(), "   ").await.unwrap_err();
        assert!(matches!(err, CoachError::InvalidRequest(_)));
    }
}
