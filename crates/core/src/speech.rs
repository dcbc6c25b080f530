//! Speech synthesis relay.
//!
//! Text goes out, audio bytes come back verbatim. No transcoding, caching or
//! streaming: one whole-buffer request per call.

use crate::error::{CoachError, Result, ensure_success};
use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, header::ACCEPT};
use serde::Serialize;
use tracing::{debug, instrument};

pub const ELEVENLABS_API_BASE: &str = "https://api.elevenlabs.io/v1";
pub const DEFAULT_TTS_MODEL: &str = "eleven_multilingual_v2";

/// MIME type of the audio the relay asks for.
pub const AUDIO_MIME: &str = "audio/mpeg";

const STABILITY: f32 = 0.5;
const SIMILARITY_BOOST: f32 = 0.75;

/// A backend that turns text into spoken audio.
#[cfg_attr(any(test, feature = "mocks"), mockall::automock)]
#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    async fn synthesize(&self, text: &str) -> Result<Bytes>;
}

#[derive(Serialize, Debug)]
struct TextToSpeechRequest<'a> {
    text: &'a str,
    model_id: &'a str,
    voice_settings: VoiceSettings,
}

#[derive(Serialize, Debug)]
struct VoiceSettings {
    stability: f32,
    similarity_boost: f32,
}

/// ElevenLabs text-to-speech client with a fixed voice.
pub struct ElevenLabsClient {
    http: Client,
    api_key: String,
    voice_id: String,
    model_id: String,
    base_url: String,
}

impl ElevenLabsClient {
    pub fn new(api_key: String, voice_id: String) -> Self {
        Self {
            http: Client::new(),
            api_key,
            voice_id,
            model_id: DEFAULT_TTS_MODEL.to_string(),
            base_url: ELEVENLABS_API_BASE.to_string(),
        }
    }

    pub fn with_model(mut self, model_id: impl Into<String>) -> Self {
        self.model_id = model_id.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl SpeechSynthesizer for ElevenLabsClient {
    #[instrument(name = "tts_synthesize", skip_all, fields(voice = %self.voice_id, chars = text.len()))]
    async fn synthesize(&self, text: &str) -> Result<Bytes> {
        if text.trim().is_empty() {
            return Err(CoachError::invalid("text to synthesize must not be empty"));
        }

        let request = TextToSpeechRequest {
            text,
            model_id: &self.model_id,
            voice_settings: VoiceSettings {
                stability: STABILITY,
                similarity_boost: SIMILARITY_BOOST,
            },
        };

        let response = self
            .http
            .post(format!("{}/text-to-speech/{}", self.base_url, self.voice_id))
            .header(ACCEPT, AUDIO_MIME)
            .header("xi-api-key", &self.api_key)
            .json(&request)
            .send()
            .await?;
        let audio = ensure_success(response).await?.bytes().await?;

        if audio.is_empty() {
            return Err(CoachError::MalformedUpstreamResponse(
                "speech service returned no audio".to_string(),
            ));
        }
        debug!(bytes = audio.len(), "Synthesized speech");
        Ok(audio)
    }
}
