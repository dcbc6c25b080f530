//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds the coach facade,
//! the session registry and the loaded configuration.

use crate::{
    config::{Config, Provider},
    sessions::SessionStore,
};
use anyhow::Context;
use pitchperfect_core::{
    PitchCoach,
    llm_client::{CompletionClient, GeminiClient, OpenAiChatClient},
    speech::{ElevenLabsClient, SpeechSynthesizer},
};
use std::sync::Arc;
use tracing::info;

/// The shared application state, created once at startup and passed to all handlers.
#[derive(Clone)]
pub struct AppState {
    pub coach: PitchCoach,
    pub sessions: SessionStore,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(coach: PitchCoach, config: Config) -> Self {
        Self {
            coach,
            sessions: SessionStore::new(config.session_ttl),
            config: Arc::new(config),
        }
    }
}

/// Builds the coach from the configured completion and speech backends.
pub fn build_coach(config: &Config) -> anyhow::Result<PitchCoach> {
    let completion: Arc<dyn CompletionClient> = match config.provider {
        Provider::Gemini => {
            info!(history_shape = ?config.history_shape, "Using Gemini provider.");
            let api_key = config
                .google_api_key
                .clone()
                .context("GOOGLE_API_KEY is required for the gemini provider")?;
            Arc::new(
                GeminiClient::new(api_key, config.chat_model.clone())
                    .with_base_url(config.gemini_api_base.clone())
                    .with_history_shape(config.history_shape),
            )
        }
        Provider::OpenAI => {
            info!("Using OpenAI provider.");
            let api_key = config
                .openai_api_key
                .clone()
                .context("OPENAI_API_KEY is required for the openai provider")?;
            Arc::new(
                OpenAiChatClient::new(api_key, config.chat_model.clone())
                    .with_base_url(config.openai_api_base.clone()),
            )
        }
    };

    let speech: Option<Arc<dyn SpeechSynthesizer>> =
        match (&config.elevenlabs_api_key, &config.elevenlabs_voice_id) {
            (Some(api_key), Some(voice_id)) => {
                info!(model = %config.elevenlabs_model, "Speech synthesis enabled.");
                Some(Arc::new(
                    ElevenLabsClient::new(api_key.clone(), voice_id.clone())
                        .with_model(config.elevenlabs_model.clone())
                        .with_base_url(config.elevenlabs_api_base.clone()),
                ))
            }
            _ => {
                info!("ElevenLabs key or voice id missing. Speech synthesis disabled.");
                None
            }
        };

    Ok(PitchCoach::new(completion, speech))
}
