//! Voice Handlers

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::application::{
    ListProviderVoices, ListVoiceProfiles, ProviderVoice, ValidateVoices, VoiceValidationReport,
};
use crate::infrastructure::http::dto::{ApiResponse, VoiceProfileResponse};
use crate::infrastructure::http::state::AppState;

// ============================================================================
// Configured profiles
// ============================================================================

pub async fn list_voice_profiles(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<VoiceProfileResponse>>> {
    let default_persona = state.voices.default_persona();
    let profiles = state
        .list_profiles_handler
        .handle(ListVoiceProfiles)
        .into_iter()
        .map(|p| VoiceProfileResponse {
            persona: p.persona.as_str().to_string(),
            character: p.persona.character_name().to_string(),
            is_default: p.persona == default_persona,
            voice_id: p.voice_id,
            language: p.language,
            gender: p.gender,
            description: p.description,
        })
        .collect();

    Json(ApiResponse::success(profiles))
}

// ============================================================================
// Provider catalog
// ============================================================================

pub async fn list_provider_voices(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<Vec<ProviderVoice>>> {
    let voices = state
        .list_provider_voices_handler
        .handle(ListProviderVoices)
        .await;
    Json(ApiResponse::success(voices))
}

// ============================================================================
// Validation
// ============================================================================

pub async fn validate_voices(
    State(state): State<Arc<AppState>>,
) -> Json<ApiResponse<VoiceValidationReport>> {
    let report = state.validate_voices_handler.handle(ValidateVoices).await;
    Json(ApiResponse::success(report))
}
