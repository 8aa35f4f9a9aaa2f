//! Speech Handlers

use axum::{
    body::Body,
    extract::State,
    http::{header, StatusCode},
    response::Response,
    Json,
};
use std::sync::Arc;

use crate::application::{ClientStatus, GetSpeechStatus, SwitchVoice, SynthesizeSpeech};
use crate::infrastructure::http::dto::{
    ApiResponse, SwitchVoiceRequest, SwitchVoiceResponseDto, SynthesizeRequest,
};
use crate::infrastructure::http::error::ApiError;
use crate::infrastructure::http::state::AppState;

// ============================================================================
// Status
// ============================================================================

pub async fn speech_status(State(state): State<Arc<AppState>>) -> Json<ApiResponse<ClientStatus>> {
    let status = state.speech_status_handler.handle(GetSpeechStatus).await;
    Json(ApiResponse::success(status))
}

// ============================================================================
// Switch Voice
// ============================================================================

pub async fn switch_voice(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SwitchVoiceRequest>,
) -> Json<ApiResponse<SwitchVoiceResponseDto>> {
    let result = state
        .switch_voice_handler
        .handle(SwitchVoice {
            persona: req.persona,
        })
        .await;

    Json(ApiResponse::success(SwitchVoiceResponseDto {
        switched: result.switched,
        voice_id: result.voice_id,
    }))
}

// ============================================================================
// Synthesize
// ============================================================================

pub async fn synthesize(
    State(state): State<Arc<AppState>>,
    Json(req): Json<SynthesizeRequest>,
) -> Result<Response, ApiError> {
    let persona = req
        .persona
        .unwrap_or_else(|| state.voices.default_persona().as_str().to_string());
    let cmd = SynthesizeSpeech {
        text: req.text,
        user_id: req.user_id,
        persona,
        context_id: req.context_id,
    };

    let result = state.synthesize_handler.handle(cmd).await?;

    Response::builder()
        .status(StatusCode::OK)
        .header(header::CONTENT_TYPE, result.content_type)
        .header(header::CONTENT_LENGTH, result.audio_data.len())
        .header("x-voice-id", result.voice_id)
        .header("x-audio-chunks", result.chunks)
        .body(Body::from(result.audio_data))
        .map_err(|e| ApiError::Internal(e.to_string()))
}
