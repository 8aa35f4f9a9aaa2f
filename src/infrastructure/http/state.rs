//! Application State
//!
//! 包含流式合成客户端与所有 Command/Query Handlers

use std::sync::Arc;

use crate::application::{
    // Command handlers
    SwitchVoiceHandler, SynthesizeSpeechHandler,
    // Query handlers
    GetSpeechStatusHandler, ListProviderVoicesHandler, ListVoiceProfilesHandler,
    ValidateVoicesHandler,
    // Services & ports
    SpeechSessionClient, TtsEnginePort,
};
use crate::domain::voice::{AudioFormat, VoiceMap};

/// 应用状态
pub struct AppState {
    // ========== Services ==========
    pub client: SpeechSessionClient,
    pub voices: Arc<VoiceMap>,
    pub tts_engine: Arc<dyn TtsEnginePort>,

    // ========== Command Handlers ==========
    pub synthesize_handler: SynthesizeSpeechHandler,
    pub switch_voice_handler: SwitchVoiceHandler,

    // ========== Query Handlers ==========
    pub list_profiles_handler: ListVoiceProfilesHandler,
    pub list_provider_voices_handler: ListProviderVoicesHandler,
    pub validate_voices_handler: ValidateVoicesHandler,
    pub speech_status_handler: GetSpeechStatusHandler,
}

impl AppState {
    /// 创建应用状态
    pub fn new(
        client: SpeechSessionClient,
        voices: Arc<VoiceMap>,
        tts_engine: Arc<dyn TtsEnginePort>,
        audio_format: AudioFormat,
        api_key_configured: bool,
    ) -> Self {
        Self {
            client: client.clone(),
            voices: voices.clone(),
            tts_engine: tts_engine.clone(),

            // Command handlers
            synthesize_handler: SynthesizeSpeechHandler::new(
                client.clone(),
                audio_format.content_type(),
            ),
            switch_voice_handler: SwitchVoiceHandler::new(client.clone()),

            // Query handlers
            list_profiles_handler: ListVoiceProfilesHandler::new(voices.clone()),
            list_provider_voices_handler: ListProviderVoicesHandler::new(tts_engine.clone()),
            validate_voices_handler: ValidateVoicesHandler::new(
                tts_engine.clone(),
                voices.clone(),
                api_key_configured,
            ),
            speech_status_handler: GetSpeechStatusHandler::new(client),
        }
    }
}
