//! Voice Query Handlers

use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use crate::application::ports::{ProviderVoice, TtsEnginePort};
use crate::application::queries::{
    GetSpeechStatus, ListProviderVoices, ListVoiceProfiles, ValidateVoices,
};
use crate::application::services::{ClientStatus, SpeechSessionClient};
use crate::domain::voice::{VoiceMap, VoiceProfile};

// ============================================================================
// Response DTOs
// ============================================================================

/// 单个角色音色的校验结果
#[derive(Debug, Clone, Serialize)]
pub struct PersonaVoiceCheck {
    pub voice_id: String,
    pub available: bool,
}

/// 音色配置校验报告
#[derive(Debug, Clone, Serialize)]
pub struct VoiceValidationReport {
    pub api_key_configured: bool,
    pub voices_available: bool,
    pub total_voices: usize,
    pub indian_voices: usize,
    pub persona_voices: BTreeMap<String, PersonaVoiceCheck>,
}

impl VoiceValidationReport {
    pub fn working_count(&self) -> usize {
        self.persona_voices.values().filter(|c| c.available).count()
    }
}

// ============================================================================
// Handlers
// ============================================================================

/// ListVoiceProfiles Handler
pub struct ListVoiceProfilesHandler {
    voices: Arc<VoiceMap>,
}

impl ListVoiceProfilesHandler {
    pub fn new(voices: Arc<VoiceMap>) -> Self {
        Self { voices }
    }

    pub fn handle(&self, _query: ListVoiceProfiles) -> Vec<VoiceProfile> {
        self.voices.profiles().to_vec()
    }
}

/// ListProviderVoices Handler
///
/// 目录不可用时返回空列表
pub struct ListProviderVoicesHandler {
    tts_engine: Arc<dyn TtsEnginePort>,
}

impl ListProviderVoicesHandler {
    pub fn new(tts_engine: Arc<dyn TtsEnginePort>) -> Self {
        Self { tts_engine }
    }

    pub async fn handle(&self, _query: ListProviderVoices) -> Vec<ProviderVoice> {
        match self.tts_engine.list_voices().await {
            Ok(voices) => voices,
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch provider voices");
                Vec::new()
            }
        }
    }
}

/// ValidateVoices Handler
///
/// 检查凭证、服务商目录，以及每个角色的音色是否在目录中
pub struct ValidateVoicesHandler {
    tts_engine: Arc<dyn TtsEnginePort>,
    voices: Arc<VoiceMap>,
    api_key_configured: bool,
}

impl ValidateVoicesHandler {
    pub fn new(
        tts_engine: Arc<dyn TtsEnginePort>,
        voices: Arc<VoiceMap>,
        api_key_configured: bool,
    ) -> Self {
        Self {
            tts_engine,
            voices,
            api_key_configured,
        }
    }

    pub async fn handle(&self, _query: ValidateVoices) -> VoiceValidationReport {
        let mut report = VoiceValidationReport {
            api_key_configured: self.api_key_configured,
            voices_available: false,
            total_voices: 0,
            indian_voices: 0,
            persona_voices: BTreeMap::new(),
        };

        let catalog = if self.api_key_configured {
            match self.tts_engine.list_voices().await {
                Ok(voices) => voices,
                Err(e) => {
                    tracing::error!(error = %e, "Voice catalog unavailable during validation");
                    Vec::new()
                }
            }
        } else {
            tracing::warn!("TTS API key not configured, skipping catalog check");
            Vec::new()
        };

        report.total_voices = catalog.len();
        report.voices_available = !catalog.is_empty();
        report.indian_voices = catalog.iter().filter(|v| v.is_indian()).count();

        // 目录中被角色映射引用的音色
        let mapped: HashSet<&str> = catalog
            .iter()
            .filter_map(|v| self.voices.profile_by_voice_id(&v.voice_id))
            .map(|p| p.voice_id.as_str())
            .collect();

        for profile in self.voices.profiles() {
            let available = mapped.contains(profile.voice_id.as_str());
            report.persona_voices.insert(
                profile.persona.as_str().to_string(),
                PersonaVoiceCheck {
                    voice_id: profile.voice_id.clone(),
                    available,
                },
            );
        }

        tracing::info!(
            api_key = report.api_key_configured,
            total_voices = report.total_voices,
            indian_voices = report.indian_voices,
            working = report.working_count(),
            personas = report.persona_voices.len(),
            "Voice configuration validated"
        );

        report
    }
}

/// GetSpeechStatus Handler
pub struct GetSpeechStatusHandler {
    client: SpeechSessionClient,
}

impl GetSpeechStatusHandler {
    pub fn new(client: SpeechSessionClient) -> Self {
        Self { client }
    }

    pub async fn handle(&self, _query: GetSpeechStatus) -> ClientStatus {
        self.client.status().await
    }
}
