//! Voice Context - Value Objects

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use super::VoiceError;

/// 聊天角色
///
/// 每个角色对应一个独立的合成音色。既接受角色名（companion/mentor/interviewer），
/// 也接受原有的人物名（mitra/guru/parikshak）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Persona {
    /// 陪伴者（Mitra）
    Companion,
    /// 导师（Guru）
    Mentor,
    /// 面试官（Parikshak）
    Interviewer,
}

impl Persona {
    pub const ALL: [Persona; 3] = [Persona::Companion, Persona::Mentor, Persona::Interviewer];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Companion => "companion",
            Self::Mentor => "mentor",
            Self::Interviewer => "interviewer",
        }
    }

    /// 人物名（前端与提示词中使用）
    pub fn character_name(&self) -> &'static str {
        match self {
            Self::Companion => "mitra",
            Self::Mentor => "guru",
            Self::Interviewer => "parikshak",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "companion" | "mitra" => Some(Self::Companion),
            "mentor" | "guru" => Some(Self::Mentor),
            "interviewer" | "parikshak" => Some(Self::Interviewer),
            _ => None,
        }
    }
}

impl FromStr for Persona {
    type Err = VoiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| VoiceError::UnknownPersona(s.to_string()))
    }
}

impl std::fmt::Display for Persona {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// 音色配置 - 角色到合成音色的映射条目
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VoiceProfile {
    pub persona: Persona,
    pub voice_id: String,
    pub language: String,
    pub gender: String,
    pub description: String,
}

impl VoiceProfile {
    /// 内置的默认音色
    pub fn builtin(persona: Persona) -> Self {
        let (voice_id, language, gender, description) = match persona {
            Persona::Companion => (
                "hi-IN-shweta",
                "Hindi",
                "Female",
                "Warm, caring friend voice in Hindi",
            ),
            Persona::Mentor => (
                "en-IN-eashwar",
                "English (India)",
                "Male",
                "Professional, knowledgeable mentor voice",
            ),
            Persona::Interviewer => (
                "en-IN-isha",
                "English (India)",
                "Female",
                "Clear, professional evaluator voice",
            ),
        };

        Self {
            persona,
            voice_id: voice_id.to_string(),
            language: language.to_string(),
            gender: gender.to_string(),
            description: description.to_string(),
        }
    }

    /// 替换音色 ID，其余元数据保持内置值
    pub fn with_voice_id(mut self, voice_id: impl Into<String>) -> Self {
        self.voice_id = voice_id.into();
        self
    }
}

/// 音频格式（与服务商协商）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AudioFormat {
    #[default]
    Wav,
    Mp3,
    Pcm,
}

impl AudioFormat {
    /// 服务商 HTTP 接口使用的大写格式名
    pub fn provider_name(&self) -> &'static str {
        match self {
            Self::Wav => "WAV",
            Self::Mp3 => "MP3",
            Self::Pcm => "PCM",
        }
    }

    pub fn content_type(&self) -> &'static str {
        match self {
            Self::Wav => "audio/wav",
            Self::Mp3 => "audio/mpeg",
            Self::Pcm => "audio/pcm",
        }
    }
}

/// 音频输出参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AudioConfig {
    #[serde(default)]
    pub format: AudioFormat,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default = "default_channels")]
    pub channels: u8,
}

fn default_sample_rate() -> u32 {
    44100
}

fn default_channels() -> u8 {
    1
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            format: AudioFormat::Wav,
            sample_rate: default_sample_rate(),
            channels: default_channels(),
        }
    }
}

/// 合成语音参数
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// 语速 (0.5 - 2.0)
    #[serde(default = "default_speed")]
    pub speed: f32,
    /// 音调 (-12 - 12)
    #[serde(default)]
    pub pitch: i8,
    /// 强调程度
    #[serde(default = "default_emphasis")]
    pub emphasis: String,
}

fn default_speed() -> f32 {
    1.0
}

fn default_emphasis() -> String {
    "moderate".to_string()
}

impl Default for VoiceSettings {
    fn default() -> Self {
        Self {
            speed: default_speed(),
            pitch: 0,
            emphasis: default_emphasis(),
        }
    }
}

impl VoiceSettings {
    pub fn validate(&self) -> Result<(), &'static str> {
        if !(0.5..=2.0).contains(&self.speed) {
            return Err("speed must be between 0.5 and 2.0");
        }
        if !(-12..=12).contains(&self.pitch) {
            return Err("pitch must be between -12 and 12");
        }
        Ok(())
    }
}
