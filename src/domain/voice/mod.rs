//! Voice Context - 音色限界上下文
//!
//! 职责:
//! - 角色（Persona）定义
//! - 角色 -> 合成音色映射
//! - 音频输出与语音参数

mod errors;
mod value_objects;
mod voice_map;

pub use errors::VoiceError;
pub use value_objects::{AudioConfig, AudioFormat, Persona, VoiceProfile, VoiceSettings};
pub use voice_map::VoiceMap;
