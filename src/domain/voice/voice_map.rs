//! Voice Map - 角色到合成音色的静态映射
//!
//! 进程启动时构建，之后只读。未识别的角色回退到默认角色的音色。

use serde::Serialize;

use super::{Persona, VoiceError, VoiceProfile};

/// 角色音色映射表
///
/// 不变量:
/// - 每个 Persona 恰好一个 VoiceProfile
/// - default_persona 一定存在于表中
#[derive(Debug, Clone, Serialize)]
pub struct VoiceMap {
    profiles: Vec<VoiceProfile>,
    default_persona: Persona,
}

impl Default for VoiceMap {
    fn default() -> Self {
        Self::builtin()
    }
}

impl VoiceMap {
    /// 内置映射，默认角色为 Companion
    pub fn builtin() -> Self {
        Self {
            profiles: Persona::ALL.iter().map(|p| VoiceProfile::builtin(*p)).collect(),
            default_persona: Persona::Companion,
        }
    }

    /// 由配置构建映射
    pub fn new(profiles: Vec<VoiceProfile>, default_persona: Persona) -> Result<Self, VoiceError> {
        let map = Self {
            profiles,
            default_persona,
        };
        map.validate()?;
        Ok(map)
    }

    pub fn default_persona(&self) -> Persona {
        self.default_persona
    }

    pub fn profiles(&self) -> &[VoiceProfile] {
        &self.profiles
    }

    /// 按角色查找
    pub fn get(&self, persona: Persona) -> Option<&VoiceProfile> {
        self.profiles.iter().find(|p| p.persona == persona)
    }

    /// 默认音色
    pub fn default_profile(&self) -> &VoiceProfile {
        // validate() 保证默认角色存在；构造路径之外无法修改 profiles
        self.get(self.default_persona)
            .unwrap_or(&self.profiles[0])
    }

    /// 解析角色字符串，未识别时回退到默认音色
    pub fn profile_for(&self, persona: &str) -> &VoiceProfile {
        match Persona::parse(persona).and_then(|p| self.get(p)) {
            Some(profile) => profile,
            None => {
                tracing::debug!(
                    persona = %persona,
                    default = %self.default_persona,
                    "Unknown persona, using default voice"
                );
                self.default_profile()
            }
        }
    }

    pub fn voice_id_for(&self, persona: &str) -> &str {
        &self.profile_for(persona).voice_id
    }

    /// 反向查找：音色 ID -> 音色配置
    pub fn profile_by_voice_id(&self, voice_id: &str) -> Option<&VoiceProfile> {
        self.profiles.iter().find(|p| p.voice_id == voice_id)
    }

    /// 校验映射完整性
    pub fn validate(&self) -> Result<(), VoiceError> {
        for persona in Persona::ALL {
            let profile = self
                .get(persona)
                .ok_or(VoiceError::MissingProfile(persona))?;
            if profile.voice_id.trim().is_empty() {
                return Err(VoiceError::EmptyVoiceId(persona));
            }
        }
        Ok(())
    }
}
