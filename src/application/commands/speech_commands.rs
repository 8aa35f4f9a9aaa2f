//! Speech Commands

/// 合成整段语音命令
#[derive(Debug, Clone)]
pub struct SynthesizeSpeech {
    pub text: String,
    pub user_id: String,
    pub persona: String,
    pub context_id: Option<String>,
}

/// 切换音色命令
#[derive(Debug, Clone)]
pub struct SwitchVoice {
    pub persona: String,
}
