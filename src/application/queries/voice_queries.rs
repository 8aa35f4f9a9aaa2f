//! Voice Queries

/// 列出本地角色音色映射
#[derive(Debug, Clone)]
pub struct ListVoiceProfiles;

/// 列出服务商音色目录
#[derive(Debug, Clone)]
pub struct ListProviderVoices;

/// 校验音色配置（凭证 + 目录 + 角色音色）
#[derive(Debug, Clone)]
pub struct ValidateVoices;

/// 查询流式客户端状态
#[derive(Debug, Clone)]
pub struct GetSpeechStatus;
