//! Voice Context - Errors

use thiserror::Error;

use super::Persona;

#[derive(Debug, Error)]
pub enum VoiceError {
    #[error("Unknown persona: {0}")]
    UnknownPersona(String),

    #[error("Missing voice profile for persona: {0}")]
    MissingProfile(Persona),

    #[error("Empty voice id for persona: {0}")]
    EmptyVoiceId(Persona),
}
