//! Localized user-facing messages.

use crate::state::Language;

/// Messages shown to the user outside of remote error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserMessage {
    /// Generation requested with an empty request field.
    NoRequest,
    /// Edit requested with a blank instruction.
    NoEditPrompt,
    /// Premium model selected but no credential was granted.
    CredentialRequired,
    /// Remote side refused the call for authorization reasons.
    AccessDenied,
    /// Microphone permission refused.
    MicrophoneDenied,
    /// Speech recognition unavailable on this platform.
    SpeechUnsupported,
    /// Imported file is not a project document.
    InvalidProject,
}

impl UserMessage {
    /// Text in the given language.
    #[must_use]
    pub const fn text(self, language: Language) -> &'static str {
        match (self, language) {
            (Self::NoRequest, Language::En) => "Please enter a request prompt.",
            (Self::NoRequest, Language::Ru) => "Пожалуйста, введите запрос.",
            (Self::NoEditPrompt, Language::En) => "Please describe the edit.",
            (Self::NoEditPrompt, Language::Ru) => "Опишите, что нужно изменить.",
            (Self::CredentialRequired, Language::En) => {
                "API Key selection required for this model."
            }
            (Self::CredentialRequired, Language::Ru) => {
                "Для этой модели необходимо выбрать API-ключ."
            }
            (Self::AccessDenied, Language::En) => {
                "Access denied or Key missing. Please check your API Key selection."
            }
            (Self::AccessDenied, Language::Ru) => {
                "Доступ запрещен или ключ отсутствует. Проверьте выбор API-ключа."
            }
            (Self::MicrophoneDenied, Language::En) => {
                "Microphone access denied. Please allow permission."
            }
            (Self::MicrophoneDenied, Language::Ru) => "Доступ к микрофону запрещен.",
            (Self::SpeechUnsupported, Language::En) => {
                "Speech recognition is not supported on this platform."
            }
            (Self::SpeechUnsupported, Language::Ru) => {
                "Распознавание речи не поддерживается на этой платформе."
            }
            (Self::InvalidProject, Language::En) => "Invalid project file format.",
            (Self::InvalidProject, Language::Ru) => "Неверный формат файла проекта.",
        }
    }
}
