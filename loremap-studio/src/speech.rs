//! Speech input for the request field.
//!
//! Platform recognizers implement [`SpeechRecognizer`] and report back through
//! the `on_*` callbacks of [`SpeechAdapter`]. Each recognition event carries
//! every segment of the session so far, so the request is rebuilt from the
//! text captured at start plus all segments rather than appended to; final
//! segments are never duplicated.

use std::sync::{Arc, Mutex, PoisonError};

use loremap_core::{AppState, Language, Store, TranscriptSegment, UserMessage};
use thiserror::Error;
use tracing::{debug, warn};

/// Recognizer error code for a refused microphone permission.
pub const NOT_ALLOWED: &str = "not-allowed";

/// Errors from starting a recognizer.
#[derive(Debug, Error)]
pub enum SpeechError {
    /// No recognizer on this platform.
    #[error("speech recognition is not supported")]
    Unsupported,

    /// The recognizer refused to start.
    #[error("speech recognizer failed to start: {0}")]
    Start(String),
}

/// Continuous recognizer with interim results.
pub trait SpeechRecognizer: Send + Sync {
    /// Begin recognition in `locale` (e.g. `ru-RU`).
    ///
    /// # Errors
    ///
    /// Returns [`SpeechError`] if recognition cannot begin.
    fn start(&self, locale: &str) -> Result<(), SpeechError>;

    /// Stop recognition. The recognizer reports `on_end` when done.
    fn stop(&self);
}

/// Feeds recognizer output into the app state.
pub struct SpeechAdapter {
    app: Store<AppState>,
    recognizer: Option<Box<dyn SpeechRecognizer>>,
    session: Mutex<Option<Session>>,
}

#[derive(Debug, Clone)]
struct Session {
    prefix: String,
    language: Language,
}

impl std::fmt::Debug for SpeechAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpeechAdapter")
            .field("supported", &self.recognizer.is_some())
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl SpeechAdapter {
    /// Adapter over `recognizer`; `None` means the platform has none.
    pub fn new(app: Store<AppState>, recognizer: Option<Box<dyn SpeechRecognizer>>) -> Self {
        Self {
            app,
            recognizer,
            session: Mutex::new(None),
        }
    }

    /// Start listening if idle, stop if listening.
    pub fn toggle(&self) {
        let state = self.app.get_state();
        if state.is_listening {
            self.stop();
        } else {
            self.start(state.language, &state.location_request);
        }
    }

    /// Start a recognition session. Text already in the request is kept in
    /// front of whatever is dictated.
    pub fn start(&self, language: Language, current_text: &str) {
        let Some(recognizer) = self.recognizer.as_ref() else {
            self.app.patch(|s| {
                s.error = Some(UserMessage::SpeechUnsupported.text(language).to_string());
            });
            return;
        };

        let trimmed = current_text.trim();
        let prefix = if trimmed.is_empty() {
            String::new()
        } else {
            format!("{trimmed} ")
        };
        *self.session.lock().unwrap_or_else(PoisonError::into_inner) =
            Some(Session { prefix, language });

        let locale = language.speech_locale();
        debug!(locale, "Starting speech recognition");
        if let Err(e) = recognizer.start(locale) {
            warn!(error = %e, "Speech recognition did not start");
            *self.session.lock().unwrap_or_else(PoisonError::into_inner) = None;
        }
    }

    /// Ask the recognizer to stop.
    pub fn stop(&self) {
        if let Some(recognizer) = self.recognizer.as_ref() {
            recognizer.stop();
        }
    }

    /// Recognition began.
    pub fn on_start(&self) {
        self.app.update(|s| {
            if s.is_listening {
                return Arc::clone(s);
            }
            let mut next = AppState::clone(s);
            next.is_listening = true;
            Arc::new(next)
        });
    }

    /// New recognition results: every segment of the session so far.
    pub fn on_result(&self, segments: &[TranscriptSegment]) {
        let prefix = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|session| session.prefix.clone())
            .unwrap_or_default();
        let transcript: String = segments.iter().map(|s| s.transcript.as_str()).collect();
        self.app.patch(|s| s.location_request = format!("{prefix}{transcript}"));
    }

    /// Recognition ended.
    pub fn on_end(&self) {
        self.session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.app.patch(|s| s.is_listening = false);
    }

    /// Recognition failed with a platform error code.
    pub fn on_error(&self, code: &str) {
        warn!(code, "Speech recognition error");
        let language = self
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map_or_else(|| self.app.get_state().language, |session| session.language);
        self.app.patch(|s| {
            s.is_listening = false;
            s.error = (code == NOT_ALLOWED)
                .then(|| UserMessage::MicrophoneDenied.text(language).to_string());
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default)]
    struct Recorder {
        calls: Arc<Mutex<Vec<String>>>,
    }

    impl SpeechRecognizer for Recorder {
        fn start(&self, locale: &str) -> Result<(), SpeechError> {
            self.calls.lock().unwrap().push(format!("start {locale}"));
            Ok(())
        }

        fn stop(&self) {
            self.calls.lock().unwrap().push("stop".into());
        }
    }

    fn adapter() -> (SpeechAdapter, Arc<Mutex<Vec<String>>>) {
        let recorder = Recorder::default();
        let calls = Arc::clone(&recorder.calls);
        let app = Store::new(AppState::default());
        (SpeechAdapter::new(app, Some(Box::new(recorder))), calls)
    }

    #[test]
    fn test_toggle_uses_state_language() {
        let (adapter, calls) = adapter();
        adapter.toggle();
        adapter.on_start();
        adapter.toggle();
        assert_eq!(*calls.lock().unwrap(), vec!["start ru-RU", "stop"]);
    }

    #[test]
    fn test_unsupported_platform() {
        let app = Store::new(AppState::default());
        let adapter = SpeechAdapter::new(app.clone(), None);
        adapter.start(Language::En, "");
        assert_eq!(
            app.get_state().error.as_deref(),
            Some(UserMessage::SpeechUnsupported.text(Language::En))
        );
        assert!(!app.get_state().is_listening);
    }
}
