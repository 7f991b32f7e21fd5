//! Input events for sketching and dictation.

use serde::{Deserialize, Serialize};

/// Phase of a pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PointerPhase {
    /// Button or finger down.
    Down,
    /// Pointer moved.
    Move,
    /// Button or finger released.
    Up,
    /// Gesture cancelled by the platform.
    Cancel,
    /// Pointer left the surface.
    Leave,
}

impl PointerPhase {
    /// Whether this phase ends a gesture.
    #[must_use]
    pub const fn ends_gesture(self) -> bool {
        matches!(self, Self::Up | Self::Cancel | Self::Leave)
    }
}

/// A pointer event in client (display) coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointerEvent {
    /// Phase of this event.
    pub phase: PointerPhase,
    /// Pointer identifier (for capture).
    pub pointer_id: u32,
    /// X position in client coordinates.
    pub client_x: f32,
    /// Y position in client coordinates.
    pub client_y: f32,
}

impl PointerEvent {
    /// Create a pointer event for the primary pointer.
    #[must_use]
    pub const fn new(phase: PointerPhase, client_x: f32, client_y: f32) -> Self {
        Self {
            phase,
            pointer_id: 0,
            client_x,
            client_y,
        }
    }
}

/// Keyboard modifiers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[allow(clippy::struct_excessive_bools)]
pub struct KeyModifiers {
    /// Shift key pressed.
    pub shift: bool,
    /// Control key pressed.
    pub ctrl: bool,
    /// Alt/Option key pressed.
    pub alt: bool,
    /// Meta/Command key pressed.
    pub meta: bool,
}

impl KeyModifiers {
    /// Ctrl on most platforms, Cmd on macOS.
    #[must_use]
    pub const fn command(self) -> bool {
        self.ctrl || self.meta
    }
}

/// A key press.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEvent {
    /// Key value as reported by the platform (`"z"`, `"["`, ...).
    pub key: String,
    /// Active modifier keys.
    pub modifiers: KeyModifiers,
    /// Focus is inside a text input; shortcuts are suppressed.
    pub in_text_field: bool,
}

impl KeyEvent {
    /// A plain key press outside any text field.
    #[must_use]
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: KeyModifiers::default(),
            in_text_field: false,
        }
    }

    /// A key press with modifiers, outside any text field.
    #[must_use]
    pub fn with_modifiers(key: impl Into<String>, modifiers: KeyModifiers) -> Self {
        Self {
            key: key.into(),
            modifiers,
            in_text_field: false,
        }
    }
}

/// One recognized speech segment.
///
/// Interim segments may still change; final segments are stable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptSegment {
    /// The recognized text.
    pub transcript: String,
    /// Confidence score (0.0 to 1.0).
    pub confidence: f32,
    /// Whether this is a final (committed) result.
    pub is_final: bool,
}

impl TranscriptSegment {
    /// Create an interim (non-final) segment.
    #[must_use]
    pub fn interim(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            transcript: transcript.into(),
            confidence,
            is_final: false,
        }
    }

    /// Create a final segment.
    #[must_use]
    pub fn final_result(transcript: impl Into<String>, confidence: f32) -> Self {
        Self {
            transcript: transcript.into(),
            confidence,
            is_final: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gesture_ending_phases() {
        assert!(PointerPhase::Up.ends_gesture());
        assert!(PointerPhase::Cancel.ends_gesture());
        assert!(PointerPhase::Leave.ends_gesture());
        assert!(!PointerPhase::Down.ends_gesture());
        assert!(!PointerPhase::Move.ends_gesture());
    }

    #[test]
    fn test_command_modifier() {
        let meta = KeyModifiers {
            meta: true,
            ..KeyModifiers::default()
        };
        assert!(meta.command());
        assert!(!KeyModifiers::default().command());
    }

    #[test]
    fn test_pointer_event_serialization() {
        let event = PointerEvent::new(PointerPhase::Move, 10.0, 20.0);
        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("\"phase\":\"move\""));
    }
}
