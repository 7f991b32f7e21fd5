//! Keyboard shortcuts for the sketch pad.
//!
//! | Keys                      | Action            |
//! |---------------------------|-------------------|
//! | Ctrl/Cmd+Z                | undo              |
//! | Ctrl/Cmd+Shift+Z          | redo              |
//! | Ctrl/Cmd+Y                | redo              |
//! | `b` / `e`                 | pen / eraser      |
//! | `g`                       | toggle grid       |
//! | `[` / `]`                 | width -2 / +2     |
//!
//! Nothing fires while a text field has focus.

use loremap_core::KeyEvent;

use crate::state::{Tool, LINE_WIDTH_STEP};

/// An action bound to a key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shortcut {
    /// Step back in history.
    Undo,
    /// Step forward in history.
    Redo,
    /// Switch tool.
    SelectTool(Tool),
    /// Show or hide the grid overlay.
    ToggleGrid,
    /// Change the stroke width by this amount.
    AdjustWidth(i32),
}

/// Map a key press to its shortcut.
#[must_use]
pub fn resolve(event: &KeyEvent) -> Option<Shortcut> {
    if event.in_text_field {
        return None;
    }
    let key = event.key.as_str();

    if event.modifiers.command() {
        // Shift turns the reported key into "Z" on most layouts.
        return match key.to_ascii_lowercase().as_str() {
            "z" if event.modifiers.shift => Some(Shortcut::Redo),
            "z" => Some(Shortcut::Undo),
            "y" => Some(Shortcut::Redo),
            _ => None,
        };
    }

    match key {
        "b" | "B" => Some(Shortcut::SelectTool(Tool::Pen)),
        "e" | "E" => Some(Shortcut::SelectTool(Tool::Eraser)),
        "g" | "G" => Some(Shortcut::ToggleGrid),
        "[" => Some(Shortcut::AdjustWidth(-LINE_WIDTH_STEP)),
        "]" => Some(Shortcut::AdjustWidth(LINE_WIDTH_STEP)),
        _ => None,
    }
}
