//! Canvas state: tool settings and the bitmap undo/redo history.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::surface::{RasterSnapshot, BACKGROUND_COLOR};

/// Maximum number of history entries kept.
pub const MAX_HISTORY: usize = 50;

/// Thinnest stroke.
pub const MIN_LINE_WIDTH: u32 = 1;

/// Thickest stroke.
pub const MAX_LINE_WIDTH: u32 = 50;

/// Width at start-up.
pub const DEFAULT_LINE_WIDTH: u32 = 5;

/// Amount `[` and `]` change the width by.
pub const LINE_WIDTH_STEP: i32 = 2;

/// Pen colour at start-up.
pub const DEFAULT_COLOR: &str = "#ffffff";

/// Drawing tools.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Tool {
    /// Free-hand stroke in the current colour.
    #[default]
    Pen,
    /// Free-hand stroke in the background colour.
    Eraser,
    /// Rectangle outline.
    Rect,
    /// Circle outline.
    Circle,
    /// Straight line.
    Line,
}

impl Tool {
    /// Tools that redraw a whole shape from a snapshot on every move.
    #[must_use]
    pub const fn is_preview(self) -> bool {
        matches!(self, Self::Rect | Self::Circle | Self::Line)
    }
}

/// One undo step: the pixels plus their encoded form.
#[derive(Debug, Clone)]
pub struct HistoryEntry {
    /// Full-surface capture.
    pub snapshot: Arc<RasterSnapshot>,
    /// PNG data URI of the same pixels.
    pub encoded: Arc<str>,
}

impl HistoryEntry {
    /// Wrap a capture and its encoding.
    #[must_use]
    pub fn new(snapshot: RasterSnapshot, encoded: impl Into<Arc<str>>) -> Self {
        Self {
            snapshot: Arc::new(snapshot),
            encoded: encoded.into(),
        }
    }
}

/// Everything the canvas toolbar and history need.
///
/// Values are treated as immutable once stored; history entries are shared
/// between successive states through `Arc`.
#[derive(Debug, Clone)]
pub struct CanvasState {
    /// Active tool.
    pub tool: Tool,
    /// Stroke width, always in `MIN_LINE_WIDTH..=MAX_LINE_WIDTH`.
    pub line_width: u32,
    /// Pen colour as a CSS colour string.
    pub color: String,
    /// Undo history, oldest first.
    pub history: Vec<HistoryEntry>,
    /// Index of the visible entry; `None` until the first push.
    pub history_step: Option<usize>,
    /// Encoded image of the visible entry, or a sketch waiting to be loaded.
    pub current_serialized: Option<Arc<str>>,
    /// Grid overlay visible.
    pub show_grid: bool,
}

impl Default for CanvasState {
    fn default() -> Self {
        Self {
            tool: Tool::Pen,
            line_width: DEFAULT_LINE_WIDTH,
            color: DEFAULT_COLOR.to_string(),
            history: Vec::new(),
            history_step: None,
            current_serialized: None,
            show_grid: false,
        }
    }
}

impl CanvasState {
    /// The entry currently shown.
    #[must_use]
    pub fn current_entry(&self) -> Option<&HistoryEntry> {
        self.history_step.and_then(|i| self.history.get(i))
    }

    /// Whether `undo` would move.
    #[must_use]
    pub fn can_undo(&self) -> bool {
        self.history_step.is_some_and(|i| i > 0)
    }

    /// Whether `redo` would move.
    #[must_use]
    pub fn can_redo(&self) -> bool {
        self.history_step.is_some_and(|i| i + 1 < self.history.len())
    }

    /// Record a new step.
    ///
    /// Drops any redo tail, appends, evicts the oldest entry past
    /// [`MAX_HISTORY`], and moves to the new last entry.
    pub fn push_history(&mut self, entry: HistoryEntry) {
        let keep = self.history_step.map_or(0, |i| i + 1);
        self.history.truncate(keep);
        self.current_serialized = Some(Arc::clone(&entry.encoded));
        self.history.push(entry);
        if self.history.len() > MAX_HISTORY {
            let excess = self.history.len() - MAX_HISTORY;
            self.history.drain(..excess);
        }
        self.history_step = Some(self.history.len() - 1);
    }

    /// Step back. Returns `false` at the first entry.
    pub fn undo(&mut self) -> bool {
        match self.history_step {
            Some(i) if i > 0 => {
                self.move_to(i - 1);
                true
            }
            _ => false,
        }
    }

    /// Step forward. Returns `false` at the last entry.
    pub fn redo(&mut self) -> bool {
        match self.history_step {
            Some(i) if i + 1 < self.history.len() => {
                self.move_to(i + 1);
                true
            }
            _ => false,
        }
    }

    fn move_to(&mut self, step: usize) {
        self.history_step = Some(step);
        self.current_serialized = self.history.get(step).map(|e| Arc::clone(&e.encoded));
    }

    /// Forget all history so the engine re-initialises from `serialized`.
    pub fn reset_history(&mut self, serialized: Option<Arc<str>>) {
        self.history.clear();
        self.history_step = None;
        self.current_serialized = serialized;
    }

    /// Set the stroke width, clamped to the allowed range.
    pub fn set_line_width(&mut self, width: u32) {
        self.line_width = width.clamp(MIN_LINE_WIDTH, MAX_LINE_WIDTH);
    }

    /// Change the stroke width by `delta`, clamped.
    pub fn nudge_line_width(&mut self, delta: i32) {
        let next = i64::from(self.line_width) + i64::from(delta);
        let clamped = next.clamp(i64::from(MIN_LINE_WIDTH), i64::from(MAX_LINE_WIDTH));
        self.line_width = u32::try_from(clamped).unwrap_or(MIN_LINE_WIDTH);
    }

    /// Colour the active tool strokes with.
    #[must_use]
    pub fn stroke_color(&self) -> &str {
        if self.tool == Tool::Eraser {
            BACKGROUND_COLOR
        } else {
            &self.color
        }
    }
}
