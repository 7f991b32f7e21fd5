//! The sketch engine: turns pointer and key input into pixels and history.
//!
//! [`CanvasEngine`] owns the raster surface and drives a shared
//! [`Store<CanvasState>`]. Every finished gesture, import, clear, undo or redo
//! is reported to the registered commit hooks with the encoded image of the
//! now-visible surface; that is the only channel through which the sketch
//! leaves this crate.

use std::sync::Arc;

use loremap_core::{KeyEvent, PointerEvent, PointerPhase, Store};
use tiny_skia::{Color, Pixmap};
use tracing::{debug, warn};

use crate::codec;
use crate::error::CanvasResult;
use crate::shortcut::{self, Shortcut};
use crate::state::{CanvasState, HistoryEntry, Tool};
use crate::surface::{
    parse_color, Brush, Point, RasterSnapshot, Shape, Surface, BACKGROUND_COLOR, CANVAS_HEIGHT,
    CANVAS_WIDTH,
};

/// Where the surface is shown, in client coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DisplayRect {
    /// Left edge.
    pub left: f32,
    /// Top edge.
    pub top: f32,
    /// Displayed width.
    pub width: f32,
    /// Displayed height.
    pub height: f32,
}

impl DisplayRect {
    /// A display rectangle.
    #[must_use]
    pub const fn new(left: f32, top: f32, width: f32, height: f32) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }
}

/// Receives the encoded sketch after every committed change.
pub type CommitHook = Box<dyn Fn(Arc<str>) + Send + Sync>;

struct Gesture {
    pointer_id: u32,
    tool: Tool,
    brush: Brush,
    start: Point,
    last: Point,
    /// Pixels under a preview shape, restored before each redraw.
    base: Option<RasterSnapshot>,
}

/// Raster sketch pad with bitmap undo/redo.
pub struct CanvasEngine {
    store: Store<CanvasState>,
    surface: Surface,
    display: DisplayRect,
    gesture: Option<Gesture>,
    painted: Option<Arc<RasterSnapshot>>,
    commit_hooks: Vec<CommitHook>,
}

impl CanvasEngine {
    /// Create an 800×800 engine bound to `store`.
    ///
    /// Nothing is drawn until [`refresh`](Self::refresh) is called, so commit
    /// hooks registered in between also see the initial entry.
    ///
    /// # Errors
    ///
    /// Fails only if the background colour or surface cannot be created.
    pub fn new(store: Store<CanvasState>) -> CanvasResult<Self> {
        Self::with_size(store, CANVAS_WIDTH, CANVAS_HEIGHT)
    }

    /// Create an engine with a custom surface size.
    ///
    /// # Errors
    ///
    /// Returns an error for zero dimensions.
    #[allow(clippy::cast_precision_loss)]
    pub fn with_size(store: Store<CanvasState>, width: u32, height: u32) -> CanvasResult<Self> {
        let surface = Surface::new(width, height, parse_color(BACKGROUND_COLOR)?)?;
        Ok(Self {
            store,
            surface,
            display: DisplayRect::new(0.0, 0.0, width as f32, height as f32),
            gesture: None,
            painted: None,
            commit_hooks: Vec::new(),
        })
    }

    /// The state store this engine drives.
    #[must_use]
    pub fn store(&self) -> &Store<CanvasState> {
        &self.store
    }

    /// Current surface.
    #[must_use]
    pub fn surface(&self) -> &Surface {
        &self.surface
    }

    /// Register a hook for committed changes.
    pub fn on_commit<F>(&mut self, hook: F)
    where
        F: Fn(Arc<str>) + Send + Sync + 'static,
    {
        self.commit_hooks.push(Box::new(hook));
    }

    /// Tell the engine where the surface is displayed.
    pub fn set_display_rect(&mut self, rect: DisplayRect) {
        self.display = rect;
    }

    /// Convert client coordinates to surface pixels, scaling each axis by
    /// `surface / displayed`.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn to_surface(&self, client_x: f32, client_y: f32) -> Point {
        let scale = |surface: u32, shown: f32| {
            if shown > 0.0 {
                surface as f32 / shown
            } else {
                1.0
            }
        };
        (
            (client_x - self.display.left) * scale(self.surface.width(), self.display.width),
            (client_y - self.display.top) * scale(self.surface.height(), self.display.height),
        )
    }

    /// Bring the surface in line with the store.
    ///
    /// With no history yet, the surface is initialised from the pending
    /// serialized sketch (or filled with the background) and that becomes
    /// the first entry. Otherwise the visible entry is repainted if it is
    /// not already on screen.
    ///
    /// # Errors
    ///
    /// Returns an error only if the initial entry cannot be encoded.
    pub fn refresh(&mut self) -> CanvasResult<()> {
        let state = self.store.get_state();
        if state.current_entry().is_some() {
            self.repaint(&state);
            return Ok(());
        }

        self.gesture = None;
        self.surface.fill_background();
        if let Some(serialized) = state.current_serialized.as_ref() {
            match codec::decode_data_uri(serialized) {
                Ok(pixmap) => {
                    self.surface.draw_at_origin(&pixmap);
                    debug!(
                        width = pixmap.width(),
                        height = pixmap.height(),
                        "Canvas initialised from stored sketch"
                    );
                    self.push_entry(Arc::clone(serialized));
                    return Ok(());
                }
                Err(e) => warn!(error = %e, "Stored sketch unreadable, starting blank"),
            }
        }
        self.commit()
    }

    fn repaint(&mut self, state: &CanvasState) {
        let Some(entry) = state.current_entry() else {
            return;
        };
        let on_screen = self
            .painted
            .as_ref()
            .is_some_and(|p| Arc::ptr_eq(p, &entry.snapshot));
        if !on_screen {
            self.surface.restore(&entry.snapshot);
            self.painted = Some(Arc::clone(&entry.snapshot));
        }
    }

    /// Feed one pointer event.
    ///
    /// While a gesture is active, events from other pointers are ignored.
    ///
    /// # Errors
    ///
    /// Returns an error if the finished gesture cannot be encoded.
    pub fn handle_pointer(&mut self, event: &PointerEvent) -> CanvasResult<()> {
        let point = self.to_surface(event.client_x, event.client_y);
        match event.phase {
            PointerPhase::Down => {
                self.begin_gesture(event.pointer_id, point);
                Ok(())
            }
            PointerPhase::Move => {
                self.continue_gesture(event.pointer_id, point);
                Ok(())
            }
            PointerPhase::Up | PointerPhase::Cancel | PointerPhase::Leave => {
                self.end_gesture(event.pointer_id)
            }
        }
    }

    /// Whether a stroke or shape is in progress.
    #[must_use]
    pub fn is_drawing(&self) -> bool {
        self.gesture.is_some()
    }

    fn begin_gesture(&mut self, pointer_id: u32, point: Point) {
        if self.gesture.is_some() {
            return;
        }
        let state = self.store.get_state();
        let color = parse_color(state.stroke_color()).unwrap_or_else(|e| {
            warn!(error = %e, "Falling back to white");
            Color::WHITE
        });
        #[allow(clippy::cast_precision_loss)]
        let brush = Brush {
            color,
            width: state.line_width as f32,
        };
        let base = state.tool.is_preview().then(|| self.surface.snapshot());
        self.gesture = Some(Gesture {
            pointer_id,
            tool: state.tool,
            brush,
            start: point,
            last: point,
            base,
        });
    }

    fn continue_gesture(&mut self, pointer_id: u32, point: Point) {
        let Some(gesture) = self.gesture.as_mut() else {
            return;
        };
        if gesture.pointer_id != pointer_id {
            return;
        }
        match gesture.tool {
            Tool::Pen | Tool::Eraser => {
                self.surface.stroke_segment(gesture.last, point, &gesture.brush);
            }
            Tool::Rect | Tool::Circle | Tool::Line => {
                if let Some(base) = gesture.base.as_ref() {
                    self.surface.restore(base);
                }
                let shape = match gesture.tool {
                    Tool::Rect => Shape::Rect {
                        from: gesture.start,
                        to: point,
                    },
                    Tool::Circle => Shape::Circle {
                        center: gesture.start,
                        edge: point,
                    },
                    _ => Shape::Line {
                        from: gesture.start,
                        to: point,
                    },
                };
                self.surface.stroke_shape(shape, &gesture.brush);
            }
        }
        gesture.last = point;
    }

    fn end_gesture(&mut self, pointer_id: u32) -> CanvasResult<()> {
        match self.gesture.as_ref() {
            Some(gesture) if gesture.pointer_id == pointer_id => {
                self.gesture = None;
                self.commit()
            }
            _ => Ok(()),
        }
    }

    /// Capture the surface as a new history entry and announce it.
    fn commit(&mut self) -> CanvasResult<()> {
        let encoded: Arc<str> = self.surface.encode()?.into();
        self.push_entry(encoded);
        Ok(())
    }

    fn push_entry(&mut self, encoded: Arc<str>) {
        let entry = HistoryEntry::new(self.surface.snapshot(), Arc::clone(&encoded));
        self.painted = Some(Arc::clone(&entry.snapshot));
        self.store.patch(|s| s.push_history(entry));
        debug!(step = ?self.store.get_state().history_step, "Canvas history pushed");
        self.emit(&encoded);
    }

    fn emit(&self, encoded: &Arc<str>) {
        for hook in &self.commit_hooks {
            hook(Arc::clone(encoded));
        }
    }

    /// Step back one entry. Returns `false` at the oldest entry.
    pub fn undo(&mut self) -> bool {
        self.step(CanvasState::can_undo, CanvasState::undo)
    }

    /// Step forward one entry. Returns `false` at the newest entry.
    pub fn redo(&mut self) -> bool {
        self.step(CanvasState::can_redo, CanvasState::redo)
    }

    fn step(
        &mut self,
        allowed: fn(&CanvasState) -> bool,
        apply: fn(&mut CanvasState) -> bool,
    ) -> bool {
        if self.gesture.is_some() {
            return false;
        }
        let moved = self.store.update(|s| {
            if !allowed(s) {
                return Arc::clone(s);
            }
            let mut next = CanvasState::clone(s);
            apply(&mut next);
            Arc::new(next)
        });
        if moved {
            let state = self.store.get_state();
            self.repaint(&state);
            if let Some(encoded) = state.current_serialized.as_ref() {
                self.emit(encoded);
            }
        }
        moved
    }

    /// Resolve and apply a key press. Returns the shortcut that fired.
    pub fn handle_key(&mut self, event: &KeyEvent) -> Option<Shortcut> {
        let shortcut = shortcut::resolve(event)?;
        self.apply(shortcut);
        Some(shortcut)
    }

    /// Apply a shortcut action.
    pub fn apply(&mut self, shortcut: Shortcut) {
        match shortcut {
            Shortcut::Undo => {
                self.undo();
            }
            Shortcut::Redo => {
                self.redo();
            }
            Shortcut::SelectTool(tool) => self.set_tool(tool),
            Shortcut::ToggleGrid => self.toggle_grid(),
            Shortcut::AdjustWidth(delta) => self.store.patch(|s| s.nudge_line_width(delta)),
        }
    }

    /// Switch tool.
    pub fn set_tool(&mut self, tool: Tool) {
        self.store.update(|s| {
            if s.tool == tool {
                return Arc::clone(s);
            }
            let mut next = CanvasState::clone(s);
            next.tool = tool;
            Arc::new(next)
        });
    }

    /// Choose a pen colour. Picking a colour also selects the pen.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CanvasError::InvalidColor`] for unparseable colours.
    pub fn set_color(&mut self, color: &str) -> CanvasResult<()> {
        parse_color(color)?;
        self.store.patch(|s| {
            s.color = color.trim().to_string();
            s.tool = Tool::Pen;
        });
        Ok(())
    }

    /// Set the stroke width, clamped to `1..=50`.
    pub fn set_line_width(&mut self, width: u32) {
        self.store.patch(|s| s.set_line_width(width));
    }

    /// Show or hide the grid overlay.
    pub fn toggle_grid(&mut self) {
        self.store.patch(|s| s.show_grid = !s.show_grid);
    }

    /// Fill with the background colour as a new, undoable step.
    ///
    /// # Errors
    ///
    /// Returns an error if the result cannot be encoded.
    pub fn clear(&mut self) -> CanvasResult<()> {
        self.gesture = None;
        self.surface.fill_background();
        self.commit()
    }

    /// Fit an uploaded image onto the surface as a new history step.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a supported image.
    pub fn import_image(&mut self, bytes: &[u8]) -> CanvasResult<()> {
        let pixmap = codec::decode_image(bytes)?;
        self.gesture = None;
        self.surface.draw_fitted(&pixmap);
        debug!(
            width = pixmap.width(),
            height = pixmap.height(),
            "Image imported onto canvas"
        );
        self.commit()
    }

    /// What should be shown: the surface, plus the grid when enabled.
    #[must_use]
    pub fn render(&self) -> Pixmap {
        if self.store.get_state().show_grid {
            self.surface.composite_grid()
        } else {
            self.surface.pixmap().clone()
        }
    }

    /// Encoded image of the visible history entry.
    #[must_use]
    pub fn current_serialized(&self) -> Option<Arc<str>> {
        self.store.get_state().current_serialized.clone()
    }
}

impl std::fmt::Debug for CanvasEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasEngine")
            .field("surface", &self.surface)
            .field("display", &self.display)
            .field("drawing", &self.gesture.is_some())
            .field("commit_hooks", &self.commit_hooks.len())
            .finish_non_exhaustive()
    }
}
