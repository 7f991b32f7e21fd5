//! # LoreMap Canvas
//!
//! Raster sketch engine for LoreMap.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────┐
//! │                 CanvasEngine                 │
//! │  pointer / key input ──► tools ──► Surface   │
//! ├──────────────────────┬───────────────────────┤
//! │  Store<CanvasState>  │  Surface (tiny-skia)  │
//! │  - tool, width, ...  │  - strokes, shapes    │
//! │  - bitmap history    │  - grid composite     │
//! │    (max 50 entries)  │  - PNG data URIs      │
//! └──────────────────────┴───────────────────────┘
//!                 │ commit hooks
//!                 ▼
//!       encoded sketch (data:image/png)
//! ```
//!
//! Pen and eraser draw segment by segment. Rectangle, circle and line
//! restore a snapshot taken at gesture start before every redraw, so a drag
//! never leaves ghost outlines.

#![forbid(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod codec;
pub mod engine;
pub mod error;
pub mod shortcut;
pub mod state;
pub mod surface;

pub use codec::{fit_centered, DataUri, Placement};
pub use engine::{CanvasEngine, CommitHook, DisplayRect};
pub use error::{CanvasError, CanvasResult};
pub use shortcut::Shortcut;
pub use state::{CanvasState, HistoryEntry, Tool, MAX_HISTORY};
pub use surface::{RasterSnapshot, Surface, CANVAS_HEIGHT, CANVAS_WIDTH};
