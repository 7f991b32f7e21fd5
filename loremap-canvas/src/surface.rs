//! The raster surface every tool draws onto.
//!
//! A single opaque layer backed by a [`tiny_skia::Pixmap`]. Erasing paints the
//! background colour; there is no transparency.

use std::fmt;

use tiny_skia::{
    Color, FilterQuality, LineCap, LineJoin, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke,
    Transform,
};

use crate::codec::{self, fit_centered};
use crate::error::{CanvasError, CanvasResult};

/// Surface width in pixels.
pub const CANVAS_WIDTH: u32 = 800;

/// Surface height in pixels.
pub const CANVAS_HEIGHT: u32 = 800;

/// Background fill, also used by the eraser.
pub const BACKGROUND_COLOR: &str = "#000000";

/// Grid cell size of the overlay.
pub const GRID_SPACING: u32 = 40;

/// A point in surface pixel coordinates.
pub type Point = (f32, f32);

/// Parse a CSS-style colour: `#rgb`, `#rrggbb`, `#rrggbbaa` or
/// `rgb(r, g, b)` / `rgba(r, g, b, a)` with `a` in `0.0..=1.0`.
///
/// # Errors
///
/// Returns [`CanvasError::InvalidColor`] for anything else.
pub fn parse_color(input: &str) -> CanvasResult<Color> {
    let value = input.trim();
    let invalid = || CanvasError::InvalidColor(input.to_string());

    if let Some(hex) = value.strip_prefix('#') {
        if !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            return Err(invalid());
        }
        let channel = |range: std::ops::Range<usize>| {
            u8::from_str_radix(&hex[range], 16).map_err(|_| invalid())
        };
        let short = |i: usize| channel(i..i + 1).map(|v| v * 17);
        return match hex.len() {
            3 => Ok(Color::from_rgba8(short(0)?, short(1)?, short(2)?, 255)),
            6 => Ok(Color::from_rgba8(channel(0..2)?, channel(2..4)?, channel(4..6)?, 255)),
            8 => Ok(Color::from_rgba8(
                channel(0..2)?,
                channel(2..4)?,
                channel(4..6)?,
                channel(6..8)?,
            )),
            _ => Err(invalid()),
        };
    }

    let args = value
        .strip_prefix("rgba(")
        .or_else(|| value.strip_prefix("rgb("))
        .and_then(|rest| rest.strip_suffix(')'))
        .ok_or_else(invalid)?;
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let byte = |s: &str| s.parse::<u8>().map_err(|_| invalid());
    match parts.as_slice() {
        [r, g, b] => Ok(Color::from_rgba8(byte(r)?, byte(g)?, byte(b)?, 255)),
        [r, g, b, a] => {
            let alpha: f32 = a.parse().map_err(|_| invalid())?;
            if !(0.0..=1.0).contains(&alpha) {
                return Err(invalid());
            }
            let (r, g, b) = (byte(r)?, byte(g)?, byte(b)?);
            Color::from_rgba(
                f32::from(r) / 255.0,
                f32::from(g) / 255.0,
                f32::from(b) / 255.0,
                alpha,
            )
            .ok_or_else(invalid)
        }
        _ => Err(invalid()),
    }
}

/// An immutable full-surface pixel capture.
///
/// Once captured a snapshot is never drawn on; restoring copies it back.
#[derive(Clone, PartialEq)]
pub struct RasterSnapshot {
    pixmap: Pixmap,
}

impl RasterSnapshot {
    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Straight (non-premultiplied) RGBA of one pixel.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
    }

    /// Borrow the captured pixels.
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }
}

impl fmt::Debug for RasterSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RasterSnapshot")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}

/// Outline shapes drawn by the preview tools.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    /// Axis-aligned rectangle spanned by two corners.
    Rect {
        /// Gesture start corner.
        from: Point,
        /// Opposite corner.
        to: Point,
    },
    /// Circle centred on the gesture start; the radius reaches the cursor.
    Circle {
        /// Centre.
        center: Point,
        /// A point on the circumference.
        edge: Point,
    },
    /// Straight segment.
    Line {
        /// Start point.
        from: Point,
        /// End point.
        to: Point,
    },
}

/// Stroke style shared by every tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    /// Stroke colour.
    pub color: Color,
    /// Stroke width in pixels.
    pub width: f32,
}

impl Brush {
    fn paint(&self) -> Paint<'static> {
        let mut paint = Paint::default();
        paint.set_color(self.color);
        paint.anti_alias = true;
        paint
    }

    fn stroke(&self) -> Stroke {
        Stroke {
            width: self.width,
            line_cap: LineCap::Round,
            line_join: LineJoin::Round,
            ..Stroke::default()
        }
    }
}

/// The drawable raster.
pub struct Surface {
    pixmap: Pixmap,
    background: Color,
}

impl Surface {
    /// Create a surface filled with `background`.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidDimensions`] if either side is zero.
    pub fn new(width: u32, height: u32, background: Color) -> CanvasResult<Self> {
        let pixmap =
            Pixmap::new(width, height).ok_or(CanvasError::InvalidDimensions { width, height })?;
        let mut surface = Self { pixmap, background };
        surface.fill_background();
        Ok(surface)
    }

    /// Width in pixels.
    #[must_use]
    pub fn width(&self) -> u32 {
        self.pixmap.width()
    }

    /// Height in pixels.
    #[must_use]
    pub fn height(&self) -> u32 {
        self.pixmap.height()
    }

    /// Background colour.
    #[must_use]
    pub fn background(&self) -> Color {
        self.background
    }

    /// Current pixels.
    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    /// Straight RGBA of one pixel.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            [c.red(), c.green(), c.blue(), c.alpha()]
        })
    }

    /// Paint the whole surface with the background colour.
    pub fn fill_background(&mut self) {
        self.pixmap.fill(self.background);
    }

    /// Draw one free-hand segment.
    pub fn stroke_segment(&mut self, from: Point, to: Point, brush: &Brush) {
        let mut pb = PathBuilder::new();
        pb.move_to(from.0, from.1);
        pb.line_to(to.0, to.1);
        let Some(path) = pb.finish() else {
            return;
        };
        self.pixmap.stroke_path(
            &path,
            &brush.paint(),
            &brush.stroke(),
            Transform::identity(),
            None,
        );
    }

    /// Stroke the outline of a shape.
    pub fn stroke_shape(&mut self, shape: Shape, brush: &Brush) {
        let path = match shape {
            Shape::Rect { from, to } => {
                let mut pb = PathBuilder::new();
                pb.move_to(from.0, from.1);
                pb.line_to(to.0, from.1);
                pb.line_to(to.0, to.1);
                pb.line_to(from.0, to.1);
                pb.close();
                pb.finish()
            }
            Shape::Circle { center, edge } => {
                let radius = (edge.0 - center.0).hypot(edge.1 - center.1);
                PathBuilder::from_circle(center.0, center.1, radius)
            }
            Shape::Line { from, to } => {
                let mut pb = PathBuilder::new();
                pb.move_to(from.0, from.1);
                pb.line_to(to.0, to.1);
                pb.finish()
            }
        };
        // Degenerate shapes (zero radius, collapsed rect) have no path.
        if let Some(path) = path {
            self.pixmap.stroke_path(
                &path,
                &brush.paint(),
                &brush.stroke(),
                Transform::identity(),
                None,
            );
        }
    }

    /// Capture the current pixels.
    #[must_use]
    pub fn snapshot(&self) -> RasterSnapshot {
        RasterSnapshot {
            pixmap: self.pixmap.clone(),
        }
    }

    /// Replace the surface contents with a snapshot.
    pub fn restore(&mut self, snapshot: &RasterSnapshot) {
        if snapshot.pixmap.width() == self.width() && snapshot.pixmap.height() == self.height() {
            self.pixmap
                .data_mut()
                .copy_from_slice(snapshot.pixmap.data());
        } else {
            self.fill_background();
            self.draw_at_origin(&snapshot.pixmap);
        }
    }

    /// Draw an image at its natural size in the top-left corner.
    pub fn draw_at_origin(&mut self, image: &Pixmap) {
        self.pixmap.draw_pixmap(
            0,
            0,
            image.as_ref(),
            &PixmapPaint::default(),
            Transform::identity(),
            None,
        );
    }

    /// Clear to background and draw `image` scaled to fit, centred.
    pub fn draw_fitted(&mut self, image: &Pixmap) {
        let placement = fit_centered(image.width(), image.height(), self.width(), self.height());
        self.fill_background();
        let paint = PixmapPaint {
            quality: FilterQuality::Bicubic,
            ..PixmapPaint::default()
        };
        let transform = Transform::from_row(
            placement.scale,
            0.0,
            0.0,
            placement.scale,
            placement.x,
            placement.y,
        );
        self.pixmap.draw_pixmap(0, 0, image.as_ref(), &paint, transform, None);
    }

    /// Encode the current pixels as a PNG data URI.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::Encode`] if PNG encoding fails.
    pub fn encode(&self) -> CanvasResult<String> {
        codec::encode_png_data_uri(&self.pixmap)
    }

    /// A copy of the surface with the grid drawn on top.
    ///
    /// The surface itself is left untouched.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn composite_grid(&self) -> Pixmap {
        let mut out = self.pixmap.clone();
        let (w, h) = (self.width() as f32, self.height() as f32);
        let mut pb = PathBuilder::new();
        for x in (0..=self.width()).step_by(GRID_SPACING as usize) {
            let x = x as f32 + 0.5;
            pb.move_to(x, 0.0);
            pb.line_to(x, h);
        }
        for y in (0..=self.height()).step_by(GRID_SPACING as usize) {
            let y = y as f32 + 0.5;
            pb.move_to(0.0, y);
            pb.line_to(w, y);
        }
        if let Some(path) = pb.finish() {
            let mut paint = Paint::default();
            paint.set_color(Color::from_rgba8(68, 68, 68, 77));
            let stroke = Stroke {
                width: 1.0,
                ..Stroke::default()
            };
            out.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        }
        out
    }
}

impl fmt::Debug for Surface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Surface")
            .field("width", &self.width())
            .field("height", &self.height())
            .finish_non_exhaustive()
    }
}
