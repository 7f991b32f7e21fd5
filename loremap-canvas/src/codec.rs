//! Image interchange: data URIs, decoding, PNG encoding and fit-to-surface
//! placement.
//!
//! Sketches and generated images travel as `data:<mime>;base64,<payload>`
//! strings.

use base64::Engine;
use tiny_skia::{IntSize, Pixmap};

use crate::error::{CanvasError, CanvasResult};

/// MIME type used for serialized sketches.
pub const PNG_MIME: &str = "image/png";

/// A parsed (but not yet decoded) data URI.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DataUri<'a> {
    /// MIME type, e.g. `image/png`. Empty if the URI omitted it.
    pub mime_type: &'a str,
    /// Encoded payload after the comma.
    pub payload: &'a str,
    /// Whether the payload is base64 (otherwise percent-encoded).
    pub is_base64: bool,
}

impl<'a> DataUri<'a> {
    /// Split a data URI into its parts.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidDataUri`] if the scheme or the comma
    /// separator is missing.
    pub fn parse(uri: &'a str) -> CanvasResult<Self> {
        let rest = uri
            .strip_prefix("data:")
            .ok_or_else(|| CanvasError::InvalidDataUri("not a data URI".to_string()))?;
        let (metadata, payload) = rest
            .split_once(',')
            .ok_or_else(|| CanvasError::InvalidDataUri("missing comma".to_string()))?;
        let is_base64 = metadata.ends_with(";base64");
        let mime_type = metadata.split(';').next().unwrap_or_default();
        Ok(Self {
            mime_type,
            payload,
            is_base64,
        })
    }

    /// Decode the payload into raw bytes.
    ///
    /// # Errors
    ///
    /// Returns [`CanvasError::InvalidDataUri`] if the payload is not valid
    /// base64 or percent-encoding.
    pub fn decode_bytes(&self) -> CanvasResult<Vec<u8>> {
        if self.is_base64 {
            base64::engine::general_purpose::STANDARD
                .decode(self.payload)
                .map_err(|e| CanvasError::InvalidDataUri(format!("bad base64: {e}")))
        } else {
            percent_decode(self.payload)
        }
    }
}

/// Build a base64 data URI.
#[must_use]
pub fn to_data_uri(mime_type: &str, bytes: &[u8]) -> String {
    let payload = base64::engine::general_purpose::STANDARD.encode(bytes);
    format!("data:{mime_type};base64,{payload}")
}

fn percent_decode(input: &str) -> CanvasResult<Vec<u8>> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' {
            let hex = input
                .get(i + 1..i + 3)
                .and_then(|h| u8::from_str_radix(h, 16).ok())
                .ok_or_else(|| CanvasError::InvalidDataUri("invalid percent-encoding".to_string()))?;
            out.push(hex);
            i += 3;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    Ok(out)
}

/// Decode PNG/JPEG/WebP/GIF/BMP bytes into a premultiplied pixmap.
///
/// # Errors
///
/// Returns [`CanvasError::Decode`] if the format is unsupported or corrupt.
pub fn decode_image(bytes: &[u8]) -> CanvasResult<Pixmap> {
    let rgba = image::load_from_memory(bytes)
        .map_err(|e| CanvasError::Decode(e.to_string()))?
        .to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut data = rgba.into_raw();
    premultiply(&mut data);
    let size = IntSize::from_wh(width, height)
        .ok_or(CanvasError::InvalidDimensions { width, height })?;
    Pixmap::from_vec(data, size).ok_or(CanvasError::InvalidDimensions { width, height })
}

/// Decode a data URI straight into a pixmap.
///
/// # Errors
///
/// Returns an error if the URI is malformed or the image cannot be decoded.
pub fn decode_data_uri(uri: &str) -> CanvasResult<Pixmap> {
    let bytes = DataUri::parse(uri)?.decode_bytes()?;
    decode_image(&bytes)
}

/// Encode a pixmap as a PNG data URI.
///
/// # Errors
///
/// Returns [`CanvasError::Encode`] if PNG encoding fails.
pub fn encode_png_data_uri(pixmap: &Pixmap) -> CanvasResult<String> {
    let png = pixmap
        .encode_png()
        .map_err(|e| CanvasError::Encode(e.to_string()))?;
    Ok(to_data_uri(PNG_MIME, &png))
}

#[allow(clippy::cast_possible_truncation)]
fn premultiply(rgba: &mut [u8]) {
    for px in rgba.chunks_exact_mut(4) {
        let a = u16::from(px[3]);
        if a == 255 {
            continue;
        }
        for c in &mut px[..3] {
            *c = ((u16::from(*c) * a + 127) / 255) as u8;
        }
    }
}

/// Where an image lands when fitted inside a surface.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Placement {
    /// Left edge on the surface.
    pub x: f32,
    /// Top edge on the surface.
    pub y: f32,
    /// Uniform scale applied to the image.
    pub scale: f32,
    /// Drawn width.
    pub width: f32,
    /// Drawn height.
    pub height: f32,
}

/// Uniformly scale `(src_w, src_h)` to fit `(dst_w, dst_h)` and center it.
///
/// Small images are scaled up, large ones down.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn fit_centered(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32) -> Placement {
    let (sw, sh) = (src_w.max(1) as f32, src_h.max(1) as f32);
    let (dw, dh) = (dst_w as f32, dst_h as f32);
    let scale = (dw / sw).min(dh / sh);
    let width = sw * scale;
    let height = sh * scale;
    Placement {
        x: (dw - width) / 2.0,
        y: (dh - height) / 2.0,
        scale,
        width,
        height,
    }
}
