//! The remote generation collaborator.

use async_trait::async_trait;
use loremap_core::{GenerationMode, Language, LoreFile};

use crate::error::GenerationResult;

/// Text and image generation backend.
///
/// Images travel as data URIs in both directions.
#[async_trait]
pub trait SceneGenerator: Send + Sync {
    /// Turn lore, the user's request and an optional sketch into one visual
    /// description.
    async fn describe_scene(
        &self,
        lore: &[LoreFile],
        request: &str,
        sketch: Option<&str>,
        model: &str,
        mode: GenerationMode,
        style: &str,
    ) -> GenerationResult<String>;

    /// Read-aloud flavour text. Best effort: failures yield an empty string.
    async fn narrate(
        &self,
        lore: &[LoreFile],
        request: &str,
        mode: GenerationMode,
        language: Language,
    ) -> String;

    /// Render one image from a description.
    async fn render_image(
        &self,
        description: &str,
        sketch: Option<&str>,
        model: &str,
        mode: GenerationMode,
        style: &str,
    ) -> GenerationResult<String>;

    /// Produce an edited copy of `image`.
    async fn edit_image(
        &self,
        image: &str,
        instruction: &str,
        model: &str,
        mode: GenerationMode,
        style: &str,
    ) -> GenerationResult<String>;
}
