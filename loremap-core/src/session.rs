//! Persisted projection of [`AppState`].
//!
//! Only domain data and settings are stored; progress flags, errors, the
//! timer and the selection are transient and rebuilt on load.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::CoreResult;
use crate::state::{
    AppState, GeneratedAsset, GenerationMode, Language, LoreFile, DEFAULT_ART_STYLE,
    DEFAULT_DESCRIPTION_MODEL, DEFAULT_IMAGE_COUNT, DEFAULT_IMAGE_MODEL, MAX_IMAGE_COUNT,
};

/// The persisted fields of [`AppState`].
///
/// Every field is optional on the wire so partially written or older
/// sessions still load; [`AppState::hydrate`] fills the gaps with defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionData {
    /// Lore context.
    #[serde(default)]
    pub lore_files: Vec<LoreFile>,
    /// The user's scene request.
    #[serde(default)]
    pub location_request: String,
    /// Last committed sketch as a data URI.
    #[serde(
        default,
        rename = "sketchBase64",
        skip_serializing_if = "Option::is_none"
    )]
    pub sketch: Option<Arc<str>>,
    /// Last visual description.
    #[serde(default)]
    pub generated_description: String,
    /// Last narrative.
    #[serde(default)]
    pub narrative_description: String,
    /// Results. Accepts legacy lists of bare image URLs.
    #[serde(default, deserialize_with = "deserialize_assets")]
    pub generated_images: Vec<GeneratedAsset>,
    /// Generation domain.
    #[serde(default)]
    pub mode: Option<GenerationMode>,
    /// Description model id.
    #[serde(default)]
    pub description_model: Option<String>,
    /// Image model id.
    #[serde(default)]
    pub image_model: Option<String>,
    /// Art style key.
    #[serde(default)]
    pub art_style: Option<String>,
    /// Images per job.
    #[serde(default)]
    pub image_count: Option<u8>,
    /// Interface language.
    #[serde(default)]
    pub language: Option<Language>,
    /// Last description duration in milliseconds.
    #[serde(
        default,
        rename = "lastTextDuration",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_text_duration_ms: Option<u64>,
    /// Last image duration in milliseconds.
    #[serde(
        default,
        rename = "lastImageDuration",
        skip_serializing_if = "Option::is_none"
    )]
    pub last_image_duration_ms: Option<u64>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StoredAsset {
    Url(String),
    Asset(GeneratedAsset),
}

fn deserialize_assets<'de, D>(deserializer: D) -> Result<Vec<GeneratedAsset>, D::Error>
where
    D: Deserializer<'de>,
{
    let stored: Option<Vec<StoredAsset>> = Option::deserialize(deserializer)?;
    Ok(stored
        .unwrap_or_default()
        .into_iter()
        .map(|entry| match entry {
            StoredAsset::Url(url) => GeneratedAsset::from_url(url),
            StoredAsset::Asset(asset) => asset,
        })
        .collect())
}

impl SessionData {
    /// Project the persisted fields out of `state`.
    #[must_use]
    pub fn from_state(state: &AppState) -> Self {
        Self {
            lore_files: state.lore_files.clone(),
            location_request: state.location_request.clone(),
            sketch: state.sketch.clone(),
            generated_description: state.generated_description.clone(),
            narrative_description: state.narrative_description.clone(),
            generated_images: state.generated_images.clone(),
            mode: Some(state.mode),
            description_model: Some(state.description_model.clone()),
            image_model: Some(state.image_model.clone()),
            art_style: Some(state.art_style.clone()),
            image_count: Some(state.image_count),
            language: Some(state.language),
            last_text_duration_ms: state.last_text_duration_ms,
            last_image_duration_ms: state.last_image_duration_ms,
        }
    }

    /// Parse a stored session.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Serialization`] for malformed JSON.
    pub fn from_json(json: &str) -> CoreResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize for storage.
    ///
    /// # Errors
    ///
    /// Returns [`crate::CoreError::Serialization`] if encoding fails.
    pub fn to_json(&self) -> CoreResult<String> {
        Ok(serde_json::to_string(self)?)
    }
}

fn non_empty(value: Option<String>, fallback: &str) -> String {
    value
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

impl AppState {
    /// Merge a stored session into this state and mark it loaded.
    ///
    /// Missing or empty settings fall back to defaults, an image count of
    /// zero counts as missing, and the selection lands on the newest asset.
    #[must_use]
    pub fn hydrate(self, data: SessionData) -> Self {
        let image_count = data
            .image_count
            .filter(|&n| n > 0)
            .unwrap_or(DEFAULT_IMAGE_COUNT)
            .min(MAX_IMAGE_COUNT);
        let selected_image_index = data.generated_images.len().saturating_sub(1);
        Self {
            lore_files: data.lore_files,
            location_request: data.location_request,
            sketch: data.sketch,
            generated_description: data.generated_description,
            narrative_description: data.narrative_description,
            generated_images: data.generated_images,
            mode: data.mode.unwrap_or_default(),
            description_model: non_empty(data.description_model, DEFAULT_DESCRIPTION_MODEL),
            image_model: non_empty(data.image_model, DEFAULT_IMAGE_MODEL),
            art_style: non_empty(data.art_style, DEFAULT_ART_STYLE),
            image_count,
            language: data.language.unwrap_or_default(),
            last_text_duration_ms: data.last_text_duration_ms,
            last_image_duration_ms: data.last_image_duration_ms,
            selected_image_index,
            is_loaded: true,
            ..self
        }
    }

    /// Whether both states project to the same [`SessionData`].
    ///
    /// Image payloads compare by pointer first, so checking a state against
    /// its own patched copy stays cheap.
    #[must_use]
    pub fn persists_same_as(&self, other: &AppState) -> bool {
        fn same_payload(a: &Arc<str>, b: &Arc<str>) -> bool {
            Arc::ptr_eq(a, b) || a == b
        }

        let same_sketch = match (&self.sketch, &other.sketch) {
            (Some(a), Some(b)) => same_payload(a, b),
            (None, None) => true,
            _ => false,
        };
        let same_assets = self.generated_images.len() == other.generated_images.len()
            && self
                .generated_images
                .iter()
                .zip(&other.generated_images)
                .all(|(a, b)| {
                    same_payload(&a.image_url, &b.image_url)
                        && a.narrative == b.narrative
                        && a.visual_prompt == b.visual_prompt
                });

        same_sketch
            && same_assets
            && self.lore_files == other.lore_files
            && self.location_request == other.location_request
            && self.generated_description == other.generated_description
            && self.narrative_description == other.narrative_description
            && self.mode == other.mode
            && self.description_model == other.description_model
            && self.image_model == other.image_model
            && self.art_style == other.art_style
            && self.image_count == other.image_count
            && self.language == other.language
            && self.last_text_duration_ms == other.last_text_duration_ms
            && self.last_image_duration_ms == other.last_image_duration_ms
    }
}
