//! Application domain state.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Default model used for the visual description stage.
pub const DEFAULT_DESCRIPTION_MODEL: &str = "gemini-3-pro-preview";

/// Default model used for image rendering and editing.
pub const DEFAULT_IMAGE_MODEL: &str = "gemini-2.5-flash-image";

/// Default art style key.
pub const DEFAULT_ART_STYLE: &str = "realistic";

/// Default number of images per job.
pub const DEFAULT_IMAGE_COUNT: u8 = 2;

/// Smallest allowed image count.
pub const MIN_IMAGE_COUNT: u8 = 1;

/// Largest allowed image count.
pub const MAX_IMAGE_COUNT: u8 = 4;

/// Description model id that bypasses the description call and forwards the
/// raw request text.
pub const DIRECT_DESCRIPTION_MODEL: &str = "skip";

/// Generation domain selector. Changes prompt framing and viewpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum GenerationMode {
    /// Top-down tactical map.
    #[default]
    Battlemap,
    /// Establishing shot of a place.
    Location,
    /// Character portrait or pose.
    Character,
}

impl GenerationMode {
    /// Wire name, as used in prompts and project files.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Battlemap => "BATTLEMAP",
            Self::Location => "LOCATION",
            Self::Character => "CHARACTER",
        }
    }
}

impl std::fmt::Display for GenerationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GenerationMode {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "battlemap" => Ok(Self::Battlemap),
            "location" => Ok(Self::Location),
            "character" => Ok(Self::Character),
            other => Err(CoreError::InvalidSetting(format!("unknown mode: {other}"))),
        }
    }
}

/// Interface and narrative language.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    En,
    /// Russian.
    #[default]
    Ru,
}

impl Language {
    /// Human-readable name, used inside prompts.
    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::En => "English",
            Self::Ru => "Russian",
        }
    }

    /// BCP 47 tag handed to speech recognizers.
    #[must_use]
    pub const fn speech_locale(self) -> &'static str {
        match self {
            Self::En => "en-US",
            Self::Ru => "ru-RU",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "en" => Ok(Self::En),
            "ru" => Ok(Self::Ru),
            other => Err(CoreError::InvalidSetting(format!("unknown language: {other}"))),
        }
    }
}

/// A world-lore text file supplied as generation context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoreFile {
    /// File name as uploaded.
    pub name: String,
    /// Full text content.
    pub content: String,
}

impl LoreFile {
    /// Create a lore file.
    #[must_use]
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }

    /// Whether a file with this name is accepted as lore (`.md` or `.txt`).
    #[must_use]
    pub fn is_supported_name(name: &str) -> bool {
        let lower = name.to_ascii_lowercase();
        lower.ends_with(".md") || lower.ends_with(".txt")
    }
}

/// One generated image plus the text it was produced from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedAsset {
    /// Image as a data URI.
    pub image_url: Arc<str>,
    /// Read-aloud flavor text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    /// The visual description the image was rendered from.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub visual_prompt: Option<String>,
}

impl GeneratedAsset {
    /// Asset with only an image (legacy sessions stored bare URLs).
    #[must_use]
    pub fn from_url(image_url: impl Into<Arc<str>>) -> Self {
        Self {
            image_url: image_url.into(),
            narrative: None,
            visual_prompt: None,
        }
    }
}

/// The four long-running activities a job can be in.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct ProgressFlags {
    /// Visual description call in flight.
    pub describing: bool,
    /// Image fan-out in flight.
    pub imaging: bool,
    /// Narrative call in flight.
    pub narrating: bool,
    /// Image edit call in flight.
    pub editing: bool,
}

impl ProgressFlags {
    /// All flags down.
    pub const IDLE: Self = Self {
        describing: false,
        imaging: false,
        narrating: false,
        editing: false,
    };

    /// Whether any activity is in flight.
    #[must_use]
    pub const fn any(self) -> bool {
        self.describing || self.imaging || self.narrating || self.editing
    }
}

/// Complete application state: persisted settings and results plus transient
/// progress fields.
#[derive(Debug, Clone, PartialEq)]
pub struct AppState {
    /// Lore context, in upload order.
    pub lore_files: Vec<LoreFile>,
    /// The user's scene request.
    pub location_request: String,
    /// Last committed sketch as a data URI.
    pub sketch: Option<Arc<str>>,
    /// Visual description produced by the last full job.
    pub generated_description: String,
    /// Narrative produced by the last full job.
    pub narrative_description: String,
    /// Results, in arrival order.
    pub generated_images: Vec<GeneratedAsset>,
    /// Generation domain.
    pub mode: GenerationMode,
    /// Text model id for the description stage (`"skip"` for direct mode).
    pub description_model: String,
    /// Image model id.
    pub image_model: String,
    /// Art style key.
    pub art_style: String,
    /// Images per job, within `MIN_IMAGE_COUNT..=MAX_IMAGE_COUNT`.
    pub image_count: u8,
    /// Interface language.
    pub language: Language,
    /// Duration of the last description stage, in milliseconds.
    pub last_text_duration_ms: Option<u64>,
    /// Duration of the last image stage, in milliseconds.
    pub last_image_duration_ms: Option<u64>,

    /// Activities in flight.
    pub progress: ProgressFlags,
    /// Speech input active.
    pub is_listening: bool,
    /// User-visible error.
    pub error: Option<String>,
    /// Seconds elapsed in the current job.
    pub gen_timer: f64,
    /// Index into `generated_images` of the asset on display.
    pub selected_image_index: usize,
    /// Set once hydration from storage has completed.
    pub is_loaded: bool,
}

impl Default for AppState {
    fn default() -> Self {
        Self {
            lore_files: Vec::new(),
            location_request: String::new(),
            sketch: None,
            generated_description: String::new(),
            narrative_description: String::new(),
            generated_images: Vec::new(),
            mode: GenerationMode::default(),
            description_model: DEFAULT_DESCRIPTION_MODEL.to_string(),
            image_model: DEFAULT_IMAGE_MODEL.to_string(),
            art_style: DEFAULT_ART_STYLE.to_string(),
            image_count: DEFAULT_IMAGE_COUNT,
            language: Language::default(),
            last_text_duration_ms: None,
            last_image_duration_ms: None,
            progress: ProgressFlags::IDLE,
            is_listening: false,
            error: None,
            gen_timer: 0.0,
            selected_image_index: 0,
            is_loaded: false,
        }
    }
}

impl AppState {
    /// The asset currently selected, if any.
    #[must_use]
    pub fn selected_asset(&self) -> Option<&GeneratedAsset> {
        self.generated_images.get(self.selected_image_index)
    }

    /// Whether the description stage is bypassed.
    #[must_use]
    pub fn is_direct_mode(&self) -> bool {
        self.description_model == DIRECT_DESCRIPTION_MODEL
    }

    /// Append an asset and select it.
    pub fn push_asset(&mut self, asset: GeneratedAsset) {
        self.selected_image_index = self.generated_images.len();
        self.generated_images.push(asset);
    }

    /// Remove every asset and reset the selection.
    pub fn clear_assets(&mut self) {
        self.generated_images.clear();
        self.selected_image_index = 0;
    }

    /// Remove one asset, keeping the selection on a sensible neighbour.
    ///
    /// Removing an entry before the selection shifts the selection down with
    /// it. Removing the selected entry moves the selection to its predecessor
    /// unless it is already the first. Out-of-range indices are ignored.
    pub fn remove_asset(&mut self, index: usize) {
        if index >= self.generated_images.len() {
            return;
        }
        self.generated_images.remove(index);
        let selected = self.selected_image_index;
        if index < selected || (index == selected && selected > 0) {
            self.selected_image_index = selected - 1;
        }
    }

    /// Set the number of images per job, clamped to the supported range.
    pub fn set_image_count(&mut self, count: u8) {
        self.image_count = count.clamp(MIN_IMAGE_COUNT, MAX_IMAGE_COUNT);
    }

    /// Add lore files, skipping names that are not `.md`/`.txt`.
    ///
    /// Returns how many were accepted.
    pub fn add_lore_files(&mut self, files: impl IntoIterator<Item = LoreFile>) -> usize {
        let before = self.lore_files.len();
        self.lore_files.extend(
            files
                .into_iter()
                .filter(|f| LoreFile::is_supported_name(&f.name)),
        );
        self.lore_files.len() - before
    }

    /// Remove a lore file by position. Out-of-range indices are ignored.
    pub fn remove_lore_file(&mut self, index: usize) {
        if index < self.lore_files.len() {
            self.lore_files.remove(index);
        }
    }

    /// Drop every progress flag and the error, as a cancel does.
    pub fn reset_progress(&mut self) {
        self.progress = ProgressFlags::IDLE;
        self.error = None;
    }

    /// Drop every progress flag and surface `message`.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.progress = ProgressFlags::IDLE;
        self.error = Some(message.into());
    }
}
