//! Command-line arguments for the `loremap` binary.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use loremap_core::{AppState, GenerationMode, Language, DIRECT_DESCRIPTION_MODEL};

use crate::config::{ConfigError, StudioConfig};

/// LoreMap command line.
#[derive(Debug, Parser)]
#[command(name = "loremap")]
#[command(about = "Sketch-to-scene generation for tabletop game masters")]
#[command(version)]
pub struct Cli {
    /// Gemini API key.
    #[arg(long, global = true, env = "GEMINI_API_KEY", hide_env_values = true)]
    pub api_key: Option<String>,

    /// Gemini REST base URL.
    #[arg(long, global = true, env = "LOREMAP_API_BASE")]
    pub api_base: Option<String>,

    /// Directory holding the saved session.
    #[arg(long, global = true, env = "LOREMAP_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// What to do.
    #[command(subcommand)]
    pub command: Command,
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Describe, narrate and render a scene.
    Generate(GenerateArgs),
    /// Render more images from the last description.
    Vary(OutputArgs),
    /// Edit an image with an instruction.
    Edit(EditArgs),
    /// Write the saved session as a project file.
    Export {
        /// Target file or directory. Defaults to a dated name in the
        /// working directory.
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Replace the saved session with a project file.
    Import {
        /// Project file to read.
        file: PathBuf,
    },
}

/// Generation settings shared by the image-producing commands.
#[derive(Debug, Clone, Default, Args)]
pub struct Settings {
    /// Generation mode: battlemap, location or character.
    #[arg(long)]
    pub mode: Option<GenerationMode>,

    /// Art style key (realistic, oldschool, grimdark, blueprint, watercolor).
    #[arg(long)]
    pub style: Option<String>,

    /// Images per job (1 to 4).
    #[arg(long)]
    pub count: Option<u8>,

    /// Description model id.
    #[arg(long)]
    pub model: Option<String>,

    /// Image model id.
    #[arg(long)]
    pub image_model: Option<String>,

    /// Skip the description stage and render the request as written.
    #[arg(long, conflicts_with = "model")]
    pub direct: bool,

    /// Narrative language: en or ru.
    #[arg(long)]
    pub language: Option<Language>,
}

impl Settings {
    /// Write the given settings into `state`, leaving the rest alone.
    pub fn apply(&self, state: &mut AppState) {
        if let Some(mode) = self.mode {
            state.mode = mode;
        }
        if let Some(style) = &self.style {
            state.art_style.clone_from(style);
        }
        if let Some(count) = self.count {
            state.set_image_count(count);
        }
        if self.direct {
            state.description_model = DIRECT_DESCRIPTION_MODEL.to_string();
        } else if let Some(model) = &self.model {
            state.description_model.clone_from(model);
        }
        if let Some(model) = &self.image_model {
            state.image_model.clone_from(model);
        }
        if let Some(language) = self.language {
            state.language = language;
        }
    }
}

/// Where results are written.
#[derive(Debug, Clone, Args)]
pub struct OutputArgs {
    /// Output directory.
    #[arg(long, short, default_value = "loremap-output")]
    pub out: PathBuf,

    /// Generation settings.
    #[command(flatten)]
    pub settings: Settings,
}

/// Arguments of `generate`.
#[derive(Debug, Clone, Args)]
pub struct GenerateArgs {
    /// The scene to generate.
    pub request: String,

    /// Sketch image to guide the layout.
    #[arg(long)]
    pub sketch: Option<PathBuf>,

    /// Lore files (.md or .txt) to add to the session.
    #[arg(long = "lore", value_name = "FILE")]
    pub lore: Vec<PathBuf>,

    /// Output and settings.
    #[command(flatten)]
    pub output: OutputArgs,
}

/// Arguments of `edit`.
#[derive(Debug, Clone, Args)]
pub struct EditArgs {
    /// What to change.
    pub instruction: String,

    /// Image to edit. Defaults to the selected asset of the saved session.
    #[arg(long)]
    pub image: Option<PathBuf>,

    /// Output and settings.
    #[command(flatten)]
    pub output: OutputArgs,
}

impl Cli {
    /// Environment configuration with command-line overrides applied.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] for a malformed API base.
    pub fn config(&self) -> Result<StudioConfig, ConfigError> {
        let mut config = StudioConfig::from_env()?;
        if let Some(key) = &self.api_key {
            config.api_key = Some(key.clone());
        }
        if let Some(base) = &self.api_base {
            config = config.with_api_base(base)?;
        }
        if let Some(dir) = &self.data_dir {
            config.data_dir.clone_from(dir);
        }
        Ok(config)
    }
}
