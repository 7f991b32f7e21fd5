//! Studio configuration, read from the environment.
//!
//! | Variable                  | Default                                            |
//! |---------------------------|----------------------------------------------------|
//! | `GEMINI_API_KEY`          | falls back to `API_KEY`, else none                 |
//! | `LOREMAP_API_BASE`        | `https://generativelanguage.googleapis.com/v1beta` |
//! | `LOREMAP_DATA_DIR`        | `$HOME/.loremap`, else `./.loremap`                |
//! | `LOREMAP_NARRATIVE_MODEL` | `gemini-2.5-flash`                                 |

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;
use url::Url;

/// Public Gemini REST endpoint.
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Model used for narrative text regardless of the selected description model.
pub const DEFAULT_NARRATIVE_MODEL: &str = "gemini-2.5-flash";

/// Image model that requires an explicitly selected credential.
pub const PREMIUM_IMAGE_MODEL: &str = "gemini-3-pro-image-preview";

/// Nominal pause in direct mode so both description paths feel alike.
pub const DIRECT_MODE_DELAY: Duration = Duration::from_millis(100);

/// Elapsed-time ticker period.
pub const TICK_PERIOD: Duration = Duration::from_millis(100);

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// `LOREMAP_API_BASE` is not a URL.
    #[error("invalid API base URL {value:?}: {reason}")]
    InvalidUrl {
        /// Offending value.
        value: String,
        /// Parser message.
        reason: String,
    },
}

/// Everything the studio needs to run.
#[derive(Debug, Clone)]
pub struct StudioConfig {
    /// Gemini API key.
    pub api_key: Option<String>,
    /// REST base, e.g. `.../v1beta`.
    pub api_base: Url,
    /// Where the session slot lives.
    pub data_dir: PathBuf,
    /// Narrative model id.
    pub narrative_model: String,
    /// Model gated behind the credential check.
    pub premium_image_model: String,
    /// Direct-mode pause.
    pub direct_delay: Duration,
    /// Ticker period.
    pub tick_period: Duration,
}

impl StudioConfig {
    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `LOREMAP_API_BASE` is malformed.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if the API base is malformed.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let api_key = non_empty("GEMINI_API_KEY").or_else(|| non_empty("API_KEY"));
        let base = non_empty("LOREMAP_API_BASE").unwrap_or_else(|| DEFAULT_API_BASE.to_string());
        let api_base = parse_base(&base)?;
        let data_dir = non_empty("LOREMAP_DATA_DIR").map_or_else(
            || {
                non_empty("HOME").map_or_else(
                    || PathBuf::from(".loremap"),
                    |home| PathBuf::from(home).join(".loremap"),
                )
            },
            PathBuf::from,
        );
        let narrative_model = non_empty("LOREMAP_NARRATIVE_MODEL")
            .unwrap_or_else(|| DEFAULT_NARRATIVE_MODEL.to_string());

        Ok(Self {
            api_key,
            api_base,
            data_dir,
            narrative_model,
            premium_image_model: PREMIUM_IMAGE_MODEL.to_string(),
            direct_delay: DIRECT_MODE_DELAY,
            tick_period: TICK_PERIOD,
        })
    }

    /// Replace the API base.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidUrl`] if `base` is malformed.
    pub fn with_api_base(mut self, base: &str) -> Result<Self, ConfigError> {
        self.api_base = parse_base(base)?;
        Ok(self)
    }
}

fn parse_base(value: &str) -> Result<Url, ConfigError> {
    // Keep a trailing slash so joins append instead of replacing the last segment.
    let normalized = if value.ends_with('/') {
        value.to_string()
    } else {
        format!("{value}/")
    };
    Url::parse(&normalized).map_err(|e| ConfigError::InvalidUrl {
        value: value.to_string(),
        reason: e.to_string(),
    })
}
