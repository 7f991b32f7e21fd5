//! Project file interchange.
//!
//! A project document is the persisted app projection plus the current
//! canvas image:
//!
//! ```json
//! {
//!   "version": 1,
//!   "timestamp": 1718000000000,
//!   "appState": { "locationRequest": "...", "generatedImages": [...] },
//!   "canvasState": { "currentSerialized": "data:image/png;base64,..." }
//! }
//! ```

use std::sync::Arc;

use chrono::{DateTime, NaiveDate, Utc};
use loremap_canvas::CanvasState;
use loremap_core::{AppState, SessionData, Store};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::{ProjectError, ProjectResult};

/// Document version written by this build.
pub const PROJECT_VERSION: u32 = 1;

/// Canvas part of a project document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CanvasSnapshot {
    /// The visible sketch as a data URI.
    #[serde(default, alias = "currentBase64")]
    pub current_serialized: Option<Arc<str>>,
}

/// A saved project.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectDocument {
    /// Format version.
    pub version: u32,
    /// Export time, milliseconds since the Unix epoch.
    #[serde(default)]
    pub timestamp: i64,
    /// Persisted app fields. The sketch travels in `canvas_state` instead.
    pub app_state: SessionData,
    /// Canvas image.
    #[serde(default)]
    pub canvas_state: CanvasSnapshot,
}

/// Download name for a project exported on `date`.
#[must_use]
pub fn export_file_name(date: NaiveDate) -> String {
    format!("loremap-project-{}.json", date.format("%Y-%m-%d"))
}

impl ProjectDocument {
    /// Capture both stores at `now`.
    #[must_use]
    pub fn capture(app: &AppState, canvas: &CanvasState, now: DateTime<Utc>) -> Self {
        let mut app_state = SessionData::from_state(app);
        app_state.sketch = None;
        Self {
            version: PROJECT_VERSION,
            timestamp: now.timestamp_millis(),
            app_state,
            canvas_state: CanvasSnapshot {
                current_serialized: canvas.current_serialized.clone(),
            },
        }
    }

    /// Pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Parse`] if serialization fails.
    pub fn to_json_pretty(&self) -> ProjectResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse a project file.
    ///
    /// # Errors
    ///
    /// Returns [`ProjectError::Parse`] for text that is not JSON and
    /// [`ProjectError::InvalidFormat`] when `version` or `appState` is
    /// missing or unusable.
    pub fn parse(json: &str) -> ProjectResult<Self> {
        let value: Value = serde_json::from_str(json)?;
        let has_version = value
            .get("version")
            .is_some_and(|v| v.as_u64().is_some_and(|n| n > 0));
        let has_app_state = value.get("appState").is_some_and(Value::is_object);
        if !has_version || !has_app_state {
            return Err(ProjectError::InvalidFormat);
        }
        serde_json::from_value(value).map_err(|_| ProjectError::InvalidFormat)
    }

    /// Replace the app state with this project and queue the canvas image
    /// for re-initialisation.
    ///
    /// The canvas history is only reset when the project carries an image;
    /// the engine must be refreshed afterwards to paint it.
    pub fn apply(self, app: &Store<AppState>, canvas: &Store<CanvasState>) {
        let image = self.canvas_state.current_serialized;
        let mut data = self.app_state;
        data.sketch.clone_from(&image);

        app.update(|current| {
            let mut next = AppState::clone(current).hydrate(data);
            next.error = None;
            Arc::new(next)
        });
        if let Some(image) = image {
            canvas.patch(|s| s.reset_history(Some(image)));
        }
        info!(version = self.version, "Project imported");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_export_file_name() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 7).unwrap();
        assert_eq!(export_file_name(date), "loremap-project-2024-03-07.json");
    }

    #[test]
    fn test_capture_moves_sketch_to_canvas_state() {
        let mut app = AppState::default();
        app.sketch = Some(Arc::from("data:image/png;base64,OLD"));
        let mut canvas = CanvasState::default();
        canvas.current_serialized = Some(Arc::from("data:image/png;base64,NEW"));
        let now = Utc.timestamp_millis_opt(1_700_000_000_000).unwrap();

        let doc = ProjectDocument::capture(&app, &canvas, now);
        assert_eq!(doc.version, 1);
        assert_eq!(doc.timestamp, 1_700_000_000_000);
        assert_eq!(doc.app_state.sketch, None);
        assert_eq!(
            doc.canvas_state.current_serialized.as_deref(),
            Some("data:image/png;base64,NEW")
        );

        let json: Value = serde_json::from_str(&doc.to_json_pretty().unwrap()).unwrap();
        assert!(json["appState"].get("sketchBase64").is_none());
        assert_eq!(
            json["canvasState"]["currentSerialized"],
            "data:image/png;base64,NEW"
        );
    }

    #[test]
    fn test_parse_rejects_missing_fields() {
        for json in [
            r#"{"appState": {}}"#,
            r#"{"version": 1}"#,
            r#"{"version": 0, "appState": {}}"#,
            r#"{"version": 1, "appState": "nope"}"#,
            r"[]",
        ] {
            assert!(
                matches!(ProjectDocument::parse(json), Err(ProjectError::InvalidFormat)),
                "{json}"
            );
        }
        assert!(matches!(
            ProjectDocument::parse("not json"),
            Err(ProjectError::Parse(_))
        ));
    }

    #[test]
    fn test_parse_accepts_legacy_canvas_key() {
        let doc = ProjectDocument::parse(
            r#"{
                "version": 1,
                "timestamp": 5,
                "appState": { "locationRequest": "Old mill", "generatedImages": ["data:image/png;base64,AA"] },
                "canvasState": { "currentBase64": "data:image/png;base64,BB" }
            }"#,
        )
        .unwrap();
        assert_eq!(doc.app_state.location_request, "Old mill");
        assert_eq!(doc.app_state.generated_images.len(), 1);
        assert_eq!(
            doc.canvas_state.current_serialized.as_deref(),
            Some("data:image/png;base64,BB")
        );
    }

    #[test]
    fn test_apply_without_image_keeps_canvas() {
        let app = Store::new(AppState::default());
        let canvas = Store::new(CanvasState::default());
        let before = canvas.get_state();
        app.patch(|s| s.error = Some("old".into()));

        let doc = ProjectDocument::parse(r#"{"version": 1, "appState": {"artStyle": "grimdark"}}"#)
            .unwrap();
        doc.apply(&app, &canvas);

        let state = app.get_state();
        assert_eq!(state.art_style, "grimdark");
        assert_eq!(state.error, None);
        assert!(state.is_loaded);
        assert!(Arc::ptr_eq(&before, &canvas.get_state()));
    }
}
