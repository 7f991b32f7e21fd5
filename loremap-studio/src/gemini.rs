//! Gemini REST implementation of [`SceneGenerator`].
//!
//! Every operation is a single `models/{model}:generateContent` call. Images
//! are uploaded as `inlineData` parts ahead of the text prompt and come back
//! the same way.

use async_trait::async_trait;
use loremap_canvas::DataUri;
use loremap_core::{GenerationMode, Language, LoreFile};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use url::Url;

use crate::config::StudioConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::generator::SceneGenerator;
use crate::prompts;

/// Returned in place of an empty description.
pub const EMPTY_DESCRIPTION: &str = "Failed to generate description.";

/// Raised when an image call returns no image part.
pub const NO_IMAGE_DATA: &str = "No image data returned from API";

const UPLOAD_MIME: &str = "image/png";

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum Part {
    Inline {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
    Text {
        text: String,
    },
    Other(serde_json::Value),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct InlineData {
    mime_type: String,
    data: String,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Content,
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    #[serde(default)]
    message: String,
}

impl GenerateResponse {
    fn parts(&self) -> impl Iterator<Item = &Part> {
        self.candidates
            .first()
            .into_iter()
            .flat_map(|c| c.content.parts.iter())
    }

    fn text(&self) -> String {
        self.parts()
            .filter_map(|p| match p {
                Part::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    fn image_uri(&self) -> Option<String> {
        self.parts().find_map(|p| match p {
            Part::Inline { inline_data } if !inline_data.data.is_empty() => Some(format!(
                "data:{};base64,{}",
                inline_data.mime_type, inline_data.data
            )),
            _ => None,
        })
    }
}

/// Image payload for upload: the base64 body of a data URI, or the input
/// unchanged when it is already bare base64.
fn inline_image(image: &str) -> Part {
    let data = match DataUri::parse(image) {
        Ok(uri) if uri.is_base64 => uri.payload.to_string(),
        _ => image.to_string(),
    };
    Part::Inline {
        inline_data: InlineData {
            mime_type: UPLOAD_MIME.to_string(),
            data,
        },
    }
}

/// Gemini client.
#[derive(Debug, Clone)]
pub struct GeminiGenerator {
    http: Client,
    base: Url,
    api_key: Option<String>,
    narrative_model: String,
}

impl GeminiGenerator {
    /// Build a client from the studio configuration.
    ///
    /// # Errors
    ///
    /// Returns [`GenerationError::Transport`] if the HTTP client fails to build.
    pub fn new(config: &StudioConfig) -> GenerationResult<Self> {
        let http = Client::builder()
            .user_agent(format!("loremap/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            http,
            base: config.api_base.clone(),
            api_key: config.api_key.clone(),
            narrative_model: config.narrative_model.clone(),
        })
    }

    fn endpoint(&self, model: &str) -> GenerationResult<Url> {
        let mut url = self
            .base
            .join(&format!("models/{model}:generateContent"))
            .map_err(|e| GenerationError::InvalidEndpoint(e.to_string()))?;
        if let Some(key) = &self.api_key {
            url.query_pairs_mut().append_pair("key", key);
        }
        Ok(url)
    }

    async fn generate(&self, model: &str, parts: Vec<Part>) -> GenerationResult<GenerateResponse> {
        // The URL carries the key; log the model only.
        debug!(model, parts = parts.len(), "sending generateContent");
        let request = GenerateRequest {
            contents: vec![Content { parts }],
        };
        let response = self
            .http
            .post(self.endpoint(model)?)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            warn!(status = %status, model, "Gemini API error response");
            let message = serde_json::from_str::<ErrorEnvelope>(&body)
                .map(|e| e.error.message)
                .unwrap_or(body);
            return Err(GenerationError::Http {
                status: status.as_u16(),
                message,
            });
        }
        serde_json::from_str(&body)
            .map_err(|e| GenerationError::Remote(format!("malformed response: {e}")))
    }

    async fn generate_image(&self, model: &str, parts: Vec<Part>) -> GenerationResult<String> {
        self.generate(model, parts)
            .await?
            .image_uri()
            .ok_or_else(|| GenerationError::NoPayload(NO_IMAGE_DATA.to_string()))
    }
}

#[async_trait]
impl SceneGenerator for GeminiGenerator {
    async fn describe_scene(
        &self,
        lore: &[LoreFile],
        request: &str,
        sketch: Option<&str>,
        model: &str,
        mode: GenerationMode,
        style: &str,
    ) -> GenerationResult<String> {
        let prompt = prompts::description_prompt(lore, request, sketch.is_some(), mode, style);
        let mut parts = Vec::with_capacity(2);
        if let Some(sketch) = sketch {
            parts.push(inline_image(sketch));
        }
        parts.push(Part::Text { text: prompt });

        let text = self.generate(model, parts).await?.text();
        if text.is_empty() {
            Ok(EMPTY_DESCRIPTION.to_string())
        } else {
            Ok(text)
        }
    }

    async fn narrate(
        &self,
        lore: &[LoreFile],
        request: &str,
        mode: GenerationMode,
        language: Language,
    ) -> String {
        let prompt = prompts::narrative_prompt(lore, request, mode, language);
        match self
            .generate(&self.narrative_model, vec![Part::Text { text: prompt }])
            .await
        {
            Ok(response) => response.text(),
            Err(e) => {
                warn!(error = %e, "narrative generation failed");
                String::new()
            }
        }
    }

    async fn render_image(
        &self,
        description: &str,
        sketch: Option<&str>,
        model: &str,
        mode: GenerationMode,
        style: &str,
    ) -> GenerationResult<String> {
        let prompt = prompts::render_prompt(description, sketch.is_some(), mode, style);
        let mut parts = Vec::with_capacity(2);
        if let Some(sketch) = sketch {
            parts.push(inline_image(sketch));
        }
        parts.push(Part::Text { text: prompt });
        self.generate_image(model, parts).await
    }

    async fn edit_image(
        &self,
        image: &str,
        instruction: &str,
        model: &str,
        mode: GenerationMode,
        style: &str,
    ) -> GenerationResult<String> {
        let parts = vec![
            inline_image(image),
            Part::Text {
                text: prompts::edit_prompt(instruction, mode, style),
            },
        ];
        self.generate_image(model, parts).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_inline_image_strips_prefix() {
        let Part::Inline { inline_data } = inline_image("data:image/jpeg;base64,QUJD") else {
            panic!("expected inline part");
        };
        assert_eq!(inline_data.data, "QUJD");
        assert_eq!(inline_data.mime_type, "image/png");

        let Part::Inline { inline_data } = inline_image("QUJD") else {
            panic!("expected inline part");
        };
        assert_eq!(inline_data.data, "QUJD");
    }

    #[test]
    fn test_request_wire_shape() {
        let request = GenerateRequest {
            contents: vec![Content {
                parts: vec![
                    inline_image("data:image/png;base64,AAAA"),
                    Part::Text { text: "hi".into() },
                ],
            }],
        };
        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "contents": [{
                    "parts": [
                        { "inlineData": { "mimeType": "image/png", "data": "AAAA" } },
                        { "text": "hi" }
                    ]
                }]
            })
        );
    }

    #[test]
    fn test_response_text_concatenates_parts() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [{ "text": "Stone " }, { "text": "floor" }] },
                "finishReason": "STOP"
            }]
        }))
        .unwrap();
        assert_eq!(response.text(), "Stone floor");
        assert_eq!(response.image_uri(), None);
    }

    #[test]
    fn test_response_first_image_wins() {
        let response: GenerateResponse = serde_json::from_value(json!({
            "candidates": [{
                "content": { "parts": [
                    { "text": "here you go" },
                    { "inlineData": { "mimeType": "image/webp", "data": "AAA" } },
                    { "inlineData": { "mimeType": "image/png", "data": "BBB" } },
                    { "thought": true }
                ] }
            }]
        }))
        .unwrap();
        assert_eq!(response.image_uri().as_deref(), Some("data:image/webp;base64,AAA"));
    }

    #[test]
    fn test_empty_candidates() {
        let response: GenerateResponse = serde_json::from_value(json!({})).unwrap();
        assert_eq!(response.text(), "");
        assert_eq!(response.image_uri(), None);
    }

    #[test]
    fn test_endpoint_appends_key() {
        let config = StudioConfig::from_lookup(|k| (k == "GEMINI_API_KEY").then(|| "k1".to_string()))
            .unwrap();
        let generator = GeminiGenerator::new(&config).unwrap();
        let url = generator.endpoint("gemini-2.5-flash").unwrap();
        assert_eq!(
            url.as_str(),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.5-flash:generateContent?key=k1"
        );
    }
}
