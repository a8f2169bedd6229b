use std::collections::BTreeMap;

use serde::Deserialize;

use crate::{
    error::{ReelError, Result},
    provider::{Service, check_response},
};

pub const SCRIPT_MODEL: &str = "gpt-4o-mini";
pub const VISION_MODEL: &str = "gpt-4o";
pub const MODERATION_MODEL: &str = "omni-moderation-latest";
pub const SPEECH_MODEL: &str = "tts-1-hd";
pub const SPEECH_VOICE: &str = "nova";

#[derive(Debug, Clone, Deserialize)]
pub struct ModerationResult {
    pub flagged: bool,
    #[serde(default)]
    pub categories: BTreeMap<String, Option<bool>>,
    #[serde(default)]
    pub category_scores: BTreeMap<String, Option<f64>>,
}

#[derive(Debug, Deserialize)]
struct ModerationResponse {
    results: Vec<ModerationResult>,
}

/// Thin client over the OpenAI endpoints the pipeline uses.
pub struct OpenAiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: &'static str,
}

impl OpenAiClient {
    pub fn new(http: reqwest::Client) -> Result<Self> {
        let api_key = Service::OpenAi.validate_api_key()?;
        Ok(Self {
            http,
            api_key,
            base_url: Service::OpenAi.config().base_url,
        })
    }

    /// Single user-turn chat completion; returns the assistant's text.
    ///
    /// `content` is either a plain string or an array of content parts
    /// (text and `image_url` entries).
    pub async fn chat(
        &self,
        model: &str,
        content: serde_json::Value,
        temperature: Option<f32>,
        max_tokens: Option<u32>,
    ) -> Result<String> {
        let mut body = serde_json::json!({
            "model": model,
            "messages": [
                {
                    "role": "user",
                    "content": content,
                },
            ],
        });
        if let Some(temperature) = temperature {
            body["temperature"] = serde_json::json!(temperature);
        }
        if let Some(max_tokens) = max_tokens {
            body["max_tokens"] = serde_json::json!(max_tokens);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .header("Content-Type", "application/json")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&body)
            .send()
            .await?;
        let response = check_response(Service::OpenAi, response)
            .await?
            .json::<serde_json::Value>()
            .await?;

        let content = response["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ReelError::Api {
                service: Service::OpenAi.name(),
                reason: format!("Invalid API response: {:?}", response),
            })?;

        Ok(content.trim().to_string())
    }

    pub async fn moderate(&self, input: &str) -> Result<Vec<ModerationResult>> {
        let response = self
            .http
            .post(format!("{}/moderations", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": MODERATION_MODEL,
                "input": input,
            }))
            .send()
            .await?;
        let response = check_response(Service::OpenAi, response)
            .await?
            .json::<ModerationResponse>()
            .await?;

        Ok(response.results)
    }

    /// Synthesize speech; returns MP3 bytes.
    pub async fn speech(&self, text: &str) -> Result<Vec<u8>> {
        let response = self
            .http
            .post(format!("{}/audio/speech", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": SPEECH_MODEL,
                "voice": SPEECH_VOICE,
                "input": text,
                "response_format": "mp3",
            }))
            .send()
            .await?;
        let bytes = check_response(Service::OpenAi, response)
            .await?
            .bytes()
            .await?;

        Ok(bytes.to_vec())
    }
}

/// Strip a surrounding markdown code fence, if the model added one.
pub fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map(|(_, body)| body).unwrap_or("");
    body.rsplit_once("```")
        .map(|(inner, _)| inner)
        .unwrap_or(body)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_fenced_json() {
        assert_eq!(strip_code_fence("```json\n{\"a\": 1}\n```"), "{\"a\": 1}");
        assert_eq!(strip_code_fence("  {\"a\": 1} "), "{\"a\": 1}");
        assert_eq!(strip_code_fence("```\n[1]\n```\n"), "[1]");
    }

    #[test]
    fn moderation_payload_tolerates_nulls() {
        let parsed: ModerationResponse = serde_json::from_str(
            r#"{"results": [{"flagged": true,
                "categories": {"violence/graphic": true, "sexual": false},
                "category_scores": {"violence/graphic": 0.91, "illicit": null}}]}"#,
        )
        .unwrap();
        let result = &parsed.results[0];
        assert!(result.flagged);
        assert_eq!(result.categories["violence/graphic"], Some(true));
        assert_eq!(result.category_scores["illicit"], None);
    }
}
