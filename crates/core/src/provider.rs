use std::time::Duration;

use crate::error::{ReelError, Result};

/// External services the pipeline talks to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Service {
    OpenAi,
    Pexels,
    ElevenLabs,
}

pub struct ServiceConfig {
    pub base_url: &'static str,
    pub env_var: &'static str,
}

impl Service {
    pub fn config(&self) -> ServiceConfig {
        match self {
            Service::OpenAi => ServiceConfig {
                base_url: "https://api.openai.com/v1",
                env_var: "OPENAI_API_KEY",
            },
            Service::Pexels => ServiceConfig {
                base_url: "https://api.pexels.com",
                env_var: "PEXELS_API_KEY",
            },
            Service::ElevenLabs => ServiceConfig {
                base_url: "https://api.elevenlabs.io/v1",
                env_var: "ELEVENLABS_API_KEY",
            },
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Service::OpenAi => "OpenAI",
            Service::Pexels => "Pexels",
            Service::ElevenLabs => "ElevenLabs",
        }
    }

    /// Validate that the API key is set for this service
    pub fn validate_api_key(&self) -> Result<String> {
        let config = self.config();
        let key = std::env::var(config.env_var).unwrap_or_default();
        let key = key.trim();
        if key.is_empty() {
            return Err(ReelError::MissingApiKey {
                service: self.name(),
                env_var: config.env_var,
            });
        }
        Ok(key.to_string())
    }
}

/// Build the HTTP client shared by every collaborator call of one run.
pub fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

/// Turn a non-2xx response into an `Api` error carrying the upstream body.
pub(crate) async fn check_response(
    service: Service,
    response: reqwest::Response,
) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ReelError::Api {
        service: service.name(),
        reason: format!("HTTP {}: {}", status, body.trim()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_service_has_a_distinct_key_variable() {
        let vars = [Service::OpenAi, Service::Pexels, Service::ElevenLabs]
            .map(|s| s.config().env_var);
        assert_eq!(vars, ["OPENAI_API_KEY", "PEXELS_API_KEY", "ELEVENLABS_API_KEY"]);
    }
}
