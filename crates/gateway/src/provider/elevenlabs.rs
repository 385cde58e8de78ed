use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{Map, Value, json};
use url::Url;

use crate::{
    error::{GatewayError, GatewayResult},
    http_client::http_client,
    provider::SpeechProvider,
};

const TTS_TIMEOUT: Duration = Duration::from_secs(60);

/// Driver for the ElevenLabs voice-cloning text-to-speech API.
pub(crate) struct ElevenLabsProvider {
    client: reqwest::Client,
    name: String,
    api_key: SecretString,
    base_url: Url,
}

impl ElevenLabsProvider {
    pub fn new(name: String, api_key: SecretString, base_url: Url) -> Self {
        Self {
            client: http_client(),
            name,
            api_key,
            base_url,
        }
    }
}

/// Per-voice synthesis parameters, with the provider's documented defaults
/// when the request does not override them.
fn voice_settings(options: &Map<String, Value>) -> Value {
    json!({
        "stability": options.get("stability").cloned().unwrap_or(json!(0.5)),
        "similarity_boost": options.get("similarity_boost").cloned().unwrap_or(json!(0.5)),
        "style": options.get("style").cloned().unwrap_or(json!(0.0)),
        "use_speaker_boost": options.get("use_speaker_boost").cloned().unwrap_or(json!(true)),
    })
}

#[async_trait]
impl SpeechProvider for ElevenLabsProvider {
    async fn speech(
        &self,
        text: &str,
        model: &str,
        voice: &str,
        options: &Map<String, Value>,
    ) -> GatewayResult<Bytes> {
        let url = format!(
            "{}/v1/text-to-speech/{voice}",
            self.base_url.as_str().trim_end_matches('/')
        );

        let body = json!({
            "text": text,
            "model_id": model,
            "voice_settings": voice_settings(options),
        });

        let response = self
            .client
            .post(url)
            .timeout(TTS_TIMEOUT)
            .header("xi-api-key", self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| GatewayError::ConnectionError(format!("Failed to reach '{}': {e}", self.name)))?;

        let status = response.status();

        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("'{}' TTS API error ({status}): {error_text}", self.name);

            return Err(GatewayError::from_upstream(status.as_u16(), error_text));
        }

        // The provider streams the audio; collect it into one buffer for the
        // caller.
        response.bytes().await.map_err(|e| {
            log::error!("Failed to read '{}' TTS audio: {e}", self.name);
            GatewayError::InternalError(None)
        })
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn voice_settings_defaults_and_overrides() {
        let defaults = voice_settings(&Map::new());
        assert_eq!(defaults["stability"], json!(0.5));
        assert_eq!(defaults["use_speaker_boost"], json!(true));

        let mut options = Map::new();
        options.insert("style".to_string(), json!(0.7));

        let overridden = voice_settings(&options);
        assert_eq!(overridden["style"], json!(0.7));
        assert_eq!(overridden["similarity_boost"], json!(0.5));
    }
}
