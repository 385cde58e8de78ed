use std::time::Duration;

use serde::Deserialize;

/// Generator worker settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    /// TTS provider requested from the gateway for podcast lines.
    pub tts_provider: String,
    /// TTS model requested from the gateway for podcast lines.
    pub tts_model: String,
    /// Voice id used for lines spoken by Host A.
    pub host_a_voice: String,
    /// Voice id used for lines spoken by Host B.
    pub host_b_voice: String,
    /// Pause between consecutive TTS calls to stay under provider rate
    /// limits.
    #[serde(deserialize_with = "duration_str::deserialize_duration")]
    pub tts_pacing: Duration,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            tts_provider: "elevenlabs".to_string(),
            tts_model: "eleven_multilingual_v2".to_string(),
            host_a_voice: "pNInz6obpgDQGcFmaJgB".to_string(),
            host_b_voice: "21m00Tcm4TlvDq8ikWAM".to_string(),
            tts_pacing: Duration::from_secs(5),
        }
    }
}
