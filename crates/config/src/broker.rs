use std::{fmt, time::Duration};

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

/// AMQP broker connection settings.
#[derive(Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Broker host.
    pub host: String,
    /// Broker port.
    pub port: u16,
    /// Broker user.
    pub user: String,
    /// Broker password.
    pub password: SecretString,
    /// Heartbeat interval negotiated with the broker. Long LLM and TTS calls
    /// must fit inside this window.
    #[serde(deserialize_with = "duration_str::deserialize_duration")]
    pub heartbeat: Duration,
    /// How long a publish may sit on a connection the broker has blocked
    /// for flow control before the event is dropped.
    #[serde(deserialize_with = "duration_str::deserialize_duration")]
    pub blocked_connection_timeout: Duration,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5672,
            user: "guest".to_string(),
            password: SecretString::from("guest".to_string()),
            heartbeat: Duration::from_secs(600),
            blocked_connection_timeout: Duration::from_secs(300),
        }
    }
}

impl BrokerConfig {
    /// The AMQP URI for the configured broker, carrying the heartbeat as a
    /// query parameter so lapin negotiates it during the handshake.
    pub fn uri(&self) -> String {
        format!(
            "amqp://{}:{}@{}:{}/%2f?heartbeat={}",
            self.user,
            self.password.expose_secret(),
            self.host,
            self.port,
            self.heartbeat.as_secs()
        )
    }
}

impl fmt::Debug for BrokerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BrokerConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("heartbeat", &self.heartbeat)
            .field("blocked_connection_timeout", &self.blocked_connection_timeout)
            .finish()
    }
}
