use std::env;

/// Configuration for the optional outer `axum` binary (host/port, logging).
/// Not part of the agent core's public surface — spec §6 names the agent's
/// own `config` argument (see [`crate::agent::AgentConfig`]) as the real
/// configuration seam.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    pub host: String,
}

impl ServerConfig {
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8765),
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 8765,
            host: "127.0.0.1".to_string(),
        }
    }
}

/// LLM credentials recognized by the test harness, not by the core
/// (spec §6): `OPENAI_API_KEY|API_KEY`, `OPENAI_BASE_URL|BASE_URL`,
/// `OPENAI_MODEL|MODEL`.
#[derive(Debug, Clone, Default)]
pub struct LlmEnvCredentials {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
    pub model: Option<String>,
}

impl LlmEnvCredentials {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("OPENAI_API_KEY").or_else(|_| env::var("API_KEY")).ok(),
            base_url: env::var("OPENAI_BASE_URL").or_else(|_| env::var("BASE_URL")).ok(),
            model: env::var("OPENAI_MODEL").or_else(|_| env::var("MODEL")).ok(),
        }
    }
}
