//! Configuration management for voxchat
//!
//! Values are layered: environment variables, then the TOML file, then
//! built-in defaults.

pub mod file;

use std::time::Duration;

use secrecy::SecretString;

use crate::services::{DEFAULT_INSTRUCTIONS, OpenAiSettings};
use crate::{Error, Result};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 7860;

/// Default number of turns allowed to stream at once
pub const DEFAULT_CONCURRENCY_LIMIT: usize = 5;

/// voxchat configuration
#[derive(Debug)]
pub struct Config {
    /// `OpenAI` API key (from `OPENAI_API_KEY`)
    pub api_key: Option<SecretString>,

    /// Endpoint and model selection
    pub openai: OpenAiSettings,

    /// Assistant instructions for replies and speech
    pub instructions: String,

    /// HTTP server configuration
    pub server: ServerConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Maximum turns streaming at once
    pub concurrency_limit: usize,

    /// Turns running longer than this are abandoned
    pub time_limit: Option<Duration>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            concurrency_limit: DEFAULT_CONCURRENCY_LIMIT,
            time_limit: None,
        }
    }
}

impl Config {
    /// Load configuration from the environment and config file
    ///
    /// # Errors
    ///
    /// Returns error if a setting is out of range
    pub fn load() -> Result<Self> {
        let fc = file::load_config_file();
        Self::resolve(fc, |key| std::env::var(key).ok())
    }

    /// Merge a parsed config file with an environment lookup
    ///
    /// # Errors
    ///
    /// Returns error if a setting is out of range
    pub fn resolve(
        fc: file::VoxchatConfigFile,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self> {
        let defaults = OpenAiSettings::default();

        // API key (env > toml > None)
        let api_key = env("OPENAI_API_KEY")
            .or(fc.openai.api_key)
            .filter(|k| !k.is_empty())
            .map(SecretString::from);

        // Models (env > toml > default)
        let openai = OpenAiSettings {
            base_url: env("OPENAI_BASE_URL")
                .or(fc.openai.base_url)
                .unwrap_or(defaults.base_url),
            stt_model: env("VOXCHAT_STT_MODEL")
                .or(fc.models.stt)
                .unwrap_or(defaults.stt_model),
            llm_model: env("VOXCHAT_LLM_MODEL")
                .or(fc.models.llm)
                .unwrap_or(defaults.llm_model),
            reasoning_effort: env("VOXCHAT_REASONING_EFFORT")
                .or(fc.models.reasoning_effort)
                .unwrap_or(defaults.reasoning_effort),
            tts_model: env("VOXCHAT_TTS_MODEL")
                .or(fc.models.tts)
                .unwrap_or(defaults.tts_model),
            voice: env("VOXCHAT_TTS_VOICE")
                .or(fc.models.voice)
                .unwrap_or(defaults.voice),
            response_format: defaults.response_format,
        };

        let instructions = env("VOXCHAT_INSTRUCTIONS")
            .or(fc.assistant.instructions)
            .unwrap_or_else(|| DEFAULT_INSTRUCTIONS.to_string());

        // Server (env > toml > default)
        let port = env("VOXCHAT_PORT")
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(DEFAULT_PORT);

        let concurrency_limit = env("VOXCHAT_CONCURRENCY_LIMIT")
            .and_then(|s| s.parse().ok())
            .or(fc.server.concurrency_limit)
            .unwrap_or(DEFAULT_CONCURRENCY_LIMIT);
        if concurrency_limit == 0 {
            return Err(Error::Config(
                "concurrency limit must be at least 1".to_string(),
            ));
        }

        let time_limit = env("VOXCHAT_TIME_LIMIT_SECS")
            .and_then(|s| s.parse().ok())
            .or(fc.server.time_limit_secs)
            .filter(|&secs| secs > 0)
            .map(Duration::from_secs);

        Ok(Self {
            api_key,
            openai,
            instructions,
            server: ServerConfig {
                port,
                concurrency_limit,
                time_limit,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = Config::resolve(file::VoxchatConfigFile::default(), env_from(&[])).unwrap();

        assert!(config.api_key.is_none());
        assert_eq!(config.openai, OpenAiSettings::default());
        assert_eq!(config.instructions, DEFAULT_INSTRUCTIONS);
        assert_eq!(config.server, ServerConfig::default());
    }

    #[test]
    fn test_env_overrides_file() {
        let fc = file::parse_config_file(
            r#"
            [openai]
            api_key = "from-file"

            [models]
            voice = "alloy"
            llm = "file-model"

            [server]
            port = 9000
            time_limit_secs = 90
            "#,
        )
        .unwrap();
        let env = env_from(&[
            ("OPENAI_API_KEY", "from-env"),
            ("VOXCHAT_TTS_VOICE", "sage"),
            ("VOXCHAT_PORT", "8080"),
        ]);

        let config = Config::resolve(fc, env).unwrap();

        assert_eq!(config.api_key.unwrap().expose_secret(), "from-env");
        assert_eq!(config.openai.voice, "sage");
        assert_eq!(config.openai.llm_model, "file-model");
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.time_limit, Some(Duration::from_secs(90)));
    }

    #[test]
    fn test_unparsable_env_falls_through() {
        let fc = file::parse_config_file("[server]\nport = 9000\n").unwrap();
        let config = Config::resolve(fc, env_from(&[("VOXCHAT_PORT", "not-a-port")])).unwrap();
        assert_eq!(config.server.port, 9000);
    }

    #[test]
    fn test_zero_concurrency_rejected() {
        let env = env_from(&[("VOXCHAT_CONCURRENCY_LIMIT", "0")]);
        let result = Config::resolve(file::VoxchatConfigFile::default(), env);
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_empty_api_key_treated_as_missing() {
        let config = Config::resolve(
            file::VoxchatConfigFile::default(),
            env_from(&[("OPENAI_API_KEY", "")]),
        )
        .unwrap();
        assert!(config.api_key.is_none());
    }
}
