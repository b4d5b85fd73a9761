//! TOML configuration file loading
//!
//! Supports `~/.config/voxchat/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::PathBuf;

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct VoxchatConfigFile {
    /// Hosted API access
    #[serde(default)]
    pub openai: OpenAiFileConfig,

    /// Model selection
    #[serde(default)]
    pub models: ModelsFileConfig,

    /// Assistant behavior
    #[serde(default)]
    pub assistant: AssistantFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// API access configuration
#[derive(Debug, Default, Deserialize)]
pub struct OpenAiFileConfig {
    pub api_key: Option<String>,
    pub base_url: Option<String>,
}

/// Model configuration
#[derive(Debug, Default, Deserialize)]
pub struct ModelsFileConfig {
    /// STT model (e.g. "whisper-1")
    pub stt: Option<String>,

    /// Responses model (e.g. "gpt-5")
    pub llm: Option<String>,

    /// Reasoning effort ("minimal", "low", "medium", "high")
    pub reasoning_effort: Option<String>,

    /// TTS model (e.g. "gpt-4o-mini-tts")
    pub tts: Option<String>,

    /// TTS voice identifier (e.g. "sage")
    pub voice: Option<String>,
}

/// Assistant configuration
#[derive(Debug, Default, Deserialize)]
pub struct AssistantFileConfig {
    /// System instructions for replies and speech
    pub instructions: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// HTTP server port
    pub port: Option<u16>,

    /// Maximum turns streaming at once
    pub concurrency_limit: Option<usize>,

    /// Maximum duration of a single turn
    pub time_limit_secs: Option<u64>,
}

/// Parse a config file body
///
/// # Errors
///
/// Returns error if the TOML is malformed
pub fn parse_config_file(content: &str) -> Result<VoxchatConfigFile> {
    Ok(toml::from_str(content)?)
}

/// Load the TOML config file from the standard path
///
/// Returns `VoxchatConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> VoxchatConfigFile {
    let Some(path) = config_file_path() else {
        return VoxchatConfigFile::default();
    };

    if !path.exists() {
        return VoxchatConfigFile::default();
    }

    match std::fs::read_to_string(&path) {
        Ok(content) => match parse_config_file(&content) {
            Ok(config) => {
                tracing::info!(path = %path.display(), "loaded config file");
                config
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to parse config file, using defaults"
                );
                VoxchatConfigFile::default()
            }
        },
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to read config file"
            );
            VoxchatConfigFile::default()
        }
    }
}

/// Return the config file path
///
/// `VOXCHAT_CONFIG` wins; otherwise `~/.config/voxchat/config.toml`.
pub fn config_file_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("VOXCHAT_CONFIG") {
        return Some(PathBuf::from(path));
    }

    directories::BaseDirs::new().map(|d| d.config_dir().join("voxchat").join("config.toml"))
}
