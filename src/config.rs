//! Configuration module

use std::env;
use std::path::PathBuf;

/// Upload ceiling enforced by the router body limit
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 16 * 1024 * 1024;

/// Records sent to the model per request
pub const DEFAULT_BATCH_SIZE: usize = 10;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// Directory holding uploaded listings and generated JSON artifacts
    pub upload_dir: PathBuf,

    /// Maximum request body size in bytes
    pub max_upload_bytes: usize,

    /// Text generation settings; `None` disables annotation
    pub ai: Option<AiConfig>,
}

/// Text generation model settings
#[derive(Debug, Clone)]
pub struct AiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub batch_size: usize,
    pub timeout_seconds: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        Self {
            port: env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(5000),

            upload_dir: env::var("UPLOAD_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("uploads")),

            max_upload_bytes: env::var("MAX_UPLOAD_BYTES")
                .ok()
                .and_then(|b| b.parse().ok())
                .unwrap_or(DEFAULT_MAX_UPLOAD_BYTES),

            ai: AiConfig::from_env(),
        }
    }
}

impl AiConfig {
    /// Annotation needs an API key and can be switched off with `AI_ANNOTATION=false`
    pub fn from_env() -> Option<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Option<Self> {
        let enabled = var("AI_ANNOTATION")
            .map(|v| !matches!(v.to_ascii_lowercase().as_str(), "0" | "false" | "off" | "no"))
            .unwrap_or(true);
        if !enabled {
            return None;
        }

        let api_key = var("GEMINI_API_KEY").filter(|k| !k.trim().is_empty())?;

        Some(Self {
            api_key,

            model: var("GEMINI_MODEL")
                .unwrap_or_else(|| "gemini-1.5-flash".to_string()),

            base_url: var("GEMINI_BASE_URL")
                .unwrap_or_else(|| "https://generativelanguage.googleapis.com".to_string()),

            batch_size: var("ANNOTATION_BATCH_SIZE")
                .and_then(|b| b.parse().ok())
                .unwrap_or(DEFAULT_BATCH_SIZE),

            timeout_seconds: var("AI_TIMEOUT_SECS")
                .and_then(|t| t.parse().ok())
                .unwrap_or(60),
        })
    }
}
