//! StoryDelta configuration types and loading

use eyre::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::delta::{PlanOptions, TagOptions, UpdatePolicy};

/// Main StoryDelta configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[serde(rename = "log-level")]
    pub log_level: Option<String>,

    /// LLM provider configuration
    pub llm: LlmConfig,

    /// Planning knobs
    pub plan: PlanConfig,
}

impl Config {
    /// Load configuration with fallback chain
    pub fn load(config_path: Option<&PathBuf>) -> Result<Self> {
        // If explicit config path provided, try to load it
        if let Some(path) = config_path {
            return Self::load_from_file(path).context(format!("Failed to load config from {}", path.display()));
        }

        // Try project-local config: .storydelta.yml
        let local_config = PathBuf::from(".storydelta.yml");
        if local_config.exists() {
            match Self::load_from_file(&local_config) {
                Ok(config) => return Ok(config),
                Err(e) => {
                    tracing::warn!("Failed to load config from {}: {}", local_config.display(), e);
                }
            }
        }

        // Try user config: ~/.config/storydelta/storydelta.yml
        if let Some(config_dir) = dirs::config_dir() {
            let user_config = config_dir.join("storydelta").join("storydelta.yml");
            if user_config.exists() {
                match Self::load_from_file(&user_config) {
                    Ok(config) => return Ok(config),
                    Err(e) => {
                        tracing::warn!("Failed to load config from {}: {}", user_config.display(), e);
                    }
                }
            }
        }

        // No config file found, use defaults
        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Read only the log level, before logging is initialized
    ///
    /// Errors are swallowed: the full load reports them once logging exists.
    pub fn load_log_level(config_path: Option<&PathBuf>) -> Option<String> {
        let candidates = [
            config_path.cloned(),
            Some(PathBuf::from(".storydelta.yml")),
            dirs::config_dir().map(|d| d.join("storydelta").join("storydelta.yml")),
        ];
        candidates
            .into_iter()
            .flatten()
            .find(|p| p.exists())
            .and_then(|p| Self::load_from_file(&p).ok())
            .and_then(|c| c.log_level)
    }

    fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path).context("Failed to read config file")?;

        let config: Self = serde_yaml::from_str(&content).context("Failed to parse config file")?;

        tracing::info!("Loaded config from: {}", path.as_ref().display());
        Ok(config)
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// Provider name ("anthropic" or "openai")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// Environment variable containing the API key
    #[serde(rename = "api-key-env")]
    pub api_key_env: String,

    /// File holding the API key, used when the env var is unset
    #[serde(rename = "api-key-file")]
    pub api_key_file: Option<PathBuf>,

    /// API base URL
    #[serde(rename = "base-url")]
    pub base_url: String,

    /// Maximum tokens per response
    #[serde(rename = "max-tokens")]
    pub max_tokens: u32,

    /// Request timeout in milliseconds
    #[serde(rename = "timeout-ms")]
    pub timeout_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: "anthropic".to_string(),
            model: "claude-sonnet-4-20250514".to_string(),
            api_key_env: "ANTHROPIC_API_KEY".to_string(),
            api_key_file: None,
            base_url: "https://api.anthropic.com".to_string(),
            max_tokens: 8192,
            timeout_ms: 300_000,
        }
    }
}

impl LlmConfig {
    /// Resolve the API key from the environment, then from `api-key-file`
    pub fn get_api_key(&self) -> Result<String> {
        if let Ok(key) = std::env::var(&self.api_key_env)
            && !key.trim().is_empty()
        {
            return Ok(key.trim().to_string());
        }

        if let Some(path) = &self.api_key_file {
            let expanded = expand_home(path);
            let key = fs::read_to_string(&expanded)
                .context(format!("Failed to read API key file {}", expanded.display()))?;
            let key = key.trim();
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }

        Err(eyre::eyre!(
            "LLM API key not found. Set the {} environment variable or llm.api-key-file.",
            self.api_key_env
        ))
    }
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => dirs::home_dir().map(|home| home.join(rest)).unwrap_or_else(|| path.to_path_buf()),
        Err(_) => path.to_path_buf(),
    }
}

/// Planning configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanConfig {
    /// Vault-relative folder for newly created pages
    #[serde(rename = "target-folder")]
    pub target_folder: String,

    /// How existing pages are updated
    #[serde(rename = "update-policy")]
    pub update_policy: UpdatePolicy,

    /// Upper bound on characters per story chunk
    #[serde(rename = "max-chunk-chars")]
    pub max_chunk_chars: usize,

    /// Upper bound on summary length
    #[serde(rename = "max-summary-chars")]
    pub max_summary_chars: usize,

    /// Operations kept per chunk after sorting
    #[serde(rename = "max-operations-per-chunk")]
    pub max_operations_per_chunk: usize,

    /// Pages listed in each prompt's snapshot
    #[serde(rename = "max-existing-pages-in-prompt")]
    pub max_existing_pages_in_prompt: usize,

    /// Operations below this confidence are tracked but not merged
    #[serde(rename = "low-confidence-threshold")]
    pub low_confidence_threshold: f64,

    /// Raw default tag list (comma or newline separated)
    #[serde(rename = "default-tags")]
    pub default_tags: String,

    /// Lorebook scopes tagged onto new pages
    #[serde(rename = "lorebook-scopes")]
    pub lorebook_scopes: Vec<String>,

    /// Prefix for lorebook scope tags
    #[serde(rename = "tag-prefix")]
    pub tag_prefix: String,
}

impl Default for PlanConfig {
    fn default() -> Self {
        let options = PlanOptions::default();
        let tags = TagOptions::default();
        Self {
            target_folder: "wiki".to_string(),
            update_policy: UpdatePolicy::default(),
            max_chunk_chars: options.max_chunk_chars,
            max_summary_chars: options.max_summary_chars,
            max_operations_per_chunk: options.max_operations_per_chunk,
            max_existing_pages_in_prompt: options.max_existing_pages_in_prompt,
            low_confidence_threshold: options.low_confidence_threshold,
            default_tags: tags.default_tags_raw,
            lorebook_scopes: tags.lorebook_scopes,
            tag_prefix: tags.tag_prefix,
        }
    }
}

impl PlanConfig {
    /// Numeric knobs for the planning engine
    pub fn options(&self) -> PlanOptions {
        PlanOptions {
            max_chunk_chars: self.max_chunk_chars,
            max_summary_chars: self.max_summary_chars,
            max_operations_per_chunk: self.max_operations_per_chunk,
            max_existing_pages_in_prompt: self.max_existing_pages_in_prompt,
            low_confidence_threshold: self.low_confidence_threshold,
        }
    }

    /// Tag inputs for newly created pages
    pub fn tag_options(&self) -> TagOptions {
        TagOptions {
            default_tags_raw: self.default_tags.clone(),
            lorebook_scopes: self.lorebook_scopes.clone(),
            tag_prefix: self.tag_prefix.clone(),
        }
    }
}
