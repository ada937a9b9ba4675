//! Configuration management for fewshot.
//!
//! Configuration is merged from, in increasing precedence:
//! - Built-in defaults
//! - The workspace config file (`.fewshot/config.yaml`)
//! - Environment variables
//! - Command-line flags
//!
//! Durable session state lives next to the config file in `.fewshot/`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Providers the factory knows how to build.
pub const KNOWN_PROVIDERS: [&str; 3] = ["gemini", "ollama", "scripted"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .fewshot/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Model provider ("gemini", "ollama" or "scripted")
    pub provider: String,

    /// Model identifier
    pub model: String,

    /// API key for the provider
    pub api_key: Option<String>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Provider configurations from config.yaml
    pub llm: Option<LlmConfig>,

    /// Session behavior
    pub session: SessionSettings,
}

/// LLM configuration from config.yaml.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(rename = "activeProvider")]
    pub active_provider: String,

    pub providers: HashMap<String, ProviderConfig>,
}

/// Provider-specific configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ProviderConfig {
    Gemini {
        #[serde(rename = "apiKeyEnv")]
        api_key_env: String,
        model: String,
        endpoint: Option<String>,
    },
    Ollama {
        endpoint: String,
        model: String,
        timeout: Option<u64>,
    },
}

impl ProviderConfig {
    /// Model configured for this provider.
    pub fn model(&self) -> &str {
        match self {
            Self::Gemini { model, .. } => model,
            Self::Ollama { model, .. } => model,
        }
    }

    /// Endpoint override, if any.
    pub fn endpoint(&self) -> Option<&str> {
        match self {
            Self::Gemini { endpoint, .. } => endpoint.as_deref(),
            Self::Ollama { endpoint, .. } => Some(endpoint.as_str()),
        }
    }
}

/// Which templates feed the compositor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplatePolicy {
    /// Only the current template is composed
    #[default]
    Current,
    /// Every template is composed, in collection order
    All,
}

/// Where durable session state is written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per record under `.fewshot/state/`
    #[default]
    File,
    /// A single SQLite database at `.fewshot/state.sqlite`
    Sqlite,
}

/// Session behavior settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSettings {
    /// Persist the conversation log across runs
    #[serde(default)]
    pub persist_conversation: bool,

    /// Template composition policy
    #[serde(default)]
    pub template_policy: TemplatePolicy,

    /// Quiet period before template edits are written, in milliseconds
    #[serde(default = "default_template_debounce_ms")]
    pub template_debounce_ms: u64,

    /// Storage backend
    #[serde(default)]
    pub storage: StorageBackend,
}

fn default_template_debounce_ms() -> u64 {
    800
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            persist_conversation: false,
            template_policy: TemplatePolicy::default(),
            template_debounce_ms: default_template_debounce_ms(),
            storage: StorageBackend::default(),
        }
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ConfigFile {
    llm: Option<LlmConfig>,
    session: Option<SessionSettings>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            provider: "gemini".to_string(),
            model: "gemini-1.5-flash".to_string(),
            api_key: None,
            log_level: None,
            verbose: false,
            no_color: false,
            llm: None,
            session: SessionSettings::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables, config file and defaults.
    ///
    /// Environment variables:
    /// - `FEWSHOT_WORKSPACE`: Override workspace path
    /// - `FEWSHOT_CONFIG`: Path to config file
    /// - `FEWSHOT_PROVIDER`: Model provider
    /// - `FEWSHOT_MODEL`: Model identifier
    /// - `FEWSHOT_API_KEY`: API key
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        Self::load_with(None, None)
    }

    /// Like `load`, but an explicit workspace or config file wins over the
    /// environment. The config file is read from the resulting location.
    pub fn load_with(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Ok(workspace) = std::env::var("FEWSHOT_WORKSPACE") {
            config.workspace = PathBuf::from(workspace);
        }
        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }

        if let Ok(config_file) = std::env::var("FEWSHOT_CONFIG") {
            config.config_file = Some(PathBuf::from(config_file));
        }
        if let Some(config_file) = config_file {
            config.config_file = Some(config_file);
        }

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = config.config_path();
        if config_path.exists() {
            config = config.merge_yaml(&config_path)?;
        }

        // Environment variables override the YAML file
        if let Ok(provider) = std::env::var("FEWSHOT_PROVIDER") {
            config.provider = provider;
        }

        if let Ok(model) = std::env::var("FEWSHOT_MODEL") {
            config.model = model;
        }

        config.api_key = std::env::var("FEWSHOT_API_KEY").ok();
        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var("NO_COLOR").is_ok() {
            config.no_color = true;
        }

        Ok(config)
    }

    /// Path of the config file that applies to this configuration.
    pub fn config_path(&self) -> PathBuf {
        match self.config_file {
            Some(ref cf) => cf.clone(),
            None => self.fewshot_dir().join("config.yaml"),
        }
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&self, path: &Path) -> AppResult<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        self.merge_yaml_str(&contents)
            .map_err(|e| AppError::Config(format!("Failed to parse config file {:?}: {}", path, e)))
    }

    fn merge_yaml_str(&self, contents: &str) -> Result<Self, serde_yaml::Error> {
        let config_file: ConfigFile = serde_yaml::from_str(contents)?;
        let mut result = self.clone();

        if let Some(logging) = config_file.logging {
            if let Some(level) = logging.level {
                result.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                result.no_color = !color;
            }
        }

        if let Some(session) = config_file.session {
            result.session = session;
        }

        if let Some(llm) = config_file.llm {
            result.provider = llm.active_provider.clone();

            if let Some(provider_config) = llm.providers.get(&llm.active_provider) {
                result.model = provider_config.model().to_string();
            }

            result.llm = Some(llm);
        }

        Ok(result)
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Command-line flags take precedence over everything else.
    #[allow(clippy::too_many_arguments)]
    pub fn with_overrides(
        mut self,
        workspace: Option<PathBuf>,
        config_file: Option<PathBuf>,
        provider: Option<String>,
        model: Option<String>,
        log_level: Option<String>,
        verbose: bool,
        no_color: bool,
    ) -> Self {
        if let Some(workspace) = workspace {
            self.workspace = workspace;
        }

        if let Some(config_file) = config_file {
            self.config_file = Some(config_file);
        }

        if let Some(provider) = provider {
            self.provider = provider;
        }

        if let Some(model) = model {
            self.model = model;
        }

        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            self.log_level = Some("debug".to_string());
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .fewshot directory.
    pub fn fewshot_dir(&self) -> PathBuf {
        self.workspace.join(".fewshot")
    }

    /// Directory used by the file storage backend.
    pub fn state_dir(&self) -> PathBuf {
        self.fewshot_dir().join("state")
    }

    /// Database used by the SQLite storage backend.
    pub fn state_db_path(&self) -> PathBuf {
        self.fewshot_dir().join("state.sqlite")
    }

    /// Ensure the .fewshot directory exists.
    pub fn ensure_fewshot_dir(&self) -> AppResult<()> {
        let dir = self.fewshot_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create .fewshot directory: {}", e))
            })?;
        }
        Ok(())
    }

    /// Get the configuration for a provider.
    pub fn get_provider_config(&self, provider: &str) -> Option<&ProviderConfig> {
        self.llm.as_ref().and_then(|llm| llm.providers.get(provider))
    }

    /// Endpoint override for a provider.
    pub fn provider_endpoint(&self, provider: &str) -> Option<&str> {
        self.get_provider_config(provider)
            .and_then(ProviderConfig::endpoint)
    }

    /// Request timeout for a provider, in seconds.
    pub fn provider_timeout(&self, provider: &str) -> Option<u64> {
        match self.get_provider_config(provider) {
            Some(ProviderConfig::Ollama { timeout, .. }) => *timeout,
            _ => None,
        }
    }

    /// Resolve the API key for a provider.
    ///
    /// `FEWSHOT_API_KEY` wins over the provider's `apiKeyEnv`.
    pub fn resolve_api_key(&self, provider: &str) -> Option<String> {
        if let Some(ref key) = self.api_key {
            return Some(key.clone());
        }

        match self.get_provider_config(provider) {
            Some(ProviderConfig::Gemini { api_key_env, .. }) => std::env::var(api_key_env).ok(),
            _ => None,
        }
    }

    /// Validate configuration for the active provider.
    pub fn validate(&self) -> AppResult<()> {
        let provider = self.provider.as_str();

        if !KNOWN_PROVIDERS.contains(&provider) {
            return Err(AppError::Config(format!(
                "Unknown provider: {}. Supported: {}",
                provider,
                KNOWN_PROVIDERS.join(", ")
            )));
        }

        if provider == "gemini" && self.resolve_api_key(provider).is_none() {
            let hint = match self.get_provider_config(provider) {
                Some(ProviderConfig::Gemini { api_key_env, .. }) => api_key_env.clone(),
                _ => "FEWSHOT_API_KEY".to_string(),
            };
            return Err(AppError::Config(format!(
                "API key not found; set {}",
                hint
            )));
        }

        if self.session.template_debounce_ms == 0 {
            tracing::debug!("Template debounce disabled; every edit writes immediately");
        }

        Ok(())
    }
}
