//! Configuration management for pplx-assist
//!
//! Supports:
//! - TOML config file at XDG locations
//! - Environment variable overrides
//! - Command-line argument overrides

use std::env;
use std::fmt;
use std::fs;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use clap::ValueEnum;
use config::{Config, Environment, File, FileFormat};
use env_logger::fmt::WriteStyle;
use log::LevelFilter;
use serde::{Deserialize, Serialize};

use crate::agent::AgentSettings;
use crate::cli::{GlobalOpts, OutputFormat};
use crate::completion::DEFAULT_ENDPOINT;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");

/// Perplexity keys look like `pplx-` followed by 48 characters
const API_KEY_PREFIX: &str = "pplx-";
const API_KEY_LEN: usize = 53;

const REDACTED: &str = "********";

/// Models selectable for the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
pub enum Model {
    #[default]
    #[serde(rename = "sonar-small-online")]
    #[value(name = "sonar-small-online")]
    SonarSmallOnline,
    #[serde(rename = "sonar-medium-online")]
    #[value(name = "sonar-medium-online")]
    SonarMediumOnline,
    #[serde(rename = "sonar-large-online")]
    #[value(name = "sonar-large-online")]
    SonarLargeOnline,
    #[serde(rename = "gpt-5")]
    #[value(name = "gpt-5")]
    Gpt5,
    #[serde(rename = "gpt-4")]
    #[value(name = "gpt-4")]
    Gpt4,
    #[serde(rename = "gpt-3.5-turbo")]
    #[value(name = "gpt-3.5-turbo")]
    Gpt35Turbo,
}

impl Model {
    pub const ALL: [Model; 6] = [
        Model::SonarSmallOnline,
        Model::SonarMediumOnline,
        Model::SonarLargeOnline,
        Model::Gpt5,
        Model::Gpt4,
        Model::Gpt35Turbo,
    ];

    /// Identifier sent to the completion API
    pub fn as_str(self) -> &'static str {
        match self {
            Model::SonarSmallOnline => "sonar-small-online",
            Model::SonarMediumOnline => "sonar-medium-online",
            Model::SonarLargeOnline => "sonar-large-online",
            Model::Gpt5 => "gpt-5",
            Model::Gpt4 => "gpt-4",
            Model::Gpt35Turbo => "gpt-3.5-turbo",
        }
    }
}

impl fmt::Display for Model {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Conversation languages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Fr,
    Es,
    De,
    It,
}

impl Language {
    pub const ALL: [Language; 5] = [
        Language::En,
        Language::Fr,
        Language::Es,
        Language::De,
        Language::It,
    ];

    pub fn code(self) -> &'static str {
        match self {
            Language::En => "en",
            Language::Fr => "fr",
            Language::Es => "es",
            Language::De => "de",
            Language::It => "it",
        }
    }

    /// English name, used when instructing the model
    pub fn name(self) -> &'static str {
        match self {
            Language::En => "English",
            Language::Fr => "French",
            Language::Es => "Spanish",
            Language::De => "German",
            Language::It => "Italian",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Runtime context containing resolved configuration
#[derive(Debug, Clone)]
pub struct RuntimeContext {
    pub global: GlobalOpts,
    pub config: AppConfig,
    config_path: PathBuf,
}

impl RuntimeContext {
    pub fn new(global: &GlobalOpts) -> Result<Self> {
        let config_path = resolve_config_path(global.config.as_ref())?;
        let config = load_config(&config_path, global)?;

        Ok(Self {
            global: global.clone(),
            config,
            config_path,
        })
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn init_logging(&self) -> Result<()> {
        if self.global.quiet {
            log::set_max_level(LevelFilter::Off);
            return Ok(());
        }

        let mut builder = env_logger::Builder::from_env(
            env_logger::Env::default().default_filter_or(&self.config.logging.level),
        );

        if let Some(level) = self.cli_log_level() {
            builder.filter_level(level);
        }

        let force_color = env::var_os("FORCE_COLOR").is_some();
        let disable_color = self.global.no_color
            || env::var_os("NO_COLOR").is_some()
            || (!force_color && !std::io::stderr().is_terminal());

        if disable_color {
            builder.write_style(WriteStyle::Never);
        } else if force_color {
            builder.write_style(WriteStyle::Always);
        } else {
            builder.write_style(WriteStyle::Auto);
        }

        builder.try_init().or_else(|err| {
            if self.global.verbose > 0 {
                eprintln!("logger already initialized: {err}");
            }
            Ok(())
        })
    }

    /// Log level requested on the command line, if any
    fn cli_log_level(&self) -> Option<LevelFilter> {
        if self.global.trace {
            Some(LevelFilter::Trace)
        } else if self.global.debug {
            Some(LevelFilter::Debug)
        } else {
            match self.global.verbose {
                0 => None,
                1 => Some(LevelFilter::Info),
                2 => Some(LevelFilter::Debug),
                _ => Some(LevelFilter::Trace),
            }
        }
    }

    /// Get the effective Home Assistant server URL
    pub fn server_url(&self) -> Result<&str> {
        self.global
            .server
            .as_deref()
            .or(self.config.homeassistant.server.as_deref())
            .ok_or_else(|| {
                anyhow!(
                    "No Home Assistant server configured.\n\
                    Set via --server, HASS_SERVER env var, or in config file."
                )
            })
    }

    /// Get the effective Home Assistant auth token
    pub fn token(&self) -> Result<&str> {
        self.global
            .token
            .as_deref()
            .or(self.config.homeassistant.token.as_deref())
            .ok_or_else(|| {
                anyhow!(
                    "No authentication token configured.\n\
                    Set via --token, HASS_TOKEN env var, or in config file."
                )
            })
    }

    /// Get the effective, validated Perplexity API key
    pub fn api_key(&self) -> Result<&str> {
        let key = self
            .global
            .api_key
            .as_deref()
            .or(self.config.perplexity.api_key.as_deref())
            .ok_or_else(|| {
                anyhow!(
                    "No Perplexity API key configured.\n\
                    Set via --api-key, PPLX_API_KEY env var, or in config file.\n\
                    You can get one from: https://platform.perplexity.ai/"
                )
            })?;

        validate_api_key(key)?;
        Ok(key)
    }

    /// Home Assistant request timeout in seconds
    pub fn timeout(&self) -> u64 {
        self.global
            .timeout
            .unwrap_or(self.config.homeassistant.timeout)
    }

    /// Perplexity request timeout in seconds
    pub fn completion_timeout(&self) -> u64 {
        self.global.timeout.unwrap_or(self.config.perplexity.timeout)
    }

    /// Check if SSL verification should be skipped
    pub fn insecure(&self) -> bool {
        self.global.insecure || self.config.homeassistant.insecure
    }

    pub fn model(&self) -> Model {
        self.global.model.unwrap_or(self.config.perplexity.model)
    }

    pub fn language(&self) -> Language {
        self.global
            .language
            .unwrap_or(self.config.perplexity.language)
    }

    /// Resolve everything the conversation agent needs
    pub fn agent_settings(&self) -> Result<AgentSettings> {
        let perplexity = &self.config.perplexity;

        Ok(AgentSettings {
            api_key: self.api_key()?.to_string(),
            model: self.model(),
            language: self.language(),
            notify_response: perplexity.notify_response,
            custom_system_prompt: perplexity.custom_system_prompt.clone(),
            endpoint: perplexity.endpoint.clone(),
            timeout: Duration::from_secs(self.completion_timeout()),
            max_context_entities: perplexity.max_context_entities,
        })
    }

    /// Get the effective output format
    pub fn output_format(&self) -> OutputFormat {
        if self.global.json {
            return OutputFormat::Json;
        }

        self.global
            .output_format
            .unwrap_or(match self.config.output.format.as_str() {
                "json" => OutputFormat::Json,
                "yaml" => OutputFormat::Yaml,
                "table" => OutputFormat::Table,
                _ => OutputFormat::Auto,
            })
    }
}

/// Check the shape of a Perplexity API key
pub fn validate_api_key(key: &str) -> Result<()> {
    if !key.starts_with(API_KEY_PREFIX) {
        bail!("Invalid Perplexity API key: it must start with '{API_KEY_PREFIX}'");
    }

    let len = key.chars().count();
    if len != API_KEY_LEN {
        bail!("Invalid Perplexity API key: expected {API_KEY_LEN} characters, got {len}");
    }

    Ok(())
}

/// Application configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub homeassistant: HomeAssistantConfig,
    pub perplexity: PerplexityConfig,
    pub output: OutputConfig,
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Copy of the config with secrets masked, for display
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.homeassistant.token.is_some() {
            config.homeassistant.token = Some(REDACTED.to_string());
        }
        if config.perplexity.api_key.is_some() {
            config.perplexity.api_key = Some(REDACTED.to_string());
        }
        config
    }

    /// Display value of a dotted key such as `perplexity.model`, secrets masked
    pub fn display_value(&self, key: &str) -> Result<String> {
        let tree = serde_json::to_value(self.redacted())?;
        let value = key
            .split('.')
            .try_fold(&tree, |node, part| node.get(part))
            .ok_or_else(|| anyhow!("Unknown configuration key '{key}'"))?;

        Ok(match value {
            serde_json::Value::String(text) => text.clone(),
            other => other.to_string(),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HomeAssistantConfig {
    pub server: Option<String>,
    pub token: Option<String>,
    pub timeout: u64,
    pub insecure: bool,
}

impl Default for HomeAssistantConfig {
    fn default() -> Self {
        Self {
            server: None,
            token: None,
            timeout: 30,
            insecure: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PerplexityConfig {
    pub api_key: Option<String>,
    pub model: Model,
    pub language: Language,
    pub endpoint: String,
    pub timeout: u64,
    /// Send every response as a persistent notification
    pub notify_response: bool,
    pub custom_system_prompt: String,
    /// Caps how many entities are listed in the prompt context
    pub max_context_entities: Option<usize>,
    /// Initial state of the switches before anything was persisted
    pub allow_entities_access: bool,
    pub allow_actions_on_entities: bool,
    pub enable_web_search: bool,
}

impl Default for PerplexityConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            model: Model::default(),
            language: Language::default(),
            endpoint: DEFAULT_ENDPOINT.to_string(),
            timeout: 30,
            notify_response: false,
            custom_system_prompt: String::new(),
            max_context_entities: None,
            allow_entities_access: false,
            allow_actions_on_entities: false,
            enable_web_search: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub format: String,
    pub no_headers: bool,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            format: "auto".to_string(),
            no_headers: false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

fn resolve_config_path(override_path: Option<&PathBuf>) -> Result<PathBuf> {
    if let Some(path) = override_path {
        let expanded = expand_path(path)?;
        if expanded.is_dir() {
            return Ok(expanded.join("config.toml"));
        }
        return Ok(expanded);
    }

    Ok(default_config_dir()?.join("config.toml"))
}

fn load_config(config_path: &Path, global: &GlobalOpts) -> Result<AppConfig> {
    // Create default config if it doesn't exist
    if !config_path.exists() {
        write_default_config(config_path)?;
    }

    let config = Config::builder()
        .set_default("homeassistant.timeout", 30_i64)?
        .set_default("homeassistant.insecure", false)?
        .set_default("perplexity.model", Model::default().as_str())?
        .set_default("perplexity.language", Language::default().code())?
        .set_default("perplexity.endpoint", DEFAULT_ENDPOINT)?
        .set_default("perplexity.timeout", 30_i64)?
        .set_default("perplexity.notify_response", false)?
        .set_default("perplexity.custom_system_prompt", "")?
        .set_default("perplexity.allow_entities_access", false)?
        .set_default("perplexity.allow_actions_on_entities", false)?
        .set_default("perplexity.enable_web_search", true)?
        .set_default("output.format", "auto")?
        .set_default("output.no_headers", false)?
        .set_default("logging.level", "warn")?
        .add_source(
            File::from(config_path)
                .format(FileFormat::Toml)
                .required(false),
        )
        // Environment variable overrides (PPLX_ASSIST__*)
        .add_source(
            Environment::with_prefix("PPLX_ASSIST")
                .try_parsing(true)
                .separator("__"),
        )
        .build()?;

    let mut app_config: AppConfig = config
        .try_deserialize()
        .with_context(|| format!("reading config from {}", config_path.display()))?;

    // Apply CLI overrides
    if global.no_headers {
        app_config.output.no_headers = true;
    }

    Ok(app_config)
}

pub fn write_default_config(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating config directory {}", parent.display()))?;
    }

    let config = AppConfig::default();
    let toml = toml::to_string_pretty(&config).context("serializing default config")?;

    let content = format!(
        "# pplx-assist configuration\n\
        # File: {}\n\
        #\n\
        # Environment variables:\n\
        #   HASS_SERVER    - Home Assistant server URL\n\
        #   HASS_TOKEN     - Home Assistant authentication token\n\
        #   PPLX_API_KEY   - Perplexity API key\n\
        #   PPLX_ASSIST__* - Override any config value (e.g., PPLX_ASSIST__PERPLEXITY__MODEL=gpt-4)\n\
        \n\
        {toml}",
        path.display()
    );

    fs::write(path, content).with_context(|| format!("writing config to {}", path.display()))
}

fn expand_path(path: &Path) -> Result<PathBuf> {
    if let Some(text) = path.to_str() {
        let expanded = shellexpand::full(text).context("expanding path")?;
        Ok(PathBuf::from(expanded.to_string()))
    } else {
        Ok(path.to_path_buf())
    }
}

fn default_config_dir() -> Result<PathBuf> {
    if let Some(dir) = env::var_os("XDG_CONFIG_HOME").filter(|v| !v.is_empty()) {
        return Ok(PathBuf::from(dir).join(APP_NAME));
    }

    if let Some(mut dir) = dirs::config_dir() {
        dir.push(APP_NAME);
        return Ok(dir);
    }

    dirs::home_dir()
        .map(|home| home.join(".config").join(APP_NAME))
        .ok_or_else(|| anyhow!("unable to determine configuration directory"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key_of_len(len: usize) -> String {
        format!("{API_KEY_PREFIX}{}", "x".repeat(len - API_KEY_PREFIX.len()))
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.homeassistant.timeout, 30);
        assert_eq!(config.perplexity.timeout, 30);
        assert_eq!(config.perplexity.model, Model::SonarSmallOnline);
        assert_eq!(config.perplexity.language, Language::En);
        assert_eq!(config.perplexity.endpoint, DEFAULT_ENDPOINT);
        assert!(!config.perplexity.allow_actions_on_entities);
        assert_eq!(config.output.format, "auto");
    }

    #[test]
    fn test_config_serialization() {
        let config = AppConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        assert!(toml.contains("[homeassistant]"));
        assert!(toml.contains("[perplexity]"));
        assert!(toml.contains("model = \"sonar-small-online\""));
        assert!(toml.contains("[logging]"));
    }

    #[test]
    fn test_model_deserializes_from_api_name() {
        let config: PerplexityConfig = toml::from_str("model = \"gpt-3.5-turbo\"").unwrap();
        assert_eq!(config.model, Model::Gpt35Turbo);
        assert_eq!(config.model.as_str(), "gpt-3.5-turbo");
    }

    #[test]
    fn test_validate_api_key() {
        assert!(validate_api_key(&key_of_len(API_KEY_LEN)).is_ok());
        assert!(validate_api_key(&key_of_len(API_KEY_LEN - 1)).is_err());
        assert!(validate_api_key(&"a".repeat(API_KEY_LEN)).is_err());
    }

    #[test]
    fn test_redacted_hides_secrets() {
        let mut config = AppConfig::default();
        config.homeassistant.token = Some("secret-token".to_string());
        config.perplexity.api_key = Some(key_of_len(API_KEY_LEN));

        let redacted = config.redacted();
        assert_eq!(redacted.homeassistant.token.as_deref(), Some(REDACTED));
        assert_eq!(redacted.perplexity.api_key.as_deref(), Some(REDACTED));
        assert!(AppConfig::default().redacted().perplexity.api_key.is_none());
    }

    #[test]
    fn test_display_value_walks_dotted_keys() {
        let mut config = AppConfig::default();
        config.perplexity.api_key = Some(key_of_len(API_KEY_LEN));

        assert_eq!(config.display_value("homeassistant.timeout").unwrap(), "30");
        assert_eq!(
            config.display_value("perplexity.model").unwrap(),
            "sonar-small-online"
        );
        assert_eq!(config.display_value("perplexity.api_key").unwrap(), REDACTED);
        assert_eq!(
            config.display_value("perplexity.max_context_entities").unwrap(),
            "null"
        );
        assert!(config.display_value("perplexity.nope").is_err());
        assert!(config.display_value("homeassistant.timeout.extra").is_err());
    }
}
