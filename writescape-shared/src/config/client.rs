//! Layered client configuration: defaults, file, environment and overrides.

use directories::BaseDirs;
use serde::{Deserialize, Serialize};
use std::{
    env, fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};
use thiserror::Error;
use url::Url;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
const SESSION_FILE_NAME: &str = "session.json";
const LOG_LEVELS: [&str; 6] = ["trace", "debug", "info", "warn", "error", "off"];

/// Errors raised while loading or validating a [`ClientConfig`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read or written.
    #[error("failed to access configuration file {path}: {source}")]
    Io {
        /// File that failed.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The file extension or requested format is not one of yaml, json or toml.
    #[error("unsupported configuration format '{0}'. Use 'yaml', 'json' or 'toml'.")]
    UnsupportedFormat(String),
    /// The file content did not match the configuration schema.
    #[error("failed to parse configuration: {0}")]
    Parse(String),
    /// The configuration could not be rendered in the requested format.
    #[error("failed to serialize configuration: {0}")]
    Serialize(String),
    /// An environment override held an unusable value.
    #[error("invalid {var} value '{value}'")]
    InvalidEnv {
        /// Variable name.
        var: &'static str,
        /// Offending value.
        value: String,
    },
    /// The resolved configuration failed validation.
    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

/// Serialization formats accepted for configuration files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    /// `.yaml` / `.yml`
    Yaml,
    /// `.json`
    Json,
    /// `.toml`
    Toml,
}

impl ConfigFormat {
    /// Picks the format from a file extension.
    ///
    /// # Errors
    /// Returns [`ConfigError::UnsupportedFormat`] for any other extension.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        extension.parse()
    }

    /// Conventional file name for a generated configuration in this format.
    #[must_use]
    pub const fn file_name(self) -> &'static str {
        match self {
            Self::Yaml => "writescape.yaml",
            Self::Json => "writescape.json",
            Self::Toml => "writescape.toml",
        }
    }
}

impl FromStr for ConfigFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "yaml" | "yml" => Ok(Self::Yaml),
            "json" => Ok(Self::Json),
            "toml" => Ok(Self::Toml),
            other => Err(ConfigError::UnsupportedFormat(other.to_string())),
        }
    }
}

/// Log output encoding.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Human readable lines.
    #[default]
    Text,
    /// One JSON object per event.
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

impl fmt::Display for LogFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
        }
    }
}

/// Logging settings consumed by the tracing subscriber.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default level directive when `RUST_LOG` is not set.
    pub level: String,
    /// Output encoding.
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Text,
        }
    }
}

/// Delays and intervals that shape request scheduling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    /// Settle time before registration fields run their delayed rules and uniqueness checks.
    pub validation_debounce_ms: u64,
    /// Settle time before the live search issues a query.
    pub search_debounce_ms: u64,
    /// How often a logged-in session re-validates its token.
    pub session_check_interval_secs: u64,
    /// Upper bound on a single HTTP request.
    pub request_timeout_secs: u64,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            validation_debounce_ms: 800,
            search_debounce_ms: 700,
            session_check_interval_secs: 300,
            request_timeout_secs: 30,
        }
    }
}

impl TimingConfig {
    /// Registration debounce as a [`Duration`].
    #[must_use]
    pub const fn validation_debounce(&self) -> Duration {
        Duration::from_millis(self.validation_debounce_ms)
    }

    /// Search debounce as a [`Duration`].
    #[must_use]
    pub const fn search_debounce(&self) -> Duration {
        Duration::from_millis(self.search_debounce_ms)
    }

    /// Session check interval as a [`Duration`].
    #[must_use]
    pub const fn session_check_interval(&self) -> Duration {
        Duration::from_secs(self.session_check_interval_secs)
    }

    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

/// The main configuration structure for the Writescape client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Base URL of the Writescape HTTP API.
    pub backend_url: Url,
    /// Socket.IO endpoint for chat; the backend URL when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub realtime_url: Option<Url>,
    /// Where the logged-in user is persisted; the per-user config directory when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_file: Option<PathBuf>,
    /// Logging settings.
    pub logging: LoggingConfig,
    /// Scheduling settings.
    pub timing: TimingConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl ClientConfig {
    /// Generates a default configuration.
    ///
    /// # Panics
    /// Never: the default backend URL is a valid literal.
    #[must_use]
    pub fn with_defaults() -> Self {
        Self {
            backend_url: Url::parse(DEFAULT_BACKEND_URL).expect("default backend URL is valid"),
            realtime_url: None,
            session_file: None,
            logging: LoggingConfig::default(),
            timing: TimingConfig::default(),
        }
    }

    /// Loads the configuration from a file, environment variables, or defaults.
    ///
    /// Later sources win: defaults, then the file, then `WRITESCAPE_*` variables,
    /// then `backend_override`.
    ///
    /// # Errors
    /// Returns an error when the file cannot be read or parsed, an environment
    /// variable is malformed, or the resolved configuration is invalid.
    pub fn load_config(
        config_path: Option<&Path>,
        backend_override: Option<Url>,
    ) -> Result<Self, ConfigError> {
        let mut config = match config_path {
            Some(path) => Self::from_file(path)?,
            None => Self::with_defaults(),
        };

        config.apply_env_overrides()?;

        if let Some(url) = backend_override {
            config.backend_url = url;
        }

        config.validate().map_err(ConfigError::Invalid)?;
        Ok(config)
    }

    /// Reads a configuration file; missing keys fall back to defaults.
    ///
    /// # Errors
    /// Returns an error for unreadable files, unknown extensions and malformed content.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let format = ConfigFormat::from_path(path)?;
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        match format {
            ConfigFormat::Yaml => {
                serde_yml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            ConfigFormat::Json => {
                serde_json::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
            ConfigFormat::Toml => {
                toml::from_str(&content).map_err(|err| ConfigError::Parse(err.to_string()))
            }
        }
    }

    /// Applies `WRITESCAPE_*` environment variables on top of the current values.
    ///
    /// # Errors
    /// Returns [`ConfigError::InvalidEnv`] when a URL or format variable cannot be parsed.
    pub fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Ok(value) = env::var("WRITESCAPE_BACKEND_URL") {
            self.backend_url = Url::parse(&value).map_err(|_| ConfigError::InvalidEnv {
                var: "WRITESCAPE_BACKEND_URL",
                value,
            })?;
        }
        if let Ok(value) = env::var("WRITESCAPE_REALTIME_URL") {
            self.realtime_url = Some(Url::parse(&value).map_err(|_| ConfigError::InvalidEnv {
                var: "WRITESCAPE_REALTIME_URL",
                value,
            })?);
        }
        if let Ok(value) = env::var("WRITESCAPE_SESSION_FILE") {
            self.session_file = Some(PathBuf::from(value));
        }
        if let Ok(value) = env::var("WRITESCAPE_LOG_LEVEL") {
            self.logging.level = value;
        }
        if let Ok(value) = env::var("WRITESCAPE_LOG_FORMAT") {
            self.logging.format = value.parse().map_err(|_| ConfigError::InvalidEnv {
                var: "WRITESCAPE_LOG_FORMAT",
                value,
            })?;
        }
        Ok(())
    }

    /// Validate the complete configuration, collecting every problem found.
    ///
    /// # Errors
    /// Returns the list of validation messages when anything is wrong.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if !matches!(self.backend_url.scheme(), "http" | "https") {
            errors.push(format!(
                "backend_url must use http or https, got '{}'",
                self.backend_url.scheme()
            ));
        }

        if let Some(realtime) = &self.realtime_url
            && !matches!(realtime.scheme(), "http" | "https" | "ws" | "wss")
        {
            errors.push(format!(
                "realtime_url must use http, https, ws or wss, got '{}'",
                realtime.scheme()
            ));
        }

        if !LOG_LEVELS.contains(&self.logging.level.to_ascii_lowercase().as_str()) {
            errors.push(format!("unknown log level '{}'", self.logging.level));
        }

        if self.timing.validation_debounce_ms == 0 {
            errors.push("timing.validation_debounce_ms must be greater than 0".to_string());
        }
        if self.timing.search_debounce_ms == 0 {
            errors.push("timing.search_debounce_ms must be greater than 0".to_string());
        }
        if self.timing.session_check_interval_secs == 0 {
            errors.push("timing.session_check_interval_secs must be greater than 0".to_string());
        }
        if self.timing.request_timeout_secs == 0 {
            errors.push("timing.request_timeout_secs must be greater than 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// The Socket.IO endpoint, defaulting to the backend URL.
    #[must_use]
    pub fn realtime_endpoint(&self) -> Url {
        self.realtime_url
            .clone()
            .unwrap_or_else(|| self.backend_url.clone())
    }

    /// Resolved path of the persisted session file.
    #[must_use]
    pub fn session_path(&self) -> PathBuf {
        self.session_file.clone().unwrap_or_else(|| {
            BaseDirs::new()
                .map(|dirs| dirs.config_dir().join("writescape").join(SESSION_FILE_NAME))
                .unwrap_or_else(|| PathBuf::from("./writescape-session.json"))
        })
    }

    /// Renders the configuration in the given format.
    ///
    /// # Errors
    /// Returns [`ConfigError::Serialize`] if the serializer rejects the value.
    pub fn render(&self, format: ConfigFormat) -> Result<String, ConfigError> {
        match format {
            ConfigFormat::Yaml => {
                serde_yml::to_string(self).map_err(|err| ConfigError::Serialize(err.to_string()))
            }
            ConfigFormat::Json => serde_json::to_string_pretty(self)
                .map_err(|err| ConfigError::Serialize(err.to_string())),
            ConfigFormat::Toml => {
                toml::to_string_pretty(self).map_err(|err| ConfigError::Serialize(err.to_string()))
            }
        }
    }
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    const ENV_VARS: [&str; 5] = [
        "WRITESCAPE_BACKEND_URL",
        "WRITESCAPE_REALTIME_URL",
        "WRITESCAPE_SESSION_FILE",
        "WRITESCAPE_LOG_LEVEL",
        "WRITESCAPE_LOG_FORMAT",
    ];

    fn cleanup_env_vars() {
        for var in ENV_VARS {
            unsafe {
                env::remove_var(var);
            }
        }
    }

    #[test]
    #[serial]
    fn test_config_with_defaults() {
        cleanup_env_vars();
        let config = ClientConfig::with_defaults();

        assert_eq!(config.backend_url.as_str(), "http://localhost:8080/");
        assert_eq!(config.realtime_url, None);
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Text);
        assert_eq!(config.timing.validation_debounce_ms, 800);
        assert_eq!(config.timing.search_debounce_ms, 700);
        assert_eq!(config.realtime_endpoint(), config.backend_url);
    }

    #[test]
    #[serial]
    fn test_load_config_with_backend_override() {
        cleanup_env_vars();
        let url = Url::parse("https://api.writescape.test").unwrap();
        let config = ClientConfig::load_config(None, Some(url.clone())).unwrap();
        assert_eq!(config.backend_url, url);
    }

    #[test]
    #[serial]
    fn test_load_config_with_environment_variables() {
        cleanup_env_vars();
        unsafe {
            env::set_var("WRITESCAPE_BACKEND_URL", "https://env.writescape.test");
            env::set_var("WRITESCAPE_REALTIME_URL", "wss://chat.writescape.test");
            env::set_var("WRITESCAPE_SESSION_FILE", "/tmp/ws-session.json");
            env::set_var("WRITESCAPE_LOG_LEVEL", "debug");
            env::set_var("WRITESCAPE_LOG_FORMAT", "json");
        }

        let config = ClientConfig::load_config(None, None).unwrap();
        assert_eq!(config.backend_url.as_str(), "https://env.writescape.test/");
        assert_eq!(
            config.realtime_endpoint().as_str(),
            "wss://chat.writescape.test/"
        );
        assert_eq!(config.session_path(), PathBuf::from("/tmp/ws-session.json"));
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, LogFormat::Json);

        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_override_beats_environment() {
        cleanup_env_vars();
        unsafe {
            env::set_var("WRITESCAPE_BACKEND_URL", "https://env.writescape.test");
        }
        let url = Url::parse("http://127.0.0.1:9000").unwrap();
        let config = ClientConfig::load_config(None, Some(url.clone())).unwrap();
        assert_eq!(config.backend_url, url);
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_invalid_environment_url_is_reported() {
        cleanup_env_vars();
        unsafe {
            env::set_var("WRITESCAPE_BACKEND_URL", "not a url");
        }
        let err = ClientConfig::load_config(None, None).unwrap_err();
        assert!(err.to_string().contains("WRITESCAPE_BACKEND_URL"));
        cleanup_env_vars();
    }

    #[test]
    #[serial]
    fn test_load_partial_yaml_file() {
        cleanup_env_vars();
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("writescape.yaml");
        fs::write(
            &path,
            "backend_url: \"https://yaml.writescape.test\"\ntiming:\n  search_debounce_ms: 250\n",
        )
        .unwrap();

        let config = ClientConfig::load_config(Some(&path), None).unwrap();
        assert_eq!(config.backend_url.as_str(), "https://yaml.writescape.test/");
        assert_eq!(config.timing.search_debounce_ms, 250);
        assert_eq!(config.timing.validation_debounce_ms, 800);
    }

    #[test]
    #[serial]
    fn test_load_json_and_toml_files() {
        cleanup_env_vars();
        let temp_dir = TempDir::new().unwrap();

        let json_path = temp_dir.path().join("writescape.json");
        fs::write(
            &json_path,
            r#"{"backend_url":"https://json.writescape.test","logging":{"level":"info","format":"json"}}"#,
        )
        .unwrap();
        let json = ClientConfig::load_config(Some(&json_path), None).unwrap();
        assert_eq!(json.logging.format, LogFormat::Json);

        let toml_path = temp_dir.path().join("writescape.toml");
        fs::write(
            &toml_path,
            "backend_url = \"https://toml.writescape.test\"\n[timing]\nrequest_timeout_secs = 5\n",
        )
        .unwrap();
        let toml = ClientConfig::load_config(Some(&toml_path), None).unwrap();
        assert_eq!(toml.backend_url.as_str(), "https://toml.writescape.test/");
        assert_eq!(toml.timing.request_timeout_secs, 5);
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ClientConfig::from_file(Path::new("writescape.ini")).unwrap_err();
        assert!(matches!(err, ConfigError::UnsupportedFormat(_)));
    }

    #[test]
    fn test_missing_file() {
        let err = ClientConfig::from_file(Path::new("/nonexistent/writescape.yaml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn test_malformed_json() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("broken.json");
        fs::write(&path, "{ not json").unwrap();
        let err = ClientConfig::from_file(&path).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_validate_collects_every_problem() {
        let mut config = ClientConfig::with_defaults();
        config.backend_url = Url::parse("ftp://files.writescape.test").unwrap();
        config.logging.level = "loud".to_string();
        config.timing.search_debounce_ms = 0;

        let errors = config.validate().unwrap_err();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("backend_url"));
    }

    #[test]
    fn test_render_round_trips_every_format() {
        let config = ClientConfig::with_defaults();
        for format in [ConfigFormat::Yaml, ConfigFormat::Json, ConfigFormat::Toml] {
            let rendered = config.render(format).unwrap();
            assert!(rendered.contains("localhost:8080"), "{format:?}: {rendered}");
        }
    }

    #[test]
    fn test_format_parsing() {
        assert_eq!("YML".parse::<ConfigFormat>().unwrap(), ConfigFormat::Yaml);
        assert_eq!(ConfigFormat::Toml.file_name(), "writescape.toml");
        assert!("xml".parse::<ConfigFormat>().is_err());
    }
}
