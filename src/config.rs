use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub const DEFAULT_AUTH_URL: &str = "https://auth.europe-west1.gcp.commercetools.com";
pub const DEFAULT_API_URL: &str = "https://api.europe-west1.gcp.commercetools.com";

/// The API caps query limits at 500.
pub const MAX_PAGE_SIZE: u32 = 500;

const REDACTED: &str = "********";

/// Source of a configuration value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Default,
    File,
    Environment,
}

impl std::fmt::Display for ConfigSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigSource::Default => write!(f, "default"),
            ConfigSource::File => write!(f, "file"),
            ConfigSource::Environment => write!(f, "environment"),
        }
    }
}

/// A configuration value with its source
#[derive(Debug, Clone, Serialize)]
pub struct ConfigValue<T> {
    pub value: T,
    pub source: ConfigSource,
}

impl<T> ConfigValue<T> {
    pub fn new(value: T, source: ConfigSource) -> Self {
        Self { value, source }
    }
}

/// Which of the two projects a configuration block describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectSide {
    Source,
    Target,
}

impl ProjectSide {
    fn env_prefix(self) -> &'static str {
        match self {
            ProjectSide::Source => "SOURCE",
            ProjectSide::Target => "TARGET",
        }
    }
}

impl std::fmt::Display for ProjectSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ProjectSide::Source => write!(f, "source"),
            ProjectSide::Target => write!(f, "target"),
        }
    }
}

/// Resolved credentials handed to the API client.
#[derive(Clone, PartialEq)]
pub struct ProjectCredentials {
    pub project_key: String,
    pub client_id: String,
    pub client_secret: String,
    pub auth_url: String,
    pub api_url: String,
    pub scopes: Vec<String>,
}

impl std::fmt::Debug for ProjectCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectCredentials")
            .field("project_key", &self.project_key)
            .field("client_id", &self.client_id)
            .field("auth_url", &self.auth_url)
            .field("api_url", &self.api_url)
            .field("scopes", &self.scopes)
            .finish()
    }
}

/// Connection settings of one project, with source tracking.
#[derive(Debug, Clone, Serialize)]
pub struct ProjectConfig {
    pub project_key: Option<ConfigValue<String>>,
    pub client_id: Option<ConfigValue<String>>,
    pub client_secret: Option<ConfigValue<String>>,
    pub auth_url: ConfigValue<String>,
    pub api_url: ConfigValue<String>,
    /// Empty means `manage_project:{project_key}`
    pub scopes: ConfigValue<Vec<String>>,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            project_key: None,
            client_id: None,
            client_secret: None,
            auth_url: ConfigValue::new(DEFAULT_AUTH_URL.to_string(), ConfigSource::Default),
            api_url: ConfigValue::new(DEFAULT_API_URL.to_string(), ConfigSource::Default),
            scopes: ConfigValue::new(Vec::new(), ConfigSource::Default),
        }
    }
}

impl ProjectConfig {
    /// Returns true if key, client id and secret are all present
    pub fn is_configured(&self) -> bool {
        self.project_key.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }

    /// Validates the block and produces the credentials used by the client.
    pub fn credentials(&self, side: ProjectSide) -> Result<ProjectCredentials, ConfigError> {
        let required = |value: &Option<ConfigValue<String>>, name: &str| {
            value
                .as_ref()
                .map(|v| v.value.clone())
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::Missing(format!("{}.{}", side, name)))
        };

        let project_key = required(&self.project_key, "project_key")?;
        let client_id = required(&self.client_id, "client_id")?;
        let client_secret = required(&self.client_secret, "client_secret")?;

        let scopes = if self.scopes.value.is_empty() {
            vec![format!("manage_project:{}", project_key)]
        } else {
            self.scopes.value.clone()
        };

        Ok(ProjectCredentials {
            project_key,
            client_id,
            client_secret,
            auth_url: self.auth_url.value.trim_end_matches('/').to_string(),
            api_url: self.api_url.value.trim_end_matches('/').to_string(),
            scopes,
        })
    }

    fn apply_file(&mut self, file: ProjectFile) {
        if let Some(v) = file.project_key {
            self.project_key = Some(ConfigValue::new(v, ConfigSource::File));
        }
        if let Some(v) = file.client_id {
            self.client_id = Some(ConfigValue::new(v, ConfigSource::File));
        }
        if let Some(v) = file.client_secret {
            self.client_secret = Some(ConfigValue::new(v, ConfigSource::File));
        }
        if let Some(v) = file.auth_url {
            self.auth_url = ConfigValue::new(v, ConfigSource::File);
        }
        if let Some(v) = file.api_url {
            self.api_url = ConfigValue::new(v, ConfigSource::File);
        }
        if let Some(v) = file.scopes {
            self.scopes = ConfigValue::new(v, ConfigSource::File);
        }
    }

    fn apply_env(&mut self, side: ProjectSide) {
        let prefix = side.env_prefix();
        let var = |name: &str| std::env::var(format!("{}_{}", prefix, name)).ok();

        if let Some(v) = var("PROJECT_KEY") {
            self.project_key = Some(ConfigValue::new(v, ConfigSource::Environment));
        }
        if let Some(v) = var("CLIENT_ID") {
            self.client_id = Some(ConfigValue::new(v, ConfigSource::Environment));
        }
        if let Some(v) = var("CLIENT_SECRET") {
            self.client_secret = Some(ConfigValue::new(v, ConfigSource::Environment));
        }
        if let Some(v) = var("AUTH_URL") {
            self.auth_url = ConfigValue::new(v, ConfigSource::Environment);
        }
        if let Some(v) = var("API_URL") {
            self.api_url = ConfigValue::new(v, ConfigSource::Environment);
        }
        if let Some(v) = var("SCOPES") {
            let scopes = v.split_whitespace().map(str::to_string).collect();
            self.scopes = ConfigValue::new(scopes, ConfigSource::Environment);
        }
    }

    fn redacted(&self) -> Self {
        let mut copy = self.clone();
        if let Some(secret) = copy.client_secret.as_mut() {
            secret.value = REDACTED.to_string();
        }
        copy
    }
}

/// Application configuration with source tracking
#[derive(Debug, Clone, Serialize)]
pub struct Config {
    pub source: ProjectConfig,
    pub target: ProjectConfig,
    /// Resources requested per page
    pub page_size: ConfigValue<u32>,
    /// Pages synced in parallel within one resource sync
    pub concurrency: ConfigValue<usize>,
    /// Retries for throttled or failed requests
    pub max_retries: ConfigValue<u32>,
    /// Config file path used (if any)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ProjectFile {
    project_key: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    auth_url: Option<String>,
    api_url: Option<String>,
    scopes: Option<Vec<String>>,
}

/// Internal struct for deserializing config file
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
struct ConfigFile {
    source: Option<ProjectFile>,
    target: Option<ProjectFile>,
    page_size: Option<u32>,
    concurrency: Option<usize>,
    max_retries: Option<u32>,
}

impl Config {
    /// Load configuration with priority: env vars > config file > defaults
    pub fn load(config_path: Option<PathBuf>) -> Result<Self, ConfigError> {
        let mut source = ProjectConfig::default();
        let mut target = ProjectConfig::default();
        let mut page_size = ConfigValue::new(MAX_PAGE_SIZE, ConfigSource::Default);
        let mut concurrency = ConfigValue::new(4, ConfigSource::Default);
        let mut max_retries = ConfigValue::new(3, ConfigSource::Default);
        let mut config_file = None;

        let path = config_path.unwrap_or_else(Self::default_config_path);
        if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .map_err(|e| ConfigError::ReadError(path.clone(), e))?;
            let file_config: ConfigFile = serde_yaml::from_str(&contents)
                .map_err(|e| ConfigError::ParseError(path.clone(), e))?;

            config_file = Some(path.clone());

            if let Some(block) = file_config.source {
                source.apply_file(block);
            }
            if let Some(block) = file_config.target {
                target.apply_file(block);
            }
            if let Some(size) = file_config.page_size {
                page_size = ConfigValue::new(size, ConfigSource::File);
            }
            if let Some(n) = file_config.concurrency {
                concurrency = ConfigValue::new(n, ConfigSource::File);
            }
            if let Some(n) = file_config.max_retries {
                max_retries = ConfigValue::new(n, ConfigSource::File);
            }
        }

        source.apply_env(ProjectSide::Source);
        target.apply_env(ProjectSide::Target);
        if let Ok(size) = std::env::var("CTP_SYNC_PAGE_SIZE") {
            let parsed = size
                .parse()
                .map_err(|_| ConfigError::Invalid("CTP_SYNC_PAGE_SIZE".to_string(), size))?;
            page_size = ConfigValue::new(parsed, ConfigSource::Environment);
        }

        if page_size.value == 0 || page_size.value > MAX_PAGE_SIZE {
            return Err(ConfigError::Invalid(
                "page_size".to_string(),
                format!("{} (expected 1..={})", page_size.value, MAX_PAGE_SIZE),
            ));
        }
        if concurrency.value == 0 {
            return Err(ConfigError::Invalid(
                "concurrency".to_string(),
                "0 (expected at least 1)".to_string(),
            ));
        }

        Ok(Self {
            source,
            target,
            page_size,
            concurrency,
            max_retries,
            config_file,
        })
    }

    /// Copy of the configuration with client secrets masked, for display.
    pub fn redacted(&self) -> Self {
        Self {
            source: self.source.redacted(),
            target: self.target.redacted(),
            ..self.clone()
        }
    }

    /// Default config directory (platform-specific):
    /// - Linux: ~/.config/ctp-project-sync/
    /// - macOS: ~/Library/Application Support/ctp-project-sync/
    /// - Windows: %APPDATA%/ctp-project-sync/
    pub fn default_config_dir() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("ctp-project-sync")
    }

    /// Default config file path (platform-specific config dir + config.yaml)
    pub fn default_config_path() -> PathBuf {
        Self::default_config_dir().join("config.yaml")
    }
}

#[derive(Debug)]
pub enum ConfigError {
    ReadError(PathBuf, std::io::Error),
    ParseError(PathBuf, serde_yaml::Error),
    Missing(String),
    Invalid(String, String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::ReadError(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::ParseError(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Missing(name) => write!(
                f,
                "Missing configuration value '{}'. Set it in the config file or via environment.",
                name
            ),
            ConfigError::Invalid(name, value) => {
                write!(f, "Invalid value for '{}': {}", name, value)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::tempdir;

    fn write_config(dir: &tempfile::TempDir, lines: &[&str]) -> PathBuf {
        let path = dir.path().join("config.yaml");
        let mut file = std::fs::File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{}", line).unwrap();
        }
        path
    }

    #[test]
    fn test_default_config() {
        let temp_dir = tempdir().unwrap();
        let config_path = temp_dir.path().join("nonexistent.yaml");

        let config = Config::load(Some(config_path)).unwrap();
        assert_eq!(config.page_size.value, 500);
        assert_eq!(config.page_size.source, ConfigSource::Default);
        assert_eq!(config.concurrency.value, 4);
        assert_eq!(config.source.auth_url.value, DEFAULT_AUTH_URL);
        assert!(config.config_file.is_none());
    }

    #[test]
    fn test_load_from_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = write_config(
            &temp_dir,
            &[
                "source:",
                "  project_key: shop-eu",
                "  client_id: src-id",
                "  client_secret: src-secret",
                "target:",
                "  project_key: shop-us",
                "  client_id: tgt-id",
                "  client_secret: tgt-secret",
                "  api_url: https://api.us-central1.gcp.commercetools.com/",
                "  scopes: [manage_products:shop-us]",
                "page_size: 100",
            ],
        );

        let config = Config::load(Some(config_path.clone())).unwrap();
        assert_eq!(config.config_file, Some(config_path));
        assert_eq!(config.page_size.value, 100);
        assert_eq!(config.page_size.source, ConfigSource::File);

        let source = config.source.credentials(ProjectSide::Source).unwrap();
        assert_eq!(source.project_key, "shop-eu");
        assert_eq!(source.scopes, vec!["manage_project:shop-eu".to_string()]);

        let target = config.target.credentials(ProjectSide::Target).unwrap();
        assert_eq!(target.api_url, "https://api.us-central1.gcp.commercetools.com");
        assert_eq!(target.scopes, vec!["manage_products:shop-us".to_string()]);
    }

    #[test]
    fn test_missing_credentials() {
        let temp_dir = tempdir().unwrap();
        let config_path = write_config(&temp_dir, &["source:", "  project_key: only-key"]);

        let config = Config::load(Some(config_path)).unwrap();
        assert!(!config.source.is_configured());
        let err = config.source.credentials(ProjectSide::Source).unwrap_err();
        assert!(err.to_string().contains("source.client_id"));
    }

    #[test]
    fn test_page_size_out_of_range() {
        let temp_dir = tempdir().unwrap();
        let config_path = write_config(&temp_dir, &["page_size: 501"]);

        let err = Config::load(Some(config_path)).unwrap_err();
        assert!(err.to_string().contains("page_size"));
    }

    #[test]
    fn test_redacted_hides_secret() {
        let temp_dir = tempdir().unwrap();
        let config_path = write_config(
            &temp_dir,
            &["target:", "  client_secret: very-secret"],
        );

        let config = Config::load(Some(config_path)).unwrap();
        let shown = serde_json::to_string(&config.redacted()).unwrap();
        assert!(!shown.contains("very-secret"));
        assert!(shown.contains(REDACTED));
    }

    #[test]
    #[ignore] // Run with --ignored; env vars can pollute parallel tests
    fn test_env_var_overrides_file() {
        let temp_dir = tempdir().unwrap();
        let config_path = write_config(&temp_dir, &["source:", "  project_key: fromfile"]);

        std::env::set_var("SOURCE_PROJECT_KEY", "fromenv");

        let config = Config::load(Some(config_path)).unwrap();
        let key = config.source.project_key.unwrap();
        assert_eq!(key.value, "fromenv");
        assert_eq!(key.source, ConfigSource::Environment);

        std::env::remove_var("SOURCE_PROJECT_KEY");
    }

    #[test]
    fn test_invalid_yaml_error() {
        let temp_dir = tempdir().unwrap();
        let config_path = write_config(&temp_dir, &["invalid: yaml: content: ["]);

        let result = Config::load(Some(config_path));
        assert!(result.is_err());
        let err = result.unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }
}
