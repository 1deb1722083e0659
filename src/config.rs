use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

static CONFIG_FILE_NAME: &str = "watchbot.toml";

const DEFAULT_CHECK_INTERVAL: u64 = 30;
const DEFAULT_REQUEST_TIMEOUT: u64 = 10;
const DEFAULT_ISSUE_LIMIT: u32 = 100;

/// Settings read from `watchbot.toml`.
///
/// Secrets (API keys, tokens) never live here; they come from the
/// environment, see `RedmineClient::new_from_env` and
/// `ZulipClient::new_from_env`.
#[derive(PartialEq, Eq, Debug, serde::Deserialize)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct Config {
    /// Seconds to wait after a polling pass finishes before starting the next.
    #[serde(default = "default_check_interval")]
    pub check_interval: u64,
    /// Upper bound in seconds for a single Redmine or Zulip request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout: u64,
    /// How many of the most recent issues are fetched per watch.
    #[serde(default = "default_issue_limit")]
    pub issue_limit: u32,
}

fn default_check_interval() -> u64 {
    DEFAULT_CHECK_INTERVAL
}

fn default_request_timeout() -> u64 {
    DEFAULT_REQUEST_TIMEOUT
}

fn default_issue_limit() -> u32 {
    DEFAULT_ISSUE_LIMIT
}

impl Default for Config {
    fn default() -> Self {
        Config {
            check_interval: DEFAULT_CHECK_INTERVAL,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
            issue_limit: DEFAULT_ISSUE_LIMIT,
        }
    }
}

impl Config {
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout)
    }

    fn validate(self) -> Result<Self, ConfigurationError> {
        if self.check_interval == 0 {
            return Err(ConfigurationError::Invalid(
                "`check-interval` must be at least 1 second".to_string(),
            ));
        }
        if self.request_timeout == 0 {
            return Err(ConfigurationError::Invalid(
                "`request-timeout` must be at least 1 second".to_string(),
            ));
        }
        if self.issue_limit == 0 {
            return Err(ConfigurationError::Invalid(
                "`issue-limit` must be at least 1".to_string(),
            ));
        }
        Ok(self)
    }
}

/// Loads the configuration.
///
/// An explicit `path` (or `WATCHBOT_CONFIG`) must exist. Otherwise
/// `watchbot.toml` in the working directory is used when present, and the
/// defaults when it is not. `CHECK_INTERVAL` in the environment overrides the
/// file.
pub fn load(path: Option<&Path>) -> Result<Config, ConfigurationError> {
    let explicit = path
        .map(Path::to_path_buf)
        .or_else(|| std::env::var_os("WATCHBOT_CONFIG").map(PathBuf::from));
    let config = match explicit {
        Some(path) => {
            if !path.exists() {
                return Err(ConfigurationError::Missing(path));
            }
            read(&path)?
        }
        None => {
            let path = Path::new(CONFIG_FILE_NAME);
            if path.exists() {
                read(path)?
            } else {
                tracing::debug!("no {CONFIG_FILE_NAME} found, using defaults");
                Config::default()
            }
        }
    };
    apply_env(config)?.validate()
}

fn read(path: &Path) -> Result<Config, ConfigurationError> {
    let contents =
        std::fs::read_to_string(path).map_err(|e| ConfigurationError::Io(Arc::new(e)))?;
    let config = toml::from_str::<Config>(&contents).map_err(ConfigurationError::Toml)?;
    tracing::debug!("configuration from {}: {:?}", path.display(), config);
    Ok(config)
}

fn apply_env(mut config: Config) -> Result<Config, ConfigurationError> {
    if let Ok(value) = std::env::var("CHECK_INTERVAL") {
        config.check_interval = value.trim().parse().map_err(|_| ConfigurationError::Env {
            name: "CHECK_INTERVAL",
            value,
        })?;
    }
    Ok(config)
}

#[derive(Clone, Debug)]
pub enum ConfigurationError {
    Missing(PathBuf),
    Io(Arc<std::io::Error>),
    Toml(toml::de::Error),
    Env { name: &'static str, value: String },
    Invalid(String),
}

impl std::error::Error for ConfigurationError {}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            ConfigurationError::Missing(path) => {
                write!(f, "Configuration file `{}` does not exist.", path.display())
            }
            ConfigurationError::Io(e) => write!(f, "Failed to read configuration: {e}"),
            ConfigurationError::Toml(e) => write!(f, "Malformed `{CONFIG_FILE_NAME}`.\n{e}"),
            ConfigurationError::Env { name, value } => {
                write!(f, "`{name}` must be a number of seconds, got `{value}`")
            }
            ConfigurationError::Invalid(msg) => write!(f, "Invalid configuration: {msg}"),
        }
    }
}
