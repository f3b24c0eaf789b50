use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use validator::{Validate, ValidationError};

// Default constants
pub const DEFAULT_ENV_PREFIX: &str = "QUARRY";
pub const DEFAULT_NORMALIZE: bool = true;
pub const DEFAULT_KILL_ON_INTERRUPT: bool = true;
pub const DEFAULT_POLL_INITIAL_DELAY_MS: u64 = 100;
pub const DEFAULT_POLL_MAX_DELAY_MS: u64 = 5000;

/// Client configuration, constructed once at process start and handed to the
/// assembler that builds the wrapper chain.
#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ClientConfig {
    /// Database used for unqualified table names. Also part of the cache key.
    #[serde(default)]
    pub database: Option<String>,

    #[serde(default)]
    pub workgroup: Option<String>,

    /// Where the remote service writes result files.
    #[serde(default)]
    pub output_location: Option<String>,

    #[serde(default)]
    pub region: Option<String>,

    /// Storage URI for a cache that keeps execution ids only.
    #[serde(default)]
    #[validate(custom(function = "validate_storage_uri"))]
    pub cache_remote: Option<String>,

    /// Storage URI for a cache that keeps execution ids and results.
    #[serde(default)]
    #[validate(custom(function = "validate_storage_uri"))]
    pub cache_local: Option<String>,

    #[serde(default = "default_normalize")]
    pub normalize: bool,

    #[serde(default = "default_kill_on_interrupt")]
    pub kill_on_interrupt: bool,

    #[serde(default)]
    #[validate(nested)]
    pub poll: PollSettings,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            database: None,
            workgroup: None,
            output_location: None,
            region: None,
            cache_remote: None,
            cache_local: None,
            normalize: default_normalize(),
            kill_on_interrupt: default_kill_on_interrupt(),
            poll: PollSettings::default(),
        }
    }
}

/// Backoff between status polls while waiting for a query to finish.
#[derive(Debug, Deserialize, Clone, Copy, Validate)]
#[validate(schema(function = "validate_poll_bounds"))]
pub struct PollSettings {
    #[serde(default = "default_poll_initial_delay_ms")]
    #[validate(range(min = 1))]
    pub initial_delay_ms: u64,
    #[serde(default = "default_poll_max_delay_ms")]
    #[validate(range(min = 1))]
    pub max_delay_ms: u64,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            initial_delay_ms: default_poll_initial_delay_ms(),
            max_delay_ms: default_poll_max_delay_ms(),
        }
    }
}

fn default_normalize() -> bool {
    DEFAULT_NORMALIZE
}

fn default_kill_on_interrupt() -> bool {
    DEFAULT_KILL_ON_INTERRUPT
}

fn default_poll_initial_delay_ms() -> u64 {
    DEFAULT_POLL_INITIAL_DELAY_MS
}

fn default_poll_max_delay_ms() -> u64 {
    DEFAULT_POLL_MAX_DELAY_MS
}

fn validate_storage_uri(uri: &str) -> Result<(), ValidationError> {
    if uri.is_empty() {
        return Err(ValidationError::new("empty_storage_uri"));
    }
    // Bare paths are accepted as local directories.
    if !uri.contains(':') {
        return Ok(());
    }
    match url::Url::parse(uri) {
        Ok(_) => Ok(()),
        Err(_) => Err(ValidationError::new("invalid_storage_uri")),
    }
}

fn validate_poll_bounds(poll: &PollSettings) -> Result<(), ValidationError> {
    if poll.initial_delay_ms > poll.max_delay_ms {
        return Err(ValidationError::new("initial_delay_exceeds_max_delay"));
    }
    Ok(())
}

impl ClientConfig {
    /// Load from an optional config file, overlaid with `QUARRY_*` variables
    /// from the process environment.
    pub fn from_file(path: Option<&str>) -> Result<Self> {
        Self::load(path, None, DEFAULT_ENV_PREFIX)
    }

    /// Load from an explicit variable map instead of the process environment.
    ///
    /// Maps `<PREFIX>_CACHE_LOCAL` to `cache_local` and
    /// `<PREFIX>_POLL__MAX_DELAY_MS` to `poll.max_delay_ms`. Empty values are
    /// treated as unset.
    pub fn from_environ(environ: &HashMap<String, String>, prefix: &str) -> Result<Self> {
        Self::load(None, Some(environ.clone()), prefix)
    }

    fn load(
        path: Option<&str>,
        environ: Option<HashMap<String, String>>,
        prefix: &str,
    ) -> Result<Self> {
        let builder = config::Config::builder();

        let builder = match path {
            Some(path) if std::path::Path::new(path).exists() => {
                builder.add_source(config::File::with_name(path))
            }
            Some(path) => anyhow::bail!("Config file not found: {}", path),
            None => builder,
        };

        let builder = builder.add_source(
            config::Environment::with_prefix(prefix)
                .prefix_separator("_")
                .separator("__")
                .ignore_empty(true)
                .try_parsing(true)
                .source(environ),
        );

        let cfg = builder.build().context("Failed to build client configuration")?;

        let client_config: ClientConfig = cfg
            .try_deserialize()
            .context("Failed to deserialize client configuration")?;

        client_config
            .validate()
            .map_err(|e| anyhow::anyhow!("Client configuration validation failed: {:?}", e))?;

        tracing::debug!(
            env_prefix = %prefix,
            file = ?path,
            database = ?client_config.database,
            cache_remote = ?client_config.cache_remote,
            cache_local = ?client_config.cache_local,
            "Loaded client configuration"
        );
        Ok(client_config)
    }
}
