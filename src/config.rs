use serde::Deserialize;
use std::path::Path;
use std::time::Duration;

const ENV_PREFIX: &str = "LDAPEXT";

/// Client-side settings. Loaded from an optional YAML file, then overridden
/// by `LDAPEXT_*` environment variables.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Config {
    /// debug, info, warn, error
    pub log_level: String,

    /// Default per-request timeout in milliseconds. Zero disables it.
    pub request_timeout_ms: u64,

    /// Worker threads of the handler runtime. Zero uses tokio's default.
    pub handler_threads: usize,

    /// Limit on outstanding requests per connection. Zero means unbounded.
    pub max_pending_requests: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            request_timeout_ms: 0,
            handler_threads: 0,
            max_pending_requests: 0,
        }
    }
}

impl Config {
    pub fn load(path: Option<&Path>) -> crate::Result<Self> {
        Self::load_with_prefix(path, ENV_PREFIX)
    }

    fn load_with_prefix(path: Option<&Path>, prefix: &str) -> crate::Result<Self> {
        let mut builder = ::config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(
                ::config::File::from(path)
                    .format(::config::FileFormat::Yaml)
                    .required(true),
            );
        }
        let config: Config = builder
            .add_source(::config::Environment::with_prefix(prefix).try_parsing(true))
            .build()?
            .try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> crate::Result<()> {
        parse_level(&self.log_level).map(|_| ()).ok_or_else(|| {
            crate::LdapExtError::Config(format!("Invalid log level: {}", self.log_level))
        })
    }

    pub fn level(&self) -> tracing::Level {
        parse_level(&self.log_level).unwrap_or(tracing::Level::INFO)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        (self.request_timeout_ms > 0).then(|| Duration::from_millis(self.request_timeout_ms))
    }

    /// Builds the runtime on which result handlers are dispatched.
    pub fn build_handler_runtime(&self) -> crate::Result<tokio::runtime::Runtime> {
        let mut builder = tokio::runtime::Builder::new_multi_thread();
        builder.thread_name("ldapext-handler").enable_time();
        if self.handler_threads > 0 {
            builder.worker_threads(self.handler_threads);
        }
        Ok(builder.build()?)
    }
}

fn parse_level(level: &str) -> Option<tracing::Level> {
    match level.to_lowercase().as_str() {
        "trace" => Some(tracing::Level::TRACE),
        "debug" => Some(tracing::Level::DEBUG),
        "info" => Some(tracing::Level::INFO),
        "warn" => Some(tracing::Level::WARN),
        "error" => Some(tracing::Level::ERROR),
        _ => None,
    }
}
