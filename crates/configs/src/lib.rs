//! # configs
//!
//! Layered application configuration. Lowest to highest precedence:
//! built-in defaults, an optional `temple-site.toml`, then `TEMPLE__`
//! environment variables with `__` between levels
//! (`TEMPLE__DATA__BACKEND=sqlite`). A `.env` file is loaded into the
//! environment first.

use std::net::SocketAddr;
use std::time::Duration;

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, Environment, File};
use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

pub const FILE_NAME: &str = "temple-site";
pub const ENV_PREFIX: &str = "TEMPLE";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not read configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataBackend {
    Memory,
    Sqlite,
    Rest,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaBackend {
    Memory,
    Local,
    Rest,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub bind: SocketAddr,
}

#[derive(Debug, Clone)]
pub struct DataConfig {
    pub backend: DataBackend,
    /// SQLite url for `sqlite`, project base url for `rest`.
    pub url: String,
    pub api_key: Option<SecretString>,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub backend: MediaBackend,
    pub bucket: String,
    /// Media directory for `local`.
    pub root: String,
    /// Base of public URLs: the project url for `rest`, a path prefix for
    /// `local`, any base for `memory`.
    pub public_url: String,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: Option<SecretString>,
    pub jwt_audience: Option<String>,
    /// Identities with administrative capability.
    pub admin_allowlist: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct LogConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    pub filter: String,
    pub json: bool,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub data: DataConfig,
    pub storage: StorageConfig,
    pub auth: AuthConfig,
    pub log: LogConfig,
}

/// Accepts `["a", "b"]` or `"a, b"`: lists from the environment arrive as
/// one string.
#[derive(Debug, Default, Deserialize)]
#[serde(untagged)]
enum StringList {
    #[default]
    Empty,
    List(Vec<String>),
    Joined(String),
}

impl StringList {
    fn into_vec(self) -> Vec<String> {
        match self {
            StringList::Empty => Vec::new(),
            StringList::List(items) => items,
            StringList::Joined(s) => s.split(',').map(str::to_string).collect(),
        }
        .into_iter()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
    }
}

#[derive(Debug, Deserialize)]
struct RawConfig {
    server: RawServer,
    data: RawData,
    storage: RawStorage,
    auth: RawAuth,
    log: RawLog,
}

#[derive(Debug, Deserialize)]
struct RawServer {
    bind: String,
}

#[derive(Debug, Deserialize)]
struct RawData {
    backend: DataBackend,
    #[serde(default)]
    url: String,
    #[serde(default)]
    api_key: Option<String>,
    timeout_secs: u64,
}

#[derive(Debug, Deserialize)]
struct RawStorage {
    backend: MediaBackend,
    bucket: String,
    root: String,
    public_url: String,
}

#[derive(Debug, Deserialize)]
struct RawAuth {
    #[serde(default)]
    jwt_secret: Option<String>,
    #[serde(default)]
    jwt_audience: Option<String>,
    #[serde(default)]
    admin_allowlist: StringList,
}

#[derive(Debug, Deserialize)]
struct RawLog {
    filter: String,
    json: bool,
}

fn non_empty(s: Option<String>) -> Option<String> {
    s.filter(|v| !v.trim().is_empty())
}

impl AppConfig {
    /// Loads `.env`, `temple-site.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenvy::dotenv() {
            debug!(path = %path.display(), ".env loaded");
        }
        let builder = Config::builder()
            .add_source(File::with_name(FILE_NAME).required(false))
            .add_source(Environment::with_prefix(ENV_PREFIX).separator("__"));
        Self::from_builder(builder)
    }

    /// Applies defaults under whatever sources `builder` carries, then
    /// validates.
    pub fn from_builder(builder: ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
        let raw: RawConfig = builder
            .set_default("server.bind", "127.0.0.1:8080")?
            .set_default("data.backend", "memory")?
            .set_default("data.timeout_secs", 10)?
            .set_default("storage.backend", "memory")?
            .set_default("storage.bucket", "temple")?
            .set_default("storage.root", "./data/media")?
            .set_default("storage.public_url", "/media")?
            .set_default("log.filter", "info,temple_site=debug,tower_http=info")?
            .set_default("log.json", false)?
            .build()?
            .try_deserialize()?;
        let config = Self::from_raw(raw)?;
        info!(
            bind = %config.server.bind,
            data = ?config.data.backend,
            media = ?config.storage.backend,
            admins = config.auth.admin_allowlist.len(),
            "configuration loaded"
        );
        Ok(config)
    }

    fn from_raw(raw: RawConfig) -> Result<Self, ConfigError> {
        let bind = raw
            .server
            .bind
            .parse()
            .map_err(|e| ConfigError::Invalid(format!("server.bind '{}': {e}", raw.server.bind)))?;

        let api_key = non_empty(raw.data.api_key);
        match raw.data.backend {
            DataBackend::Sqlite if raw.data.url.is_empty() => {
                return Err(ConfigError::Invalid("data.url is required for sqlite".into()));
            }
            DataBackend::Rest if raw.data.url.is_empty() || api_key.is_none() => {
                return Err(ConfigError::Invalid("data.url and data.api_key are required for rest".into()));
            }
            _ => {}
        }
        if raw.storage.backend == MediaBackend::Rest && (raw.data.url.is_empty() || api_key.is_none()) {
            return Err(ConfigError::Invalid(
                "rest media storage needs data.url and data.api_key".into(),
            ));
        }
        if raw.storage.bucket.trim().is_empty() {
            return Err(ConfigError::Invalid("storage.bucket must not be empty".into()));
        }

        Ok(Self {
            server: ServerConfig { bind },
            data: DataConfig {
                backend: raw.data.backend,
                url: raw.data.url,
                api_key: api_key.map(SecretString::from),
                timeout: Duration::from_secs(raw.data.timeout_secs.max(1)),
            },
            storage: StorageConfig {
                backend: raw.storage.backend,
                bucket: raw.storage.bucket,
                root: raw.storage.root,
                public_url: raw.storage.public_url,
            },
            auth: AuthConfig {
                jwt_secret: non_empty(raw.auth.jwt_secret).map(SecretString::from),
                jwt_audience: non_empty(raw.auth.jwt_audience),
                admin_allowlist: raw.auth.admin_allowlist.into_vec(),
            },
            log: LogConfig {
                filter: raw.log.filter,
                json: raw.log.json,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;
    use secrecy::ExposeSecret;

    fn from_toml(toml: &str) -> Result<AppConfig, ConfigError> {
        AppConfig::from_builder(Config::builder().add_source(File::from_str(toml, FileFormat::Toml)))
    }

    #[test]
    fn defaults_give_an_in_memory_dev_server() {
        let config = from_toml("").unwrap();

        assert_eq!(config.server.bind.port(), 8080);
        assert_eq!(config.data.backend, DataBackend::Memory);
        assert_eq!(config.storage.bucket, "temple");
        assert_eq!(config.data.timeout, Duration::from_secs(10));
        assert!(config.auth.admin_allowlist.is_empty());
        assert!(!config.log.json);
    }

    #[test]
    fn allowlist_accepts_list_or_comma_string() {
        let listed = from_toml("[auth]\nadmin_allowlist = [\"abbot-uid\", \" \"]").unwrap();
        assert_eq!(listed.auth.admin_allowlist, ["abbot-uid"]);

        let joined = from_toml("[auth]\nadmin_allowlist = \"abbot-uid, secretary-uid\"").unwrap();
        assert_eq!(joined.auth.admin_allowlist, ["abbot-uid", "secretary-uid"]);
    }

    #[test]
    fn rest_backend_needs_url_and_key() {
        let missing = from_toml("[data]\nbackend = \"rest\"\nurl = \"https://project.example\"");
        assert!(matches!(missing, Err(ConfigError::Invalid(_))));

        let ok = from_toml(
            "[data]\nbackend = \"rest\"\nurl = \"https://project.example\"\napi_key = \"anon\"",
        )
        .unwrap();
        assert_eq!(ok.data.api_key.as_ref().map(|k| k.expose_secret()), Some("anon"));
    }

    #[test]
    fn bad_bind_address_is_rejected() {
        let err = from_toml("[server]\nbind = \"localhost\"").unwrap_err();

        assert!(err.to_string().contains("server.bind"));
    }

    #[test]
    fn secrets_are_redacted_in_debug_output() {
        let config = from_toml("[auth]\njwt_secret = \"super-secret\"").unwrap();

        assert!(!format!("{config:?}").contains("super-secret"));
    }
}
