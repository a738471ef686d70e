use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::workflows::submission::SchemaVersion;

const DEFAULT_CHANNEL: &str = "@listings";
const DEFAULT_MAX_LINKS: usize = 10;

/// Distinguishes runtime behavior for different stages of the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn from_str(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// Top-level configuration for the application.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub intake: IntakeConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::from_str(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = env::var("APP_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort)?;

        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            intake: IntakeConfig::from_env()?,
        })
    }
}

/// Settings controlling the HTTP server binding.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

/// Tracing and metrics controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

/// Knobs for the submission wizard and the moderation lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntakeConfig {
    /// Distribution channel approved listings are published to.
    pub channel: String,
    /// Schema version new submissions are created under.
    pub default_schema: SchemaVersion,
    /// Upper bound on items collected by a multi-value link step.
    pub max_links: usize,
    /// Optional JSON snapshot mirrored by the in-memory repository.
    pub data_path: Option<PathBuf>,
    /// Admins allowed to moderate. Empty means any caller may moderate.
    pub admin_ids: Vec<String>,
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            channel: DEFAULT_CHANNEL.to_string(),
            default_schema: SchemaVersion::Extended,
            max_links: DEFAULT_MAX_LINKS,
            data_path: None,
            admin_ids: Vec::new(),
        }
    }
}

impl IntakeConfig {
    fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let channel = env::var("INTAKE_CHANNEL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
            .unwrap_or(defaults.channel);

        let default_schema = match env::var("INTAKE_SCHEMA") {
            Ok(raw) => SchemaVersion::parse(&raw).ok_or(ConfigError::InvalidSchema(raw))?,
            Err(_) => defaults.default_schema,
        };

        let max_links = match env::var("INTAKE_MAX_LINKS") {
            Ok(raw) => raw
                .trim()
                .parse::<usize>()
                .ok()
                .filter(|value| *value > 0)
                .ok_or(ConfigError::InvalidMaxLinks)?,
            Err(_) => defaults.max_links,
        };

        let data_path = env::var("INTAKE_DATA_PATH")
            .ok()
            .filter(|value| !value.trim().is_empty())
            .map(PathBuf::from);

        let admin_ids = env::var("INTAKE_ADMIN_IDS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|id| !id.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            channel,
            default_schema,
            max_links,
            data_path,
            admin_ids,
        })
    }

    pub fn is_admin(&self, admin_id: &str) -> bool {
        self.admin_ids.is_empty() || self.admin_ids.iter().any(|id| id == admin_id)
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidSchema(String),
    InvalidMaxLinks,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidSchema(value) => write!(
                f,
                "INTAKE_SCHEMA must be 'extended' or 'legacy' (found '{}')",
                value
            ),
            ConfigError::InvalidMaxLinks => {
                write!(f, "INTAKE_MAX_LINKS must be a positive integer")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidHost { source } => Some(source),
            ConfigError::InvalidPort
            | ConfigError::InvalidSchema(_)
            | ConfigError::InvalidMaxLinks => None,
        }
    }
}
