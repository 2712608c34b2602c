use std::env;
use std::fmt;
use std::net::{IpAddr, SocketAddr};

const DEFAULT_MAIL_FROM: &str = "BUP Alumni Mentorship <no-reply@localhost>";
const DEFAULT_DASHBOARD_URL: &str = "http://localhost:3000/mentorship_student_dashboard.html";

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
    pub database: DatabaseConfig,
    pub mail: MailConfig,
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

        let url = env::var("DATABASE_URL")
            .ok()
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty());
        if let Some(url) = &url {
            DatabaseConfig::check_url(url)?;
        }
        let max_connections = env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".to_string())
            .parse::<u32>()
            .ok()
            .filter(|value| *value > 0)
            .ok_or(ConfigError::InvalidMaxConnections)?;

        let from_address = env::var("MAIL_FROM").unwrap_or_else(|_| DEFAULT_MAIL_FROM.to_string());
        let dashboard_url = env::var("MENTORSHIP_DASHBOARD_URL")
            .unwrap_or_else(|_| DEFAULT_DASHBOARD_URL.to_string());

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            database: DatabaseConfig {
                url,
                max_connections,
            },
            mail: MailConfig {
                from_address,
                dashboard_url,
            },
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

/// Relational store selection. No URL keeps everything in process memory.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
    pub max_connections: u32,
}

impl DatabaseConfig {
    pub fn check_url(url: &str) -> Result<(), ConfigError> {
        if url.starts_with("sqlite:") {
            Ok(())
        } else {
            Err(ConfigError::UnsupportedDatabaseUrl {
                url: url.to_string(),
            })
        }
    }

    /// Replaces the configured URL with a command-line override, held to the same rules.
    pub fn override_url(&mut self, url: String) -> Result<(), ConfigError> {
        let url = url.trim().to_string();
        Self::check_url(&url)?;
        self.url = Some(url);
        Ok(())
    }

    /// Every connection to `sqlite::memory:` opens its own database, so the pool is pinned to one.
    pub fn effective_max_connections(&self) -> u32 {
        match &self.url {
            Some(url) if url.contains(":memory:") => 1,
            _ => self.max_connections,
        }
    }
}

/// Sender identity and links used in approval e-mails.
#[derive(Debug, Clone)]
pub struct MailConfig {
    pub from_address: String,
    pub dashboard_url: String,
}

impl Default for MailConfig {
    fn default() -> Self {
        Self {
            from_address: DEFAULT_MAIL_FROM.to_string(),
            dashboard_url: DEFAULT_DASHBOARD_URL.to_string(),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    InvalidPort,
    InvalidHost { source: std::net::AddrParseError },
    InvalidMaxConnections,
    UnsupportedDatabaseUrl { url: String },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::InvalidPort => write!(f, "APP_PORT must be a valid u16"),
            ConfigError::InvalidHost { .. } => {
                write!(f, "APP_HOST must parse to an IPv4 or IPv6 address")
            }
            ConfigError::InvalidMaxConnections => {
                write!(f, "DATABASE_MAX_CONNECTIONS must be a positive integer")
            }
            ConfigError::UnsupportedDatabaseUrl { url } => {
                write!(f, "DATABASE_URL '{url}' is not a sqlite: URL")
            }
        }
    }
}

impl std::error::Error for ConfigError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ConfigError::InvalidPort
            | ConfigError::InvalidMaxConnections
            | ConfigError::UnsupportedDatabaseUrl { .. } => None,
            ConfigError::InvalidHost { source } => Some(source),
        }
    }
}
