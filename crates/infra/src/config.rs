//! Application configuration.
//!
//! Sources, later ones winning: built-in defaults, the JSON file named by
//! `JSON_CONFIG_PATH` (if set), then individual environment variables.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use userverse_core::DomainError;

pub const CONFIG_PATH_VAR: &str = "JSON_CONFIG_PATH";

/// Signing secret used when none is configured. Refused in production.
pub const INSECURE_DEV_SECRET: &str = "dev-secret";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid value for {var}: {reason}")]
    Env { var: &'static str, reason: String },

    #[error("{0}")]
    Invalid(String),
}

impl From<ConfigError> for DomainError {
    fn from(err: ConfigError) -> Self {
        DomainError::validation(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Test,
    Production,
}

impl core::str::FromStr for Environment {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(Self::Development),
            "test" | "testing" => Ok(Self::Test),
            "production" | "prod" => Ok(Self::Production),
            other => Err(ConfigError::Env {
                var: "USERVERSE_ENV",
                reason: format!("unknown environment '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    pub secret: String,
    pub expiry_minutes: i64,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: INSECURE_DEV_SECRET.to_string(),
            expiry_minutes: 60,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasswordResetConfig {
    pub otp_ttl_minutes: i64,
    pub otp_length: usize,
    /// Wrong codes tolerated before the ticket is burned.
    pub max_attempts: u32,
}

impl Default for PasswordResetConfig {
    fn default() -> Self {
        Self {
            otp_ttl_minutes: 60,
            otp_length: 6,
            max_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub environment: Environment,
    pub name: String,
    pub version: String,
    pub bind_addr: String,
    /// `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub jwt: JwtConfig,
    pub password_reset: PasswordResetConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            environment: Environment::default(),
            name: "userverse".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            bind_addr: "0.0.0.0:8080".to_string(),
            database_url: None,
            database_max_connections: 10,
            jwt: JwtConfig::default(),
            password_reset: PasswordResetConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_sources(|var| std::env::var(var).ok())
    }

    /// Load using `lookup` in place of the process environment.
    pub fn from_sources(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = match lookup(CONFIG_PATH_VAR) {
            Some(path) => Self::from_file(Path::new(&path))?,
            None => Self::default(),
        };
        config.apply_env(&lookup)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    fn apply_env(&mut self, lookup: &impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        if let Some(v) = lookup("USERVERSE_ENV") {
            self.environment = v.parse()?;
        }
        if let Some(v) = lookup("DATABASE_URL") {
            self.database_url = Some(v).filter(|s| !s.is_empty());
        }
        if let Some(v) = lookup("JWT_SECRET") {
            self.jwt.secret = v;
        }
        if let Some(v) = lookup("JWT_EXPIRY_MINUTES") {
            self.jwt.expiry_minutes = v.parse().map_err(|e| ConfigError::Env {
                var: "JWT_EXPIRY_MINUTES",
                reason: format!("{e}"),
            })?;
        }
        if let Some(v) = lookup("BIND_ADDR") {
            self.bind_addr = v;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.expiry_minutes <= 0 {
            return Err(ConfigError::Invalid(
                "jwt.expiry_minutes must be positive".into(),
            ));
        }
        if self.password_reset.otp_length == 0 {
            return Err(ConfigError::Invalid(
                "password_reset.otp_length must be positive".into(),
            ));
        }
        if self.environment == Environment::Production {
            if self.jwt.secret.is_empty() || self.jwt.secret == INSECURE_DEV_SECRET {
                return Err(ConfigError::Invalid(
                    "a JWT secret must be configured in production".into(),
                ));
            }
            if self.database_url.is_none() {
                return Err(ConfigError::Invalid(
                    "database_url is required in production".into(),
                ));
            }
        }
        Ok(())
    }
}
