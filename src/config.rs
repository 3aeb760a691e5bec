/// Configuration management for the PantryIQ server
use crate::error::{PantryError, PantryResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub outbox: OutboxConfig,
    pub insights: InsightsConfig,
    pub rate_limit: RateLimitConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    /// Public base URL of this API, used to build invite links
    pub public_url: String,
    /// Frontend base URL, target of the invite confirmation redirect
    pub frontend_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub max_connections: u32,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Session token lifetime in days
    pub session_ttl_days: i64,
}

/// Email configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
    /// Upper bound on a single SMTP delivery, in seconds
    pub timeout_secs: u64,
}

/// Email outbox configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutboxConfig {
    pub poll_interval_secs: u64,
    pub max_attempts: i64,
    pub batch_size: i64,
    /// How long delivered or abandoned messages are kept, in hours
    pub retention_hours: i64,
}

/// Generative-AI insight provider configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InsightsConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout_secs: u64,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub authenticated_rps: u32,
    pub unauthenticated_rps: u32,
    pub burst_size: u32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> PantryResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("PANTRY_HOSTNAME").unwrap_or_else(|_| "localhost".to_string());
        let port = env::var("PANTRY_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| PantryError::Validation("Invalid port number".to_string()))?;
        let version = env::var("PANTRY_VERSION")
            .unwrap_or_else(|_| env!("CARGO_PKG_VERSION").to_string());
        let public_url = env::var("PANTRY_PUBLIC_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));
        let frontend_url = env::var("PANTRY_FRONTEND_URL")
            .unwrap_or_else(|_| "http://localhost:5173".to_string());

        let data_directory: PathBuf = env::var("PANTRY_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("PANTRY_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("pantry.sqlite"));
        let max_connections = env_or("PANTRY_DATABASE_MAX_CONNECTIONS", 10);

        let jwt_secret = env::var("PANTRY_JWT_SECRET")
            .map_err(|_| PantryError::Validation("JWT secret required".to_string()))?;
        let session_ttl_days = env_or("PANTRY_SESSION_TTL_DAYS", 7);

        let email = if let Ok(smtp_url) = env::var("PANTRY_EMAIL_SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("PANTRY_EMAIL_FROM_ADDRESS")
                    .unwrap_or_else(|_| "PantryIQ <noreply@pantryiq.com>".to_string()),
                timeout_secs: env_or("PANTRY_EMAIL_TIMEOUT_SECS", 10),
            })
        } else {
            None
        };

        let outbox = OutboxConfig {
            poll_interval_secs: env_or("PANTRY_OUTBOX_POLL_INTERVAL_SECS", 15),
            max_attempts: env_or("PANTRY_OUTBOX_MAX_ATTEMPTS", 5),
            batch_size: env_or("PANTRY_OUTBOX_BATCH_SIZE", 25),
            retention_hours: env_or("PANTRY_OUTBOX_RETENTION_HOURS", 168),
        };

        let insights = InsightsConfig {
            api_key: env::var("PANTRY_GEMINI_API_KEY")
                .or_else(|_| env::var("GEMINI_API_KEY"))
                .ok()
                .filter(|k| !k.trim().is_empty()),
            model: env::var("PANTRY_GEMINI_MODEL")
                .unwrap_or_else(|_| "gemini-2.5-flash".to_string()),
            endpoint: env::var("PANTRY_GEMINI_ENDPOINT").unwrap_or_else(|_| {
                "https://generativelanguage.googleapis.com/v1beta".to_string()
            }),
            timeout_secs: env_or("PANTRY_INSIGHTS_TIMEOUT_SECS", 15),
        };

        let rate_limit = RateLimitConfig {
            enabled: env_or("PANTRY_RATE_LIMITS_ENABLED", true),
            authenticated_rps: env_or("PANTRY_RATE_LIMIT_AUTHENTICATED_RPS", 100),
            unauthenticated_rps: env_or("PANTRY_RATE_LIMIT_UNAUTHENTICATED_RPS", 10),
            burst_size: env_or("PANTRY_RATE_LIMIT_BURST", 50),
        };

        let logging = LoggingConfig {
            level: env::var("PANTRY_LOG_LEVEL").unwrap_or_else(|_| "debug".to_string()),
            json: env::var("PANTRY_LOG_FORMAT")
                .map(|f| f.eq_ignore_ascii_case("json"))
                .unwrap_or(false),
        };

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                public_url,
                frontend_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
                max_connections,
            },
            authentication: AuthConfig {
                jwt_secret,
                session_ttl_days,
            },
            email,
            outbox,
            insights,
            rate_limit,
            logging,
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> PantryResult<()> {
        if self.service.hostname.is_empty() {
            return Err(PantryError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(PantryError::Validation(
                "JWT secret must be at least 32 characters".to_string(),
            ));
        }

        if self.authentication.session_ttl_days <= 0 {
            return Err(PantryError::Validation(
                "Session lifetime must be positive".to_string(),
            ));
        }

        Ok(())
    }

    /// Configuration suitable for tests: no email, no AI key, no rate limits
    pub fn for_testing(database: PathBuf) -> Self {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3000,
                version: env!("CARGO_PKG_VERSION").to_string(),
                public_url: "http://localhost:3000".to_string(),
                frontend_url: "http://localhost:5173/".to_string(),
            },
            storage: StorageConfig {
                data_directory: database
                    .parent()
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(".")),
                database,
                max_connections: 1,
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                session_ttl_days: 7,
            },
            email: None,
            outbox: OutboxConfig {
                poll_interval_secs: 60,
                max_attempts: 3,
                batch_size: 25,
                retention_hours: 168,
            },
            insights: InsightsConfig {
                api_key: None,
                model: "gemini-2.5-flash".to_string(),
                endpoint: "http://127.0.0.1:9".to_string(),
                timeout_secs: 1,
            },
            rate_limit: RateLimitConfig {
                enabled: false,
                authenticated_rps: 100,
                unauthenticated_rps: 10,
                burst_size: 50,
            },
            logging: LoggingConfig {
                level: "debug".to_string(),
                json: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = ServerConfig::for_testing(PathBuf::from(":memory:"));
        assert!(config.validate().is_ok());

        config.authentication.jwt_secret = "short".to_string();
        assert!(matches!(config.validate(), Err(PantryError::Validation(_))));
    }

    #[test]
    fn test_validate_rejects_empty_hostname() {
        let mut config = ServerConfig::for_testing(PathBuf::from(":memory:"));
        config.service.hostname.clear();
        assert!(config.validate().is_err());
    }
}
