use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};
use std::env;

/// Process-wide runtime mode. Read once from APP_ENV and immutable afterwards;
/// everything else in the configuration travels inside [`AppConfig`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Environment {
    Development,
    Production,
}

static ENVIRONMENT: Lazy<Environment> = Lazy::new(Environment::from_env);

impl Environment {
    fn from_env() -> Self {
        match env::var("APP_ENV").as_deref() {
            Ok("production") | Ok("prod") => Environment::Production,
            _ => Environment::Development,
        }
    }

    pub fn current() -> Self {
        *ENVIRONMENT
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub environment: Environment,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub security: SecurityConfig,
    pub email: EmailConfig,
    pub api: ApiConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub connection_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    pub cookie_name: String,
    pub secure_cookies: bool,
    pub reset_token_ttl_secs: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub from_name: String,
    pub from_email: String,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub smtp_username: String,
    pub smtp_password: String,
    /// When set, mail is written to this directory instead of going over SMTP.
    pub file_outbox: Option<String>,
    pub public_base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub enable_rate_limiting: bool,
    pub rate_limit_requests: u32,
    pub rate_limit_window_secs: u64,
}

impl AppConfig {
    pub fn from_env() -> Self {
        let base = match Environment::current() {
            Environment::Production => Self::production(),
            Environment::Development => Self::development(),
        };
        base.with_env_overrides()
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(v) = env::var("PORT") {
            self.server.port = v.parse().unwrap_or(self.server.port);
        }
        if let Ok(v) = env::var("DATABASE_URL") {
            self.database.url = v;
        }
        if let Ok(v) = env::var("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = v.parse().unwrap_or(self.database.max_connections);
        }
        if let Ok(v) = env::var("JWT_SECRET") {
            self.security.jwt_secret = v;
        }
        if let Ok(v) = env::var("JWT_TTL_SECS") {
            self.security.jwt_ttl_secs = v.parse().unwrap_or(self.security.jwt_ttl_secs);
        }
        if let Ok(v) = env::var("RESET_TOKEN_TTL_SECS") {
            self.security.reset_token_ttl_secs =
                v.parse().unwrap_or(self.security.reset_token_ttl_secs);
        }
        if let Ok(v) = env::var("EMAIL_FROM") {
            self.email.from_email = v;
        }
        if let Ok(v) = env::var("EMAIL_HOST") {
            self.email.smtp_host = v;
        }
        if let Ok(v) = env::var("EMAIL_PORT") {
            self.email.smtp_port = v.parse().unwrap_or(self.email.smtp_port);
        }
        if let Ok(v) = env::var("EMAIL_USERNAME") {
            self.email.smtp_username = v;
        }
        if let Ok(v) = env::var("EMAIL_PASSWORD") {
            self.email.smtp_password = v;
        }
        if let Ok(v) = env::var("EMAIL_OUTBOX_DIR") {
            self.email.file_outbox = Some(v);
        }
        if let Ok(v) = env::var("PUBLIC_BASE_URL") {
            self.email.public_base_url = v;
        }
        if let Ok(v) = env::var("API_ENABLE_RATE_LIMITING") {
            self.api.enable_rate_limiting = v.parse().unwrap_or(self.api.enable_rate_limiting);
        }
        self
    }

    fn development() -> Self {
        Self {
            environment: Environment::Development,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: "postgres://localhost/trailhead_dev".to_string(),
                max_connections: 10,
                connection_timeout_secs: 30,
            },
            security: SecurityConfig {
                jwt_secret: "dev-only-secret-change-me".to_string(),
                jwt_ttl_secs: 60 * 60 * 24 * 7,
                cookie_name: "jwt".to_string(),
                secure_cookies: false,
                reset_token_ttl_secs: 10 * 60,
            },
            email: EmailConfig {
                from_name: "Trailhead".to_string(),
                from_email: "hello@trailhead.test".to_string(),
                smtp_host: "localhost".to_string(),
                smtp_port: 1025,
                smtp_username: String::new(),
                smtp_password: String::new(),
                file_outbox: Some("./outbox".to_string()),
                public_base_url: "http://localhost:3000".to_string(),
            },
            api: ApiConfig {
                enable_rate_limiting: false,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 3600,
            },
        }
    }

    fn production() -> Self {
        Self {
            environment: Environment::Production,
            server: ServerConfig {
                bind: "0.0.0.0".to_string(),
                port: 3000,
            },
            database: DatabaseConfig {
                url: String::new(),
                max_connections: 50,
                connection_timeout_secs: 5,
            },
            security: SecurityConfig {
                jwt_secret: String::new(),
                jwt_ttl_secs: 60 * 60 * 4,
                cookie_name: "jwt".to_string(),
                secure_cookies: true,
                reset_token_ttl_secs: 10 * 60,
            },
            email: EmailConfig {
                from_name: "Trailhead".to_string(),
                from_email: String::new(),
                smtp_host: String::new(),
                smtp_port: 587,
                smtp_username: String::new(),
                smtp_password: String::new(),
                file_outbox: None,
                public_base_url: String::new(),
            },
            api: ApiConfig {
                enable_rate_limiting: true,
                rate_limit_requests: 1000,
                rate_limit_window_secs: 3600,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn development_defaults() {
        let config = AppConfig::development();
        assert!(!config.security.secure_cookies);
        assert_eq!(config.security.reset_token_ttl_secs, 600);
        assert!(!config.api.enable_rate_limiting);
    }

    #[test]
    fn production_defaults() {
        let config = AppConfig::production();
        assert!(config.security.secure_cookies);
        assert_eq!(config.security.jwt_ttl_secs, 4 * 3600);
        assert!(config.api.enable_rate_limiting);
    }
}
