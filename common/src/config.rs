// Configuration management with layered configuration (file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub scheduler: SchedulerConfig,
    pub email: EmailConfig,
    pub push: PushConfig,
    pub vision: VisionConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_seconds: u64,
    #[serde(default = "default_true")]
    pub run_migrations: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Cron expression (with seconds) driving the notification tick
    pub tick_schedule: String,
    pub shutdown_grace_seconds: u64,
}

/// Transactional email provider (Resend-compatible HTTP API)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub api_url: String,
    #[serde(default)]
    pub api_key: String,
    pub from_address: String,
    pub timeout_seconds: u64,
}

/// Web Push (VAPID) credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PushConfig {
    /// Base64url-encoded raw P-256 private scalar
    #[serde(default)]
    pub vapid_private_key: String,
    pub subject: String,
    pub ttl_seconds: u32,
    pub timeout_seconds: u64,
}

/// Generative vision model used for label extraction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisionConfig {
    pub api_url: String,
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    pub timeout_seconds: u64,
    pub max_image_bytes: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    #[serde(default)]
    pub json_logs: bool,
    pub metrics_port: u16,
    pub tracing_endpoint: Option<String>,
}

impl Settings {
    /// Load configuration with layered precedence: defaults → file → env
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from_path("config")
    }

    /// Load configuration from a specific path
    pub fn load_from_path<P: AsRef<Path>>(config_dir: P) -> Result<Self, ConfigError> {
        let config_dir = config_dir.as_ref();

        let builder = Config::builder()
            // Start with default configuration
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
            // Secrets usually arrive here, e.g. APP__EMAIL__API_KEY
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("Server port must be greater than 0".to_string());
        }

        if self.database.url.is_empty() {
            return Err("Database URL cannot be empty".to_string());
        }
        if self.database.max_connections == 0 {
            return Err("Database max_connections must be greater than 0".to_string());
        }
        if self.database.min_connections > self.database.max_connections {
            return Err("Database min_connections cannot exceed max_connections".to_string());
        }

        if let Err(e) = crate::schedule::parse_tick_schedule(&self.scheduler.tick_schedule) {
            return Err(e.to_string());
        }

        if self.email.api_url.is_empty() {
            return Err("Email api_url cannot be empty".to_string());
        }
        if self.email.from_address.trim().is_empty() {
            return Err("Email from_address cannot be empty".to_string());
        }

        if self.push.subject.is_empty() {
            return Err("Push subject cannot be empty".to_string());
        }

        if self.vision.max_image_bytes == 0 {
            return Err("Vision max_image_bytes must be greater than 0".to_string());
        }

        Ok(())
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: "0.0.0.0".to_string(),
                port: 5000,
            },
            database: DatabaseConfig {
                url: "postgresql://localhost/medicine_tracker".to_string(),
                max_connections: 10,
                min_connections: 1,
                connect_timeout_seconds: 30,
                run_migrations: true,
            },
            scheduler: SchedulerConfig {
                tick_schedule: "0 * * * * *".to_string(),
                shutdown_grace_seconds: 5,
            },
            email: EmailConfig {
                api_url: "https://api.resend.com".to_string(),
                api_key: String::new(),
                from_address: "Medicine Tracker <onboarding@resend.dev>".to_string(),
                timeout_seconds: 30,
            },
            push: PushConfig {
                vapid_private_key: String::new(),
                subject: "mailto:noreply@medicinetracker.com".to_string(),
                ttl_seconds: 86400,
                timeout_seconds: 30,
            },
            vision: VisionConfig {
                api_url: "https://generativelanguage.googleapis.com/v1beta".to_string(),
                model: "gemini-2.0-flash-exp".to_string(),
                api_key: String::new(),
                timeout_seconds: 60,
                max_image_bytes: 5 * 1024 * 1024,
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                json_logs: false,
                metrics_port: 9090,
                tracing_endpoint: None,
            },
        }
    }
}
