// Configuration management with layered configuration (defaults, file, env)

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main settings structure containing all configuration options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub object_store: ObjectStoreConfig,
    pub secrets: SecretsConfig,
    pub warehouse: WarehouseConfig,
    pub media: MediaConfig,
    pub batch: BatchConfig,
    pub output: OutputConfig,
    pub observability: ObservabilityConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct ObjectStoreConfig {
    pub bucket: String,
    pub region: String,
    /// Custom S3-compatible endpoint. AWS S3 is used when unset.
    #[serde(default)]
    pub endpoint: Option<String>,
    /// Static credentials. The ambient AWS credential chain is used when unset.
    #[serde(default)]
    pub access_key: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub path_style: bool,
}

impl std::fmt::Debug for ObjectStoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectStoreConfig")
            .field("bucket", &self.bucket)
            .field("region", &self.region)
            .field("endpoint", &self.endpoint)
            .field("access_key", &self.access_key.as_ref().map(|_| "<redacted>"))
            .field("secret_key", &self.secret_key.as_ref().map(|_| "<redacted>"))
            .field("path_style", &self.path_style)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecretsConfig {
    pub region: String,
    /// Secret holding the media API key. The request's `api_key` is used when unset.
    #[serde(default)]
    pub media_api_key_secret: Option<String>,
    pub media_api_key_field: String,
    pub warehouse_password_secret: String,
    pub warehouse_password_field: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Warehouse host. Falls back to the request's account when unset.
    #[serde(default)]
    pub host: Option<String>,
    pub port: u16,
    pub database: String,
    pub table: String,
    pub connect_timeout_seconds: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaConfig {
    pub api_key_param: String,
    pub request_timeout_seconds: u64,
    /// Directory for transient downloads. Defaults to the system temp directory.
    #[serde(default)]
    pub scratch_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    pub max_items: u32,
    pub cutoff_seconds: u64,
    pub host_time_limit_seconds: u64,
    #[serde(default)]
    pub on_item_failure: FailurePolicy,
    #[serde(default)]
    pub has_more: HasMorePolicy,
}

/// What the batch does when a single item's transfer fails
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Fail the whole run and discard every completion record
    #[default]
    AbortBatch,
    /// Stop at the failing item and report the records completed before it
    KeepCompleted,
}

/// How the `hasMore` flag of the response is derived
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HasMorePolicy {
    /// Always report `false`
    #[default]
    Never,
    /// Report `true` when the batch was full or iteration stopped early
    WhenIncomplete,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    pub table_name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    pub log_level: String,
    /// Set when the host environment already installed a log subscriber
    #[serde(default)]
    pub logging_preconfigured: bool,
    #[serde(default)]
    pub metrics_port: Option<u16>,
    #[serde(default)]
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
            // Built-in defaults so partial files are enough
            .add_source(Config::try_from(&Settings::default())?)
            .add_source(File::from(config_dir.join("default.toml")).required(false))
            // Add local configuration (not committed to git)
            .add_source(File::from(config_dir.join("local.toml")).required(false))
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
        // Validate object store config
        if self.object_store.bucket.is_empty() {
            return Err("Object store bucket cannot be empty".to_string());
        }
        if self.object_store.region.is_empty() {
            return Err("Object store region cannot be empty".to_string());
        }
        if self.object_store.access_key.is_some() != self.object_store.secret_key.is_some() {
            return Err(
                "Object store access_key and secret_key must be provided together".to_string(),
            );
        }

        // Validate secrets config
        if self.secrets.region.is_empty() {
            return Err("Secret store region cannot be empty".to_string());
        }
        if matches!(&self.secrets.media_api_key_secret, Some(name) if name.is_empty()) {
            return Err("Media API key secret name cannot be empty".to_string());
        }
        if self.secrets.media_api_key_field.is_empty() {
            return Err("Media API key secret field cannot be empty".to_string());
        }
        if self.secrets.warehouse_password_secret.is_empty()
            || self.secrets.warehouse_password_field.is_empty()
        {
            return Err("Warehouse password secret name and field cannot be empty".to_string());
        }

        // Validate warehouse config
        if !is_sql_identifier(&self.warehouse.table) {
            return Err(format!(
                "Warehouse table '{}' is not a valid SQL identifier",
                self.warehouse.table
            ));
        }
        if self.warehouse.database.is_empty() {
            return Err("Warehouse database cannot be empty".to_string());
        }

        // Validate media config
        if self.media.api_key_param.is_empty() {
            return Err("Media api_key_param cannot be empty".to_string());
        }
        if self.media.request_timeout_seconds == 0 {
            return Err("Media request_timeout_seconds must be greater than 0".to_string());
        }

        // Validate batch config
        if self.batch.max_items == 0 {
            return Err("Batch max_items must be greater than 0".to_string());
        }
        if self.batch.cutoff_seconds == 0 {
            return Err("Batch cutoff_seconds must be greater than 0".to_string());
        }
        if self.batch.cutoff_seconds >= self.batch.host_time_limit_seconds {
            return Err(format!(
                "Batch cutoff_seconds ({}) must be below host_time_limit_seconds ({})",
                self.batch.cutoff_seconds, self.batch.host_time_limit_seconds
            ));
        }

        // Validate output config
        if !is_sql_identifier(&self.output.table_name) {
            return Err(format!(
                "Output table '{}' is not a valid SQL identifier",
                self.output.table_name
            ));
        }

        Ok(())
    }
}

/// Accepts `name` or `schema.name` built from ASCII letters, digits and underscores
fn is_sql_identifier(value: &str) -> bool {
    !value.is_empty()
        && value.split('.').all(|part| {
            let mut chars = part.chars();
            matches!(chars.next(), Some(c) if c.is_ascii_alphabetic() || c == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            object_store: ObjectStoreConfig {
                bucket: "s3_bucket_name".to_string(),
                region: "us-west-2".to_string(),
                endpoint: None,
                access_key: None,
                secret_key: None,
                path_style: false,
            },
            secrets: SecretsConfig {
                region: "us-west-2".to_string(),
                media_api_key_secret: Some("api_keys".to_string()),
                media_api_key_field: "api_keys".to_string(),
                warehouse_password_secret: "/user_id/snowflake_password".to_string(),
                warehouse_password_field: "user_id/snowflake_password".to_string(),
            },
            warehouse: WarehouseConfig {
                host: None,
                port: 5432,
                database: "analytics".to_string(),
                table: "call_recordings".to_string(),
                connect_timeout_seconds: 30,
            },
            media: MediaConfig {
                api_key_param: "apikey".to_string(),
                request_timeout_seconds: 300,
                scratch_dir: None,
            },
            batch: BatchConfig {
                max_items: 2000,
                cutoff_seconds: 870, // 14m30s
                host_time_limit_seconds: 900,
                on_item_failure: FailurePolicy::AbortBatch,
                has_more: HasMorePolicy::Never,
            },
            output: OutputConfig {
                table_name: "audio_upload_status".to_string(),
            },
            observability: ObservabilityConfig {
                log_level: "info".to_string(),
                logging_preconfigured: false,
                metrics_port: None,
                tracing_endpoint: None,
            },
        }
    }
}
