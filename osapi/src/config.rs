//! Application configuration management.
//!
//! Configuration is loaded from a YAML file with environment variable overrides. The configuration
//! file path defaults to `config.yaml` but can be specified via `-f` flag or `OSAPI_CONFIG`
//! environment variable. A missing file is not an error: every field has a default.
//!
//! ## Loading Priority
//!
//! Configuration sources are merged in the following order (later sources override earlier ones):
//!
//! 1. **YAML config file** - Base configuration (default: `config.yaml`)
//! 2. **Environment variables** - Variables prefixed with `OSAPI_` override YAML values
//! 3. **AWS variables** - `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY`, `AWS_URL_ENDPOINT` and
//!    `AWS_REGION` override the matching `storage.*` fields if set
//!
//! For nested config values, use double underscores in environment variables. For example,
//! `OSAPI_UPLOAD__MAX_CONCURRENT_UPLOADS=50` sets `upload.max_concurrent_uploads`.
//!
//! ## Usage
//!
//! ```no_run
//! use clap::Parser;
//! use osapi::config::{Args, Config};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let args = Args::parse();
//! let config = Config::load(&args)?;
//!
//! println!("Server will bind to {}:{}", config.host, config.port);
//! # Ok(())
//! # }
//! ```
//!
//! ## Environment Variable Examples
//!
//! ```bash
//! # Credentials and endpoint, same names as the AWS tooling
//! AWS_ACCESS_KEY_ID=minio
//! AWS_SECRET_ACCESS_KEY=minio123
//! AWS_URL_ENDPOINT=http://localhost:9000
//!
//! # Destination for uploads
//! OSAPI_STORAGE__BUCKET=images
//! OSAPI_STORAGE__KEY_PREFIX=incoming
//!
//! # Bound the upload fan-out
//! OSAPI_UPLOAD__MAX_CONCURRENT_UPLOADS=50
//! ```

use clap::Parser;
use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::errors::Error;

/// S3 refuses presigned URLs valid for longer than a week
const MAX_PRESIGNED_URL_EXPIRY: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Simple CLI args - just for specifying config file
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to configuration file
    #[arg(short = 'f', long, env = "OSAPI_CONFIG", default_value = "config.yaml")]
    pub config: String,

    /// Validate configuration and exit without starting the server.
    #[arg(long)]
    pub validate: bool,
}

/// Main application configuration.
///
/// This is the root configuration structure loaded from YAML and environment variables.
/// All fields have sensible defaults defined in the `Default` implementation.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// HTTP server host to bind to (e.g., "0.0.0.0" for all interfaces)
    pub host: String,
    /// HTTP server port to bind to
    pub port: u16,
    /// Object store connection and default upload destination
    pub storage: StorageConfig,
    /// Batch upload behaviour and limits
    pub upload: UploadConfig,
    /// Lifetime of URLs returned by `/generate-presigned-url/`
    #[serde(with = "humantime_serde")]
    pub presigned_url_expiry: Duration,
    /// CORS configuration for browser clients
    pub cors: CorsConfig,
    /// Enable OpenTelemetry OTLP export for distributed tracing
    pub enable_otel_export: bool,
}

/// Which [`crate::storage::ObjectStore`] implementation to run against
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// Any S3-compatible service (AWS, MinIO, Ceph...)
    #[default]
    S3,
    /// Process-local storage, lost on restart
    Memory,
}

/// Object store configuration.
#[derive(Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Access key for the S3 backend (env: `AWS_ACCESS_KEY_ID`)
    pub access_key_id: String,
    /// Secret key for the S3 backend (env: `AWS_SECRET_ACCESS_KEY`)
    pub secret_access_key: String,
    /// Custom endpoint, e.g. a MinIO server (env: `AWS_URL_ENDPOINT`). Unset means AWS itself.
    pub endpoint_url: Option<String>,
    /// Signing region (env: `AWS_REGION`)
    pub region: String,
    /// Address buckets as `endpoint/bucket/key` instead of `bucket.endpoint/key`
    pub force_path_style: bool,
    /// Bucket used for uploads, presigned URLs and existence checks
    pub bucket: String,
    /// Prefix prepended (with a `/`) to every object key
    pub key_prefix: String,
}

// Manual impl so the secret never ends up in logs
impl std::fmt::Debug for StorageConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StorageConfig")
            .field("backend", &self.backend)
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &if self.secret_access_key.is_empty() { "" } else { "<redacted>" })
            .field("endpoint_url", &self.endpoint_url)
            .field("region", &self.region)
            .field("force_path_style", &self.force_path_style)
            .field("bucket", &self.bucket)
            .field("key_prefix", &self.key_prefix)
            .finish()
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::S3,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            endpoint_url: None,
            region: "us-east-1".to_string(),
            force_path_style: true,
            bucket: String::new(),
            key_prefix: String::new(),
        }
    }
}

/// Batch upload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct UploadConfig {
    /// Maximum number of backend writes in flight for one batch.
    /// Set to 0 for unlimited (not recommended for production).
    /// Default: 200
    pub max_concurrent_uploads: usize,
    /// Maximum size in bytes of a single uploaded file.
    /// Set to 0 for unlimited.
    /// Default: 100MB
    pub max_file_size: u64,
    /// Maximum size in bytes of a whole `/upload/` request body.
    /// Default: 1GB
    pub max_request_size: u64,
    /// Give up on unfinished uploads of a batch after this long. Unset means no deadline.
    #[serde(default, with = "humantime_serde")]
    pub batch_timeout: Option<Duration>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            max_concurrent_uploads: 200,
            max_file_size: 100 * 1024 * 1024,     // 100MB
            max_request_size: 1024 * 1024 * 1024, // 1GB
            batch_timeout: None,
        }
    }
}

/// CORS (Cross-Origin Resource Sharing) configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default, deny_unknown_fields)]
pub struct CorsConfig {
    /// Allowed origins for CORS requests
    pub allowed_origins: Vec<CorsOrigin>,
    /// Allow credentials (cookies) in CORS requests
    pub allow_credentials: bool,
    /// Cache preflight requests for this many seconds
    pub max_age: Option<u64>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        let local = |s: &str| CorsOrigin::Url(Url::parse(s).expect("static origin URL is valid"));
        Self {
            allowed_origins: vec![
                local("http://localhost"),
                local("http://localhost:8080"),
                local("http://127.0.0.1"),
                local("http://127.0.0.1:8080"),
            ],
            allow_credentials: true,
            max_age: Some(3600),
        }
    }
}

/// A CORS origin: either `*` or a specific URL
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(untagged)]
pub enum CorsOrigin {
    /// Allow all origins (`*`)
    #[serde(deserialize_with = "parse_wildcard")]
    Wildcard,
    /// Specific origin URL (e.g., `https://app.example.com`)
    #[serde(deserialize_with = "parse_url")]
    Url(Url),
}

impl CorsOrigin {
    /// The value sent back in `Access-Control-Allow-Origin`; no trailing slash
    pub fn header_value(&self) -> String {
        match self {
            CorsOrigin::Wildcard => "*".to_string(),
            CorsOrigin::Url(url) => url.origin().ascii_serialization(),
        }
    }
}

fn parse_wildcard<'de, D>(deserializer: D) -> Result<(), D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    if s == "*" {
        Ok(())
    } else {
        Err(serde::de::Error::custom("Expected '*'"))
    }
}

fn parse_url<'de, D>(deserializer: D) -> Result<Url, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    Url::parse(&s).map_err(serde::de::Error::custom)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            storage: StorageConfig::default(),
            upload: UploadConfig::default(),
            presigned_url_expiry: Duration::from_secs(60 * 60), // 1 hour
            cors: CorsConfig::default(),
            enable_otel_export: false,
        }
    }
}

impl Config {
    #[allow(clippy::result_large_err)]
    pub fn load(args: &Args) -> Result<Self, figment::Error> {
        let config: Self = Self::figment(args).extract()?;
        config.validate().map_err(|e| figment::Error::from(e.to_string()))?;
        Ok(config)
    }

    pub fn figment(args: &Args) -> Figment {
        Figment::new()
            // Load base config file
            .merge(Yaml::file(&args.config))
            // Environment variables can still override specific values
            // (OSAPI_CONFIG names the file itself and is not a config key)
            .merge(Env::prefixed("OSAPI_").ignore(&["CONFIG"]).split("__"))
            // The variable names the AWS tooling uses
            .merge(Env::raw().only(&["AWS_ACCESS_KEY_ID"]).map(|_| "storage.access_key_id".into()))
            .merge(
                Env::raw()
                    .only(&["AWS_SECRET_ACCESS_KEY"])
                    .map(|_| "storage.secret_access_key".into()),
            )
            .merge(Env::raw().only(&["AWS_URL_ENDPOINT"]).map(|_| "storage.endpoint_url".into()))
            .merge(Env::raw().only(&["AWS_REGION"]).map(|_| "storage.region".into()))
    }

    /// Validate the configuration for consistency and required fields
    pub fn validate(&self) -> Result<(), Error> {
        if self.host.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: host cannot be empty".to_string(),
            });
        }

        if self.storage.region.trim().is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: storage.region cannot be empty".to_string(),
            });
        }

        if let Some(endpoint) = self.storage.endpoint_url.as_deref()
            && let Err(e) = Url::parse(endpoint)
        {
            return Err(Error::Internal {
                operation: format!("Config validation: storage.endpoint_url '{endpoint}' is not a valid URL: {e}"),
            });
        }

        if self.presigned_url_expiry.is_zero() || self.presigned_url_expiry > MAX_PRESIGNED_URL_EXPIRY {
            return Err(Error::Internal {
                operation: format!(
                    "Config validation: presigned_url_expiry must be between 1s and 7 days (got {})",
                    humantime_serde::re::humantime::format_duration(self.presigned_url_expiry)
                ),
            });
        }

        if let Some(timeout) = self.upload.batch_timeout
            && timeout.is_zero()
        {
            return Err(Error::Internal {
                operation: "Config validation: upload.batch_timeout cannot be zero. Remove it to disable the deadline.".to_string(),
            });
        }

        // Validate CORS configuration
        if self.cors.allowed_origins.is_empty() {
            return Err(Error::Internal {
                operation: "Config validation: CORS allowed_origins cannot be empty. Add at least one allowed origin.".to_string(),
            });
        }

        let has_wildcard = self.cors.allowed_origins.iter().any(|origin| matches!(origin, CorsOrigin::Wildcard));
        if has_wildcard && self.cors.allow_credentials {
            return Err(Error::Internal {
                operation: "Config validation: CORS cannot use wildcard origin '*' with allow_credentials=true. Specify explicit origins."
                    .to_string(),
            });
        }

        Ok(())
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// One-line description of where uploads end up, for startup and `--validate` output
    pub fn storage_target(&self) -> String {
        let storage = &self.storage;
        let backend = match storage.backend {
            StorageBackend::S3 => format!("s3 at {}", storage.endpoint_url.as_deref().unwrap_or("the AWS default endpoint")),
            StorageBackend::Memory => "in-memory store".to_string(),
        };
        let bucket = if storage.bucket.trim().is_empty() {
            "<unset>"
        } else {
            storage.bucket.as_str()
        };
        format!("{backend}, bucket {bucket}, key prefix '{}'", storage.key_prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    fn args(path: &str) -> Args {
        Args {
            config: path.to_string(),
            validate: false,
        }
    }

    #[test]
    fn test_defaults_without_config_file() {
        Jail::expect_with(|_jail| {
            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.port, 8080);
            assert_eq!(config.storage.backend, StorageBackend::S3);
            assert_eq!(config.upload.max_concurrent_uploads, 200);
            assert_eq!(config.presigned_url_expiry, Duration::from_secs(3600));
            assert_eq!(config.cors.allowed_origins.len(), 4);
            assert!(config.upload.batch_timeout.is_none());

            Ok(())
        });
    }

    #[test]
    fn test_yaml_config() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
port: 9000
storage:
  backend: memory
  bucket: images
  key_prefix: incoming
upload:
  max_concurrent_uploads: 16
  batch_timeout: 30s
presigned_url_expiry: 15m
cors:
  allowed_origins:
    - https://app.example.com
  allow_credentials: false
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.port, 9000);
            assert_eq!(config.storage.backend, StorageBackend::Memory);
            assert_eq!(config.storage.bucket, "images");
            assert_eq!(config.storage.key_prefix, "incoming");
            assert_eq!(config.upload.max_concurrent_uploads, 16);
            assert_eq!(config.upload.batch_timeout, Some(Duration::from_secs(30)));
            assert_eq!(config.presigned_url_expiry, Duration::from_secs(15 * 60));
            assert_eq!(config.cors.allowed_origins[0].header_value(), "https://app.example.com");
            assert_eq!(config.storage_target(), "in-memory store, bucket images, key prefix 'incoming'");

            Ok(())
        });
    }

    #[test]
    fn test_storage_target_flags_missing_bucket() {
        let mut config = Config::default();
        config.storage.endpoint_url = Some("http://minio:9000".to_string());

        assert_eq!(config.storage_target(), "s3 at http://minio:9000, bucket <unset>, key prefix ''");
    }

    #[test]
    fn test_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "storage:\n  bucket: from-file\n")?;

            jail.set_env("OSAPI_HOST", "127.0.0.1");
            jail.set_env("OSAPI_STORAGE__BUCKET", "from-env");
            jail.set_env("OSAPI_UPLOAD__MAX_CONCURRENT_UPLOADS", "8");

            let config = Config::load(&args("test.yaml"))?;

            assert_eq!(config.host, "127.0.0.1");
            assert_eq!(config.storage.bucket, "from-env");
            assert_eq!(config.upload.max_concurrent_uploads, 8);

            Ok(())
        });
    }

    #[test]
    fn test_aws_env_variables_map_to_storage() {
        Jail::expect_with(|jail| {
            jail.set_env("AWS_ACCESS_KEY_ID", "minio");
            jail.set_env("AWS_SECRET_ACCESS_KEY", "minio123");
            jail.set_env("AWS_URL_ENDPOINT", "http://localhost:9000");
            jail.set_env("AWS_REGION", "eu-west-1");

            let config = Config::load(&args("missing.yaml"))?;

            assert_eq!(config.storage.access_key_id, "minio");
            assert_eq!(config.storage.secret_access_key, "minio123");
            assert_eq!(config.storage.endpoint_url.as_deref(), Some("http://localhost:9000"));
            assert_eq!(config.storage.region, "eu-west-1");

            Ok(())
        });
    }

    #[test]
    fn test_secret_is_not_debug_printed() {
        let storage = StorageConfig {
            secret_access_key: "super-secret".to_string(),
            ..Default::default()
        };
        let printed = format!("{storage:?}");
        assert!(!printed.contains("super-secret"));
        assert!(printed.contains("<redacted>"));
    }

    #[test]
    fn test_unknown_fields_rejected() {
        Jail::expect_with(|jail| {
            jail.create_file("test.yaml", "storage:\n  buckett: typo\n")?;

            assert!(Config::load(&args("test.yaml")).is_err());
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_wildcard_with_credentials() {
        let config = Config {
            cors: CorsConfig {
                allowed_origins: vec![CorsOrigin::Wildcard],
                allow_credentials: true,
                max_age: None,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            cors: CorsConfig {
                allowed_origins: vec![CorsOrigin::Wildcard],
                allow_credentials: false,
                max_age: None,
            },
            ..Default::default()
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validation_rejects_bad_expiry_and_endpoint() {
        let config = Config {
            presigned_url_expiry: Duration::from_secs(8 * 24 * 60 * 60),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = Config {
            presigned_url_expiry: Duration::ZERO,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.storage.endpoint_url = Some("not a url".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_wildcard_origin_parses_from_yaml() {
        Jail::expect_with(|jail| {
            jail.create_file(
                "test.yaml",
                r#"
cors:
  allowed_origins: ["*"]
  allow_credentials: false
"#,
            )?;

            let config = Config::load(&args("test.yaml"))?;
            assert_eq!(config.cors.allowed_origins, vec![CorsOrigin::Wildcard]);
            Ok(())
        });
    }
}
