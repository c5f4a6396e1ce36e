//! Service configuration loaded from environment variables.

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_STORAGE_PATH: &str = "data/trees.json";
const DEFAULT_OBJECT_NAME: &str = "trees.json";
const DEFAULT_GCS_ENDPOINT: &str = "https://storage.googleapis.com";
const DEFAULT_REGION: &str = "us-east-1";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),

    #[error("invalid storage type: {0}. Must be 'local', 'gcs', or 's3'")]
    InvalidStorageType(String),

    #[error("invalid value for {var}: {value}")]
    InvalidValue { var: &'static str, value: String },
}

/// Where the snapshot lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageConfig {
    Local { path: PathBuf },
    Gcs(GcsConfig),
    S3(S3Config),
}

impl StorageConfig {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Local { .. } => "local",
            Self::Gcs(_) => "gcs",
            Self::S3(_) => "s3",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GcsConfig {
    pub bucket: String,
    pub object: String,
    /// Base URL of the JSON API. Overridable for emulators.
    pub endpoint: String,
    /// OAuth2 bearer token. Requests are anonymous without one.
    pub access_token: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct S3Config {
    pub bucket: String,
    pub key: String,
    pub region: String,
    /// Custom endpoint for S3-compatible stores. Defaults to AWS.
    pub endpoint: Option<String>,
    /// Requests are unsigned without credentials.
    pub credentials: Option<S3Credentials>,
}

impl S3Config {
    pub fn endpoint_url(&self) -> String {
        match &self.endpoint {
            Some(endpoint) => endpoint.trim_end_matches('/').to_string(),
            None => format!("https://s3.{}.amazonaws.com", self.region),
        }
    }
}

#[derive(Clone, PartialEq, Eq)]
pub struct S3Credentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

impl std::fmt::Debug for S3Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("S3Credentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub storage: StorageConfig,
    /// Upper bound on a single remote storage request.
    pub request_timeout: Duration,
    pub log_format: LogFormat,
}

impl Config {
    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Load configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let storage_type = var("STORAGE_TYPE").unwrap_or_else(|| "local".to_string());
        let storage = match storage_type.to_ascii_lowercase().as_str() {
            "local" => StorageConfig::Local {
                path: var("STORAGE_PATH")
                    .unwrap_or_else(|| DEFAULT_STORAGE_PATH.to_string())
                    .into(),
            },
            "gcs" => StorageConfig::Gcs(GcsConfig {
                bucket: var("GCS_BUCKET_NAME").ok_or(ConfigError::Missing("GCS_BUCKET_NAME"))?,
                object: var("GCS_OBJECT_NAME").unwrap_or_else(|| DEFAULT_OBJECT_NAME.to_string()),
                endpoint: var("GCS_ENDPOINT")
                    .map(|e| e.trim_end_matches('/').to_string())
                    .unwrap_or_else(|| DEFAULT_GCS_ENDPOINT.to_string()),
                access_token: var("GCS_ACCESS_TOKEN"),
            }),
            "s3" => {
                let credentials = match (var("AWS_ACCESS_KEY_ID"), var("AWS_SECRET_ACCESS_KEY")) {
                    (Some(access_key_id), Some(secret_access_key)) => Some(S3Credentials {
                        access_key_id,
                        secret_access_key,
                        session_token: var("AWS_SESSION_TOKEN"),
                    }),
                    (None, None) => None,
                    (Some(_), None) => return Err(ConfigError::Missing("AWS_SECRET_ACCESS_KEY")),
                    (None, Some(_)) => return Err(ConfigError::Missing("AWS_ACCESS_KEY_ID")),
                };
                StorageConfig::S3(S3Config {
                    bucket: var("S3_BUCKET_NAME").ok_or(ConfigError::Missing("S3_BUCKET_NAME"))?,
                    key: var("S3_OBJECT_KEY").unwrap_or_else(|| DEFAULT_OBJECT_NAME.to_string()),
                    region: var("AWS_REGION").unwrap_or_else(|| DEFAULT_REGION.to_string()),
                    endpoint: var("S3_ENDPOINT"),
                    credentials,
                })
            }
            _ => return Err(ConfigError::InvalidStorageType(storage_type)),
        };

        let request_timeout = match var("STORAGE_TIMEOUT_SECS") {
            Some(value) => match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => Duration::from_secs(secs),
                _ => {
                    return Err(ConfigError::InvalidValue {
                        var: "STORAGE_TIMEOUT_SECS",
                        value,
                    })
                }
            },
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        };

        let log_format = match var("LOG_FORMAT").as_deref().map(str::to_ascii_lowercase) {
            None => LogFormat::Text,
            Some(f) if f == "text" => LogFormat::Text,
            Some(f) if f == "json" => LogFormat::Json,
            Some(value) => {
                return Err(ConfigError::InvalidValue {
                    var: "LOG_FORMAT",
                    value,
                })
            }
        };

        Ok(Self {
            storage,
            request_timeout,
            log_format,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_to_local_storage() {
        let config = load(&[]).unwrap();
        assert_eq!(
            config.storage,
            StorageConfig::Local {
                path: PathBuf::from("data/trees.json")
            }
        );
        assert_eq!(config.request_timeout, Duration::from_secs(30));
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn reads_gcs_settings() {
        let config = load(&[
            ("STORAGE_TYPE", "gcs"),
            ("GCS_BUCKET_NAME", "forest"),
            ("GCS_ENDPOINT", "http://localhost:4443/"),
        ])
        .unwrap();

        let StorageConfig::Gcs(gcs) = config.storage else {
            panic!("expected gcs config");
        };
        assert_eq!(gcs.bucket, "forest");
        assert_eq!(gcs.object, "trees.json");
        assert_eq!(gcs.endpoint, "http://localhost:4443");
        assert!(gcs.access_token.is_none());
    }

    #[test]
    fn reads_s3_settings() {
        let config = load(&[
            ("STORAGE_TYPE", "S3"),
            ("S3_BUCKET_NAME", "forest"),
            ("S3_OBJECT_KEY", "state/trees.json"),
            ("AWS_REGION", "eu-west-1"),
            ("AWS_ACCESS_KEY_ID", "AKID"),
            ("AWS_SECRET_ACCESS_KEY", "secret"),
            ("STORAGE_TIMEOUT_SECS", "5"),
        ])
        .unwrap();

        assert_eq!(config.request_timeout, Duration::from_secs(5));
        let StorageConfig::S3(s3) = config.storage else {
            panic!("expected s3 config");
        };
        assert_eq!(s3.key, "state/trees.json");
        assert_eq!(s3.endpoint_url(), "https://s3.eu-west-1.amazonaws.com");
        assert_eq!(s3.credentials.unwrap().access_key_id, "AKID");
    }

    #[test]
    fn remote_storage_requires_bucket() {
        assert!(matches!(
            load(&[("STORAGE_TYPE", "gcs")]),
            Err(ConfigError::Missing("GCS_BUCKET_NAME"))
        ));
        assert!(matches!(
            load(&[("STORAGE_TYPE", "s3")]),
            Err(ConfigError::Missing("S3_BUCKET_NAME"))
        ));
    }

    #[test]
    fn rejects_half_configured_credentials() {
        assert!(matches!(
            load(&[
                ("STORAGE_TYPE", "s3"),
                ("S3_BUCKET_NAME", "forest"),
                ("AWS_ACCESS_KEY_ID", "AKID"),
            ]),
            Err(ConfigError::Missing("AWS_SECRET_ACCESS_KEY"))
        ));
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(matches!(
            load(&[("STORAGE_TYPE", "ftp")]),
            Err(ConfigError::InvalidStorageType(_))
        ));
        assert!(matches!(
            load(&[("STORAGE_TIMEOUT_SECS", "soon")]),
            Err(ConfigError::InvalidValue { .. })
        ));
        assert!(matches!(
            load(&[("LOG_FORMAT", "xml")]),
            Err(ConfigError::InvalidValue { .. })
        ));
    }

    #[test]
    fn credentials_debug_hides_secrets() {
        let creds = S3Credentials {
            access_key_id: "AKID".into(),
            secret_access_key: "very-secret".into(),
            session_token: Some("token".into()),
        };
        let rendered = format!("{:?}", creds);
        assert!(!rendered.contains("very-secret"));
        assert!(!rendered.contains("token\""));
    }
}
