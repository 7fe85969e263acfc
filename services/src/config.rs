use redactor_utils::version_info::RuntimeEnv;
use serde::Deserialize;
use std::env::vars;
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Default Qiniu upload endpoint (East China region).
pub const DEFAULT_QINIU_UPLOAD_HOST: &str = "https://upload.qiniup.com";

/// Default cap on a single upload request body.
pub const DEFAULT_UPLOAD_BODY_LIMIT: usize = 64 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub enum Env {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "test")]
    Test,
    #[serde(rename = "prod")]
    Prod,
}

impl From<&Env> for RuntimeEnv {
    fn from(env: &Env) -> Self {
        match env {
            Env::Local => RuntimeEnv::Local,
            Env::Test => RuntimeEnv::Test,
            Env::Prod => RuntimeEnv::Prod,
        }
    }
}

impl Display for Env {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Env::Local => write!(f, "local"),
            Env::Test => write!(f, "test"),
            Env::Prod => write!(f, "prod"),
        }
    }
}

/// Errors raised while assembling the service from configuration.
///
/// These are fatal: they surface at startup, never while serving a request.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("The \"{0}\" attribute must be set.")]
    MissingAttribute(&'static str),

    #[error("{0}")]
    Invalid(String),
}

// The final, validated configuration struct.
#[derive(Debug, Clone)]
pub struct Config {
    env: Env,
    database_url: String,
    server_addr: String,
    port: u16,
    // Local disk uploads
    upload_path: PathBuf,
    upload_url: String,
    upload_body_limit: usize,
    // Qiniu credentials; the cloud action refuses to start if any is missing
    qiniu_bucket: Option<String>,
    qiniu_access_key: Option<String>,
    qiniu_secret_key: Option<String>,
    qiniu_upload_host: String,
    qiniu_base_url: String,
}

// An intermediate struct for deserializing environment variables
// where most settings are optional.
#[derive(Deserialize)]
struct RawConfig {
    env: Env,
    database_url: String,
    server_addr: Option<String>,
    port: Option<u16>,
    upload_path: Option<String>,
    upload_url: Option<String>,
    upload_body_limit: Option<usize>,
    qiniu_bucket: Option<String>,
    qiniu_access_key: Option<String>,
    qiniu_secret_key: Option<String>,
    qiniu_upload_host: Option<String>,
    qiniu_base_url: Option<String>,
}

impl Config {
    /// Create a test configuration with default values.
    ///
    /// Available to unit and integration tests; not meant for production.
    pub fn new_for_test() -> Self {
        Self {
            env: Env::Test,
            database_url: "postgres://localhost:5432/test".to_owned(),
            server_addr: "127.0.0.1".to_owned(),
            port: 8080,
            upload_path: PathBuf::from("uploads"),
            upload_url: "/uploads".to_owned(),
            upload_body_limit: DEFAULT_UPLOAD_BODY_LIMIT,
            qiniu_bucket: None,
            qiniu_access_key: None,
            qiniu_secret_key: None,
            qiniu_upload_host: DEFAULT_QINIU_UPLOAD_HOST.to_owned(),
            qiniu_base_url: String::new(),
        }
    }

    /// Test configuration with local uploads stored under `path`.
    pub fn new_for_test_with_upload_path(path: impl Into<PathBuf>) -> Self {
        Self {
            upload_path: path.into(),
            ..Self::new_for_test()
        }
    }

    /// Test configuration with Qiniu credentials filled in.
    pub fn with_qiniu(
        mut self,
        bucket: impl Into<String>,
        access_key: impl Into<String>,
        secret_key: impl Into<String>,
    ) -> Self {
        self.qiniu_bucket = Some(bucket.into());
        self.qiniu_access_key = Some(access_key.into());
        self.qiniu_secret_key = Some(secret_key.into());
        self
    }

    pub fn with_qiniu_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.qiniu_base_url = base_url.into();
        self
    }

    pub fn with_upload_body_limit(mut self, limit: usize) -> Self {
        self.upload_body_limit = limit;
        self
    }

    pub fn environment(&self) -> &Env {
        &self.env
    }

    pub fn database_url(&self) -> &str {
        &self.database_url
    }

    pub fn server_addr(&self) -> &str {
        &self.server_addr
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn is_local(&self) -> bool {
        matches!(self.env, Env::Local)
    }

    pub fn is_prod(&self) -> bool {
        matches!(self.env, Env::Prod)
    }

    /// Directory local uploads are written under.
    pub fn upload_path(&self) -> &Path {
        &self.upload_path
    }

    /// Public URL prefix matching [`Config::upload_path`].
    pub fn upload_url(&self) -> &str {
        &self.upload_url
    }

    pub fn upload_body_limit(&self) -> usize {
        self.upload_body_limit
    }

    pub fn qiniu_bucket(&self) -> Option<&str> {
        self.qiniu_bucket.as_deref()
    }

    pub fn qiniu_access_key(&self) -> Option<&str> {
        self.qiniu_access_key.as_deref()
    }

    pub fn qiniu_secret_key(&self) -> Option<&str> {
        self.qiniu_secret_key.as_deref()
    }

    pub fn qiniu_upload_host(&self) -> &str {
        &self.qiniu_upload_host
    }

    /// Domain the bucket is served from, prepended to stored keys in links.
    pub fn qiniu_base_url(&self) -> &str {
        &self.qiniu_base_url
    }

    /// Whether any Qiniu credential is configured, i.e. the cloud action
    /// should be mounted.
    pub fn qiniu_enabled(&self) -> bool {
        self.qiniu_bucket.is_some()
            || self.qiniu_access_key.is_some()
            || self.qiniu_secret_key.is_some()
    }

    /// Initializes configuration by reading from environment variables
    /// and applying environment-aware defaults.
    pub fn init() -> anyhow::Result<Self> {
        let raw_config: RawConfig = serde_env::from_iter(vars())?;
        Self::from_raw(raw_config)
    }

    fn from_raw(raw_config: RawConfig) -> anyhow::Result<Self> {
        let RawConfig {
            env,
            database_url,
            server_addr,
            port,
            upload_path,
            upload_url,
            upload_body_limit,
            qiniu_bucket,
            qiniu_access_key,
            qiniu_secret_key,
            qiniu_upload_host,
            qiniu_base_url,
        } = raw_config;

        let server_addr = server_addr.unwrap_or_else(|| match env {
            Env::Local => "127.0.0.1".to_owned(),
            _ => "0.0.0.0".to_owned(),
        });

        let port = match port {
            Some(port) => port,
            None if !matches!(env, Env::Prod) => 8080,
            None => anyhow::bail!("PORT must be set for {} environment", env),
        };

        let upload_url = upload_url
            .map(|url| url.trim_end_matches('/').to_owned())
            .unwrap_or_else(|| "/uploads".to_owned());
        if upload_url.is_empty() {
            anyhow::bail!("UPLOAD_URL must not be empty");
        }

        // Blank values count as unset, so `QINIU_BUCKET=` does not enable the action.
        let non_empty = |value: Option<String>| value.filter(|v| !v.trim().is_empty());

        Ok(Config {
            env,
            database_url,
            server_addr,
            port,
            upload_path: upload_path
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from("uploads")),
            upload_url,
            upload_body_limit: upload_body_limit.unwrap_or(DEFAULT_UPLOAD_BODY_LIMIT),
            qiniu_bucket: non_empty(qiniu_bucket),
            qiniu_access_key: non_empty(qiniu_access_key),
            qiniu_secret_key: non_empty(qiniu_secret_key),
            qiniu_upload_host: qiniu_upload_host
                .unwrap_or_else(|| DEFAULT_QINIU_UPLOAD_HOST.to_owned()),
            qiniu_base_url: qiniu_base_url.unwrap_or_default(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_env::from_iter;

    #[test]
    fn local_defaults() {
        let raw: RawConfig = from_iter(vec![
            ("ENV", "local"),
            ("DATABASE_URL", "postgres://example"),
        ])
        .expect("RawConfig should deserialize");

        let config = Config::from_raw(raw).expect("local config should build");
        assert_eq!(config.server_addr(), "127.0.0.1");
        assert_eq!(config.port(), 8080);
        assert_eq!(config.upload_path(), Path::new("uploads"));
        assert_eq!(config.upload_url(), "/uploads");
        assert_eq!(config.qiniu_upload_host(), DEFAULT_QINIU_UPLOAD_HOST);
        assert!(!config.qiniu_enabled());
    }

    #[test]
    fn prod_requires_port() {
        let raw: RawConfig = from_iter(vec![
            ("ENV", "prod"),
            ("DATABASE_URL", "postgres://example"),
        ])
        .expect("RawConfig should deserialize");

        let result = Config::from_raw(raw);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("PORT"));
    }

    #[test]
    fn prod_binds_publicly() {
        let raw: RawConfig = from_iter(vec![
            ("ENV", "prod"),
            ("DATABASE_URL", "postgres://example"),
            ("PORT", "9000"),
        ])
        .expect("RawConfig should deserialize");

        let config = Config::from_raw(raw).expect("prod config should build");
        assert_eq!(config.server_addr(), "0.0.0.0");
        assert_eq!(config.port(), 9000);
    }

    #[test]
    fn upload_settings_are_read() {
        let raw: RawConfig = from_iter(vec![
            ("ENV", "local"),
            ("DATABASE_URL", "postgres://example"),
            ("UPLOAD_PATH", "/var/www/statics"),
            ("UPLOAD_URL", "http://my-site.com/statics/"),
            ("UPLOAD_BODY_LIMIT", "1048576"),
        ])
        .expect("RawConfig should deserialize");

        let config = Config::from_raw(raw).expect("config should build");
        assert_eq!(config.upload_path(), Path::new("/var/www/statics"));
        assert_eq!(config.upload_url(), "http://my-site.com/statics");
        assert_eq!(config.upload_body_limit(), 1_048_576);
    }

    #[test]
    fn any_qiniu_value_enables_the_cloud_action() {
        let raw: RawConfig = from_iter(vec![
            ("ENV", "local"),
            ("DATABASE_URL", "postgres://example"),
            ("QINIU_BUCKET", "my-bucket"),
        ])
        .expect("RawConfig should deserialize");

        let config = Config::from_raw(raw).expect("config should build");
        assert!(config.qiniu_enabled());
        assert_eq!(config.qiniu_bucket(), Some("my-bucket"));
        assert!(config.qiniu_secret_key().is_none());
    }

    #[test]
    fn blank_qiniu_values_are_ignored() {
        let raw: RawConfig = from_iter(vec![
            ("ENV", "local"),
            ("DATABASE_URL", "postgres://example"),
            ("QINIU_BUCKET", ""),
        ])
        .expect("RawConfig should deserialize");

        let config = Config::from_raw(raw).expect("config should build");
        assert!(!config.qiniu_enabled());
    }
}
