//! Process configuration, read from `GCKMS_*` environment variables.

use std::time::Duration;

use eyre::WrapErr;
use serde::Deserialize;

use crate::remote::KMS_ENDPOINT;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    Remote,
    Mock,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

#[derive(Clone, Deserialize)]
pub struct Config {
    /// Which backend the facade binds.
    #[serde(default)]
    pub backend: BackendKind,

    /// Cloud KMS REST root.
    #[serde(default = "default_kms_endpoint")]
    pub kms_endpoint: String,

    /// Service-account key file used to mint a bearer token.
    pub credentials_path: Option<String>,

    /// Pre-issued bearer token; takes precedence over `credentials_path`.
    pub access_token: Option<String>,

    /// Transport timeout for each HTTP request.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Optional deadline for a whole facade call.
    pub call_deadline_secs: Option<u64>,

    pub project_id: Option<String>,
    pub location_id: Option<String>,

    #[serde(default = "default_log_level")]
    pub log_level: String,

    #[serde(default)]
    pub log_format: LogFormat,
}

fn default_kms_endpoint() -> String {
    KMS_ENDPOINT.into()
}
fn default_request_timeout() -> u64 {
    30
}
fn default_log_level() -> String {
    "info".into()
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("backend", &self.backend)
            .field("kms_endpoint", &self.kms_endpoint)
            .field("credentials_path", &self.credentials_path)
            .field("access_token", &self.access_token.as_ref().map(|_| "[REDACTED]"))
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("call_deadline_secs", &self.call_deadline_secs)
            .field("project_id", &self.project_id)
            .field("location_id", &self.location_id)
            .field("log_level", &self.log_level)
            .field("log_format", &self.log_format)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> eyre::Result<Self> {
        Self::load(config::Environment::with_prefix("GCKMS").try_parsing(true))
    }

    /// Build from any `config` source and validate.
    pub fn load<S>(source: S) -> eyre::Result<Self>
    where
        S: config::Source + Send + Sync + 'static,
    {
        let cfg = config::Config::builder()
            .add_source(source)
            .build()
            .wrap_err("failed to build configuration")?;

        let c: Config = cfg
            .try_deserialize()
            .wrap_err("failed to deserialise configuration")?;

        c.validate()?;
        Ok(c)
    }

    fn validate(&self) -> eyre::Result<()> {
        if self.request_timeout_secs == 0 {
            eyre::bail!("GCKMS_REQUEST_TIMEOUT_SECS must be > 0");
        }
        if self.call_deadline_secs == Some(0) {
            eyre::bail!("GCKMS_CALL_DEADLINE_SECS must be > 0 when set");
        }
        if self.kms_endpoint.trim().is_empty() {
            eyre::bail!("GCKMS_KMS_ENDPOINT must not be empty");
        }
        if self.backend == BackendKind::Remote
            && self.access_token.is_none()
            && self.credentials_path.is_none()
        {
            eyre::bail!(
                "remote backend needs GCKMS_ACCESS_TOKEN or GCKMS_CREDENTIALS_PATH"
            );
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn call_deadline(&self) -> Option<Duration> {
        self.call_deadline_secs.map(Duration::from_secs)
    }
}
