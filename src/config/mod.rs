//! Application configuration.
//!
//! Configuration is an explicit object constructed once and handed to the
//! gateway by reference; there is no process-wide cache. `from_env` reads
//! prefixed environment variables (default prefix `SLACK`):
//!
//! - `{PREFIX}_SIGNING_KEY` - shared secret for request signatures
//! - `{PREFIX}_BOT_TOKEN` - Web API token for the default workspace
//! - `{PREFIX}_APP_ID` - application identifier
//! - `{PREFIX}_MAX_CLOCK_SKEW` - signature timestamp tolerance in seconds
//! - `{PREFIX}_SKIP_AUTH` - bypass signature checks (testing only)

use std::env;

use thiserror::Error;

use crate::auth::DEFAULT_MAX_CLOCK_SKEW_SECS;

/// Default environment variable prefix.
pub const DEFAULT_ENV_PREFIX: &str = "SLACK";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("no signing secret configured")]
    MissingSigningSecret,

    #[error("invalid value for environment variable {var}: {message}")]
    InvalidVar { var: String, message: String },

    #[error("no listener registered under name `{0}`")]
    UnknownListener(String),

    #[error("no credentials available for app `{0}`")]
    UnknownApp(String),

    #[error("cannot build a command definition without a name")]
    MissingCommandName,

    #[error("invalid filter regex `{pattern}`: {message}")]
    InvalidRegex { pattern: String, message: String },

    #[error("invalid working directory for deferrer script: {0}")]
    InvalidDeferralDir(String),
}

#[derive(Clone, Default)]
pub struct AppConfig {
    id: Option<String>,
    alias: Option<String>,
    signing_secret: Option<String>,
    bot_token: Option<String>,
    max_clock_skew: Option<i64>,
    skip_auth: bool,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from `{prefix}_*` environment variables.
    pub fn from_env(prefix: &str) -> Result<Self, ConfigError> {
        let var = |key: &str| env::var(format!("{prefix}_{key}")).ok().filter(|v| !v.is_empty());

        let max_clock_skew = match var("MAX_CLOCK_SKEW") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|e| ConfigError::InvalidVar {
                var: format!("{prefix}_MAX_CLOCK_SKEW"),
                message: e.to_string(),
            })?),
            None => None,
        };

        Ok(AppConfig {
            id: var("APP_ID"),
            alias: None,
            signing_secret: var("SIGNING_KEY"),
            bot_token: var("BOT_TOKEN"),
            max_clock_skew,
            skip_auth: matches!(var("SKIP_AUTH").as_deref(), Some("1") | Some("true")),
        })
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }

    pub fn with_alias(mut self, alias: impl Into<String>) -> Self {
        self.alias = Some(alias.into());
        self
    }

    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(secret.into());
        self
    }

    pub fn with_bot_token(mut self, token: impl Into<String>) -> Self {
        self.bot_token = Some(token.into());
        self
    }

    pub fn with_max_clock_skew(mut self, seconds: i64) -> Self {
        self.max_clock_skew = Some(seconds);
        self
    }

    /// Disables signature verification. Never enable outside tests.
    pub fn with_skip_auth(mut self, skip: bool) -> Self {
        self.skip_auth = skip;
        self
    }

    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    pub fn alias(&self) -> Option<&str> {
        self.alias.as_deref()
    }

    pub fn signing_secret(&self) -> Option<&str> {
        self.signing_secret.as_deref()
    }

    pub fn bot_token(&self) -> Option<&str> {
        self.bot_token.as_deref()
    }

    pub fn max_clock_skew(&self) -> i64 {
        self.max_clock_skew.unwrap_or(DEFAULT_MAX_CLOCK_SKEW_SECS)
    }

    pub fn skip_auth(&self) -> bool {
        self.skip_auth
    }
}

// Secrets stay out of log output.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("id", &self.id)
            .field("alias", &self.alias)
            .field("signing_secret", &self.signing_secret.as_ref().map(|_| "[redacted]"))
            .field("bot_token", &self.bot_token.as_ref().map(|_| "[redacted]"))
            .field("max_clock_skew", &self.max_clock_skew())
            .field("skip_auth", &self.skip_auth)
            .finish()
    }
}

/// Credentials for one application/tenant.
#[derive(Clone)]
pub struct AppCredentials {
    pub signing_secret: String,
    pub bot_token: Option<String>,
}

/// Per-tenant credential lookup by application identifier.
pub trait CredentialsStore: Send + Sync {
    fn credentials(&self, app_id: Option<&str>) -> Result<AppCredentials, ConfigError>;
}

/// Store holding credentials for exactly one application, ignoring the
/// requested id.
pub struct SingleAppCredentialsStore {
    credentials: AppCredentials,
}

impl SingleAppCredentialsStore {
    pub fn new(credentials: AppCredentials) -> Self {
        SingleAppCredentialsStore { credentials }
    }
}

impl CredentialsStore for SingleAppCredentialsStore {
    fn credentials(&self, _app_id: Option<&str>) -> Result<AppCredentials, ConfigError> {
        Ok(self.credentials.clone())
    }
}
