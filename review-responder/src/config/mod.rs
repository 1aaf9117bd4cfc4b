use config::{builder::DefaultState, Config, ConfigBuilder, ConfigError, Environment, File, FileFormat};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};

/// Flat variable names accepted on top of the `REVIEW_RESPONDER__SECTION__KEY` form.
const LEGACY_VARIABLES: &[(&str, &str)] = &[
    ("CLIENT_ID", "oauth.client_id"),
    ("CLIENT_SECRET", "oauth.client_secret"),
    ("REDIRECT_URI", "oauth.redirect_uri"),
    ("OPENAI_API_KEY", "llm.api_key"),
    ("GBP_ACCOUNT_ID", "gbp.account_id"),
    ("GBP_LOCATION_ID", "gbp.location_id"),
    ("SESSION_SECRET", "server.session_secret"),
    ("PORT", "server.port"),
];

const MIN_SESSION_SECRET_BYTES: usize = 32;

#[derive(Debug, Deserialize, Clone)]
pub struct Configuration {
    pub server: ServerConfiguration,
    pub oauth: OAuthConfiguration,
    pub llm: LlmConfiguration,
    pub gbp: GbpConfiguration,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfiguration {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_session_ttl")]
    pub session_ttl_seconds: u64,

    #[serde(default = "default_request_timeout")]
    pub request_timeout_seconds: u64,

    #[serde(deserialize_with = "secret")]
    pub session_secret: SecretString,
}

#[derive(Debug, Deserialize, Clone)]
pub struct OAuthConfiguration {
    pub client_id: String,
    #[serde(deserialize_with = "secret")]
    pub client_secret: SecretString,
    pub redirect_uri: String,
    #[serde(default = "default_scope")]
    pub scope: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfiguration {
    #[serde(deserialize_with = "secret")]
    pub api_key: SecretString,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_llm_base_url")]
    pub base_url: String,

    #[serde(default = "default_outbound_timeout")]
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct GbpConfiguration {
    pub account_id: String,
    pub location_id: String,

    #[serde(default = "default_outbound_timeout")]
    pub timeout_seconds: u64,

    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_session_ttl() -> u64 {
    600
}

fn default_request_timeout() -> u64 {
    120
}

fn default_scope() -> String {
    "https://www.googleapis.com/auth/business.manage".to_string()
}

fn default_model() -> String {
    "gpt-4o".to_string()
}

fn default_llm_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_outbound_timeout() -> u64 {
    30
}

fn default_concurrency() -> usize {
    4
}

fn secret<'de, D>(deserializer: D) -> Result<SecretString, D::Error>
where
    D: Deserializer<'de>,
{
    String::deserialize(deserializer).map(SecretString::from)
}

impl Configuration {
    /// Load from `config.toml` (optional), `REVIEW_RESPONDER__*` variables and the flat legacy
    /// variables, in increasing priority.
    pub fn new() -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if std::path::Path::new("config.toml").exists() {
            builder = builder.add_source(File::with_name("config"));
        }

        builder = builder.add_source(Environment::with_prefix("REVIEW_RESPONDER").separator("__"));

        Self::finish(builder, |name| std::env::var(name).ok())
    }

    /// Load from an in-memory TOML document plus a variable lookup, without touching the process
    /// environment.
    pub fn from_toml<F>(toml: &str, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let builder = Config::builder().add_source(File::from_str(toml, FileFormat::Toml));
        Self::finish(builder, lookup)
    }

    fn finish<F>(mut builder: ConfigBuilder<DefaultState>, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        for &(variable, key) in LEGACY_VARIABLES {
            builder = builder.set_override_option(key, lookup(variable))?;
        }

        let configuration: Self = builder.build()?.try_deserialize()?;
        configuration.validate().map_err(ConfigError::Message)?;
        Ok(configuration)
    }

    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("oauth.client_id", self.oauth.client_id.as_str()),
            (
                "oauth.client_secret",
                self.oauth.client_secret.expose_secret(),
            ),
            ("oauth.redirect_uri", self.oauth.redirect_uri.as_str()),
            ("llm.api_key", self.llm.api_key.expose_secret()),
            ("gbp.account_id", self.gbp.account_id.as_str()),
            ("gbp.location_id", self.gbp.location_id.as_str()),
        ];
        for (name, value) in required {
            if value.trim().is_empty() {
                return Err(format!("{} is required", name));
            }
        }

        if self.server.session_secret.expose_secret().len() < MIN_SESSION_SECRET_BYTES {
            return Err(format!(
                "server.session_secret must be at least {} bytes",
                MIN_SESSION_SECRET_BYTES
            ));
        }

        for (name, value) in [
            ("oauth.redirect_uri", &self.oauth.redirect_uri),
            ("llm.base_url", &self.llm.base_url),
        ] {
            let parsed = url::Url::parse(value)
                .map_err(|e| format!("{} is not a valid URL: {}", name, e))?;
            if !matches!(parsed.scheme(), "http" | "https") {
                return Err(format!("{} must be a valid HTTP(S) URL", name));
            }
        }

        if self.gbp.concurrency == 0 {
            return Err("gbp.concurrency must be at least 1".to_string());
        }

        Ok(())
    }
}
