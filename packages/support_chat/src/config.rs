use anyhow::{Context, Result};
use chat_sync::UserIdentity;
use serde::{Deserialize, Deserializer, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

// =============================================================================
// Unified config (figment-deserialized from defaults / config.toml / env vars)
// =============================================================================
//
// Two equivalent ways to configure:
//
//   config.toml:     [service]
//                    base_url = "https://support.example.com"
//
//   env var:         SUPPORT_CHAT_SERVICE__BASE_URL=https://support.example.com
//                    (double underscore = nesting)

/// Top-level tunable configuration, deserialized by figment.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct FileConfig {
    #[serde(default)]
    pub service: ServiceFileConfig,
    #[serde(default)]
    pub user: UserFileConfig,
    #[serde(default)]
    pub csrf: CsrfFileConfig,
    #[serde(default)]
    pub auth: AuthFileConfig,
}

/// Where the chat service lives (`[service]`).
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServiceFileConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for ServiceFileConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

/// The signed-in customer (`[user]`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct UserFileConfig {
    #[serde(default, deserialize_with = "scalar_string")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub name: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub email: Option<String>,
}

impl UserFileConfig {
    pub fn identity(&self) -> Result<UserIdentity> {
        let (Some(id), Some(name)) = (non_empty(&self.id), non_empty(&self.name)) else {
            anyhow::bail!(
                "No user configured. Set [user] id and name in config.toml \
                 or SUPPORT_CHAT_USER__ID / SUPPORT_CHAT_USER__NAME."
            );
        };
        let identity = UserIdentity::new(id, name);
        Ok(match non_empty(&self.email) {
            Some(email) => identity.with_email(email),
            None => identity,
        })
    }
}

/// Cross-site request forgery header/token pair (`[csrf]`).
/// Only sent when both are set.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CsrfFileConfig {
    #[serde(default, deserialize_with = "scalar_string")]
    pub header: Option<String>,
    #[serde(default, deserialize_with = "scalar_string")]
    pub token: Option<String>,
}

/// Identity context carried on every request (`[auth]`).
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AuthFileConfig {
    /// Raw `Cookie` header value, e.g. `JSESSIONID=...`.
    #[serde(default, deserialize_with = "scalar_string")]
    pub cookie: Option<String>,
}

fn default_base_url() -> String {
    "http://127.0.0.1:8080".to_string()
}
fn default_request_timeout_secs() -> u64 {
    10
}

/// Accept any scalar where a string is expected. Env vars like
/// `SUPPORT_CHAT_USER__ID=7` reach us as integers, and user ids are numeric
/// on the service side.
fn scalar_string<'de, D>(deserializer: D) -> std::result::Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Scalar {
        Text(String),
        Unsigned(u64),
        Signed(i64),
        Float(f64),
        Flag(bool),
    }

    Ok(Option::<Scalar>::deserialize(deserializer)?.map(|value| match value {
        Scalar::Text(s) => s,
        Scalar::Unsigned(n) => n.to_string(),
        Scalar::Signed(n) => n.to_string(),
        Scalar::Float(n) => n.to_string(),
        Scalar::Flag(b) => b.to_string(),
    }))
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

/// Build a figment that layers: defaults → config.toml → SUPPORT_CHAT_* env vars.
///
/// Env vars use double-underscore for nesting into sections:
///   `SUPPORT_CHAT_USER__NAME=Ada`  →  `user.name = "Ada"`
///   `SUPPORT_CHAT_CSRF__TOKEN=abc`  →  `csrf.token = "abc"`
pub fn load_config(data_dir: &Path) -> figment::Figment {
    use figment::{
        Figment,
        providers::{Env, Format, Serialized, Toml},
    };

    Figment::from(Serialized::defaults(FileConfig::default()))
        .merge(Toml::file(data_dir.join("config.toml")))
        .merge(Env::prefixed("SUPPORT_CHAT_").split("__"))
}

// =============================================================================
// Runtime config structs (derived from FileConfig)
// =============================================================================

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CsrfToken {
    pub header: String,
    pub token: String,
}

/// How to reach the chat service (runtime view).
#[derive(Clone, Debug)]
pub struct ServiceConfig {
    /// Base URL without a trailing slash
    pub base_url: String,
    pub request_timeout: Duration,
    pub csrf: Option<CsrfToken>,
    pub cookie: Option<String>,
}

impl ServiceConfig {
    pub fn from_file(fc: &FileConfig) -> Self {
        let csrf = match (non_empty(&fc.csrf.header), non_empty(&fc.csrf.token)) {
            (Some(header), Some(token)) => Some(CsrfToken {
                header: header.to_string(),
                token: token.to_string(),
            }),
            _ => None,
        };
        Self {
            base_url: fc.service.base_url.trim_end_matches('/').to_string(),
            request_timeout: Duration::from_secs(fc.service.request_timeout_secs.max(1)),
            csrf,
            cookie: non_empty(&fc.auth.cookie).map(str::to_string),
        }
    }
}

// =============================================================================
// Directory layout config (not tunable via figment, derived from --data-dir)
// =============================================================================

#[derive(Clone, Debug)]
pub struct SupportChatConfig {
    pub data_dir: PathBuf,
    pub logs_dir: PathBuf,
}

impl SupportChatConfig {
    pub fn new(custom_dir: Option<PathBuf>) -> Result<Self> {
        let data_dir = match custom_dir {
            Some(dir) => dir,
            None => dirs::home_dir()
                .context("Could not find home directory")?
                .join(".support-chat"),
        };

        std::fs::create_dir_all(&data_dir)
            .with_context(|| format!("Failed to create data directory: {:?}", data_dir))?;

        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)
            .with_context(|| format!("Failed to create logs directory: {:?}", logs_dir))?;

        debug!("Data directory: {}", data_dir.display());

        Ok(Self { data_dir, logs_dir })
    }

    pub fn config_toml_path(&self) -> PathBuf {
        self.data_dir.join("config.toml")
    }

    pub fn chat_log_path(&self) -> PathBuf {
        self.logs_dir.join("support-chat.log")
    }

    /// Extract the layered file config for this data directory.
    pub fn file_config(&self) -> Result<FileConfig> {
        load_config(&self.data_dir)
            .extract()
            .with_context(|| format!("Invalid configuration in {}", self.config_toml_path().display()))
    }
}
