use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::api::constants::{self, DEFAULT_ENDPOINT_BASE, DEFAULT_TOKEN_URL};
use crate::api::resilience::{ResilienceConfig, ResilienceProfile};

/// Environment variable prefix used by [`ClientConfig::from_env`]
pub const ENV_PREFIX: &str = "XERO_";

const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "scheme", rename_all = "snake_case")]
pub enum AuthConfig {
    Bearer {
        access_token: String,
    },
    ClientCredentials {
        consumer_key: String,
        consumer_secret: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        token_url: Option<String>,
        #[serde(default)]
        scopes: Vec<String>,
    },
    SignedRequest {
        consumer_key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        private_key: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        private_key_path: Option<PathBuf>,
    },
}

impl AuthConfig {
    pub fn scheme(&self) -> &'static str {
        match self {
            AuthConfig::Bearer { .. } => "bearer",
            AuthConfig::ClientCredentials { .. } => "client_credentials",
            AuthConfig::SignedRequest { .. } => "signed_request",
        }
    }

    pub fn token_url(&self) -> &str {
        match self {
            AuthConfig::ClientCredentials {
                token_url: Some(url), ..
            } => url,
            _ => DEFAULT_TOKEN_URL,
        }
    }
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthConfig::Bearer { .. } => f
                .debug_struct("Bearer")
                .field("access_token", &"[REDACTED]")
                .finish(),
            AuthConfig::ClientCredentials {
                consumer_key,
                token_url,
                scopes,
                ..
            } => f
                .debug_struct("ClientCredentials")
                .field("consumer_key", consumer_key)
                .field("consumer_secret", &"[REDACTED]")
                .field("token_url", token_url)
                .field("scopes", scopes)
                .finish(),
            AuthConfig::SignedRequest {
                consumer_key,
                private_key,
                private_key_path,
            } => f
                .debug_struct("SignedRequest")
                .field("consumer_key", consumer_key)
                .field("private_key", &private_key.as_ref().map(|_| "[REDACTED]"))
                .field("private_key_path", private_key_path)
                .finish(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_endpoint_base")]
    pub endpoint_base: String,
    #[serde(default = "constants::default_user_agent")]
    pub user_agent: String,
    /// Organisation the requests act on, sent as `xero-tenant-id`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub resilience: ResilienceProfile,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    pub auth: AuthConfig,
}

fn default_endpoint_base() -> String {
    DEFAULT_ENDPOINT_BASE.to_string()
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl ClientConfig {
    pub fn new(auth: AuthConfig) -> Self {
        Self {
            endpoint_base: default_endpoint_base(),
            user_agent: constants::default_user_agent(),
            tenant_id: None,
            auth,
            resilience: ResilienceProfile::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_endpoint_base(mut self, endpoint_base: impl Into<String>) -> Self {
        self.endpoint_base = endpoint_base.into();
        self
    }

    pub fn with_tenant_id(mut self, tenant_id: impl Into<String>) -> Self {
        self.tenant_id = Some(tenant_id.into());
        self
    }

    pub fn with_resilience(mut self, profile: ResilienceProfile) -> Self {
        self.resilience = profile;
        self
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn resilience_config(&self) -> ResilienceConfig {
        self.resilience.to_config()
    }

    /// Read `XERO_*` variables, loading `.env` first if one exists
    pub fn from_env() -> Result<Self> {
        match dotenvy::dotenv() {
            Ok(path) => debug!("Loaded environment from {:?}", path),
            Err(e) if e.not_found() => debug!("No .env file found"),
            Err(e) => return Err(e).context("Failed to load .env file"),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read `XERO_*` variables from a specific dotenv file. Variables already
    /// set in the process environment take precedence.
    pub fn from_env_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut values = HashMap::new();
        for item in dotenvy::from_path_iter(path)
            .with_context(|| format!("Failed to open env file: {:?}", path))?
        {
            let (key, value) = item.with_context(|| format!("Failed to parse env file: {:?}", path))?;
            values.insert(key, value);
        }

        Self::from_lookup(|key| std::env::var(key).ok().or_else(|| values.get(key).cloned()))
    }

    /// Build a configuration from any key lookup using the `XERO_*` names
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| {
            lookup(&format!("{}{}", ENV_PREFIX, name)).filter(|value| !value.trim().is_empty())
        };
        let required = |name: &str| {
            var(name).with_context(|| format!("{}{} is not set", ENV_PREFIX, name))
        };

        let scheme = match var("AUTH_SCHEME") {
            Some(scheme) => scheme.to_lowercase(),
            None if var("ACCESS_TOKEN").is_some() => "bearer".to_string(),
            None if var("PRIVATE_KEY").is_some() || var("PRIVATE_KEY_PATH").is_some() => {
                "signed_request".to_string()
            }
            None => "client_credentials".to_string(),
        };

        let auth = match scheme.as_str() {
            "bearer" => AuthConfig::Bearer {
                access_token: required("ACCESS_TOKEN")?,
            },
            "client_credentials" => AuthConfig::ClientCredentials {
                consumer_key: required("CONSUMER_KEY")?,
                consumer_secret: required("CONSUMER_SECRET")?,
                token_url: var("TOKEN_URL"),
                scopes: var("SCOPES")
                    .map(|scopes| {
                        scopes
                            .split([' ', ','])
                            .filter(|s| !s.is_empty())
                            .map(str::to_string)
                            .collect()
                    })
                    .unwrap_or_default(),
            },
            "signed_request" => {
                let private_key = var("PRIVATE_KEY");
                let private_key_path = var("PRIVATE_KEY_PATH").map(PathBuf::from);
                if private_key.is_none() && private_key_path.is_none() {
                    anyhow::bail!(
                        "{}PRIVATE_KEY or {}PRIVATE_KEY_PATH is required for signed requests",
                        ENV_PREFIX,
                        ENV_PREFIX
                    );
                }
                AuthConfig::SignedRequest {
                    consumer_key: required("CONSUMER_KEY")?,
                    private_key,
                    private_key_path,
                }
            }
            other => anyhow::bail!("Unknown {}AUTH_SCHEME '{}'", ENV_PREFIX, other),
        };

        let mut config = Self::new(auth);
        if let Some(endpoint_base) = var("ENDPOINT_BASE") {
            config.endpoint_base = endpoint_base;
        }
        if let Some(user_agent) = var("USER_AGENT") {
            config.user_agent = user_agent;
        }
        config.tenant_id = var("TENANT_ID");
        if let Some(profile) = var("RESILIENCE") {
            config.resilience = serde_json::from_value(serde_json::Value::String(profile.to_lowercase()))
                .with_context(|| format!("Invalid {}RESILIENCE '{}'", ENV_PREFIX, profile))?;
        }
        if let Some(timeout) = var("TIMEOUT_SECS") {
            config.timeout_secs = timeout
                .parse()
                .with_context(|| format!("Invalid {}TIMEOUT_SECS '{}'", ENV_PREFIX, timeout))?;
        }

        debug!("Configuration resolved with {} authentication", config.auth.scheme());
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        debug!("Loading config from: {:?}", path);

        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;

        toml::from_str(&content).with_context(|| format!("Failed to parse config file: {:?}", path))
    }

    /// Default config file location
    pub fn config_path() -> Result<PathBuf> {
        let config_dir = if cfg!(target_os = "linux") {
            dirs::config_dir()
                .context("Failed to get XDG config directory")?
                .join("xero-accounting")
        } else {
            dirs::home_dir()
                .context("Failed to get home directory")?
                .join(".xero-accounting")
        };

        Ok(config_dir.join("config.toml"))
    }

    /// Load the config file from its default location, falling back to the
    /// environment when there is none
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;

        if config_path.exists() {
            info!("Using config file {:?}", config_path);
            Self::from_toml_file(&config_path)
        } else {
            info!("No config file at {:?}, reading environment", config_path);
            Self::from_env()
        }
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let content = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }
        fs::write(path, content).with_context(|| format!("Failed to write config file: {:?}", path))?;

        info!("Config saved to {:?}", path);
        Ok(())
    }
}
