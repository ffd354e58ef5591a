//! Process-wide configuration.
//!
//! Loaded once at startup from an optional YAML file (`BFF_CONFIG`) and
//! environment overrides, then handed by value to the components that need
//! it. Nothing re-reads the environment after startup.

use std::time::Duration;

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_LISTEN_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_BACKEND_URL: &str = "https://api.pulsebiz.io";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_SESSION_COOKIES: &[&str] =
    &["__Secure-pulse.session-token", "pulse.session-token"];

#[derive(Debug)]
pub struct Config {
    pub server: ServerConfig,
    pub backend: BackendConfig,
    pub session: SessionConfig,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub listen_addr: String,
}

#[derive(Debug)]
pub struct BackendConfig {
    /// Base URL of the API service; request paths are appended to it
    pub url: Url,
    /// `X-API-Key` credential. `None` makes every proxied request fail closed.
    pub service_key: Option<SecretString>,
    pub timeout: Duration,
}

#[derive(Debug)]
pub struct SessionConfig {
    /// HMAC key shared with the session issuer
    pub secret: Option<SecretString>,
    /// Cookies searched for a session token, in order
    pub cookie_names: Vec<String>,
    /// When set, only `<user>@<domain>` identities are accepted
    pub allowed_email_domain: Option<String>,
}

impl BackendConfig {
    /// Backend config for `url` with the default timeout.
    pub fn with_url(url: &str, service_key: Option<&str>) -> Result<Self> {
        Ok(Self {
            url: parse_backend_url(url)?,
            service_key: normalize_secret(service_key.map(str::to_string)),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
        })
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            secret: None,
            cookie_names: DEFAULT_SESSION_COOKIES.iter().map(|c| c.to_string()).collect(),
            allowed_email_domain: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileConfig {
    server: FileServer,
    backend: FileBackend,
    session: FileSession,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileServer {
    listen_addr: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileBackend {
    url: Option<String>,
    service_key: Option<String>,
    timeout_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct FileSession {
    secret: Option<String>,
    cookie_names: Option<Vec<String>>,
    allowed_email_domain: Option<String>,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn load() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which stands in for the
    /// environment. Reads the YAML file named by `BFF_CONFIG` first, then
    /// applies the individual overrides.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = match lookup("BFF_CONFIG") {
            Some(path) => {
                let raw = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read config file {path}"))?;
                serde_yaml::from_str(&raw)
                    .with_context(|| format!("failed to parse config file {path}"))?
            }
            None => FileConfig::default(),
        };
        Self::resolve(file, &lookup)
    }

    /// Parses a YAML document without applying environment overrides.
    pub fn from_yaml_str(raw: &str) -> Result<Self> {
        let file: FileConfig = serde_yaml::from_str(raw).context("invalid config YAML")?;
        Self::resolve(file, &|_| None)
    }

    fn resolve(file: FileConfig, lookup: &dyn Fn(&str) -> Option<String>) -> Result<Self> {
        let listen_addr = lookup("LISTEN")
            .or(file.server.listen_addr)
            .unwrap_or_else(|| DEFAULT_LISTEN_ADDR.to_string());

        let url = parse_backend_url(
            lookup("BACKEND_URL")
                .or(file.backend.url)
                .as_deref()
                .unwrap_or(DEFAULT_BACKEND_URL),
        )?;

        let timeout_ms = match lookup("BACKEND_TIMEOUT_MS") {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .with_context(|| format!("BACKEND_TIMEOUT_MS is not a number: {raw}"))?,
            None => file.backend.timeout_ms.unwrap_or(DEFAULT_TIMEOUT_MS),
        };
        if timeout_ms == 0 {
            anyhow::bail!("backend timeout must be greater than zero");
        }

        let service_key = normalize_secret(lookup("BACKEND_SERVICE_KEY").or(file.backend.service_key));

        let cookie_names = lookup("SESSION_COOKIE_NAMES")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|name| !name.is_empty())
                    .map(str::to_string)
                    .collect::<Vec<_>>()
            })
            .or(file.session.cookie_names)
            .filter(|names| !names.is_empty())
            .unwrap_or_else(|| SessionConfig::default().cookie_names);

        let allowed_email_domain = lookup("ALLOWED_EMAIL_DOMAIN")
            .or(file.session.allowed_email_domain)
            .map(|domain| domain.trim().trim_start_matches('@').to_ascii_lowercase())
            .filter(|domain| !domain.is_empty());

        Ok(Self {
            server: ServerConfig { listen_addr },
            backend: BackendConfig {
                url,
                service_key,
                timeout: Duration::from_millis(timeout_ms),
            },
            session: SessionConfig {
                secret: normalize_secret(lookup("SESSION_SECRET").or(file.session.secret)),
                cookie_names,
                allowed_email_domain,
            },
        })
    }
}

/// Empty secrets count as unset.
fn normalize_secret(raw: Option<String>) -> Option<SecretString> {
    raw.filter(|value| !value.trim().is_empty())
        .map(SecretString::from)
}

fn parse_backend_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim()).with_context(|| format!("invalid BACKEND_URL: {raw}"))?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none() {
        anyhow::bail!("BACKEND_URL must be an http(s) URL with a host: {raw}");
    }
    Ok(url)
}
