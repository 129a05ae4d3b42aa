use std::{env, fmt, str::FromStr};

use crate::{
    error::ConfigError,
    provider::{Provider, ProviderEndpoints},
};

/// Minimum secret length accepted for cookie signing keys.
pub const MIN_SESSION_SECRET_LEN: usize = 64;

/// Deployment flavour. The two variants never share a database.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Variant {
    /// GitHub and Facebook sign-in.
    Social,
    /// Google sign-in.
    Google,
}

impl Variant {
    pub fn providers(&self) -> &'static [Provider] {
        match self {
            Variant::Social => &[Provider::GitHub, Provider::Facebook],
            Variant::Google => &[Provider::Google],
        }
    }

    pub fn default_port(&self) -> u16 {
        match self {
            Variant::Social => 5000,
            Variant::Google => 3000,
        }
    }

    pub fn default_database_url(&self) -> &'static str {
        match self {
            Variant::Social => "sqlite:userfacebookgithuboauth.db",
            Variant::Google => "sqlite:usergoogleoauth.db",
        }
    }

    /// Where an unauthenticated `/profile` request is sent.
    pub fn login_route(&self) -> &'static str {
        match self {
            Variant::Social => "/",
            Variant::Google => "/auth/google",
        }
    }

    /// Where the browser lands after logout.
    pub fn logout_redirect(&self) -> &'static str {
        self.login_route()
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Variant::Social => f.write_str("social"),
            Variant::Google => f.write_str("google"),
        }
    }
}

impl FromStr for Variant {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "social" => Ok(Variant::Social),
            "google" => Ok(Variant::Google),
            other => Err(ConfigError::Invalid(format!(
                "APP_VARIANT must be `social` or `google`, got `{}`",
                other
            ))),
        }
    }
}

/// Client credentials and endpoints for one enabled provider.
#[derive(Clone)]
pub struct ProviderSettings {
    pub provider: Provider,
    pub client_id: String,
    pub client_secret: String,
    pub endpoints: ProviderEndpoints,
}

impl fmt::Debug for ProviderSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProviderSettings")
            .field("provider", &self.provider)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .field("endpoints", &self.endpoints)
            .finish()
    }
}

#[derive(Clone)]
pub struct Config {
    pub variant: Variant,
    pub database_url: String,
    pub port: u16,
    pub base_url: String,
    pub session_secret: String,
    pub providers: Vec<ProviderSettings>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("variant", &self.variant)
            .field("database_url", &self.database_url)
            .field("port", &self.port)
            .field("base_url", &self.base_url)
            .field("session_secret", &"[REDACTED]")
            .field("providers", &self.providers)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let variant = match lookup("APP_VARIANT") {
            Some(value) => value.parse()?,
            None => Variant::Social,
        };

        let port = match lookup("PORT") {
            Some(value) => value
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("PORT is not a valid port: {}", value)))?,
            None => variant.default_port(),
        };

        let session_secret = require(&lookup, "SESSION_SECRET")?;
        if session_secret.len() < MIN_SESSION_SECRET_LEN {
            return Err(ConfigError::Invalid(format!(
                "SESSION_SECRET must be at least {} bytes",
                MIN_SESSION_SECRET_LEN
            )));
        }

        let providers = variant
            .providers()
            .iter()
            .map(|&provider| provider_settings(&lookup, provider))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Config {
            variant,
            database_url: lookup("DATABASE_URL")
                .unwrap_or_else(|| variant.default_database_url().to_string()),
            port,
            base_url: lookup("BASE_URL")
                .map(|url| url.trim_end_matches('/').to_string())
                .unwrap_or_else(|| format!("http://localhost:{}", port)),
            session_secret,
            providers,
        })
    }

    pub fn secure_cookies(&self) -> bool {
        self.base_url.starts_with("https://")
    }

    pub fn callback_url(&self, provider: Provider) -> String {
        format!("{}/auth/{}/callback", self.base_url, provider)
    }
}

fn provider_settings<F>(lookup: &F, provider: Provider) -> Result<ProviderSettings, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let (id_key, secret_key) = match provider {
        Provider::GitHub => ("GITHUB_CLIENT_ID", "GITHUB_CLIENT_SECRET"),
        Provider::Facebook => ("FACEBOOK_CLIENT_ID", "FACEBOOK_CLIENT_SECRET"),
        Provider::Google => ("GOOGLE_CLIENT_ID", "GOOGLE_CLIENT_SECRET"),
    };

    Ok(ProviderSettings {
        provider,
        client_id: require(lookup, id_key)?,
        client_secret: require(lookup, secret_key)?,
        endpoints: provider.default_endpoints(),
    })
}

fn require<F>(lookup: &F, key: &'static str) -> Result<String, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .filter(|value| !value.is_empty())
        .ok_or(ConfigError::MissingEnvVar(key))
}
