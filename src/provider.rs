use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::AuthError;

/// An external OAuth identity issuer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    GitHub,
    Facebook,
    Google,
}

impl Provider {
    pub const ALL: [Provider; 3] = [Provider::GitHub, Provider::Facebook, Provider::Google];

    /// Path segment used in `/auth/{provider}` routes.
    pub fn as_str(&self) -> &'static str {
        match self {
            Provider::GitHub => "github",
            Provider::Facebook => "facebook",
            Provider::Google => "google",
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Provider::GitHub => "GitHub",
            Provider::Facebook => "Facebook",
            Provider::Google => "Google",
        }
    }

    /// Column of the `users` table holding this provider's external id.
    pub fn id_column(&self) -> &'static str {
        match self {
            Provider::GitHub => "github_id",
            Provider::Facebook => "facebook_id",
            Provider::Google => "google_id",
        }
    }

    pub fn scopes(&self) -> &'static [&'static str] {
        match self {
            Provider::GitHub => &["user:email"],
            Provider::Facebook => &["email"],
            Provider::Google => &["openid", "profile", "email"],
        }
    }

    pub fn default_endpoints(&self) -> ProviderEndpoints {
        match self {
            Provider::GitHub => ProviderEndpoints {
                auth_url: "https://github.com/login/oauth/authorize".to_string(),
                token_url: "https://github.com/login/oauth/access_token".to_string(),
                profile_url: "https://api.github.com/user".to_string(),
                emails_url: Some("https://api.github.com/user/emails".to_string()),
            },
            Provider::Facebook => ProviderEndpoints {
                auth_url: "https://www.facebook.com/v24.0/dialog/oauth".to_string(),
                token_url: "https://graph.facebook.com/v24.0/oauth/access_token".to_string(),
                profile_url: "https://graph.facebook.com/v24.0/me?fields=id,name,email"
                    .to_string(),
                emails_url: None,
            },
            Provider::Google => ProviderEndpoints {
                auth_url: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
                token_url: "https://oauth2.googleapis.com/token".to_string(),
                profile_url: "https://www.googleapis.com/oauth2/v3/userinfo".to_string(),
                emails_url: None,
            },
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Provider {
    type Err = AuthError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Provider::ALL
            .into_iter()
            .find(|provider| provider.as_str() == s)
            .ok_or_else(|| AuthError::UnknownProvider(s.to_string()))
    }
}

/// URLs a provider is reached at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderEndpoints {
    pub auth_url: String,
    pub token_url: String,
    pub profile_url: String,
    /// Secondary email listing, only GitHub has one.
    pub emails_url: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_round_trips_through_path_segment() {
        for provider in Provider::ALL {
            assert_eq!(provider.as_str().parse::<Provider>().unwrap(), provider);
        }
    }

    #[test]
    fn test_unknown_provider_is_rejected() {
        let result = "twitter".parse::<Provider>();
        assert!(matches!(result, Err(AuthError::UnknownProvider(name)) if name == "twitter"));

        // Path segments are case sensitive
        assert!("GitHub".parse::<Provider>().is_err());
    }

    #[test]
    fn test_id_columns_are_distinct() {
        assert_eq!(Provider::GitHub.id_column(), "github_id");
        assert_eq!(Provider::Facebook.id_column(), "facebook_id");
        assert_eq!(Provider::Google.id_column(), "google_id");
    }

    #[test]
    fn test_only_github_lists_emails_separately() {
        assert!(Provider::GitHub.default_endpoints().emails_url.is_some());
        assert!(Provider::Facebook.default_endpoints().emails_url.is_none());
        assert!(Provider::Google.default_endpoints().emails_url.is_none());
    }

    #[test]
    fn test_serde_uses_lowercase_names() {
        let json = serde_json::to_string(&Provider::GitHub).unwrap();
        assert_eq!(json, "\"github\"");

        let provider: Provider = serde_json::from_str("\"facebook\"").unwrap();
        assert_eq!(provider, Provider::Facebook);
    }
}
