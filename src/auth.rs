use std::collections::HashMap;

use oauth2::{
    basic::BasicClient, AccessToken, AuthType, AuthUrl, AuthorizationCode, ClientId,
    ClientSecret, CsrfToken, RedirectUrl, Scope, TokenResponse, TokenUrl,
};
use reqwest::Client as HttpClient;
use serde::Deserialize;
use subtle::ConstantTimeEq;

use crate::{
    config::{Config, ProviderSettings},
    error::{AppError, AuthError, ConfigError},
    models::{ProviderIdentity, User},
    provider::{Provider, ProviderEndpoints},
    reconcile::IdentityReconciler,
};

const USER_AGENT: &str = "oauth-profile-app";

#[derive(Debug, Clone)]
pub struct ProviderClient {
    client: BasicClient,
    endpoints: ProviderEndpoints,
}

impl ProviderClient {
    pub fn new(settings: &ProviderSettings, redirect_url: String) -> Result<Self, ConfigError> {
        let invalid = |what: &str, e: oauth2::url::ParseError| {
            ConfigError::Invalid(format!("{} {} URL: {}", settings.provider.label(), what, e))
        };

        let client = BasicClient::new(
            ClientId::new(settings.client_id.clone()),
            Some(ClientSecret::new(settings.client_secret.clone())),
            AuthUrl::new(settings.endpoints.auth_url.clone()).map_err(|e| invalid("authorize", e))?,
            Some(
                TokenUrl::new(settings.endpoints.token_url.clone())
                    .map_err(|e| invalid("token", e))?,
            ),
        )
        .set_auth_type(AuthType::RequestBody)
        .set_redirect_uri(RedirectUrl::new(redirect_url).map_err(|e| invalid("redirect", e))?);

        Ok(Self {
            client,
            endpoints: settings.endpoints.clone(),
        })
    }
}

/// OAuth clients for the providers enabled in this deployment.
#[derive(Debug, Clone)]
pub struct OAuth2Config {
    clients: HashMap<Provider, ProviderClient>,
    order: Vec<Provider>,
    http_client: HttpClient,
}

impl OAuth2Config {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let http_client = HttpClient::builder().user_agent(USER_AGENT).build()?;

        let mut clients = HashMap::new();
        let mut order = Vec::new();
        for settings in &config.providers {
            let client = ProviderClient::new(settings, config.callback_url(settings.provider))?;
            clients.insert(settings.provider, client);
            order.push(settings.provider);
        }

        Ok(OAuth2Config {
            clients,
            order,
            http_client,
        })
    }

    /// Enabled providers in configuration order.
    pub fn providers(&self) -> &[Provider] {
        &self.order
    }

    pub fn client(&self, provider: Provider) -> Result<&ProviderClient, AuthError> {
        self.clients
            .get(&provider)
            .ok_or_else(|| AuthError::UnknownProvider(provider.to_string()))
    }
}

/// Compares a returned `state` with the stored one in constant time.
fn state_matches(received: &str, expected: &str) -> bool {
    if received.len() != expected.len() {
        return false;
    }
    received.as_bytes().ct_eq(expected.as_bytes()).into()
}

#[derive(Debug, Clone)]
pub struct AuthService {
    oauth2_config: OAuth2Config,
    reconciler: IdentityReconciler,
}

impl AuthService {
    pub fn new(oauth2_config: OAuth2Config, reconciler: IdentityReconciler) -> Self {
        Self {
            oauth2_config,
            reconciler,
        }
    }

    pub fn providers(&self) -> &[Provider] {
        self.oauth2_config.providers()
    }

    /// Resolves a route segment to an enabled provider.
    pub fn enabled_provider(&self, name: &str) -> Result<Provider, AuthError> {
        let provider: Provider = name.parse()?;
        self.oauth2_config.client(provider)?;
        Ok(provider)
    }

    /// Builds the consent-screen URL and the state it must come back with.
    pub fn authorize_url(&self, provider: Provider) -> Result<(String, CsrfToken), AuthError> {
        let client = self.oauth2_config.client(provider)?;

        let (auth_url, csrf_token) = client
            .client
            .authorize_url(CsrfToken::new_random)
            .add_scopes(
                provider
                    .scopes()
                    .iter()
                    .map(|scope| Scope::new(scope.to_string())),
            )
            .url();

        Ok((auth_url.to_string(), csrf_token))
    }

    /// Runs the callback leg: state check, code exchange, profile fetch and
    /// reconciliation. Provider failures come back as `AppError::Auth`, store
    /// failures as `AppError::Database`.
    pub async fn handle_callback(
        &self,
        provider: Provider,
        code: String,
        state: String,
        expected_csrf_token: CsrfToken,
    ) -> Result<User, AppError> {
        if !state_matches(&state, expected_csrf_token.secret()) {
            return Err(AuthError::StateMismatch.into());
        }

        let identity = self.fetch_identity(provider, code).await?;
        self.reconciler.reconcile(&identity).await
    }

    pub async fn fetch_identity(
        &self,
        provider: Provider,
        code: String,
    ) -> Result<ProviderIdentity, AuthError> {
        let client = self.oauth2_config.client(provider)?;

        let token_result = client
            .client
            .exchange_code(AuthorizationCode::new(code))
            .request_async(oauth2::reqwest::async_http_client)
            .await
            .map_err(|e| AuthError::TokenExchange(e.to_string()))?;

        let access_token = token_result.access_token();

        match provider {
            Provider::GitHub => self.fetch_github_identity(client, access_token).await,
            Provider::Facebook => {
                let profile: FacebookUserProfile =
                    self.get_json(&client.endpoints.profile_url, access_token).await?;
                Ok(profile.into_identity())
            }
            Provider::Google => {
                let profile: GoogleUserProfile =
                    self.get_json(&client.endpoints.profile_url, access_token).await?;
                Ok(profile.into_identity())
            }
        }
    }

    async fn fetch_github_identity(
        &self,
        client: &ProviderClient,
        access_token: &AccessToken,
    ) -> Result<ProviderIdentity, AuthError> {
        let profile: GitHubUserProfile =
            self.get_json(&client.endpoints.profile_url, access_token).await?;

        // Private addresses are only visible through the emails endpoint
        let emails = match (&profile.email, &client.endpoints.emails_url) {
            (None, Some(emails_url)) => {
                match self.get_json::<Vec<GitHubEmail>>(emails_url, access_token).await {
                    Ok(emails) => order_github_emails(emails),
                    Err(e) => {
                        tracing::warn!("Could not list GitHub emails: {}", e);
                        Vec::new()
                    }
                }
            }
            _ => Vec::new(),
        };

        Ok(profile.into_identity(emails))
    }

    async fn get_json<T>(&self, url: &str, access_token: &AccessToken) -> Result<T, AuthError>
    where
        T: serde::de::DeserializeOwned,
    {
        let response = self
            .oauth2_config
            .http_client
            .get(url)
            .bearer_auth(access_token.secret())
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| AuthError::ProfileFetch(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AuthError::ProfileFetch(format!("HTTP {}", response.status())));
        }

        response
            .json()
            .await
            .map_err(|e| AuthError::ProfileFetch(e.to_string()))
    }
}

// GitHub API user profile response
#[derive(Debug, Deserialize)]
pub struct GitHubUserProfile {
    pub id: u64,
    pub login: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl GitHubUserProfile {
    fn into_identity(self, listed_emails: Vec<String>) -> ProviderIdentity {
        let emails = match self.email {
            Some(email) => vec![email],
            None => listed_emails,
        };

        ProviderIdentity {
            provider: Provider::GitHub,
            external_id: self.id.to_string(),
            display_name: non_empty(self.name).unwrap_or(self.login),
            emails,
        }
    }
}

// GitHub API email response
#[derive(Debug, Deserialize)]
pub struct GitHubEmail {
    pub email: String,
    pub primary: bool,
    pub verified: bool,
}

/// Verified addresses first, the primary one leading.
fn order_github_emails(mut emails: Vec<GitHubEmail>) -> Vec<String> {
    emails.retain(|email| email.verified);
    emails.sort_by_key(|email| !email.primary);
    emails.into_iter().map(|email| email.email).collect()
}

// Facebook Graph API `/me` response
#[derive(Debug, Deserialize)]
pub struct FacebookUserProfile {
    pub id: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl FacebookUserProfile {
    fn into_identity(self) -> ProviderIdentity {
        ProviderIdentity {
            provider: Provider::Facebook,
            display_name: non_empty(self.name).unwrap_or_else(|| fallback_name(Provider::Facebook)),
            external_id: self.id,
            emails: self.email.into_iter().collect(),
        }
    }
}

// Google OpenID Connect userinfo response
#[derive(Debug, Deserialize)]
pub struct GoogleUserProfile {
    pub sub: String,
    pub name: Option<String>,
    pub email: Option<String>,
}

impl GoogleUserProfile {
    fn into_identity(self) -> ProviderIdentity {
        ProviderIdentity {
            provider: Provider::Google,
            display_name: non_empty(self.name).unwrap_or_else(|| fallback_name(Provider::Google)),
            external_id: self.sub,
            emails: self.email.into_iter().collect(),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn fallback_name(provider: Provider) -> String {
    format!("{} User", provider.label())
}
