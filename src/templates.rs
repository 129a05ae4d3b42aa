use askama::Template;

use crate::{models::User, provider::Provider};

pub struct ProviderLink {
    pub label: &'static str,
    pub href: String,
}

#[derive(Template)]
#[template(path = "index.html")]
pub struct IndexTemplate {
    pub providers: Vec<ProviderLink>,
}

impl IndexTemplate {
    pub fn new(providers: &[Provider]) -> Self {
        Self {
            providers: providers
                .iter()
                .map(|provider| ProviderLink {
                    label: provider.label(),
                    href: format!("/auth/{}", provider),
                })
                .collect(),
        }
    }
}

#[derive(Template)]
#[template(path = "profile.html")]
pub struct ProfileTemplate {
    pub display_name: String,
    pub email: Option<String>,
}

impl ProfileTemplate {
    pub fn new(user: &User) -> Self {
        Self {
            display_name: user.display_name.clone(),
            email: user.email.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_index_lists_each_provider() {
        let html = IndexTemplate::new(&[Provider::GitHub, Provider::Facebook])
            .render()
            .unwrap();

        assert!(html.contains("href=\"/auth/github\""));
        assert!(html.contains("Sign in with GitHub"));
        assert!(html.contains("href=\"/auth/facebook\""));
        assert!(!html.contains("/auth/google"));
    }

    #[test]
    fn test_profile_escapes_display_name() {
        let user = User {
            id: 1,
            github_id: Some("1".to_string()),
            facebook_id: None,
            google_id: None,
            display_name: "<script>alert(1)</script>".to_string(),
            email: None,
            created_at: Utc::now(),
        };

        let html = ProfileTemplate::new(&user).render().unwrap();
        assert!(!html.contains("<script>alert"));
        assert!(html.contains("&lt;script&gt;"));
        assert!(html.contains("href=\"/logout\""));
    }
}
