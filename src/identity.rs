//! Caller identity.
//!
//! A request is either anonymous or carries a bearer token that an
//! [`IdentityVerifier`] redeems for a [`UserId`]. Verification problems never fail
//! a request; they only downgrade the caller to [`Caller::Anonymous`].

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const BEARER_PREFIX: &str = "Bearer ";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct UserId(pub Uuid);

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for UserId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Uuid::from_str(s).map(Self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Caller {
    #[default]
    Anonymous,
    User(UserId),
}

impl Caller {
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Caller::Anonymous => None,
            Caller::User(user_id) => Some(*user_id),
        }
    }

    pub fn is_anonymous(&self) -> bool {
        matches!(self, Caller::Anonymous)
    }
}

#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    /// Redeem a bearer token for the user it was issued to.
    async fn verify(&self, token: &str) -> anyhow::Result<UserId>;
}

/// Pull the token out of an `Authorization` header value. Anything that is not
/// `Bearer <token>` yields `None`.
pub fn bearer_token(header: Option<&str>) -> Option<&str> {
    let token = header?.strip_prefix(BEARER_PREFIX)?.trim();
    if token.is_empty() { None } else { Some(token) }
}

/// Resolve the caller for a request given its raw `Authorization` header.
pub async fn resolve_caller(verifier: &dyn IdentityVerifier, header: Option<&str>) -> Caller {
    let Some(token) = bearer_token(header) else {
        return Caller::Anonymous;
    };

    match verifier.verify(token).await {
        Ok(user_id) => Caller::User(user_id),
        Err(err) => {
            let detail = format!("{err:#}");
            tracing::error!(error = %detail, "Error verifying token");
            Caller::Anonymous
        }
    }
}

/// Rejects every token. Used when no identity backend is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoIdentityVerifier;

#[async_trait]
impl IdentityVerifier for NoIdentityVerifier {
    async fn verify(&self, _token: &str) -> anyhow::Result<UserId> {
        Err(anyhow!("no identity backend is configured"))
    }
}

/// Fixed token table, for tests and local development.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentityVerifier {
    tokens: HashMap<String, UserId>,
}

impl StaticIdentityVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_token(mut self, token: impl Into<String>, user_id: UserId) -> Self {
        self.tokens.insert(token.into(), user_id);
        self
    }
}

#[async_trait]
impl IdentityVerifier for StaticIdentityVerifier {
    async fn verify(&self, token: &str) -> anyhow::Result<UserId> {
        self.tokens
            .get(token)
            .copied()
            .ok_or_else(|| anyhow!("unknown token"))
    }
}

#[cfg(feature = "api")]
pub use supabase::SupabaseIdentityVerifier;

#[cfg(feature = "api")]
mod supabase {
    use anyhow::Context;
    use async_trait::async_trait;
    use serde::Deserialize;

    use super::{IdentityVerifier, UserId};

    #[derive(Debug, Deserialize)]
    struct AuthUser {
        id: String,
    }

    /// Verifies access tokens against a Supabase-compatible `auth/v1/user` endpoint.
    #[derive(Debug, Clone)]
    pub struct SupabaseIdentityVerifier {
        client: reqwest::Client,
        user_url: String,
        api_key: String,
    }

    impl SupabaseIdentityVerifier {
        pub fn new(base_url: &str, api_key: impl Into<String>) -> Self {
            Self {
                client: reqwest::Client::new(),
                user_url: format!("{}/auth/v1/user", base_url.trim_end_matches('/')),
                api_key: api_key.into(),
            }
        }
    }

    #[async_trait]
    impl IdentityVerifier for SupabaseIdentityVerifier {
        async fn verify(&self, token: &str) -> anyhow::Result<UserId> {
            let user = self
                .client
                .get(&self.user_url)
                .header("apikey", &self.api_key)
                .bearer_auth(token)
                .send()
                .await
                .context("identity request failed")?
                .error_for_status()
                .context("identity service rejected token")?
                .json::<AuthUser>()
                .await
                .context("identity response was not a user")?;

            user.id
                .parse()
                .with_context(|| format!("identity service returned invalid user id '{}'", user.id))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bearer_token_requires_prefix() {
        assert_eq!(bearer_token(Some("Bearer abc")), Some("abc"));
        assert_eq!(bearer_token(Some("bearer abc")), None);
        assert_eq!(bearer_token(Some("Basic abc")), None);
        assert_eq!(bearer_token(Some("Bearer ")), None);
        assert_eq!(bearer_token(None), None);
    }

    #[tokio::test]
    async fn resolves_known_token_to_user() {
        let user = UserId(Uuid::new_v4());
        let verifier = StaticIdentityVerifier::new().with_token("good", user);

        let caller = resolve_caller(&verifier, Some("Bearer good")).await;
        assert_eq!(caller, Caller::User(user));
    }

    #[tokio::test]
    async fn failed_verification_downgrades_to_anonymous() {
        let verifier = StaticIdentityVerifier::new();
        let caller = resolve_caller(&verifier, Some("Bearer expired")).await;
        assert!(caller.is_anonymous());

        let caller = resolve_caller(&NoIdentityVerifier, Some("Bearer anything")).await;
        assert_eq!(caller, Caller::Anonymous);
    }

    #[tokio::test]
    async fn missing_header_is_anonymous() {
        let caller = resolve_caller(&NoIdentityVerifier, None).await;
        assert_eq!(caller.user_id(), None);
    }
}
