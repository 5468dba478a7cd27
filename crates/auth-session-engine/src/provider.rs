//! Identity provider seam and the Supabase GoTrue implementation.
//!
//! The gateway talks to [`IdentityProvider`] only; the REST details live
//! here. Every failure is classified into the [`AuthError`] taxonomy before
//! it leaves this module — the raw status and body go to the logs, never to
//! the caller.

use crate::error::{AuthError, AuthResult};
use crate::session::{Identity, Session};
use chrono::{Duration, Utc};
use futures_util::future::BoxFuture;
use serde::Deserialize;
use tracing::{debug, error};
use url::Url;

/// Outcome of a sign-up call.
///
/// Providers configured to require email confirmation create the account but
/// issue no session until the address is verified.
#[derive(Debug, Clone)]
pub struct SignUpOutcome {
    pub identity: Identity,
    /// Present when the provider issued a session immediately.
    pub session: Option<Session>,
}

/// External identity provider operations used by the auth gateway.
pub trait IdentityProvider: Send + Sync {
    fn sign_in<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, AuthResult<Session>>;

    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
        metadata: &'a serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'a, AuthResult<SignUpOutcome>>;

    fn sign_out<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, AuthResult<()>>;

    fn reset_password<'a>(&'a self, email: &'a str) -> BoxFuture<'a, AuthResult<()>>;

    /// Build the browser URL that starts the provider's OAuth flow.
    fn authorize_url(
        &self,
        provider: &str,
        redirect_uri: &str,
        state: &str,
        code_challenge: &str,
    ) -> AuthResult<Url>;

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        code_verifier: &'a str,
    ) -> BoxFuture<'a, AuthResult<Session>>;

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, AuthResult<Session>>;
}

/// Token grant response shared by the password, pkce, and refresh grants.
#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    refresh_token: String,
    expires_in: i64,
    user: UserPayload,
}

#[derive(Debug, Deserialize)]
struct UserPayload {
    id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: serde_json::Map<String, serde_json::Value>,
}

/// Sign-up responses come in two shapes: a full token grant when the project
/// auto-confirms, or a bare user object when email confirmation is pending.
#[derive(Debug, Deserialize)]
struct SignUpResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    user: Option<UserPayload>,
    // Bare-user shape: the fields sit at the top level.
    #[serde(default)]
    id: Option<String>,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    user_metadata: Option<serde_json::Map<String, serde_json::Value>>,
}

impl From<UserPayload> for Identity {
    fn from(user: UserPayload) -> Self {
        Identity {
            id: user.id,
            email: user.email,
            metadata: user.user_metadata,
        }
    }
}

fn session_from_grant(data: TokenResponse) -> Session {
    let expires_at = Utc::now() + Duration::seconds(data.expires_in);
    Session {
        identity: data.user.into(),
        access_token: data.access_token,
        refresh_token: data.refresh_token,
        expires_at,
    }
}

fn outcome_from_sign_up(data: SignUpResponse) -> AuthResult<SignUpOutcome> {
    if let (Some(access_token), Some(refresh_token), Some(expires_in), Some(user)) = (
        data.access_token,
        data.refresh_token,
        data.expires_in,
        data.user,
    ) {
        let session = session_from_grant(TokenResponse {
            access_token,
            refresh_token,
            expires_in,
            user,
        });
        return Ok(SignUpOutcome {
            identity: session.identity.clone(),
            session: Some(session),
        });
    }

    // Confirmation pending: the account exists but no tokens were issued.
    let Some(id) = data.id else {
        return Err(AuthError::Unknown(
            "sign-up response carried neither a session nor a user".to_string(),
        ));
    };
    Ok(SignUpOutcome {
        identity: Identity {
            id,
            email: data.email,
            metadata: data.user_metadata.unwrap_or_default(),
        },
        session: None,
    })
}

fn network(err: reqwest::Error) -> AuthError {
    AuthError::NetworkError(err.to_string())
}

/// Classify a non-2xx provider response. The body is logged, never returned.
async fn classify_failure(response: reqwest::Response, credentials_grant: bool) -> AuthError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    error!(status = %status, body = %body, "auth provider call failed");

    if status.is_server_error() {
        AuthError::NetworkError(format!("provider returned {status}"))
    } else if credentials_grant
        && (status == reqwest::StatusCode::BAD_REQUEST
            || status == reqwest::StatusCode::UNAUTHORIZED)
    {
        AuthError::InvalidCredentials
    } else {
        AuthError::Unknown(format!("provider returned {status}"))
    }
}

/// Supabase GoTrue REST implementation of [`IdentityProvider`].
#[derive(Clone)]
pub struct SupabaseAuthProvider {
    http_client: reqwest::Client,
    api_url: String,
    anon_key: String,
}

impl SupabaseAuthProvider {
    /// Create a new provider client.
    ///
    /// # Arguments
    /// * `api_url` - The Supabase project API URL (e.g., `https://xyz.supabase.co`)
    /// * `anon_key` - The Supabase anonymous API key
    pub fn new(api_url: impl Into<String>, anon_key: impl Into<String>) -> Self {
        Self {
            http_client: reqwest::Client::new(),
            api_url: api_url.into(),
            anon_key: anon_key.into(),
        }
    }

    fn auth_url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.api_url, path)
    }

    async fn token_grant(
        &self,
        grant_type: &str,
        body: serde_json::Value,
        credentials_grant: bool,
    ) -> AuthResult<Session> {
        let url = format!("{}?grant_type={}", self.auth_url("token"), grant_type);

        let response = self
            .http_client
            .post(&url)
            .header("apikey", &self.anon_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(network)?;

        if !response.status().is_success() {
            return Err(classify_failure(response, credentials_grant).await);
        }

        let data: TokenResponse = response.json().await.map_err(network)?;
        debug!(user_id = %data.user.id, grant_type, "token grant succeeded");
        Ok(session_from_grant(data))
    }
}

impl std::fmt::Debug for SupabaseAuthProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SupabaseAuthProvider")
            .field("api_url", &self.api_url)
            .finish_non_exhaustive()
    }
}

impl IdentityProvider for SupabaseAuthProvider {
    fn sign_in<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
    ) -> BoxFuture<'a, AuthResult<Session>> {
        Box::pin(async move {
            self.token_grant(
                "password",
                serde_json::json!({ "email": email, "password": password }),
                true,
            )
            .await
        })
    }

    fn sign_up<'a>(
        &'a self,
        email: &'a str,
        password: &'a str,
        metadata: &'a serde_json::Map<String, serde_json::Value>,
    ) -> BoxFuture<'a, AuthResult<SignUpOutcome>> {
        Box::pin(async move {
            let response = self
                .http_client
                .post(self.auth_url("signup"))
                .header("apikey", &self.anon_key)
                .header("Content-Type", "application/json")
                .json(&serde_json::json!({
                    "email": email,
                    "password": password,
                    "data": metadata,
                }))
                .send()
                .await
                .map_err(network)?;

            if !response.status().is_success() {
                return Err(classify_failure(response, false).await);
            }

            let data: SignUpResponse = response.json().await.map_err(network)?;
            outcome_from_sign_up(data)
        })
    }

    fn sign_out<'a>(&'a self, access_token: &'a str) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            let response = self
                .http_client
                .post(self.auth_url("logout"))
                .header("apikey", &self.anon_key)
                .header("Authorization", format!("Bearer {access_token}"))
                .send()
                .await
                .map_err(network)?;

            if !response.status().is_success() {
                return Err(classify_failure(response, false).await);
            }
            Ok(())
        })
    }

    fn reset_password<'a>(&'a self, email: &'a str) -> BoxFuture<'a, AuthResult<()>> {
        Box::pin(async move {
            let response = self
                .http_client
                .post(self.auth_url("recover"))
                .header("apikey", &self.anon_key)
                .header("Content-Type", "application/json")
                .json(&serde_json::json!({ "email": email }))
                .send()
                .await
                .map_err(network)?;

            if !response.status().is_success() {
                return Err(classify_failure(response, false).await);
            }
            debug!("password recovery email requested");
            Ok(())
        })
    }

    fn authorize_url(
        &self,
        provider: &str,
        redirect_uri: &str,
        state: &str,
        code_challenge: &str,
    ) -> AuthResult<Url> {
        let mut url = Url::parse(&self.auth_url("authorize"))
            .map_err(|e| AuthError::Unknown(format!("invalid provider URL: {e}")))?;
        url.query_pairs_mut()
            .append_pair("provider", provider)
            .append_pair("redirect_to", redirect_uri)
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "s256");
        Ok(url)
    }

    fn exchange_code<'a>(
        &'a self,
        code: &'a str,
        code_verifier: &'a str,
    ) -> BoxFuture<'a, AuthResult<Session>> {
        Box::pin(async move {
            self.token_grant(
                "pkce",
                serde_json::json!({ "auth_code": code, "code_verifier": code_verifier }),
                false,
            )
            .await
        })
    }

    fn refresh<'a>(&'a self, refresh_token: &'a str) -> BoxFuture<'a, AuthResult<Session>> {
        Box::pin(async move {
            self.token_grant(
                "refresh_token",
                serde_json::json!({ "refresh_token": refresh_token }),
                false,
            )
            .await
        })
    }
}
