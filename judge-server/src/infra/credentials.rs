//! Client-credential token acquisition for evaluator backends.

use judge_config::AuthConfig;
use judge_core::AccessToken;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("token request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("token endpoint returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("token response did not contain an access_token")]
    MissingToken,
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
}

/// Exchanges the configured client credentials for a bearer token.
///
/// Without a token endpoint the returned token is anonymous and evaluator
/// calls carry no `Authorization` header.
pub async fn acquire_token(
    client: &reqwest::Client,
    auth: &AuthConfig,
) -> Result<AccessToken, CredentialError> {
    let Some(token_url) = auth.token_url.as_ref() else {
        warn!("No token endpoint configured; evaluator calls are unauthenticated");
        return Ok(AccessToken::anonymous());
    };

    let form = [
        ("client_id", auth.client_id.as_deref().unwrap_or_default()),
        (
            "client_secret",
            auth.client_secret.as_deref().unwrap_or_default(),
        ),
        ("grant_type", auth.grant_type.as_str()),
        ("scope", auth.scope.as_deref().unwrap_or_default()),
    ];

    let response = client.post(token_url.clone()).form(&form).send().await?;
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(CredentialError::Status {
            status: status.as_u16(),
            body,
        });
    }

    let token = response
        .json::<TokenResponse>()
        .await?
        .access_token
        .filter(|token| !token.is_empty())
        .ok_or(CredentialError::MissingToken)?;

    info!(endpoint = %token_url, "Acquired evaluator access token");
    Ok(AccessToken::new(token))
}
