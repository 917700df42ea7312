use crate::{Error, Result};
use predictor_types::api::{ErrorResponse, VerifyLoginResponse};
use predictor_types::{ErrorCode, LoginOutcome};
use reqwest::StatusCode;
use std::future::Future;
use url::Url;

/// Seam between the session state machine and the login verifier endpoint.
pub trait Verify {
    fn verify_login(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<LoginOutcome>> + Send;
}

/// HTTP client for `GET /verify-login`. Branches on the structured `code`
/// field of failure bodies, never on message text.
pub struct HttpVerifier {
    client: reqwest::Client,
    base_url: Url,
}

impl HttpVerifier {
    pub fn new(base_url: &str) -> Result<Self> {
        let base_url = Url::parse(base_url)?;
        match base_url.scheme() {
            "http" | "https" => {}
            other => return Err(Error::InvalidScheme(other.to_string())),
        }
        Ok(Self {
            client: reqwest::Client::new(),
            base_url,
        })
    }
}

impl Verify for HttpVerifier {
    async fn verify_login(&self, user_id: &str) -> Result<LoginOutcome> {
        let url = self.base_url.join("verify-login")?;
        let response = self
            .client
            .get(url)
            .query(&[("userId", user_id)])
            .send()
            .await?;
        let status = response.status();
        match status {
            StatusCode::OK => {
                let body: VerifyLoginResponse = response.json().await?;
                Ok(LoginOutcome::Verified {
                    redeposit_count: body.redeposit_count,
                })
            }
            StatusCode::FORBIDDEN => {
                let body: ErrorResponse = response.json().await?;
                match body.code {
                    ErrorCode::NotRegistered => Ok(LoginOutcome::NotRegistered),
                    ErrorCode::NeedsDeposit => Ok(LoginOutcome::RegisteredNoDeposit),
                    _ => Err(Error::UnexpectedResponse),
                }
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                Err(Error::FailedWithBody { status, body })
            }
        }
    }
}
