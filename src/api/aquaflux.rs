//! AquaFlux service client
//!
//! Mints on the AquaFlux NFT contract require a short-lived authorization
//! issued by the project's backend: a wallet-login exchange yields a bearer
//! token, and the mint endpoint returns the `(nftType, expiresAt, signature)`
//! tuple the contract verifies on-chain. Responses carry a
//! `{success, data}` envelope.

use crate::config::ApiConfig;
use crate::error::{AgentError, AgentResult};

use ethers::signers::{LocalWallet, Signer};
use ethers::types::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::time::sleep;
use tracing::warn;

#[derive(Debug, Clone, Serialize)]
struct LoginRequest {
    address: String,
    message: String,
    signature: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct SignatureRequest {
    wallet_address: String,
    requested_nft_type: u64,
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    success: bool,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginData {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HoldingData {
    is_holding_token: bool,
}

/// Signed permission to call mint on the NFT contract
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MintAuthorization {
    pub nft_type: u64,
    pub expires_at: u64,
    pub signature: Bytes,
}

/// Client bound to one account
pub struct AquafluxClient {
    http: reqwest::Client,
    policy: ApiConfig,
    signer: LocalWallet,
}

impl AquafluxClient {
    pub fn new(policy: ApiConfig, signer: LocalWallet) -> AgentResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(policy.request_timeout_secs))
            .build()
            .map_err(|e| AgentError::Api(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            policy,
            signer,
        })
    }

    /// Exchange a signed timestamped message for a bearer token
    pub async fn login(&self) -> AgentResult<String> {
        let timestamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let message = format!("Sign in to AquaFlux with timestamp: {}", timestamp);
        let signature = self
            .signer
            .sign_message(message.as_bytes())
            .await
            .map_err(|e| AgentError::Signing(format!("login signature failed: {}", e)))?;

        let request = LoginRequest {
            address: format!("{:?}", self.signer.address()),
            message,
            signature: format!("0x{}", signature),
        };

        let data: LoginData = self
            .post_with_retry("users/wallet-login", &request, None)
            .await?;
        Ok(data.access_token)
    }

    /// Whether the backend sees the account as holding the crafted token
    pub async fn check_token_holding(&self, token: &str) -> AgentResult<bool> {
        let data: HoldingData = self
            .post_with_retry(
                "users/check-token-holding",
                &serde_json::json!({}),
                Some(token),
            )
            .await?;
        Ok(data.is_holding_token)
    }

    /// Fetch a mint authorization for the given NFT type
    pub async fn mint_authorization(
        &self,
        token: &str,
        nft_type: u64,
    ) -> AgentResult<MintAuthorization> {
        let request = SignatureRequest {
            wallet_address: format!("{:?}", self.signer.address()),
            requested_nft_type: nft_type,
        };
        self.post_with_retry("users/get-signature", &request, Some(token))
            .await
    }

    async fn post_with_retry<P, T>(
        &self,
        path: &str,
        payload: &P,
        bearer: Option<&str>,
    ) -> AgentResult<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.policy.base_url.trim_end_matches('/'), path);

        let mut last_error = String::new();
        for attempt in 0..self.policy.max_attempts {
            let mut builder = self.http.post(&url).json(payload);
            if let Some(token) = bearer {
                builder = builder.bearer_auth(token);
            }

            match builder.send().await {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => match response.json::<ApiResponse<T>>().await {
                        Ok(ApiResponse {
                            success: true,
                            data: Some(data),
                        }) => return Ok(data),
                        Ok(_) => {
                            last_error = "response not successful or missing data".to_string();
                        }
                        Err(e) => {
                            last_error = format!("malformed response: {}", e);
                        }
                    },
                    Err(e) => {
                        last_error = e.to_string();
                    }
                },
                Err(e) => {
                    last_error = e.to_string();
                }
            }

            warn!(
                "AquaFlux call {} attempt {}/{} failed: {}",
                path,
                attempt + 1,
                self.policy.max_attempts,
                last_error
            );
            if attempt + 1 < self.policy.max_attempts {
                sleep(Duration::from_secs(self.policy.retry_delay_secs)).await;
            }
        }

        Err(AgentError::Api(format!(
            "{} failed after {} attempts: {}",
            path, self.policy.max_attempts, last_error
        )))
    }
}
