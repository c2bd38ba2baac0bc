//! Recommendation API client
//!
//! The scoring service is an opaque collaborator: we send the account's
//! asset positions and receive a proposed allocation plus ready-made
//! calldata. Only the `{data: ...}` envelope shape is relied on; any other
//! shape is a failure to retry. These calls carry their own retry budget
//! and never touch the account's nonce state.

mod aquaflux;

pub use aquaflux::{AquafluxClient, MintAuthorization};

use crate::config::ApiConfig;
use crate::error::{AgentError, AgentResult};

use base64::Engine;
use ethers::signers::{LocalWallet, Signer};
use ethers::types::Bytes;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;
use tokio::time::sleep;
use tracing::warn;

/// Allocation preferences forwarded verbatim to the scoring service
const PORTFOLIO_PROFILE: &str = "1. Mandatory Requirement: The product's TVL must be higher than one million USD.\n2. Balance Preference: Prioritize products that have a good balance of high current APY and high TVL.\n3. Portfolio Allocation: Select the 3 products with the best combined ranking in terms of current APY and TVL among those with TVL > 1,000,000 USD, and allocate the investment equally among them.";

#[derive(Debug, Clone, Serialize)]
pub struct ChainRef {
    pub id: u64,
}

/// One token position in the recommendation request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetPosition {
    pub chain: ChainRef,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub address: String,
    /// Raw token units as a decimal string
    pub assets: String,
    pub price: f64,
    pub assets_usd: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct RecommendationRequest {
    user: String,
    profile: String,
    user_positions: Vec<serde_json::Value>,
    user_assets: Vec<AssetPosition>,
    chain_ids: Vec<u64>,
    tokens: Vec<String>,
    protocols: Vec<String>,
    env: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ChangeTransactionsRequest {
    user: String,
    changes: serde_json::Value,
    prev_transaction_results: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
}

/// Proposed allocation; the change set is opaque to the agent
#[derive(Debug, Clone, Deserialize)]
pub struct Recommendation {
    pub changes: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ChainCalldata {
    data: String,
}

/// Client bound to one account and one chain
pub struct RecommendationClient {
    http: reqwest::Client,
    policy: ApiConfig,
    chain_id: u64,
    user: String,
    authorization: String,
}

impl RecommendationClient {
    /// Build a client whose authorization header is derived from a wallet
    /// signature over the account address.
    pub async fn new(policy: ApiConfig, chain_id: u64, signer: &LocalWallet) -> AgentResult<Self> {
        let user = format!("{:?}", signer.address());
        let signature = signer
            .sign_message(user.as_bytes())
            .await
            .map_err(|e| AgentError::Signing(format!("auth signature failed: {}", e)))?;
        let authorization =
            base64::engine::general_purpose::STANDARD.encode(signature.to_vec());

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(policy.request_timeout_secs))
            .build()
            .map_err(|e| AgentError::Api(format!("http client: {}", e)))?;

        Ok(Self {
            http,
            policy,
            chain_id,
            user,
            authorization,
        })
    }

    /// Fetch a proposed allocation for the given positions
    pub async fn portfolio_recommendation(
        &self,
        assets: Vec<AssetPosition>,
    ) -> AgentResult<Recommendation> {
        let tokens = assets.iter().map(|a| a.symbol.clone()).collect();
        let request = RecommendationRequest {
            user: self.user.clone(),
            profile: PORTFOLIO_PROFILE.to_string(),
            user_positions: Vec::new(),
            user_assets: assets,
            chain_ids: vec![self.chain_id],
            tokens,
            protocols: vec!["MockVault".to_string()],
            env: "pharos".to_string(),
        };

        self.post_with_retry("investment/financial-portfolio-recommendation", &request)
            .await
    }

    /// Turn an allocation change set into staking-router calldata
    pub async fn change_transactions(&self, changes: &serde_json::Value) -> AgentResult<Bytes> {
        let request = ChangeTransactionsRequest {
            user: self.user.clone(),
            changes: changes.clone(),
            prev_transaction_results: serde_json::json!({}),
        };

        let per_chain: HashMap<String, ChainCalldata> = self
            .post_with_retry("investment/generate-change-transactions", &request)
            .await?;

        let entry = per_chain.get(&self.chain_id.to_string()).ok_or_else(|| {
            AgentError::Api(format!(
                "change transactions missing chain {}",
                self.chain_id
            ))
        })?;

        entry
            .data
            .parse::<Bytes>()
            .map_err(|e| AgentError::Api(format!("invalid calldata hex: {}", e)))
    }

    async fn post_with_retry<P, T>(&self, path: &str, payload: &P) -> AgentResult<T>
    where
        P: Serialize,
        T: DeserializeOwned,
    {
        let url = format!("{}/{}", self.policy.base_url.trim_end_matches('/'), path);

        // Fixed pacing delay keeps request timing off the service's
        // rate limiter before the first attempt.
        sleep(Duration::from_secs(self.policy.pacing_delay_secs)).await;

        let mut last_error = String::new();
        for attempt in 0..self.policy.max_attempts {
            let result = self
                .http
                .post(&url)
                .header(reqwest::header::AUTHORIZATION, &self.authorization)
                .json(payload)
                .send()
                .await;

            match result {
                Ok(response) => match response.error_for_status() {
                    Ok(response) => match response.json::<Envelope<T>>().await {
                        Ok(Envelope { data: Some(data) }) => return Ok(data),
                        Ok(Envelope { data: None }) => {
                            last_error = "response missing data field".to_string();
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
                "API call {} attempt {}/{} failed: {}",
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
