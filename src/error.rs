//! Error types for the Pharos agent

use thiserror::Error;

/// Classified RPC failure, produced once at the provider boundary.
///
/// Classification happens in `chain::provider` by inspecting the provider's
/// error surface; everything above the boundary matches on these variants
/// instead of error strings.
#[derive(Error, Debug, Clone)]
pub enum RpcError {
    #[error("nonce conflict: {0}")]
    NonceConflict(String),

    #[error("insufficient funds: {0}")]
    InsufficientFunds(String),

    #[error("not yet available: {0}")]
    NotYetAvailable(String),

    #[error("timeout during {0}")]
    Timeout(String),

    #[error("transient rpc failure: {0}")]
    Transient(String),
}

impl RpcError {
    /// Whether a later retry of the same call can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, RpcError::InsufficientFunds(_))
    }
}

/// Result type for RPC calls
pub type RpcResult<T> = Result<T, RpcError>;

/// Main error type for the agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("Rpc error: {0}")]
    Rpc(#[from] RpcError),

    #[error("Gas estimation error: {0}")]
    GasEstimation(String),

    #[error("Signing error: {0}")]
    Signing(String),

    #[error("Recommendation API error: {0}")]
    Api(String),
}

/// Result type for agent operations
pub type AgentResult<T> = Result<T, AgentError>;
