//! Operator wallet loading
//!
//! Keys come from an environment variable (single-account dev mode) or a
//! keys file with one hex private key per line. Each key becomes an
//! independent account session at process start; nothing is persisted.

use crate::config::WalletConfig;
use crate::error::{AgentError, AgentResult};

use ethers::signers::{LocalWallet, Signer};
use std::path::Path;
use tracing::info;

/// Load all configured signing keys, bound to the target chain
pub fn load_wallets(config: &WalletConfig, chain_id: u64) -> AgentResult<Vec<LocalWallet>> {
    // Environment variable wins (dev mode)
    if let Some(var) = &config.private_key_env {
        if let Ok(key) = std::env::var(var) {
            let wallet = parse_key(&key)?.with_chain_id(chain_id);
            info!("Loaded wallet from ${}: {:?}", var, wallet.address());
            return Ok(vec![wallet]);
        }
    }

    if let Some(path) = &config.keys_file {
        return load_keys_file(Path::new(path), chain_id);
    }

    Err(AgentError::Wallet(
        "No wallet configured. Set the key env var or configure wallet.keys_file".to_string(),
    ))
}

fn load_keys_file(path: &Path, chain_id: u64) -> AgentResult<Vec<LocalWallet>> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| AgentError::Wallet(format!("Failed to read {:?}: {}", path, e)))?;

    let mut wallets = Vec::new();
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        wallets.push(parse_key(line)?.with_chain_id(chain_id));
    }

    if wallets.is_empty() {
        return Err(AgentError::Wallet(format!("No keys found in {:?}", path)));
    }

    info!("Loaded {} wallet(s) from {:?}", wallets.len(), path);
    Ok(wallets)
}

fn parse_key(key: &str) -> AgentResult<LocalWallet> {
    key.trim_start_matches("0x")
        .parse::<LocalWallet>()
        .map_err(|e| AgentError::Wallet(format!("Invalid private key: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const KEY_A: &str = "ac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
    const KEY_B: &str = "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

    #[test]
    fn test_keys_file_skips_blank_lines() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{}", KEY_A).unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  {}  ", KEY_B).unwrap();

        let wallets = load_keys_file(file.path(), 688688).unwrap();
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[0].chain_id(), 688688);
        assert_ne!(wallets[0].address(), wallets[1].address());
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "not-a-key").unwrap();

        let err = load_keys_file(file.path(), 688688).unwrap_err();
        assert!(matches!(err, AgentError::Wallet(_)));
    }
}
