//! ERC-20 reads and calldata
//!
//! Minimal hand-rolled surface: selectors are computed at runtime from the
//! canonical signatures and arguments ABI-encoded directly, which keeps the
//! token path free of generated bindings.

use super::provider::ChainRpc;
use crate::error::{RpcError, RpcResult};

use ethers::abi::{self, Token};
use ethers::prelude::*;
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::utils::id;

/// Calldata for approve(spender, amount)
pub fn approve_calldata(spender: Address, amount: U256) -> Bytes {
    let mut data = id("approve(address,uint256)").to_vec();
    data.extend(abi::encode(&[Token::Address(spender), Token::Uint(amount)]));
    Bytes::from(data)
}

/// Token balance of an owner
pub async fn balance_of(rpc: &dyn ChainRpc, token: Address, owner: Address) -> RpcResult<U256> {
    let mut data = id("balanceOf(address)").to_vec();
    data.extend(abi::encode(&[Token::Address(owner)]));
    read_uint(rpc, token, Bytes::from(data)).await
}

/// Remaining allowance granted by owner to spender
pub async fn allowance(
    rpc: &dyn ChainRpc,
    token: Address,
    owner: Address,
    spender: Address,
) -> RpcResult<U256> {
    let mut data = id("allowance(address,address)").to_vec();
    data.extend(abi::encode(&[Token::Address(owner), Token::Address(spender)]));
    read_uint(rpc, token, Bytes::from(data)).await
}

/// eth_call returning a single uint256
pub async fn read_uint(rpc: &dyn ChainRpc, to: Address, data: Bytes) -> RpcResult<U256> {
    let tx = TypedTransaction::Legacy(TransactionRequest::new().to(to).data(data));
    let raw = rpc.call(tx).await?;
    decode_uint(&raw)
}

fn decode_uint(raw: &Bytes) -> RpcResult<U256> {
    if raw.len() < 32 {
        return Err(RpcError::Transient(format!(
            "short eth_call return: {} bytes",
            raw.len()
        )));
    }
    Ok(U256::from_big_endian(&raw[..32]))
}
