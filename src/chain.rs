//! RPC plumbing shared by the contract client and the funding step
//!
//! SECURITY NOTE:
//! - Providers are built around an `EthereumWallet`; raw keys never reach here
//! - Error text from the node is reduced to a revert reason before display

use crate::wallet::SecureWallet;
use crate::{Error, Result};
use alloy::hex;
use alloy::primitives::utils::parse_ether;
use alloy::primitives::{Address, TxHash, U256};
use alloy::providers::{DynProvider, Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;

/// Fallback message when a failure carries no readable reason
pub const GENERIC_FAILURE: &str = "Transaction failed";

fn parse_url(rpc_url: &str) -> Result<url::Url> {
    rpc_url
        .parse()
        .map_err(|e| Error::Config(format!("Invalid RPC URL {}: {}", rpc_url, e)))
}

/// Read-only provider
pub fn connect(rpc_url: &str) -> Result<DynProvider> {
    Ok(ProviderBuilder::new().connect_http(parse_url(rpc_url)?).erased())
}

/// Provider that signs and fills transactions with `signer`
pub fn connect_with_signer(rpc_url: &str, signer: &SecureWallet) -> Result<DynProvider> {
    Ok(ProviderBuilder::new()
        .wallet(signer.wallet().clone())
        .connect_http(parse_url(rpc_url)?)
        .erased())
}

/// Classify an RPC/contract failure as a revert or a network problem
pub fn classify_error(error: impl std::fmt::Display) -> Error {
    let text = error.to_string();
    let lower = text.to_lowercase();
    if lower.contains("revert") {
        Error::TransactionReverted {
            reason: parse_revert_reason(&text),
        }
    } else {
        Error::Network(text)
    }
}

/// Extract the human-readable revert reason from node error text
pub fn parse_revert_reason(error: &str) -> String {
    // viem/ethers style: "reverted with the following reason:\n<reason>\n"
    if let Some(start) = error.find("reverted with the following reason:") {
        let rest = error[start + "reverted with the following reason:".len()..].trim_start();
        if let Some(line) = rest.lines().next().map(str::trim).filter(|l| !l.is_empty()) {
            return line.to_string();
        }
    }

    if error.contains("execution reverted") {
        if let Some(start) = error.find("revert: ") {
            let reason = &error[start + 8..];
            let end = reason.find('"').unwrap_or(reason.len());
            return reason[..end].trim().to_string();
        }
        if let Some(start) = error.find("execution reverted: ") {
            let reason = error[start + 20..].trim();
            if !reason.is_empty() && !reason.starts_with("0x") {
                let end = reason.find(['"', ',']).unwrap_or(reason.len());
                return reason[..end].trim().to_string();
            }
        }
        if let Some(reason) = decode_error_string(error) {
            return reason;
        }
    }

    GENERIC_FAILURE.to_string()
}

/// Decode an ABI `Error(string)` payload (selector 0x08c379a0) found in text
fn decode_error_string(error: &str) -> Option<String> {
    let start = error.find("0x08c379a0")?;
    let hex_data = &error[start..];
    let end = hex_data[2..]
        .find(|c: char| !c.is_ascii_hexdigit())
        .map_or(hex_data.len(), |i| i + 2);
    let bytes = hex::decode(&hex_data[10..end]).ok()?;

    // offset (32) | length (32) | data
    if bytes.len() < 64 {
        return None;
    }
    let len: usize = U256::from_be_slice(&bytes[32..64]).try_into().ok()?;
    let data = bytes.get(64..64usize.checked_add(len)?)?;
    String::from_utf8(data.to_vec()).ok()
}

/// Send native currency from `from` to `to` and wait for confirmation
///
/// `amount` is in whole units of the native token (e.g. "0.1").
pub async fn transfer_native(
    rpc_url: &str,
    from: &SecureWallet,
    to: Address,
    amount: &str,
) -> Result<TxHash> {
    let value = parse_ether(amount)
        .map_err(|e| Error::InvalidArgument(format!("Invalid amount {}: {}", amount, e)))?;
    let provider = connect_with_signer(rpc_url, from)?;

    let tx = TransactionRequest::default()
        .from(from.address())
        .to(to)
        .value(value);

    let pending = provider.send_transaction(tx).await.map_err(classify_error)?;
    let receipt = pending.get_receipt().await.map_err(classify_error)?;
    if !receipt.status() {
        return Err(Error::TransactionReverted {
            reason: GENERIC_FAILURE.to_string(),
        });
    }

    tracing::info!(
        from = %from.address(),
        to = %to,
        amount,
        tx_hash = %receipt.transaction_hash,
        "Funded game wallet"
    );
    Ok(receipt.transaction_hash)
}
