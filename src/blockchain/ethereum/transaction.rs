//! Unsigned EVM transaction payloads accepted by the signer.
//!
//! Payloads are JSON objects tagged by `"type"`:
//! `legacy`, `access_list` (EIP-2930) or `dynamic_fee` (EIP-1559).
use ethers::types::transaction::eip2718::TypedTransaction;
use ethers::types::transaction::eip2930::AccessList;
use ethers::types::{
    Address, Bytes, Eip1559TransactionRequest, Eip2930TransactionRequest, TransactionRequest, U256,
};
use serde::{Deserialize, Serialize};

use crate::core::errors::WalletError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvmTxType {
    Legacy,
    AccessList,
    DynamicFee,
}

impl EvmTxType {
    pub fn from_tag(tag: &str) -> Result<Self, WalletError> {
        match tag {
            "legacy" => Ok(EvmTxType::Legacy),
            "access_list" => Ok(EvmTxType::AccessList),
            "dynamic_fee" => Ok(EvmTxType::DynamicFee),
            other => Err(WalletError::UnsupportedTransactionType(other.to_string())),
        }
    }

    /// EIP-2718 envelope byte; legacy transactions have none.
    pub fn type_byte(&self) -> Option<u8> {
        match self {
            EvmTxType::Legacy => None,
            EvmTxType::AccessList => Some(0x01),
            EvmTxType::DynamicFee => Some(0x02),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LegacyTxData {
    pub nonce: u64,
    pub gas: u64,
    pub gas_price: Option<U256>,
    pub to: Option<Address>,
    pub value: Option<U256>,
    #[serde(default)]
    pub data: Bytes,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessListTxData {
    pub nonce: u64,
    pub gas: u64,
    pub gas_price: Option<U256>,
    pub to: Option<Address>,
    pub value: Option<U256>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub access_list: AccessList,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DynamicFeeTxData {
    pub nonce: u64,
    pub gas: u64,
    pub max_priority_fee_per_gas: Option<U256>,
    pub max_fee_per_gas: Option<U256>,
    pub to: Option<Address>,
    pub value: Option<U256>,
    #[serde(default)]
    pub data: Bytes,
    #[serde(default)]
    pub access_list: AccessList,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EvmTxRequest {
    Legacy(LegacyTxData),
    AccessList(AccessListTxData),
    DynamicFee(DynamicFeeTxData),
}

impl EvmTxRequest {
    /// Decodes a JSON payload. Unknown `"type"` tags are reported as
    /// [`WalletError::UnsupportedTransactionType`] rather than as a parse error.
    pub fn decode(payload: &[u8]) -> Result<Self, WalletError> {
        let value: serde_json::Value = serde_json::from_slice(payload)?;
        let tag = value
            .get("type")
            .and_then(|t| t.as_str())
            .ok_or(WalletError::MissingRequiredField("type"))?;
        EvmTxType::from_tag(tag)?;
        Ok(serde_json::from_value(value)?)
    }

    pub fn encode(&self) -> Result<Vec<u8>, WalletError> {
        Ok(serde_json::to_vec(self)?)
    }

    pub fn tx_type(&self) -> EvmTxType {
        match self {
            EvmTxRequest::Legacy(_) => EvmTxType::Legacy,
            EvmTxRequest::AccessList(_) => EvmTxType::AccessList,
            EvmTxRequest::DynamicFee(_) => EvmTxType::DynamicFee,
        }
    }

    /// Validates mandatory fields and builds the ethers transaction for `chain_id`.
    pub fn to_typed_transaction(&self, chain_id: u64, from: Address) -> Result<TypedTransaction, WalletError> {
        match self {
            EvmTxRequest::Legacy(tx) => {
                let request = legacy_request(
                    tx.nonce,
                    tx.gas,
                    tx.gas_price,
                    tx.to,
                    tx.value,
                    &tx.data,
                    chain_id,
                    from,
                )?;
                Ok(TypedTransaction::Legacy(request))
            }
            EvmTxRequest::AccessList(tx) => {
                if tx.access_list.0.is_empty() {
                    return Err(WalletError::MissingRequiredField("access_list"));
                }
                let request = legacy_request(
                    tx.nonce,
                    tx.gas,
                    tx.gas_price,
                    tx.to,
                    tx.value,
                    &tx.data,
                    chain_id,
                    from,
                )?;
                Ok(TypedTransaction::Eip2930(Eip2930TransactionRequest::new(
                    request,
                    tx.access_list.clone(),
                )))
            }
            EvmTxRequest::DynamicFee(tx) => {
                let to = tx.to.ok_or(WalletError::MissingRequiredField("to"))?;
                let value = tx.value.ok_or(WalletError::MissingRequiredField("value"))?;
                let max_fee = tx
                    .max_fee_per_gas
                    .ok_or(WalletError::MissingRequiredField("max_fee_per_gas"))?;
                let tip = tx
                    .max_priority_fee_per_gas
                    .ok_or(WalletError::MissingRequiredField("max_priority_fee_per_gas"))?;
                let request = Eip1559TransactionRequest::new()
                    .from(from)
                    .to(to)
                    .value(value)
                    .gas(tx.gas)
                    .nonce(tx.nonce)
                    .data(tx.data.clone())
                    .max_fee_per_gas(max_fee)
                    .max_priority_fee_per_gas(tip)
                    .access_list(tx.access_list.clone())
                    .chain_id(chain_id);
                Ok(TypedTransaction::Eip1559(request))
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn legacy_request(
    nonce: u64,
    gas: u64,
    gas_price: Option<U256>,
    to: Option<Address>,
    value: Option<U256>,
    data: &Bytes,
    chain_id: u64,
    from: Address,
) -> Result<TransactionRequest, WalletError> {
    let to = to.ok_or(WalletError::MissingRequiredField("to"))?;
    let value = value.ok_or(WalletError::MissingRequiredField("value"))?;
    let gas_price = gas_price.ok_or(WalletError::MissingRequiredField("gas_price"))?;
    Ok(TransactionRequest::new()
        .from(from)
        .to(to)
        .value(value)
        .gas(gas)
        .gas_price(gas_price)
        .nonce(nonce)
        .data(data.clone())
        .chain_id(chain_id))
}
