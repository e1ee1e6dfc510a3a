//! JSON-RPC gateway to the ledger network.
//!
//! The gateway is bound to a single endpoint chosen from an ordered
//! candidate list at construction time, so no call mixes state across
//! endpoints. Every method is bounded by the retry policy in
//! [`super::retry`].

use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use crate::rpc::retry::{retry_with_timeout, RetryConfig};
use crate::types::{Result, SolWalletError};

/// Retry budget forwarded to the node with `sendTransaction`.
const SEND_MAX_RETRIES: u64 = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct Blockhash {
    pub blockhash: String,
    #[serde(rename = "lastValidBlockHeight")]
    pub last_valid_block_height: u64,
}

/// One entry of a `getSignaturesForAddress` response, most recent first.
#[derive(Debug, Clone, Deserialize)]
pub struct SignatureInfo {
    pub signature: String,
    #[serde(default)]
    pub err: Option<Value>,
    #[serde(rename = "blockTime", default)]
    pub block_time: Option<i64>,
}

/// A parsed instruction reduced to the fields deposit matching needs.
#[derive(Debug, Clone)]
pub struct ParsedInstruction {
    pub program: String,
    pub kind: String,
    pub source: Option<String>,
    pub destination: Option<String>,
    pub lamports: Option<u64>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedTransaction {
    /// True when the transaction meta records an execution error.
    pub failed: bool,
    pub instructions: Vec<ParsedInstruction>,
}

pub struct RpcGateway {
    http: reqwest::Client,
    endpoint: String,
    retry: RetryConfig,
}

impl RpcGateway {
    /// Probes `endpoints` in order with a blockhash fetch and binds to the
    /// first one that answers.
    pub async fn connect(endpoints: &[String], retry: RetryConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(retry.timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("build http client: {err}"))?;

        for endpoint in endpoints {
            let candidate = Self {
                http: http.clone(),
                endpoint: endpoint.clone(),
                retry: retry.clone(),
            };
            match candidate.call_once("getLatestBlockhash", json!([])).await {
                Ok(_) => {
                    info!(endpoint, "rpc endpoint selected");
                    return Ok(candidate);
                }
                Err(err) => {
                    warn!(endpoint, %err, "rpc endpoint failed liveness probe");
                }
            }
        }

        Err(SolWalletError::NoLiveEndpoint {
            tried: endpoints.len(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub async fn get_balance(&self, address: &str) -> Result<u64> {
        let result = self
            .call(
                "getBalance",
                json!([address, { "commitment": "confirmed" }]),
            )
            .await?;
        result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| self.shape_error("getBalance", "missing value"))
    }

    pub async fn get_latest_blockhash(&self) -> Result<Blockhash> {
        let result = self
            .call("getLatestBlockhash", json!([{ "commitment": "finalized" }]))
            .await?;
        let value = result
            .get("value")
            .cloned()
            .ok_or_else(|| self.shape_error("getLatestBlockhash", "missing value"))?;
        serde_json::from_value(value)
            .map_err(|err| self.shape_error("getLatestBlockhash", &err.to_string()))
    }

    pub async fn get_signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        let result = self
            .call(
                "getSignaturesForAddress",
                json!([address, { "limit": limit }]),
            )
            .await?;
        if result.is_null() {
            return Ok(Vec::new());
        }
        serde_json::from_value(result)
            .map_err(|err| self.shape_error("getSignaturesForAddress", &err.to_string()))
    }

    /// Returns `None` while the transaction is not yet queryable.
    pub async fn get_transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>> {
        let result = self
            .call(
                "getTransaction",
                json!([
                    signature,
                    { "encoding": "jsonParsed", "maxSupportedTransactionVersion": 0 }
                ]),
            )
            .await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(parse_transaction(&result)))
    }

    /// Submits a signed transaction, skipping preflight simulation.
    pub async fn send_transaction(&self, signed_tx_base64: &str) -> Result<String> {
        let result = self
            .call(
                "sendTransaction",
                json!([
                    signed_tx_base64,
                    {
                        "encoding": "base64",
                        "skipPreflight": true,
                        "preflightCommitment": "confirmed",
                        "maxRetries": SEND_MAX_RETRIES
                    }
                ]),
            )
            .await?;
        result
            .as_str()
            .map(str::to_string)
            .ok_or_else(|| self.shape_error("sendTransaction", "missing signature"))
    }

    async fn call(&self, method: &'static str, params: Value) -> Result<Value> {
        retry_with_timeout(method, &self.retry, || {
            self.call_once(method, params.clone())
        })
        .await
    }

    async fn call_once(&self, method: &'static str, params: Value) -> Result<Value> {
        debug!(endpoint = %self.endpoint, method, "rpc request");
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.endpoint)
            .json(&body)
            .send()
            .await
            .map_err(|err| self.rpc_error(method, err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(self.rpc_error(method, format!("http status {status}")));
        }

        let envelope: RpcEnvelope = response
            .json()
            .await
            .map_err(|err| self.rpc_error(method, err.to_string()))?;
        if let Some(error) = envelope.error {
            return Err(self.rpc_error(method, format!("{} ({})", error.message, error.code)));
        }
        envelope
            .result
            .ok_or_else(|| self.rpc_error(method, "missing result".to_string()))
    }

    fn rpc_error(&self, method: &'static str, details: String) -> SolWalletError {
        SolWalletError::Rpc {
            endpoint: self.endpoint.clone(),
            method,
            details,
        }
    }

    fn shape_error(&self, method: &'static str, details: &str) -> SolWalletError {
        self.rpc_error(method, format!("unexpected response shape: {details}"))
    }
}

#[derive(Deserialize)]
struct RpcEnvelope {
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<RpcErrorBody>,
}

#[derive(Deserialize)]
struct RpcErrorBody {
    code: i64,
    message: String,
}

/// Reduces a jsonParsed `getTransaction` result to the fields the deposit
/// watcher consumes. Instructions without a parsed payload are dropped.
fn parse_transaction(result: &Value) -> ParsedTransaction {
    let failed = result
        .pointer("/meta/err")
        .map(|err| !err.is_null())
        .unwrap_or(false);

    let instructions = result
        .pointer("/transaction/message/instructions")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(|entry| {
                    let program = entry.get("program")?.as_str()?.to_string();
                    let parsed = entry.get("parsed")?;
                    let kind = parsed.get("type")?.as_str()?.to_string();
                    let info = parsed.get("info");
                    let field = |name: &str| {
                        info.and_then(|i| i.get(name))
                            .and_then(Value::as_str)
                            .map(str::to_string)
                    };
                    Some(ParsedInstruction {
                        program,
                        kind,
                        source: field("source"),
                        destination: field("destination"),
                        lamports: info.and_then(|i| i.get("lamports")).and_then(Value::as_u64),
                    })
                })
                .collect()
        })
        .unwrap_or_default();

    ParsedTransaction {
        failed,
        instructions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_signature_listing() {
        let raw = json!([
            { "signature": "sigA", "err": null, "blockTime": 1700000000, "slot": 5 },
            { "signature": "sigB", "err": { "InstructionError": [0, "Custom"] } }
        ]);
        let infos: Vec<SignatureInfo> = serde_json::from_value(raw).unwrap();
        assert_eq!(infos.len(), 2);
        assert_eq!(infos[0].signature, "sigA");
        assert!(infos[0].err.is_none());
        assert_eq!(infos[0].block_time, Some(1_700_000_000));
        assert!(infos[1].err.is_some());
        assert_eq!(infos[1].block_time, None);
    }

    #[test]
    fn parses_blockhash_value() {
        let raw = json!({ "blockhash": "9xQeWvG816bUx9EPjHmaT23yvVM2ZWbrrpZb9PusVFin", "lastValidBlockHeight": 4242 });
        let parsed: Blockhash = serde_json::from_value(raw).unwrap();
        assert_eq!(parsed.last_valid_block_height, 4242);
    }

    #[test]
    fn reduces_parsed_transfer_transaction() {
        let raw = json!({
            "meta": { "err": null },
            "transaction": {
                "message": {
                    "instructions": [
                        {
                            "program": "system",
                            "programId": "11111111111111111111111111111111",
                            "parsed": {
                                "type": "transfer",
                                "info": {
                                    "source": "src",
                                    "destination": "dst",
                                    "lamports": 995_000_000u64
                                }
                            }
                        },
                        { "programId": "MemoSq4gqABAXKb96qnH8TysNcWxMyWCqXgDLGmfcHr", "data": "xyz" }
                    ]
                }
            }
        });
        let tx = parse_transaction(&raw);
        assert!(!tx.failed);
        assert_eq!(tx.instructions.len(), 1);
        let ix = &tx.instructions[0];
        assert_eq!(ix.program, "system");
        assert_eq!(ix.kind, "transfer");
        assert_eq!(ix.destination.as_deref(), Some("dst"));
        assert_eq!(ix.lamports, Some(995_000_000));
    }

    #[test]
    fn flags_failed_transactions() {
        let raw = json!({
            "meta": { "err": { "InsufficientFundsForFee": {} } },
            "transaction": { "message": { "instructions": [] } }
        });
        assert!(parse_transaction(&raw).failed);
    }
}
