//! Production chain client backed by the JSON-RPC gateway.

use anyhow::Result;
use async_trait::async_trait;

use sol_wallet::{Blockhash, ParsedTransaction, RpcGateway, SignatureInfo};

use crate::driver::ChainClient;

pub struct SolanaChain {
    gateway: RpcGateway,
}

impl SolanaChain {
    pub fn new(gateway: RpcGateway) -> Self {
        Self { gateway }
    }

    pub fn endpoint(&self) -> &str {
        self.gateway.endpoint()
    }
}

#[async_trait]
impl ChainClient for SolanaChain {
    async fn balance(&self, address: &str) -> Result<u64> {
        Ok(self.gateway.get_balance(address).await?)
    }

    async fn latest_blockhash(&self) -> Result<Blockhash> {
        Ok(self.gateway.get_latest_blockhash().await?)
    }

    async fn signatures_for_address(
        &self,
        address: &str,
        limit: usize,
    ) -> Result<Vec<SignatureInfo>> {
        Ok(self
            .gateway
            .get_signatures_for_address(address, limit)
            .await?)
    }

    async fn transaction(&self, signature: &str) -> Result<Option<ParsedTransaction>> {
        Ok(self.gateway.get_transaction(signature).await?)
    }

    async fn submit_transaction(&self, signed_tx_base64: &str) -> Result<String> {
        Ok(self.gateway.send_transaction(signed_tx_base64).await?)
    }
}
