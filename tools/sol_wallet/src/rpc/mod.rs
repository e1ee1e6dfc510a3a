mod client;
mod retry;

pub use client::{Blockhash, ParsedInstruction, ParsedTransaction, RpcGateway, SignatureInfo};
pub use retry::{retry_with_timeout, RetryConfig};
