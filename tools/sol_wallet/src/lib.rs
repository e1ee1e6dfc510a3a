//! Solana wallet primitives for the mix relay.
//!
//! Auditor notes:
//! - Key material is isolated under `crypto/` and zeroized on drop.
//! - Transfer transactions are assembled byte-by-byte; no chain SDK is linked.
//! - RPC access is a thin JSON-RPC client with ordered endpoint fallback.

pub mod crypto;
pub mod rpc;
pub mod tx;
pub mod types;
pub mod watcher;

pub use crypto::{decode_address, encode_address, SecretKey};
pub use rpc::{
    Blockhash, ParsedInstruction, ParsedTransaction, RetryConfig, RpcGateway, SignatureInfo,
};
pub use tx::{build_transfer, serialize_transfer_message, LAMPORTS_PER_SOL};
pub use types::{CodecError, Result, SolWalletError};
pub use watcher::{DepositWatcher, DetectorConfig};
